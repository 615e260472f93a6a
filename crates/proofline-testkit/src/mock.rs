//! Collaborator doubles.

use std::sync::Mutex;

use proofline_contracts::{
    anchor::{Certificate, RevocationStatus},
    result::{CheckId, CheckResult, CheckStatus, VerificationStatus},
};
use proofline_core::{RevocationChecker, RevocationUnavailable, VerificationObserver};

/// A revocation source that can never be reached.
#[derive(Debug, Default)]
pub struct UnavailableRevocation;

impl RevocationChecker for UnavailableRevocation {
    fn status(&self, _certificate: &Certificate) -> Result<RevocationStatus, RevocationUnavailable> {
        Err(RevocationUnavailable {
            reason: "responder unreachable".to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed {
    Status(VerificationStatus),
    Started(CheckId),
    Finished(CheckId, CheckStatus),
    Progress(u64),
}

/// Records every observer callback in order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    seen: Mutex<Vec<Observed>>,
}

impl RecordingObserver {
    pub fn seen(&self) -> Vec<Observed> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn push(&self, item: Observed) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(item);
        }
    }
}

impl VerificationObserver for RecordingObserver {
    fn status_changed(&self, status: VerificationStatus) {
        self.push(Observed::Status(status));
    }

    fn check_started(&self, check: CheckId) {
        self.push(Observed::Started(check));
    }

    fn check_finished(&self, result: &CheckResult) {
        self.push(Observed::Finished(result.id, result.status));
    }

    fn asset_progress(&self, bytes_done: u64, _bytes_total: Option<u64>) {
        self.push(Observed::Progress(bytes_done));
    }
}
