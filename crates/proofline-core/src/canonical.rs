//! Deterministic canonical serialization.
//!
//! Every digest in the system is taken over the output of this module, and a
//! signing collaborator must produce its bytes the same way.  The rules:
//!
//! - object keys sorted by UTF-8 byte order (equivalently, code-point order)
//! - no insignificant whitespace
//! - strings escape `"`, `\`, and control characters (`\u00xx`) only
//! - integral numbers print without a fractional part, `-0` prints `0`
//! - NaN and infinities print `null`
//!
//! Values enter through `serde::Serialize` via [`to_canonical_value`], which
//! builds an intermediate JSON tree and rejects what JSON cannot represent
//! (byte blobs, non-string map keys), or as an already-parsed
//! `serde_json::Value` via [`canonicalize_value`].

use serde::ser::{self, Serialize};
use serde_json::{Map, Number, Value};

use proofline_contracts::error::{ProoflineError, ProoflineResult};

/// Canonical bytes of any serializable value.
pub fn canonicalize<T: Serialize + ?Sized>(value: &T) -> ProoflineResult<Vec<u8>> {
    let tree = to_canonical_value(value)?;
    Ok(canonicalize_value(&tree))
}

/// Reduce a serializable value to a JSON tree with canonical number handling.
///
/// Fails on byte blobs, non-string map keys, and integers outside 64 bits.
pub fn to_canonical_value<T: Serialize + ?Sized>(value: &T) -> ProoflineResult<Value> {
    value.serialize(TreeSerializer)
}

/// Canonical bytes of an already-parsed JSON value.  Total: every `Value` has
/// a canonical form.
pub fn canonicalize_value(value: &Value) -> Vec<u8> {
    let mut out = Vec::with_capacity(256);
    write_value(&mut out, value);
    out
}

// ── Writer ────────────────────────────────────────────────────────────────────

fn write_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => write_number(out, n),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(out, item);
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
            out.push(b'{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_string(out, key);
                out.push(b':');
                write_value(out, item);
            }
            out.push(b'}');
        }
    }
}

fn write_number(out: &mut Vec<u8>, n: &Number) {
    if let Some(i) = n.as_i64() {
        out.extend_from_slice(i.to_string().as_bytes());
    } else if let Some(u) = n.as_u64() {
        out.extend_from_slice(u.to_string().as_bytes());
    } else if let Some(f) = n.as_f64() {
        write_float(out, f);
    } else {
        out.extend_from_slice(b"null");
    }
}

// Largest magnitude that survives an `f64 -> i64` cast.
const I64_SAFE: f64 = 9.2e18;

fn write_float(out: &mut Vec<u8>, f: f64) {
    if !f.is_finite() {
        out.extend_from_slice(b"null");
    } else if f.fract() == 0.0 && f.abs() < I64_SAFE {
        out.extend_from_slice((f as i64).to_string().as_bytes());
    } else {
        // `Display` for f64 is the shortest round-trip decimal and never uses
        // exponent notation, so integral values beyond i64 also print bare.
        out.extend_from_slice(f.to_string().as_bytes());
    }
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    out.push(b'"');
    for ch in s.chars() {
        match ch {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            c if (c as u32) < 0x20 => {
                out.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes());
            }
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}

// ── Tree serializer ───────────────────────────────────────────────────────────

fn float_value(f: f64) -> Value {
    if !f.is_finite() {
        Value::Null
    } else if f.fract() == 0.0 && f.abs() < I64_SAFE {
        Value::Number(Number::from(f as i64))
    } else {
        Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
    }
}

fn unsupported(what: &str) -> ProoflineError {
    ProoflineError::Canonicalization {
        reason: format!("{what} cannot be canonicalized"),
    }
}

struct TreeSerializer;

impl ser::Serializer for TreeSerializer {
    type Ok = Value;
    type Error = ProoflineError;
    type SerializeSeq = SeqBuilder;
    type SerializeTuple = SeqBuilder;
    type SerializeTupleStruct = SeqBuilder;
    type SerializeTupleVariant = VariantSeqBuilder;
    type SerializeMap = MapBuilder;
    type SerializeStruct = MapBuilder;
    type SerializeStructVariant = VariantMapBuilder;

    fn serialize_bool(self, v: bool) -> ProoflineResult<Value> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> ProoflineResult<Value> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i16(self, v: i16) -> ProoflineResult<Value> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i32(self, v: i32) -> ProoflineResult<Value> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i64(self, v: i64) -> ProoflineResult<Value> {
        Ok(Value::Number(v.into()))
    }

    fn serialize_i128(self, v: i128) -> ProoflineResult<Value> {
        if let Ok(i) = i64::try_from(v) {
            self.serialize_i64(i)
        } else if let Ok(u) = u64::try_from(v) {
            self.serialize_u64(u)
        } else {
            Err(unsupported("a 128-bit integer outside the 64-bit range"))
        }
    }

    fn serialize_u8(self, v: u8) -> ProoflineResult<Value> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u16(self, v: u16) -> ProoflineResult<Value> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u32(self, v: u32) -> ProoflineResult<Value> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u64(self, v: u64) -> ProoflineResult<Value> {
        Ok(Value::Number(v.into()))
    }

    fn serialize_u128(self, v: u128) -> ProoflineResult<Value> {
        match u64::try_from(v) {
            Ok(u) => self.serialize_u64(u),
            Err(_) => Err(unsupported("a 128-bit integer outside the 64-bit range")),
        }
    }

    fn serialize_f32(self, v: f32) -> ProoflineResult<Value> {
        // Go through the f32's own shortest decimal so 0.1f32 stays 0.1.
        let widened = v.to_string().parse::<f64>().unwrap_or(f64::from(v));
        self.serialize_f64(widened)
    }

    fn serialize_f64(self, v: f64) -> ProoflineResult<Value> {
        Ok(float_value(v))
    }

    fn serialize_char(self, v: char) -> ProoflineResult<Value> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> ProoflineResult<Value> {
        Ok(Value::String(v.to_owned()))
    }

    fn serialize_bytes(self, _v: &[u8]) -> ProoflineResult<Value> {
        Err(unsupported("an opaque byte blob (encode it as a string first)"))
    }

    fn serialize_none(self) -> ProoflineResult<Value> {
        Ok(Value::Null)
    }

    fn serialize_some<T>(self, value: &T) -> ProoflineResult<Value>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> ProoflineResult<Value> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> ProoflineResult<Value> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> ProoflineResult<Value> {
        Ok(Value::String(variant.to_owned()))
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> ProoflineResult<Value>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> ProoflineResult<Value>
    where
        T: ?Sized + Serialize,
    {
        let mut map = Map::new();
        map.insert(variant.to_owned(), to_canonical_value(value)?);
        Ok(Value::Object(map))
    }

    fn serialize_seq(self, len: Option<usize>) -> ProoflineResult<SeqBuilder> {
        Ok(SeqBuilder {
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> ProoflineResult<SeqBuilder> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> ProoflineResult<SeqBuilder> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> ProoflineResult<VariantSeqBuilder> {
        Ok(VariantSeqBuilder {
            variant,
            items: Vec::with_capacity(len),
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> ProoflineResult<MapBuilder> {
        Ok(MapBuilder {
            map: Map::new(),
            pending_key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> ProoflineResult<MapBuilder> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> ProoflineResult<VariantMapBuilder> {
        Ok(VariantMapBuilder {
            variant,
            map: Map::new(),
        })
    }
}

struct SeqBuilder {
    items: Vec<Value>,
}

impl ser::SerializeSeq for SeqBuilder {
    type Ok = Value;
    type Error = ProoflineError;

    fn serialize_element<T>(&mut self, value: &T) -> ProoflineResult<()>
    where
        T: ?Sized + Serialize,
    {
        self.items.push(to_canonical_value(value)?);
        Ok(())
    }

    fn end(self) -> ProoflineResult<Value> {
        Ok(Value::Array(self.items))
    }
}

impl ser::SerializeTuple for SeqBuilder {
    type Ok = Value;
    type Error = ProoflineError;

    fn serialize_element<T>(&mut self, value: &T) -> ProoflineResult<()>
    where
        T: ?Sized + Serialize,
    {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> ProoflineResult<Value> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SeqBuilder {
    type Ok = Value;
    type Error = ProoflineError;

    fn serialize_field<T>(&mut self, value: &T) -> ProoflineResult<()>
    where
        T: ?Sized + Serialize,
    {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> ProoflineResult<Value> {
        ser::SerializeSeq::end(self)
    }
}

struct VariantSeqBuilder {
    variant: &'static str,
    items: Vec<Value>,
}

impl ser::SerializeTupleVariant for VariantSeqBuilder {
    type Ok = Value;
    type Error = ProoflineError;

    fn serialize_field<T>(&mut self, value: &T) -> ProoflineResult<()>
    where
        T: ?Sized + Serialize,
    {
        self.items.push(to_canonical_value(value)?);
        Ok(())
    }

    fn end(self) -> ProoflineResult<Value> {
        let mut map = Map::new();
        map.insert(self.variant.to_owned(), Value::Array(self.items));
        Ok(Value::Object(map))
    }
}

struct MapBuilder {
    map: Map<String, Value>,
    pending_key: Option<String>,
}

impl ser::SerializeMap for MapBuilder {
    type Ok = Value;
    type Error = ProoflineError;

    fn serialize_key<T>(&mut self, key: &T) -> ProoflineResult<()>
    where
        T: ?Sized + Serialize,
    {
        match to_canonical_value(key)? {
            Value::String(s) => {
                self.pending_key = Some(s);
                Ok(())
            }
            _ => Err(unsupported("a map with non-string keys")),
        }
    }

    fn serialize_value<T>(&mut self, value: &T) -> ProoflineResult<()>
    where
        T: ?Sized + Serialize,
    {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| unsupported("a map value without a key"))?;
        self.map.insert(key, to_canonical_value(value)?);
        Ok(())
    }

    fn end(self) -> ProoflineResult<Value> {
        Ok(Value::Object(self.map))
    }
}

impl ser::SerializeStruct for MapBuilder {
    type Ok = Value;
    type Error = ProoflineError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> ProoflineResult<()>
    where
        T: ?Sized + Serialize,
    {
        self.map.insert(key.to_owned(), to_canonical_value(value)?);
        Ok(())
    }

    fn end(self) -> ProoflineResult<Value> {
        Ok(Value::Object(self.map))
    }
}

struct VariantMapBuilder {
    variant: &'static str,
    map: Map<String, Value>,
}

impl ser::SerializeStructVariant for VariantMapBuilder {
    type Ok = Value;
    type Error = ProoflineError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> ProoflineResult<()>
    where
        T: ?Sized + Serialize,
    {
        self.map.insert(key.to_owned(), to_canonical_value(value)?);
        Ok(())
    }

    fn end(self) -> ProoflineResult<Value> {
        let mut outer = Map::new();
        outer.insert(self.variant.to_owned(), Value::Object(self.map));
        Ok(Value::Object(outer))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
