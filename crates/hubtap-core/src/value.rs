//! Schema-less dynamic value model for argument payloads.
//!
//! Servers on the other side of the hub protocol send arguments without any
//! schema the client could know at compile time. [`DynamicValue`] represents
//! whatever arrives as an explicit tagged union, so every consumer matches
//! exhaustively instead of poking at a late-bound "anything" type.
//!
//! The decoding policy is interop-sensitive and deliberately exact:
//!
//! - object members are dropped when their **decoded** value is the absent
//!   marker (so a member holding JSON `null`, or an empty array, vanishes);
//! - an empty array decodes to the absent marker, not an empty sequence;
//! - strings are speculatively reinterpreted as date-times across the ISO
//!   8601 forms hub servers emit, down to a bare date (taken as midnight
//!   UTC); explicit-offset forms take precedence over naive ones;
//! - numbers take the narrowest lossless representation: a 64-bit integer
//!   when the literal is integral and in range, else a 64-bit float when the
//!   float reproduces the literal exactly, else an arbitrary-precision
//!   decimal that preserves the source literal byte for byte.
//!
//! Value trees are immutable after construction and mirror a JSON document,
//! so cycles cannot occur.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::{Number, Value};
use thiserror::Error;

/// Errors from decoding a payload or encoding a value tree.
#[derive(Debug, Error)]
pub enum ValueError {
    /// The payload is not well-formed JSON.
    #[error("malformed JSON payload: {0}")]
    Parse(#[from] serde_json::Error),

    /// Infinite and NaN floats have no JSON representation.
    #[error("non-finite float cannot be encoded as JSON")]
    NonFiniteFloat,
}

/// A decoded JSON value without a schema.
#[derive(Debug, Clone, PartialEq)]
pub enum DynamicValue {
    /// Absent value: JSON `null`, and the decoded form of an empty array.
    Null,
    Bool(bool),
    /// Integral number within `i64` range.
    Integer(i64),
    /// Number a 64-bit float represents exactly.
    Float(f64),
    /// Number needing more precision or range than `f64`; the source literal
    /// is preserved unchanged.
    Decimal(Number),
    String(String),
    /// String that parsed as a date-time. Naive date-times are taken as UTC;
    /// an explicit offset is kept as written.
    Timestamp(DateTime<FixedOffset>),
    /// Ordered sequence; never empty by construction (see [`DynamicValue::Null`]).
    Seq(Vec<DynamicValue>),
    /// String-keyed mapping preserving insertion order.
    Map(Vec<(String, DynamicValue)>),
}

impl DynamicValue {
    /// Decodes a JSON payload into a value tree.
    pub fn decode(bytes: &[u8]) -> Result<Self, ValueError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Ok(Self::from_json(value))
    }

    /// Decodes a JSON string slice into a value tree.
    pub fn decode_str(text: &str) -> Result<Self, ValueError> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::from_json(value))
    }

    /// Encodes the tree back into JSON bytes.
    pub fn encode(&self) -> Result<Vec<u8>, ValueError> {
        Ok(serde_json::to_vec(&self.to_json()?)?)
    }

    /// Applies the decoding policy to an already-parsed JSON value.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => DynamicValue::Null,
            Value::Bool(b) => DynamicValue::Bool(b),
            Value::Number(n) => decode_number(n),
            Value::String(s) => decode_string(s),
            Value::Array(items) => {
                let decoded: Vec<DynamicValue> =
                    items.into_iter().map(DynamicValue::from_json).collect();
                if decoded.is_empty() {
                    DynamicValue::Null
                } else {
                    DynamicValue::Seq(decoded)
                }
            }
            Value::Object(members) => {
                let mut map = Vec::with_capacity(members.len());
                for (key, member) in members {
                    let decoded = DynamicValue::from_json(member);
                    if !matches!(decoded, DynamicValue::Null) {
                        map.push((key, decoded));
                    }
                }
                DynamicValue::Map(map)
            }
        }
    }

    /// Serializes the tree into a JSON value.
    ///
    /// Timestamps become RFC 3339 strings; decimals re-emit their preserved
    /// literal rather than a float approximation.
    pub fn to_json(&self) -> Result<Value, ValueError> {
        Ok(match self {
            DynamicValue::Null => Value::Null,
            DynamicValue::Bool(b) => Value::Bool(*b),
            DynamicValue::Integer(i) => Value::Number((*i).into()),
            DynamicValue::Float(f) => {
                Value::Number(Number::from_f64(*f).ok_or(ValueError::NonFiniteFloat)?)
            }
            DynamicValue::Decimal(n) => Value::Number(n.clone()),
            DynamicValue::String(s) => Value::String(s.clone()),
            DynamicValue::Timestamp(dt) => Value::String(dt.to_rfc3339()),
            DynamicValue::Seq(items) => Value::Array(
                items
                    .iter()
                    .map(DynamicValue::to_json)
                    .collect::<Result<_, _>>()?,
            ),
            DynamicValue::Map(entries) => {
                let mut map = serde_json::Map::with_capacity(entries.len());
                for (key, value) in entries {
                    map.insert(key.clone(), value.to_json()?);
                }
                Value::Object(map)
            }
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DynamicValue::Null)
    }
}

// ── Decoding policy ───────────────────────────────────────────────────────────

/// Narrowest lossless representation: i64, then f64, then decimal.
fn decode_number(n: Number) -> DynamicValue {
    if let Some(i) = n.as_i64() {
        return DynamicValue::Integer(i);
    }
    if let Some(f) = n.as_f64().filter(|f| f.is_finite()) {
        if literal_fits_f64(&n.to_string(), f) {
            return DynamicValue::Float(f);
        }
    }
    DynamicValue::Decimal(n)
}

/// Date-time reinterpretation, otherwise the text stays a plain string.
fn decode_string(s: String) -> DynamicValue {
    match parse_timestamp(&s) {
        Some(dt) => DynamicValue::Timestamp(dt),
        None => DynamicValue::String(s),
    }
}

/// ISO 8601 profile: offset forms first, then naive forms taken as UTC, from
/// fractional seconds down to minute precision and a bare date at midnight.
fn parse_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M%:z") {
        return Some(dt);
    }
    // Z-marked stamps and naive stamps both decode as UTC.
    let naive = s.strip_suffix('Z').unwrap_or(s);
    if let Ok(dt) = NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc().fixed_offset());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M") {
        return Some(dt.and_utc().fixed_offset());
    }
    // Date-only, midnight UTC. No Z stripping here; a date takes no marker.
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_time(NaiveTime::MIN).and_utc().fixed_offset());
    }
    None
}

/// Whether `value` reproduces `literal` exactly, judged by comparing both in
/// a normalized decimal form so that positional and scientific notation of
/// the same number compare equal.
fn literal_fits_f64(literal: &str, value: f64) -> bool {
    normalize_literal(literal) == normalize_literal(&value.to_string())
}

/// Normalizes a decimal literal to (negative, significant digits, exponent),
/// where the value is `0.<digits> × 10^exponent`. `1e3`, `1000`, and
/// `1000.0` all normalize identically. Returns `None` for text that is not a
/// plain decimal literal, or whose scale overflows `i64`.
fn normalize_literal(literal: &str) -> Option<(bool, String, i64)> {
    let (negative, rest) = match literal.as_bytes().first()? {
        b'-' => (true, &literal[1..]),
        b'+' => (false, &literal[1..]),
        _ => (false, literal),
    };
    let (mantissa, exponent) = match rest.find(['e', 'E']) {
        Some(pos) => (&rest[..pos], rest[pos + 1..].parse::<i64>().ok()?),
        None => (rest, 0),
    };
    let (int_part, frac_part) = match mantissa.find('.') {
        Some(pos) => (&mantissa[..pos], &mantissa[pos + 1..]),
        None => (mantissa, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let mut digits: Vec<u8> = int_part.bytes().chain(frac_part.bytes()).collect();
    // A scale outside i64 has no normal form.
    let mut point = (int_part.len() as i64).checked_add(exponent)?;

    let leading = digits.iter().take_while(|&&b| b == b'0').count();
    digits.drain(..leading);
    point = point.checked_sub(leading as i64)?;
    while digits.last() == Some(&b'0') {
        digits.pop();
    }
    if digits.is_empty() {
        // All zeros; sign and scale are irrelevant for equality.
        return Some((false, String::new(), 0));
    }
    Some((negative, String::from_utf8(digits).ok()?, point))
}
