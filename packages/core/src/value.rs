use crate::{Error, ErrorKind};

/// The closed set of scalar values that can cross the boundary or be scanned
/// from a result row. Serde's externally tagged representation is the wire
/// form.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::I32(_) => "i32",
            Self::I64(_) => "i64",
            Self::F64(_) => "f64",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
        }
    }

    /// The documented lossy path: any native value without a variant of its
    /// own is stringified. Deterministic (same input, same text) and logged,
    /// never an implicit default branch.
    pub fn lossy_text(value: &dyn std::fmt::Display) -> Self {
        let text = value.to_string();
        tracing::warn!(value = %text, "encoding value through lossy text fallback");
        Self::Text(text)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Self::Null
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i8> for Value {
    fn from(value: i8) -> Self {
        Self::I32(value.into())
    }
}

impl From<i16> for Value {
    fn from(value: i16) -> Self {
        Self::I32(value.into())
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::I32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::I64(value)
    }
}

impl From<u8> for Value {
    fn from(value: u8) -> Self {
        Self::I32(value.into())
    }
}

impl From<u16> for Value {
    fn from(value: u16) -> Self {
        Self::I32(value.into())
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::I64(value.into())
    }
}

impl TryFrom<u64> for Value {
    type Error = Error;

    // Magnitudes above i64::MAX have no wire representation; wrapping them
    // would silently corrupt the value.
    fn try_from(value: u64) -> Result<Self, Error> {
        i64::try_from(value)
            .map(Self::I64)
            .map_err(|_| Error::encoding(format!("u64 value {value} exceeds the i64 wire range")))
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::F64(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::F64(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Self::Blob(value.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Blob(value)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(inner) => inner.into(),
            None => Self::Null,
        }
    }
}

/// Typed scan out of a [`Value`]. Scanning `Null` into a non-nullable
/// destination is a defined error, never a zero value.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, Error>;
}

fn mismatch(expected: &str, found: &Value) -> Error {
    Error::new(
        ErrorKind::Encoding,
        format!("cannot scan {} into {expected}", found.type_name()),
    )
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Bool(inner) => Ok(*inner),
            other => Err(mismatch("bool", other)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self, Error> {
        match value {
            Value::I32(inner) => Ok(*inner),
            Value::I64(inner) => i32::try_from(*inner)
                .map_err(|_| Error::encoding(format!("i64 value {inner} does not fit in i32"))),
            other => Err(mismatch("i32", other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, Error> {
        match value {
            Value::I32(inner) => Ok((*inner).into()),
            Value::I64(inner) => Ok(*inner),
            other => Err(mismatch("i64", other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, Error> {
        match value {
            Value::F64(inner) => Ok(*inner),
            other => Err(mismatch("f64", other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Text(inner) => Ok(inner.clone()),
            other => Err(mismatch("string", other)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Blob(inner) => Ok(inner.clone()),
            other => Err(mismatch("blob", other)),
        }
    }
}

impl<T> FromValue for Option<T>
where
    T: FromValue,
{
    fn from_value(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FromValue, Value};
    use crate::ErrorKind;

    fn round_trip(value: &Value) -> Value {
        let encoded = serde_json::to_vec(value).expect("value should encode");
        serde_json::from_slice(&encoded).expect("value should decode")
    }

    #[test]
    fn every_variant_round_trips() {
        let values = [
            Value::Null,
            Value::Bool(true),
            Value::Bool(false),
            Value::I32(i32::MIN),
            Value::I32(i32::MAX),
            Value::I32(0),
            Value::I64(i64::MIN),
            Value::I64(i64::MAX),
            Value::F64(-0.5),
            Value::Text(String::new()),
            Value::Text("héllo".to_string()),
            Value::Blob(Vec::new()),
            Value::Blob(vec![0, 255, 17]),
        ];
        for value in values {
            assert_eq!(round_trip(&value), value);
        }
    }

    #[test]
    fn integer_widths_map_by_magnitude() {
        assert_eq!(Value::from(7i8), Value::I32(7));
        assert_eq!(Value::from(7u16), Value::I32(7));
        assert_eq!(Value::from(7u32), Value::I64(7));
        assert_eq!(Value::from(7i64), Value::I64(7));
        assert_eq!(Value::try_from(7u64).unwrap(), Value::I64(7));
    }

    #[test]
    fn oversized_u64_is_an_encoding_error() {
        let err = Value::try_from(u64::MAX).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encoding);
    }

    #[test]
    fn option_maps_to_null_or_inner() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(3i32)), Value::I32(3));
    }

    #[test]
    fn null_into_non_nullable_is_an_error() {
        let err = String::from_value(&Value::Null).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encoding);
        assert_eq!(Option::<String>::from_value(&Value::Null).unwrap(), None);
    }

    #[test]
    fn narrowing_scan_checks_range() {
        assert_eq!(i32::from_value(&Value::I64(41)).unwrap(), 41);
        let err = i32::from_value(&Value::I64(i64::MAX)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encoding);
        assert_eq!(i64::from_value(&Value::I32(5)).unwrap(), 5);
    }

    #[test]
    fn lossy_text_is_deterministic() {
        let first = Value::lossy_text(&3.25f64);
        let second = Value::lossy_text(&3.25f64);
        assert_eq!(first, second);
        assert_eq!(first, Value::Text("3.25".to_string()));
    }
}
