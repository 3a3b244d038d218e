//! Core type definitions for the catalog.

use crate::error::Error;
use slimfetch_proto::Value;

/// Scalar column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// Boolean value.
    Bool,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point.
    Float64,
    /// UTF-8 string.
    String,
    /// Binary data.
    Bytes,
    /// Timestamp (microseconds since Unix epoch).
    Timestamp,
    /// UUID (128-bit identifier).
    Uuid,
}

impl ScalarType {
    /// Check if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ScalarType::Int32 | ScalarType::Int64 | ScalarType::Float64
        )
    }

    /// Check if values of this type can be used as row keys.
    pub fn is_key_type(&self) -> bool {
        !matches!(self, ScalarType::Float64)
    }

    /// Check whether a value is an instance of this type. Null is accepted.
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (ScalarType::Bool, Value::Bool(_))
                | (ScalarType::Int32, Value::Int32(_))
                | (ScalarType::Int64, Value::Int64(_))
                | (ScalarType::Float64, Value::Float64(_))
                | (ScalarType::String, Value::String(_))
                | (ScalarType::Bytes, Value::Bytes(_))
                | (ScalarType::Timestamp, Value::Timestamp(_))
                | (ScalarType::Uuid, Value::Uuid(_))
        )
    }

    /// Convert a key value to this type.
    ///
    /// Integers are widened or narrowed between `Int32` and `Int64` when the
    /// value fits; any other mismatch is an `InvalidKey` error.
    pub fn coerce_key(&self, value: &Value) -> Result<Value, Error> {
        match (self, value) {
            (ScalarType::Int32, Value::Int64(n)) => i32::try_from(*n)
                .map(Value::Int32)
                .map_err(|_| Error::InvalidKey(format!("{} does not fit in int32", n))),
            (ScalarType::Int64, Value::Int32(n)) => Ok(Value::Int64(i64::from(*n))),
            (ScalarType::Timestamp, Value::Int64(n)) => Ok(Value::Timestamp(*n)),
            (_, Value::Null) => Err(Error::InvalidKey("null key".into())),
            _ if self.accepts(value) => Ok(value.clone()),
            _ => Err(Error::InvalidKey(format!(
                "expected {:?} key, got {}",
                self,
                value.type_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_type_checks() {
        assert!(ScalarType::Int32.is_numeric());
        assert!(ScalarType::Float64.is_numeric());
        assert!(!ScalarType::String.is_numeric());
        assert!(!ScalarType::Bool.is_numeric());

        assert!(ScalarType::Uuid.is_key_type());
        assert!(!ScalarType::Float64.is_key_type());
    }

    #[test]
    fn test_accepts() {
        assert!(ScalarType::String.accepts(&Value::String("x".into())));
        assert!(ScalarType::String.accepts(&Value::Null));
        assert!(!ScalarType::Int32.accepts(&Value::Int64(1)));
    }

    #[test]
    fn test_coerce_key() {
        assert_eq!(
            ScalarType::Int32.coerce_key(&Value::Int64(5)).unwrap(),
            Value::Int32(5)
        );
        assert_eq!(
            ScalarType::Int64.coerce_key(&Value::Int32(5)).unwrap(),
            Value::Int64(5)
        );
        assert!(matches!(
            ScalarType::Int32.coerce_key(&Value::Int64(i64::MAX)),
            Err(Error::InvalidKey(_))
        ));
        assert!(ScalarType::Int32.coerce_key(&Value::Null).is_err());
        assert!(ScalarType::Uuid.coerce_key(&Value::String("a".into())).is_err());
    }
}
