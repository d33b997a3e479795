use crate::utils::compute_digest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Value type of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueType {
    String,
    Long,
    Double,
    Boolean,
    Date,
    Decimal,
    Binary,
    Name,
    Path,
    Reference,
    WeakReference,
    Uri,
}

impl ValueType {
    /// Reference-typed values are resolved by lookup at apply time
    pub fn is_reference(&self) -> bool {
        matches!(self, ValueType::Reference | ValueType::WeakReference)
    }
}

/// Payload of a binary value: bytes held inline, or a pointer to
/// externally stored bytes identified by location and content digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "data")]
pub enum Resource {
    Inline(Vec<u8>),
    External { location: String, digest: String },
}

impl Resource {
    pub fn digest(&self) -> String {
        match self {
            Resource::Inline(bytes) => compute_digest(bytes),
            Resource::External { digest, .. } => digest.clone(),
        }
    }
}

// Two resources are the same when their contents are, regardless of
// where the bytes live.
impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Resource::Inline(a), Resource::Inline(b)) => a == b,
            _ => self.digest() == other.digest(),
        }
    }
}

/// How a reference value designates its destination node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "by", content = "to")]
pub enum ReferenceValue {
    /// Direct node identity
    Identity(Uuid),
    /// Absolute path (leading `/`) or path relative to the fragment root
    Path(String),
}

/// A single typed value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "value")]
pub enum Value {
    String(String),
    Long(i64),
    Double(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
    Decimal(String),
    Binary(Resource),
    Name(String),
    Path(String),
    Reference(ReferenceValue),
    WeakReference(ReferenceValue),
    Uri(String),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::String(_) => ValueType::String,
            Value::Long(_) => ValueType::Long,
            Value::Double(_) => ValueType::Double,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Date(_) => ValueType::Date,
            Value::Decimal(_) => ValueType::Decimal,
            Value::Binary(_) => ValueType::Binary,
            Value::Name(_) => ValueType::Name,
            Value::Path(_) => ValueType::Path,
            Value::Reference(_) => ValueType::Reference,
            Value::WeakReference(_) => ValueType::WeakReference,
            Value::Uri(_) => ValueType::Uri,
        }
    }

    pub fn as_reference(&self) -> Option<&ReferenceValue> {
        match self {
            Value::Reference(r) | Value::WeakReference(r) => Some(r),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_equality_across_storage() {
        let inline = Resource::Inline(b"payload".to_vec());
        let external = Resource::External {
            location: "store/blob-1".to_string(),
            digest: compute_digest(b"payload"),
        };
        assert_eq!(inline, external);

        let other = Resource::External {
            location: "store/blob-1".to_string(),
            digest: compute_digest(b"different"),
        };
        assert_ne!(inline, other);
    }

    #[test]
    fn test_value_type() {
        assert_eq!(Value::Long(7).value_type(), ValueType::Long);
        let r = Value::WeakReference(ReferenceValue::Path("../logo".to_string()));
        assert_eq!(r.value_type(), ValueType::WeakReference);
        assert!(r.value_type().is_reference());
    }
}
