use super::category::Category;
use super::value::{Value, ValueType};
use serde::{Deserialize, Serialize};

/// Cardinality of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PropertyKind {
    Single,
    Multiple,
}

/// The comparable part of a property: kind, value type and values.
///
/// This is what a target adapter reads back, so model properties and
/// live properties can be compared without caring where either lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyState {
    pub kind: PropertyKind,
    pub value_type: ValueType,
    pub values: Vec<Value>,
}

impl PropertyState {
    pub fn single(value: Value) -> Self {
        Self {
            kind: PropertyKind::Single,
            value_type: value.value_type(),
            values: vec![value],
        }
    }

    pub fn multiple(value_type: ValueType, values: Vec<Value>) -> Self {
        Self {
            kind: PropertyKind::Multiple,
            value_type,
            values,
        }
    }
}

/// A named property in a model node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelProperty {
    pub name: String,
    pub kind: PropertyKind,
    pub value_type: ValueType,
    pub values: Vec<Value>,
    #[serde(default)]
    pub category: Category,
}

impl ModelProperty {
    /// Single-valued property; the value type is taken from the value
    pub fn single(name: &str, value: Value) -> Self {
        Self {
            name: name.to_string(),
            kind: PropertyKind::Single,
            value_type: value.value_type(),
            values: vec![value],
            category: Category::Config,
        }
    }

    /// Multi-valued property
    pub fn multiple(name: &str, value_type: ValueType, values: Vec<Value>) -> Self {
        Self {
            name: name.to_string(),
            kind: PropertyKind::Multiple,
            value_type,
            values,
            category: Category::Config,
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn is_reference(&self) -> bool {
        self.value_type.is_reference()
    }

    pub fn to_state(&self) -> PropertyState {
        PropertyState {
            kind: self.kind,
            value_type: self.value_type,
            values: self.values.clone(),
        }
    }

    /// Check that every value matches the declared type and cardinality
    pub fn is_consistent(&self) -> bool {
        if self.kind == PropertyKind::Single && self.values.len() != 1 {
            return false;
        }
        self.values.iter().all(|v| v.value_type() == self.value_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_infers_type() {
        let prop = ModelProperty::single("title", Value::String("Home".to_string()));
        assert_eq!(prop.value_type, ValueType::String);
        assert_eq!(prop.kind, PropertyKind::Single);
        assert!(prop.is_consistent());
    }

    #[test]
    fn test_consistency() {
        let mut prop = ModelProperty::multiple(
            "tags",
            ValueType::String,
            vec![Value::String("a".to_string()), Value::Long(1)],
        );
        assert!(!prop.is_consistent());
        prop.values.pop();
        assert!(prop.is_consistent());

        let broken = ModelProperty {
            values: vec![],
            ..ModelProperty::single("x", Value::Boolean(true))
        };
        assert!(!broken.is_consistent());
    }
}
