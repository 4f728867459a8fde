//! Rendering context
//!
//! A flat key/value map of placeholder values. Typed parameter records are
//! flattened into it through serde, so every field of the record is present
//! (empty strings included) and a typo in a template is an undefined lookup.

use std::collections::BTreeMap;

use minijinja::Value;
use serde::Serialize;

use super::error::TemplateError;

/// Values available to `${...}` placeholders
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    values: BTreeMap<String, Value>,
}

impl TemplateContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from any record that serializes to a map.
    ///
    /// Each top-level field becomes one placeholder name.
    pub fn from_serialize<T: Serialize>(params: &T) -> Result<Self, TemplateError> {
        let json =
            serde_json::to_value(params).map_err(|e| TemplateError::Context(e.to_string()))?;
        let serde_json::Value::Object(fields) = json else {
            return Err(TemplateError::Context(
                "parameters must serialize to a map of fields".to_string(),
            ));
        };

        let values = fields
            .into_iter()
            .map(|(key, value)| (key, Value::from_serialize(&value)))
            .collect();
        Ok(Self { values })
    }

    /// Set or override a single value
    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.values
            .insert(key.into(), Value::from_serialize(&value));
        self
    }

    /// Look up a value by placeholder name
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Whether the context defines the given placeholder
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Convert to minijinja Value for rendering
    pub fn to_value(&self) -> Value {
        Value::from_iter(self.values.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Params {
        topic_name: String,
        partitions: u32,
        reset_policy: String,
    }

    #[test]
    fn test_from_serialize_flattens_fields() {
        let ctx = TemplateContext::from_serialize(&Params {
            topic_name: "kafka-topic".to_string(),
            partitions: 3,
            reset_policy: String::new(),
        })
        .unwrap();

        assert_eq!(ctx.get("topic_name").unwrap().as_str(), Some("kafka-topic"));
        assert_eq!(ctx.get("partitions").unwrap().to_string(), "3");
        // empty fields are still defined
        assert!(ctx.contains("reset_policy"));
        assert!(!ctx.contains("missing"));
    }

    #[test]
    fn test_with_overrides_existing_value() {
        let ctx = TemplateContext::from_serialize(&Params {
            topic_name: "a".to_string(),
            partitions: 1,
            reset_policy: "earliest".to_string(),
        })
        .unwrap()
        .with("topic_name", "b");

        assert_eq!(ctx.get("topic_name").unwrap().as_str(), Some("b"));
    }

    #[test]
    fn test_non_map_parameters_rejected() {
        let result = TemplateContext::from_serialize(&vec![1, 2, 3]);
        assert!(matches!(result, Err(TemplateError::Context(_))));
    }
}
