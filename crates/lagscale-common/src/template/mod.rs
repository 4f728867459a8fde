//! Resource templating
//!
//! Resource documents are plain YAML bodies with `${field}` placeholders.
//! Parameters are a typed record flattened into a [`TemplateContext`], and
//! rendering is strict: an unknown placeholder is a [`TemplateError`], an
//! empty field renders as an empty string.
//!
//! - `${name}` - substitute a parameter
//! - `$${name}` - literal `${name}`
//! - `{% if %}...{% endif %}` - conditionals

mod context;
mod engine;
mod error;
mod types;

pub use context::TemplateContext;
pub use engine::TemplateEngine;
pub use error::TemplateError;
pub use types::{RenderedResource, ResourceTemplate};

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    const TOPIC_TEMPLATE: ResourceTemplate = ResourceTemplate::new(
        "kafkaTopicTemplate",
        "apiVersion: kafka.strimzi.io/v1beta2
kind: KafkaTopic
metadata:
  name: ${kafka_topic_name}
  namespace: ${test_namespace}
spec:
  partitions: ${kafka_topic_partitions}
",
    );

    #[derive(Serialize, Clone)]
    struct Params {
        test_namespace: String,
        kafka_topic_name: String,
        kafka_topic_partitions: u32,
        unused_field: String,
    }

    fn params() -> Params {
        Params {
            test_namespace: "kafka-test-ns".to_string(),
            kafka_topic_name: "kafka-topic".to_string(),
            kafka_topic_partitions: 3,
            unused_field: String::new(),
        }
    }

    // =========================================================================
    // Story: Rendering a named template
    // =========================================================================

    #[test]
    fn test_render_named_template() {
        let engine = TemplateEngine::new();
        let ctx = TemplateContext::from_serialize(&params()).unwrap();

        let rendered = TOPIC_TEMPLATE.render(&engine, &ctx).unwrap();
        assert_eq!(rendered.template, "kafkaTopicTemplate");
        assert!(rendered.document.contains("name: kafka-topic\n"));
        assert!(rendered.document.contains("partitions: 3\n"));
    }

    #[test]
    fn test_render_error_names_template_and_field() {
        const TYPO: ResourceTemplate = ResourceTemplate::new(
            "singleScaledObjectTemplate",
            "metadata:\n  name: ${kafka_topic_name}\n  topic: ${topic_nme}\n",
        );
        let engine = TemplateEngine::new();
        let ctx = TemplateContext::from_serialize(&params()).unwrap();

        let err = TYPO.render(&engine, &ctx).unwrap_err();

        assert!(matches!(
            &err,
            crate::Error::Template { source: TemplateError::Undefined(_), .. }
        ));
        let msg = err.to_string();
        assert!(msg.contains("singleScaledObjectTemplate"), "{msg}");
        assert!(msg.contains("topic_nme"), "{msg}");
    }

    #[test]
    fn test_render_is_idempotent() {
        let engine = TemplateEngine::new();
        let ctx = TemplateContext::from_serialize(&params()).unwrap();

        let first = TOPIC_TEMPLATE.render(&engine, &ctx).unwrap();
        let second = TOPIC_TEMPLATE.render(&engine, &ctx).unwrap();
        assert_eq!(first.document.as_bytes(), second.document.as_bytes());
    }

    // =========================================================================
    // Story: Schema errors surface with the template name
    // =========================================================================

    #[test]
    fn test_unknown_field_is_template_error() {
        const BROKEN: ResourceTemplate =
            ResourceTemplate::new("brokenTemplate", "topic: ${kafka_topic_nmae}\n");
        let engine = TemplateEngine::new();
        let ctx = TemplateContext::from_serialize(&params()).unwrap();

        let err = BROKEN.render(&engine, &ctx).unwrap_err();
        match err {
            crate::Error::Template { template, source } => {
                assert_eq!(template, "brokenTemplate");
                assert!(matches!(source, TemplateError::Undefined(_)));
            }
            other => panic!("Expected Template error, got {other:?}"),
        }
    }

    #[test]
    fn test_template_display_is_name() {
        assert_eq!(TOPIC_TEMPLATE.to_string(), "kafkaTopicTemplate");
    }
}
