//! YAML parsing for rendered documents
//!
//! Rendered templates are parsed with yaml-rust2 and converted into
//! `serde_json::Value` so they can be sent to the API server as-is.

use serde_json::{Map, Number, Value};
use yaml_rust2::{Yaml, YamlLoader};

use crate::Error;

/// Parse a single YAML document into a `serde_json::Value`.
///
/// Leading blank lines are fine. An empty input or a multi-document stream
/// is rejected since every template renders exactly one resource.
pub fn parse_document(input: &str) -> Result<Value, Error> {
    let mut docs = YamlLoader::load_from_str(input).map_err(|e| Error::yaml(e.to_string()))?;
    match docs.len() {
        0 => Err(Error::yaml("document is empty")),
        1 => to_json(docs.remove(0)),
        n => Err(Error::yaml(format!("expected one document, found {}", n))),
    }
}

fn to_json(yaml: Yaml) -> Result<Value, Error> {
    Ok(match yaml {
        Yaml::Null => Value::Null,
        Yaml::Boolean(b) => Value::Bool(b),
        Yaml::Integer(i) => Value::Number(i.into()),
        Yaml::Real(raw) => {
            let parsed: f64 = raw
                .parse()
                .map_err(|_| Error::yaml(format!("invalid float {}", raw)))?;
            Number::from_f64(parsed).map_or(Value::Null, Value::Number)
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Array(items) => Value::Array(
            items
                .into_iter()
                .map(to_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Yaml::Hash(entries) => {
            let mut map = Map::with_capacity(entries.len());
            for (key, value) in entries {
                map.insert(key_string(key)?, to_json(value)?);
            }
            Value::Object(map)
        }
        Yaml::Alias(_) => return Err(Error::yaml("YAML aliases not supported")),
        Yaml::BadValue => return Err(Error::yaml("bad YAML value")),
    })
}

/// Mapping keys are strings in Kubernetes documents, but YAML allows
/// `retention.ms: 1` style scalars of other types as keys too.
fn key_string(key: Yaml) -> Result<String, Error> {
    match key {
        Yaml::String(s) | Yaml::Real(s) => Ok(s),
        Yaml::Integer(i) => Ok(i.to_string()),
        Yaml::Boolean(b) => Ok(b.to_string()),
        Yaml::Null => Ok("null".to_string()),
        _ => Err(Error::yaml("unsupported YAML key type")),
    }
}
