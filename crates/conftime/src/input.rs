//! Desired-state input: YAML (or JSON) mapping of host -> attribute -> value.
//!
//! Scalars (strings, numbers, booleans) become `Scalar`, sequences become
//! `List`, and `null` becomes `Absent`. Host and attribute order is kept.

use std::path::Path;

use indexmap::IndexMap;
use serde_yaml::Value;

use conftime_core::{AttributeValue, DesiredState};

use crate::error::CliError;

/// Host -> desired attributes, in file order.
pub type Inventory = IndexMap<String, DesiredState>;

pub fn load(path: &Path) -> Result<Inventory, CliError> {
    let raw = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => CliError::InputNotFound {
            path: path.display().to_string(),
        },
        _ => CliError::Io(e),
    })?;
    parse(&raw).map_err(|reason| CliError::InvalidInput {
        path: path.display().to_string(),
        reason,
    })
}

pub fn parse(raw: &str) -> Result<Inventory, String> {
    let doc: Value = serde_yaml::from_str(raw).map_err(|e| e.to_string())?;
    let hosts = match doc {
        Value::Mapping(m) => m,
        Value::Null => return Ok(Inventory::new()),
        other => return Err(format!("top level must be a mapping, got {}", kind(&other))),
    };

    let mut inventory = Inventory::with_capacity(hosts.len());
    for (host, attrs) in hosts {
        let host = key(&host)?;
        let attrs = match attrs {
            Value::Mapping(m) => m,
            Value::Null => serde_yaml::Mapping::new(),
            other => {
                return Err(format!(
                    "host '{host}' must map to attributes, got {}",
                    kind(&other)
                ));
            }
        };

        let mut desired = DesiredState::with_capacity(attrs.len());
        for (name, value) in attrs {
            let name = key(&name)?;
            let value = attribute_value(&value)
                .map_err(|reason| format!("{host}.{name}: {reason}"))?;
            desired.insert(name, value);
        }
        inventory.insert(host, desired);
    }
    Ok(inventory)
}

fn attribute_value(value: &Value) -> Result<AttributeValue, String> {
    match value {
        Value::Null => Ok(AttributeValue::Absent),
        Value::Sequence(items) => {
            let items = items
                .iter()
                .map(|item| {
                    scalar(item)
                        .ok_or_else(|| format!("list items must be scalars, got {}", kind(item)))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(AttributeValue::list(items))
        }
        other => scalar(other)
            .map(AttributeValue::scalar)
            .ok_or_else(|| format!("expected a scalar or a list, got {}", kind(other))),
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn key(value: &Value) -> Result<String, String> {
    scalar(value).ok_or_else(|| format!("keys must be scalars, got {}", kind(value)))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_hosts_in_order() {
        let inv = parse(
            "vsrx2:\n  hostname: vsrx2\nvsrx1:\n  hostname: vsrx1\n  ntp_servers: [10.0.2.2, 10.0.2.1]\n  snmp_communities: ~\n",
        )
        .unwrap();

        assert_eq!(inv.keys().collect::<Vec<_>>(), vec!["vsrx2", "vsrx1"]);
        let vsrx1 = &inv["vsrx1"];
        assert_eq!(vsrx1["hostname"], AttributeValue::from("vsrx1"));
        assert_eq!(
            vsrx1["ntp_servers"],
            AttributeValue::from(vec!["10.0.2.1", "10.0.2.2"])
        );
        assert!(vsrx1["snmp_communities"].is_absent());
    }

    #[test]
    fn json_is_accepted() {
        let inv = parse(r#"{"r1": {"hostname": "r1", "ntp_servers": ["1.1.1.1"]}}"#).unwrap();
        assert_eq!(inv["r1"].len(), 2);
    }

    #[test]
    fn numbers_become_scalars() {
        let inv = parse("r1:\n  hostname: 42\n").unwrap();
        assert_eq!(inv["r1"]["hostname"], AttributeValue::from("42"));
    }

    #[test]
    fn empty_document_is_empty_inventory() {
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn rejects_nested_mappings() {
        let err = parse("r1:\n  hostname:\n    nested: true\n").unwrap_err();
        assert!(err.contains("r1.hostname"), "{err}");
    }

    #[test]
    fn rejects_non_mapping_top_level() {
        assert!(parse("- r1\n- r2\n").is_err());
    }

    #[test]
    fn missing_file_is_input_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, CliError::InputNotFound { .. }));
    }
}
