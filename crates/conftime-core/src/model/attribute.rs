// ── Attribute domain types ──

use std::fmt;

use serde::{Deserialize, Serialize};

/// A device attribute value.
///
/// `Absent` means the source query matched nothing. It is distinct from
/// an empty scalar (`Scalar("")`) and from an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    #[default]
    Absent,
    Scalar(String),
    List(Vec<String>),
}

impl AttributeValue {
    pub fn scalar(value: impl Into<String>) -> Self {
        Self::Scalar(value.into())
    }

    /// Build a list value, canonicalized.
    pub fn list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(values.into_iter().map(Into::into).collect()).canonicalize()
    }

    /// Sort list members lexicographically. Scalars pass through.
    #[must_use]
    pub fn canonicalize(self) -> Self {
        match self {
            Self::List(mut items) => {
                items.sort();
                Self::List(items)
            }
            other => other,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("-"),
            Self::Scalar(s) => f.write_str(s),
            Self::List(items) => f.write_str(&items.join(", ")),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Scalar(value.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(values: Vec<String>) -> Self {
        Self::List(values).canonicalize()
    }
}

impl From<Vec<&str>> for AttributeValue {
    fn from(values: Vec<&str>) -> Self {
        Self::list(values)
    }
}

/// Cardinality of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Scalar,
    List,
}

/// Where an attribute's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Query against the running configuration. Mutable.
    Config(&'static str),
    /// Query against the chassis-inventory reply. Read-only.
    Inventory(&'static str),
    /// Query against the XML output of an operational command. Read-only.
    Command {
        command: &'static str,
        query: &'static str,
    },
}

/// Static description of one attribute in a family registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeDescriptor {
    pub name: &'static str,
    pub source: Source,
    pub kind: ValueKind,
}

impl AttributeDescriptor {
    pub const fn config(name: &'static str, query: &'static str, kind: ValueKind) -> Self {
        Self {
            name,
            source: Source::Config(query),
            kind,
        }
    }

    pub const fn inventory(name: &'static str, query: &'static str, kind: ValueKind) -> Self {
        Self {
            name,
            source: Source::Inventory(query),
            kind,
        }
    }

    pub const fn command(
        name: &'static str,
        command: &'static str,
        query: &'static str,
        kind: ValueKind,
    ) -> Self {
        Self {
            name,
            source: Source::Command { command, query },
            kind,
        }
    }

    /// Only config-sourced attributes can be written back.
    pub fn is_mutable(&self) -> bool {
        matches!(self.source, Source::Config(_))
    }

    pub fn query(&self) -> &'static str {
        match self.source {
            Source::Config(q) | Source::Inventory(q) | Source::Command { query: q, .. } => q,
        }
    }
}
