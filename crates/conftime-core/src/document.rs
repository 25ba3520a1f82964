// ── Source documents and path queries ──
//
// Attribute sources are evaluated with a small location-path subset:
//
//   //a/b      descendants named `a` anywhere, then their `b` children
//   /a/b       absolute from the document root
//   a/b        relative to the root element (e.g. `<rpc-reply>`)
//   *          any element
//   b[2]       positional predicate, 1-based, per context node
//
// Names match on local name only, so namespaced replies resolve the same
// as unqualified ones. A match yields the element's trimmed text.

use roxmltree::Node;

use crate::error::CoreError;
use crate::model::{AttributeValue, ValueKind};

/// A raw XML reply held by the per-device cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    label: String,
    xml: String,
}

impl Document {
    /// Wrap `xml`, rejecting it up front if it does not parse.
    pub fn parse(label: impl Into<String>, xml: impl Into<String>) -> Result<Self, CoreError> {
        let doc = Self {
            label: label.into(),
            xml: xml.into(),
        };
        roxmltree::Document::parse(&doc.xml).map_err(|e| doc.invalid(&e))?;
        Ok(doc)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn as_str(&self) -> &str {
        &self.xml
    }

    /// Text of every element matched by `query`, in document order.
    pub fn select(&self, query: &str) -> Result<Vec<String>, CoreError> {
        let path = Path::parse(query)?;
        let doc = roxmltree::Document::parse(&self.xml).map_err(|e| self.invalid(&e))?;
        Ok(path
            .evaluate(&doc)
            .into_iter()
            .map(|n| n.text().unwrap_or_default().trim().to_owned())
            .collect())
    }

    /// Evaluate `query` for attribute `name` and apply cardinality rules.
    ///
    /// Zero matches resolve to `Absent`. Several matches on a scalar
    /// attribute are a fault; list attributes collect and sort them.
    pub fn resolve(
        &self,
        name: &str,
        query: &str,
        kind: ValueKind,
    ) -> Result<AttributeValue, CoreError> {
        let mut matches = self.select(query)?;
        match (kind, matches.len()) {
            (_, 0) => Ok(AttributeValue::Absent),
            (ValueKind::Scalar, 1) => Ok(AttributeValue::Scalar(matches.remove(0))),
            (ValueKind::Scalar, count) => Err(CoreError::MultipleMatch {
                attribute: name.to_owned(),
                query: query.to_owned(),
                count,
            }),
            (ValueKind::List, _) => Ok(AttributeValue::List(matches).canonicalize()),
        }
    }

    fn invalid(&self, err: &roxmltree::Error) -> CoreError {
        CoreError::InvalidDocument {
            document: self.label.clone(),
            reason: err.to_string(),
        }
    }
}

// ── Path parsing ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    /// `None` matches any element.
    name: Option<String>,
    /// 1-based position among matches under one context node.
    position: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    DocumentRoot,
    RootElement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Path {
    anchor: Anchor,
    steps: Vec<Step>,
}

impl Path {
    fn parse(query: &str) -> Result<Self, CoreError> {
        let invalid = |reason: &str| CoreError::InvalidQuery {
            query: query.to_owned(),
            reason: reason.to_owned(),
        };

        let query_trimmed = query.trim();
        if query_trimmed.is_empty() {
            return Err(invalid("empty query"));
        }

        let (anchor, mut rest, mut axis) = if let Some(rest) = query_trimmed.strip_prefix("//") {
            (Anchor::DocumentRoot, rest, Axis::Descendant)
        } else if let Some(rest) = query_trimmed.strip_prefix('/') {
            (Anchor::DocumentRoot, rest, Axis::Child)
        } else {
            (Anchor::RootElement, query_trimmed, Axis::Child)
        };

        let mut steps = Vec::new();
        loop {
            let (token, tail) = match rest.find('/') {
                Some(i) => (&rest[..i], Some(&rest[i + 1..])),
                None => (rest, None),
            };
            steps.push(Self::parse_step(token, axis).map_err(|r| invalid(&r))?);

            let Some(tail) = tail else { break };
            if let Some(after) = tail.strip_prefix('/') {
                axis = Axis::Descendant;
                rest = after;
            } else {
                axis = Axis::Child;
                rest = tail;
            }
        }
        Ok(Self { anchor, steps })
    }

    fn parse_step(token: &str, axis: Axis) -> Result<Step, String> {
        let (name, position) = match token.find('[') {
            Some(open) => {
                let inner = token[open + 1..]
                    .strip_suffix(']')
                    .ok_or_else(|| format!("unterminated predicate in '{token}'"))?;
                let position: usize = inner
                    .trim()
                    .parse()
                    .map_err(|_| format!("unsupported predicate '[{inner}]'"))?;
                if position == 0 {
                    return Err("positions are 1-based".into());
                }
                (&token[..open], Some(position))
            }
            None => (token, None),
        };

        if name.is_empty() {
            return Err("empty step".into());
        }
        if name.contains(['@', '(', ')', ':', '=', '.']) {
            return Err(format!("unsupported step '{name}'"));
        }
        Ok(Step {
            axis,
            name: (name != "*").then(|| name.to_owned()),
            position,
        })
    }

    fn evaluate<'a, 'input>(&self, doc: &'a roxmltree::Document<'input>) -> Vec<Node<'a, 'input>> {
        let mut context = match self.anchor {
            Anchor::DocumentRoot => vec![doc.root()],
            Anchor::RootElement => vec![doc.root_element()],
        };

        for step in &self.steps {
            let mut next = Vec::new();
            for node in &context {
                let candidates: Vec<Node<'a, 'input>> = match step.axis {
                    Axis::Child => node.children().filter(|c| step.matches(*c)).collect(),
                    Axis::Descendant => node
                        .descendants()
                        .filter(|d| d != node && step.matches(*d))
                        .collect(),
                };
                match step.position {
                    Some(pos) => next.extend(candidates.into_iter().nth(pos - 1)),
                    None => next.extend(candidates),
                }
            }
            next.sort_by_key(|n| n.id().get_usize());
            next.dedup_by_key(|n| n.id().get_usize());
            context = next;
        }
        context
    }
}

impl Step {
    fn matches(&self, node: Node<'_, '_>) -> bool {
        node.is_element()
            && self
                .name
                .as_deref()
                .is_none_or(|name| node.tag_name().name() == name)
    }
}
