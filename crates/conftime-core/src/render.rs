// ── Payload rendering ──
//
// Turns one attribute change into the family-specific XML sent with
// `<edit-config>`. Templates use Jinja syntax and receive:
//   values    desired value: `none` when absent, a string, or a list
//   previous  snapshot value, same shape
//   added     members in `values` but not in `previous`
//   removed   members in `previous` but not in `values`
// Payloads touch only the changed members, never the enclosing block.

use std::path::{Path, PathBuf};

use minijinja::{AutoEscape, Environment, context};
use tracing::debug;

use crate::error::CoreError;
use crate::model::{AttributeValue, DeviceFamily};

/// Builds edit payloads.
pub trait Renderer: Send + Sync {
    fn render(
        &self,
        family: DeviceFamily,
        attribute: &str,
        value: &AttributeValue,
        previous: &AttributeValue,
    ) -> Result<String, CoreError>;
}

fn members(value: &AttributeValue) -> &[String] {
    match value {
        AttributeValue::Absent => &[],
        AttributeValue::Scalar(s) => std::slice::from_ref(s),
        AttributeValue::List(items) => items,
    }
}

/// `(added, removed)` between `previous` and `value`, each sorted.
fn changes<'v>(
    value: &'v AttributeValue,
    previous: &'v AttributeValue,
) -> (Vec<&'v str>, Vec<&'v str>) {
    let now = members(value);
    let before = members(previous);
    let mut added: Vec<&str> = now
        .iter()
        .filter(|m| !before.contains(m))
        .map(String::as_str)
        .collect();
    let mut removed: Vec<&str> = before
        .iter()
        .filter(|m| !now.contains(m))
        .map(String::as_str)
        .collect();
    added.sort_unstable();
    removed.sort_unstable();
    (added, removed)
}

const BUILTIN: &[(&str, &str)] = &[
    ("junos/hostname.j2", include_str!("../templates/junos/hostname.j2")),
    ("junos/ntp_servers.j2", include_str!("../templates/junos/ntp_servers.j2")),
    (
        "junos/snmp_communities.j2",
        include_str!("../templates/junos/snmp_communities.j2"),
    ),
];

/// Jinja renderer over `<family>/<attribute>.j2` templates.
///
/// Templates found under the override directory win over the built-in set.
pub struct TemplateRenderer {
    env: Environment<'static>,
    override_dir: Option<PathBuf>,
}

impl std::fmt::Debug for TemplateRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateRenderer")
            .field("override_dir", &self.override_dir)
            .finish_non_exhaustive()
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new(None)
    }
}

impl TemplateRenderer {
    pub fn new(override_dir: Option<PathBuf>) -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        env.set_keep_trailing_newline(false);

        let dir = override_dir.clone();
        env.set_loader(move |name| {
            if let Some(dir) = &dir {
                if let Some(source) = read_override(dir, name)? {
                    return Ok(Some(source));
                }
            }
            Ok(BUILTIN
                .iter()
                .find(|(builtin, _)| *builtin == name)
                .map(|(_, source)| (*source).to_owned()))
        });

        Self { env, override_dir }
    }

    pub fn override_dir(&self) -> Option<&Path> {
        self.override_dir.as_deref()
    }

    fn template_name(family: DeviceFamily, attribute: &str) -> String {
        format!("{family}/{attribute}.j2")
    }
}

fn read_override(dir: &Path, name: &str) -> Result<Option<String>, minijinja::Error> {
    let path = dir.join(name);
    match std::fs::read_to_string(&path) {
        Ok(source) => Ok(Some(source)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(minijinja::Error::new(
            minijinja::ErrorKind::InvalidOperation,
            format!("cannot read {}", path.display()),
        )
        .with_source(e)),
    }
}

impl Renderer for TemplateRenderer {
    fn render(
        &self,
        family: DeviceFamily,
        attribute: &str,
        value: &AttributeValue,
        previous: &AttributeValue,
    ) -> Result<String, CoreError> {
        let name = Self::template_name(family, attribute);
        let render_err = |e: minijinja::Error| CoreError::Render {
            attribute: attribute.to_owned(),
            reason: e.to_string(),
        };

        let template = self.env.get_template(&name).map_err(render_err)?;
        let (added, removed) = changes(value, previous);
        let payload = template
            .render(context! {
                values => value,
                previous => previous,
                added => added,
                removed => removed,
            })
            .map_err(render_err)?;
        debug!(%family, attribute, bytes = payload.len(), "rendered payload");
        Ok(payload)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const NONE: &AttributeValue = &AttributeValue::Absent;

    fn names<'a>(doc: &'a roxmltree::Document<'a>, parent: &str) -> Vec<(&'a str, bool)> {
        doc.descendants()
            .filter(|n| n.has_tag_name(parent))
            .map(|n| {
                let name = n
                    .children()
                    .find(|c| c.has_tag_name("name"))
                    .and_then(|c| c.text())
                    .unwrap_or_default();
                let deleted = n
                    .attributes()
                    .any(|a| a.name() == "operation" && a.value() == "delete");
                (name, deleted)
            })
            .collect()
    }

    #[test]
    fn builtin_hostname() {
        let xml = TemplateRenderer::default()
            .render(
                DeviceFamily::Junos,
                "hostname",
                &AttributeValue::scalar("vsrx2"),
                NONE,
            )
            .unwrap();
        assert!(xml.contains("<host-name>vsrx2</host-name>"), "{xml}");
        roxmltree::Document::parse(&xml).unwrap();
    }

    #[test]
    fn absent_hostname_renders_delete() {
        let xml = TemplateRenderer::default()
            .render(
                DeviceFamily::Junos,
                "hostname",
                &AttributeValue::Absent,
                &AttributeValue::scalar("vsrx"),
            )
            .unwrap();
        assert!(xml.contains(r#"<host-name nc:operation="delete"/>"#), "{xml}");
    }

    #[test]
    fn list_payload_carries_only_changed_members() {
        let xml = TemplateRenderer::default()
            .render(
                DeviceFamily::Junos,
                "ntp_servers",
                &AttributeValue::list(["10.0.2.3", "10.0.2.1"]),
                &AttributeValue::list(["10.0.2.1", "10.0.2.2"]),
            )
            .unwrap();
        let doc = roxmltree::Document::parse(&xml).unwrap();
        assert_eq!(
            names(&doc, "server"),
            vec![("10.0.2.2", true), ("10.0.2.3", false)]
        );
    }

    #[test]
    fn snmp_payload_leaves_sibling_settings_alone() {
        let xml = TemplateRenderer::default()
            .render(
                DeviceFamily::Junos,
                "snmp_communities",
                &AttributeValue::list(["ops", "public"]),
                &AttributeValue::list(["private", "public"]),
            )
            .unwrap();
        let doc = roxmltree::Document::parse(&xml).unwrap();

        assert_eq!(
            names(&doc, "community"),
            vec![("private", true), ("ops", false)]
        );
        // No block-level operation, so location, contact, trap groups and
        // the untouched `public` community are merged as-is.
        let snmp = doc.descendants().find(|n| n.has_tag_name("snmp")).unwrap();
        assert_eq!(snmp.attributes().count(), 0);
        assert!(!xml.contains("replace"));
        assert!(!xml.contains("authorization"));
        assert!(!xml.contains("<name>public</name>"));
    }

    #[test]
    fn clearing_a_list_deletes_each_member() {
        let xml = TemplateRenderer::default()
            .render(
                DeviceFamily::Junos,
                "ntp_servers",
                &AttributeValue::Absent,
                &AttributeValue::list(["10.0.2.1"]),
            )
            .unwrap();
        let doc = roxmltree::Document::parse(&xml).unwrap();
        assert_eq!(names(&doc, "server"), vec![("10.0.2.1", true)]);
        let ntp = doc.descendants().find(|n| n.has_tag_name("ntp")).unwrap();
        assert_eq!(ntp.attributes().count(), 0);
    }

    #[test]
    fn values_are_escaped() {
        let xml = TemplateRenderer::default()
            .render(
                DeviceFamily::Junos,
                "snmp_communities",
                &AttributeValue::list(["a<b&c"]),
                NONE,
            )
            .unwrap();
        let doc = roxmltree::Document::parse(&xml).unwrap();
        assert!(doc.descendants().any(|n| n.text() == Some("a<b&c")));
    }

    #[test]
    fn missing_template_is_render_fault() {
        let err = TemplateRenderer::default()
            .render(DeviceFamily::Junos, "serial", &AttributeValue::scalar("x"), NONE)
            .unwrap_err();
        assert!(matches!(err, CoreError::Render { ref attribute, .. } if attribute == "serial"));

        let err = TemplateRenderer::default()
            .render(DeviceFamily::Nexus, "hostname", &AttributeValue::scalar("x"), NONE)
            .unwrap_err();
        assert!(matches!(err, CoreError::Render { .. }));
    }

    #[test]
    fn override_dir_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("junos")).unwrap();
        std::fs::write(
            dir.path().join("junos/hostname.j2"),
            "<config><custom>{{ values }}</custom></config>",
        )
        .unwrap();

        let renderer = TemplateRenderer::new(Some(dir.path().to_path_buf()));
        let xml = renderer
            .render(
                DeviceFamily::Junos,
                "hostname",
                &AttributeValue::scalar("edge1"),
                NONE,
            )
            .unwrap();
        assert_eq!(xml, "<config><custom>edge1</custom></config>");

        // Attributes without an override fall back to the built-in set.
        let xml = renderer
            .render(
                DeviceFamily::Junos,
                "ntp_servers",
                &AttributeValue::list(["10.0.0.1"]),
                NONE,
            )
            .unwrap();
        assert!(xml.contains("<ntp"));
    }
}
