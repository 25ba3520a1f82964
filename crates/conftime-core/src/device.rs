// ── Device reconciliation core ──
//
// A `Device` is bound to one open session for its whole life:
// populate → snapshot → caller sets desired values → diff → locked
// edit/commit → close. Mutable attributes are read eagerly from the
// running configuration. Read-only attributes are fetched on first
// access and memoized.

use conftime_api::Datastore;
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::cache::{DocumentCache, DocumentKind};
use crate::config::ApplyMode;
use crate::error::CoreError;
use crate::model::{AttributeDescriptor, AttributeValue, DeviceFamily, Outcome, Source, ValueKind};
use crate::render::Renderer;
use crate::session::Session;

/// Ordered attribute map keyed by registry name.
pub type AttributeMap = IndexMap<&'static str, AttributeValue>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum ReadOnly {
    Unfetched,
    Fetched(AttributeValue),
}

pub struct Device<S: Session> {
    host: String,
    family: DeviceFamily,
    registry: &'static [AttributeDescriptor],
    session: S,
    cache: DocumentCache,
    values: AttributeMap,
    snapshot: AttributeMap,
    read_only: IndexMap<&'static str, ReadOnly>,
    closed: bool,
}

impl<S: Session> std::fmt::Debug for Device<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("host", &self.host)
            .field("family", &self.family)
            .field("values", &self.values)
            .finish_non_exhaustive()
    }
}

impl<S: Session> Device<S> {
    /// Take ownership of `session`, populate mutable attributes from the
    /// running configuration, and freeze the snapshot.
    ///
    /// On failure the session is closed before the error is returned.
    pub async fn new(
        host: impl Into<String>,
        mut session: S,
        family: DeviceFamily,
    ) -> Result<Self, CoreError> {
        let host = host.into();
        let Some(registry) = family.registry() else {
            close_quietly(&host, &mut session).await;
            return Err(CoreError::UnsupportedFamily {
                family: format!("{family} (reconciliation not implemented)"),
            });
        };

        let mut device = Self {
            host,
            family,
            registry,
            session,
            cache: DocumentCache::new(),
            values: AttributeMap::new(),
            snapshot: AttributeMap::new(),
            read_only: IndexMap::new(),
            closed: false,
        };

        if let Err(e) = device.populate().await {
            close_quietly(&device.host, &mut device.session).await;
            device.closed = true;
            return Err(e);
        }
        Ok(device)
    }

    async fn populate(&mut self) -> Result<(), CoreError> {
        let session = &mut self.session;
        let config = self
            .cache
            .get_or_fetch(DocumentKind::Config, || async move {
                session
                    .get_config(Datastore::Running)
                    .await
                    .map_err(|e| CoreError::document("config", e))
            })
            .await?;

        for desc in self.registry {
            if desc.is_mutable() {
                let value = config.resolve(desc.name, desc.query(), desc.kind)?;
                self.values.insert(desc.name, value);
            } else {
                self.read_only.insert(desc.name, ReadOnly::Unfetched);
            }
        }
        self.snapshot = self.values.clone();
        debug!(host = %self.host, attributes = self.values.len(), "snapshot captured");
        Ok(())
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn family(&self) -> DeviceFamily {
        self.family
    }

    pub fn registry(&self) -> &'static [AttributeDescriptor] {
        self.registry
    }

    /// Attribute values as captured right after construction.
    pub fn snapshot(&self) -> &AttributeMap {
        &self.snapshot
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    fn descriptor(&self, name: &str) -> Result<&'static AttributeDescriptor, CoreError> {
        self.registry
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| CoreError::UnknownAttribute {
                name: name.to_owned(),
                family: self.family.to_string(),
            })
    }

    /// Current value of `name`. Read-only attributes are fetched on first
    /// access and served from memory afterwards.
    pub async fn get(&mut self, name: &str) -> Result<AttributeValue, CoreError> {
        let desc = self.descriptor(name)?;
        if desc.is_mutable() {
            return Ok(self.values.get(desc.name).cloned().unwrap_or_default());
        }

        if let Some(ReadOnly::Fetched(value)) = self.read_only.get(desc.name) {
            return Ok(value.clone());
        }
        let value = self.fetch_read_only(desc).await?;
        self.read_only
            .insert(desc.name, ReadOnly::Fetched(value.clone()));
        Ok(value)
    }

    async fn fetch_read_only(
        &mut self,
        desc: &'static AttributeDescriptor,
    ) -> Result<AttributeValue, CoreError> {
        let (kind, body) = match desc.source {
            Source::Inventory(_) => (
                DocumentKind::Inventory,
                self.family.inventory_rpc().to_owned(),
            ),
            Source::Command { command, .. } => (
                DocumentKind::Operational(command),
                self.family.command_rpc(command),
            ),
            Source::Config(_) => {
                return Err(CoreError::Internal(format!(
                    "'{}' is not a read-only attribute",
                    desc.name
                )));
            }
        };

        let label = kind.to_string();
        let session = &mut self.session;
        let doc = self
            .cache
            .get_or_fetch(kind, || async move {
                session
                    .rpc(&body)
                    .await
                    .map_err(|e| CoreError::document(&label, e))
            })
            .await?;
        doc.resolve(desc.name, desc.query(), desc.kind)
    }

    /// Assign a desired value to a mutable attribute.
    ///
    /// Strings are trimmed and list values are sorted. A single string
    /// given for a list attribute becomes a one-element list.
    pub fn set(&mut self, name: &str, value: AttributeValue) -> Result<(), CoreError> {
        let desc = self.descriptor(name)?;
        if !desc.is_mutable() {
            return Err(CoreError::ReadOnlyAttribute {
                name: name.to_owned(),
            });
        }

        let value = match (desc.kind, value) {
            (_, AttributeValue::Absent) => AttributeValue::Absent,
            (ValueKind::Scalar, AttributeValue::Scalar(s)) => AttributeValue::Scalar(s.trim().to_owned()),
            (ValueKind::List, AttributeValue::Scalar(s)) => {
                AttributeValue::List(vec![s.trim().to_owned()])
            }
            (ValueKind::List, AttributeValue::List(items)) => {
                AttributeValue::list(items.iter().map(|s| s.trim().to_owned()))
            }
            (ValueKind::Scalar, AttributeValue::List(_)) => {
                return Err(CoreError::Input {
                    message: format!("attribute '{name}' takes a single value, not a list"),
                });
            }
        };
        self.values.insert(desc.name, value);
        Ok(())
    }

    /// Attributes whose current value differs from the snapshot, in
    /// registry order.
    pub fn diff(&self) -> AttributeMap {
        self.values
            .iter()
            .filter(|(name, value)| self.snapshot.get(*name) != Some(*value))
            .map(|(name, value)| (*name, value.clone()))
            .collect()
    }

    /// Every attribute including read-only ones, in registry order.
    pub async fn report(&mut self) -> Result<AttributeMap, CoreError> {
        let mut report = AttributeMap::with_capacity(self.registry.len());
        for desc in self.registry {
            let value = self.get(desc.name).await?;
            report.insert(desc.name, value);
        }
        Ok(report)
    }

    /// Push the diff to the device.
    ///
    /// Each changed attribute is rendered, then edited and committed per
    /// `mode`. The first failure aborts the loop; attributes already
    /// applied stay applied.
    pub async fn update(
        &mut self,
        renderer: &dyn Renderer,
        mode: ApplyMode,
    ) -> Result<Outcome, CoreError> {
        let diff = self.diff();
        if diff.is_empty() {
            debug!(host = %self.host, "no changes");
            return Ok(Outcome::Unchanged);
        }

        let mut payloads = IndexMap::new();
        let mut applied = Vec::new();
        for (name, value) in diff {
            let previous = self.snapshot.get(name).unwrap_or(&AttributeValue::Absent);
            let payload = renderer.render(self.family, name, &value, previous)?;
            if mode.edit {
                self.edit_config(&payload).await?;
            }
            if mode.commit {
                self.commit().await?;
            }
            if mode.is_dry_run() {
                payloads.insert(name.to_owned(), payload);
            } else {
                info!(host = %self.host, attribute = name, "attribute applied");
                applied.push(name.to_owned());
            }
        }

        if mode.is_dry_run() {
            Ok(Outcome::DryRun { payloads })
        } else {
            Ok(Outcome::Applied {
                attributes: applied,
            })
        }
    }

    // ── Transaction ─────────────────────────────────────────────────

    /// Submit one payload under the running-datastore lock.
    ///
    /// The lock is released on every path. An edit failure takes
    /// precedence over an unlock failure.
    pub async fn edit_config(&mut self, payload: &str) -> Result<(), CoreError> {
        let lock_target = self.family.lock_target();
        self.session
            .lock(lock_target)
            .await
            .map_err(|e| CoreError::transaction("lock", e))?;

        let edited = self
            .session
            .edit_config(self.family.edit_target(), payload)
            .await
            .map_err(|e| CoreError::transaction("edit-config", e));
        let unlocked = self
            .session
            .unlock(lock_target)
            .await
            .map_err(|e| CoreError::transaction("unlock", e));

        match (edited, unlocked) {
            (Err(edit), Err(unlock)) => {
                warn!(host = %self.host, error = %unlock, "unlock failed after edit error");
                Err(edit)
            }
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
            (Ok(()), Ok(())) => Ok(()),
        }
    }

    pub async fn commit(&mut self) -> Result<(), CoreError> {
        self.session
            .commit()
            .await
            .map_err(|e| CoreError::transaction("commit", e))
    }

    /// Close the session. Idempotent.
    pub async fn close(&mut self) -> Result<(), CoreError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.session.close().await.map_err(CoreError::from)
    }
}

async fn close_quietly<S: Session>(host: &str, session: &mut S) {
    if let Err(e) = session.close().await {
        debug!(host, error = %e, "session close failed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::render::TemplateRenderer;

    const CONFIG: &str = r"<rpc-reply><data><configuration>
  <system>
    <host-name>vsrx</host-name>
    <ntp>
      <server><name>10.0.2.2</name></server>
      <server><name>10.0.2.1</name></server>
    </ntp>
  </system>
  <snmp>
    <community><name>public</name></community>
    <community><name>private</name></community>
  </snmp>
</configuration></data></rpc-reply>";

    const INVENTORY: &str = r"<rpc-reply><chassis-inventory><chassis>
  <name>Chassis</name>
  <serial-number>98f086798881</serial-number>
  <description>FIREFLY-PERIMETER</description>
</chassis></chassis-inventory></rpc-reply>";

    const TERSE: &str = r"<rpc-reply><interface-information>
  <physical-interface><name>
ge-0/0/1
</name></physical-interface>
  <physical-interface><name>
ge-0/0/0
</name></physical-interface>
</interface-information></rpc-reply>";

    #[derive(Clone, Default)]
    struct FakeSession {
        log: Arc<Mutex<Vec<String>>>,
        fail_edit: bool,
        fail_unlock: bool,
        fail_commit: bool,
    }

    impl FakeSession {
        fn calls(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }

        fn record(&self, call: impl Into<String>) {
            self.log.lock().unwrap().push(call.into());
        }
    }

    fn rpc_error(tag: &str) -> conftime_api::Error {
        conftime_api::Error::Rpc {
            tag: tag.into(),
            message: format!("{tag} from device"),
        }
    }

    #[async_trait]
    impl Session for FakeSession {
        fn capabilities(&self) -> &[String] {
            &[]
        }

        async fn get_config(&mut self, source: Datastore) -> Result<String, conftime_api::Error> {
            self.record(format!("get-config {source}"));
            Ok(CONFIG.into())
        }

        async fn rpc(&mut self, operation: &str) -> Result<String, conftime_api::Error> {
            self.record(format!("rpc {operation}"));
            if operation.contains("get-chassis-inventory") {
                Ok(INVENTORY.into())
            } else if operation.contains("show interfaces terse") {
                Ok(TERSE.into())
            } else {
                Err(rpc_error("operation-not-supported"))
            }
        }

        async fn lock(&mut self, target: Datastore) -> Result<(), conftime_api::Error> {
            self.record(format!("lock {target}"));
            Ok(())
        }

        async fn unlock(&mut self, target: Datastore) -> Result<(), conftime_api::Error> {
            self.record(format!("unlock {target}"));
            if self.fail_unlock {
                return Err(rpc_error("operation-failed"));
            }
            Ok(())
        }

        async fn edit_config(
            &mut self,
            target: Datastore,
            _config: &str,
        ) -> Result<(), conftime_api::Error> {
            self.record(format!("edit-config {target}"));
            if self.fail_edit {
                return Err(rpc_error("invalid-value"));
            }
            Ok(())
        }

        async fn commit(&mut self) -> Result<(), conftime_api::Error> {
            self.record("commit");
            if self.fail_commit {
                return Err(rpc_error("operation-failed"));
            }
            Ok(())
        }

        async fn close(&mut self) -> Result<(), conftime_api::Error> {
            self.record("close");
            Ok(())
        }
    }

    async fn junos(session: FakeSession) -> Device<FakeSession> {
        Device::new("vsrx1", session, DeviceFamily::Junos).await.unwrap()
    }

    fn transaction_calls(calls: &[String]) -> Vec<&str> {
        calls
            .iter()
            .map(String::as_str)
            .filter(|c| !c.starts_with("get-config") && !c.starts_with("rpc"))
            .collect()
    }

    // ── Population ──────────────────────────────────────────────────

    #[tokio::test]
    async fn snapshot_holds_mutable_attributes_only() {
        let session = FakeSession::default();
        let device = junos(session.clone()).await;

        let mut expected = AttributeMap::new();
        expected.insert("hostname", AttributeValue::scalar("vsrx"));
        expected.insert("ntp_servers", AttributeValue::list(["10.0.2.1", "10.0.2.2"]));
        expected.insert("snmp_communities", AttributeValue::list(["private", "public"]));
        assert_eq!(device.snapshot(), &expected);

        // One config fetch, no read-only RPCs yet.
        assert_eq!(session.calls(), vec!["get-config running"]);
    }

    #[tokio::test]
    async fn read_only_attributes_are_memoized() {
        let session = FakeSession::default();
        let mut device = junos(session.clone()).await;

        assert_eq!(
            device.get("serial").await.unwrap(),
            AttributeValue::scalar("98f086798881")
        );
        assert_eq!(
            device.get("model").await.unwrap(),
            AttributeValue::scalar("FIREFLY-PERIMETER")
        );
        assert_eq!(
            device.get("ifaces").await.unwrap(),
            AttributeValue::list(["ge-0/0/0", "ge-0/0/1"])
        );
        device.get("serial").await.unwrap();
        device.get("ifaces").await.unwrap();

        let rpcs: Vec<_> = session
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("rpc"))
            .collect();
        assert_eq!(rpcs.len(), 2, "{rpcs:?}");
    }

    #[tokio::test]
    async fn report_is_in_registry_order() {
        let mut device = junos(FakeSession::default()).await;
        let report = device.report().await.unwrap();
        let names: Vec<_> = report.keys().copied().collect();
        assert_eq!(
            names,
            ["hostname", "ntp_servers", "snmp_communities", "serial", "model", "ifaces"]
        );
    }

    #[tokio::test]
    async fn unsupported_family_closes_session() {
        let session = FakeSession::default();
        let err = Device::new("nx1", session.clone(), DeviceFamily::Nexus)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedFamily { .. }));
        assert_eq!(session.calls(), vec!["close"]);
    }

    // ── Mutation and diff ───────────────────────────────────────────

    #[tokio::test]
    async fn set_rejects_unknown_and_read_only() {
        let mut device = junos(FakeSession::default()).await;
        assert!(matches!(
            device.set("domain_name", "example.net".into()),
            Err(CoreError::UnknownAttribute { .. })
        ));
        assert!(matches!(
            device.set("serial", "x".into()),
            Err(CoreError::ReadOnlyAttribute { .. })
        ));
        assert!(matches!(
            device.set("hostname", vec!["a", "b"].into()),
            Err(CoreError::Input { .. })
        ));
    }

    #[tokio::test]
    async fn list_diff_ignores_permutation() {
        let mut device = junos(FakeSession::default()).await;
        device
            .set("ntp_servers", vec!["10.0.2.2", "10.0.2.1"].into())
            .unwrap();
        device
            .set("snmp_communities", vec!["public", "private"].into())
            .unwrap();
        device.set("hostname", " vsrx ".into()).unwrap();
        assert!(device.diff().is_empty());
    }

    #[tokio::test]
    async fn diff_holds_changed_attributes_in_registry_order() {
        let mut device = junos(FakeSession::default()).await;
        device
            .set("snmp_communities", vec!["public"].into())
            .unwrap();
        device.set("hostname", "edge1".into()).unwrap();

        let diff = device.diff();
        let names: Vec<_> = diff.keys().copied().collect();
        assert_eq!(names, ["hostname", "snmp_communities"]);
    }

    #[tokio::test]
    async fn single_string_for_list_attribute_becomes_list() {
        let mut device = junos(FakeSession::default()).await;
        device.set("ntp_servers", "10.0.2.9".into()).unwrap();
        assert_eq!(
            device.diff().get("ntp_servers"),
            Some(&AttributeValue::list(["10.0.2.9"]))
        );
    }

    // ── Update ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn unchanged_device_is_not_contacted() {
        let session = FakeSession::default();
        let mut device = junos(session.clone()).await;
        let outcome = device
            .update(&TemplateRenderer::default(), ApplyMode::default())
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Unchanged);
        assert!(transaction_calls(&session.calls()).is_empty());
    }

    #[tokio::test]
    async fn update_locks_edits_unlocks_then_commits() {
        let session = FakeSession::default();
        let mut device = junos(session.clone()).await;
        device.set("hostname", "edge1".into()).unwrap();

        let outcome = device
            .update(&TemplateRenderer::default(), ApplyMode::default())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::Applied {
                attributes: vec!["hostname".into()]
            }
        );
        assert_eq!(
            transaction_calls(&session.calls()),
            ["lock running", "edit-config candidate", "unlock running", "commit"]
        );
    }

    #[tokio::test]
    async fn edit_failure_still_unlocks_and_wins() {
        let session = FakeSession {
            fail_edit: true,
            fail_unlock: true,
            ..FakeSession::default()
        };
        let mut device = junos(session.clone()).await;
        device.set("hostname", "edge1".into()).unwrap();
        device.set("ntp_servers", vec!["10.0.2.9"].into()).unwrap();

        let err = device
            .update(&TemplateRenderer::default(), ApplyMode::default())
            .await
            .unwrap_err();
        assert!(
            matches!(err, CoreError::Transaction { ref stage, ref tag, .. }
                if stage == "edit-config" && tag.as_deref() == Some("invalid-value")),
            "unexpected error: {err:?}"
        );
        // Loop aborted after the first attribute, no commit.
        assert_eq!(
            transaction_calls(&session.calls()),
            ["lock running", "edit-config candidate", "unlock running"]
        );
    }

    #[tokio::test]
    async fn commit_failure_aborts_remaining_attributes() {
        let session = FakeSession {
            fail_commit: true,
            ..FakeSession::default()
        };
        let mut device = junos(session.clone()).await;
        device.set("hostname", "edge1".into()).unwrap();
        device.set("ntp_servers", vec!["10.0.2.9"].into()).unwrap();

        let err = device
            .update(&TemplateRenderer::default(), ApplyMode::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Transaction { ref stage, .. } if stage == "commit"));
        assert_eq!(
            session
                .calls()
                .iter()
                .filter(|c| c.starts_with("edit-config"))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn dry_run_renders_without_writing() {
        let session = FakeSession::default();
        let mut device = junos(session.clone()).await;
        device.set("hostname", "edge1".into()).unwrap();

        let outcome = device
            .update(&TemplateRenderer::default(), ApplyMode::DRY_RUN)
            .await
            .unwrap();
        let Outcome::DryRun { payloads } = outcome else {
            panic!("expected dry run, got {outcome:?}");
        };
        assert_eq!(payloads.len(), 1);
        assert!(payloads["hostname"].contains("<host-name>edge1</host-name>"));
        assert!(transaction_calls(&session.calls()).is_empty());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let session = FakeSession::default();
        let mut device = junos(session.clone()).await;
        device.close().await.unwrap();
        device.close().await.unwrap();
        assert_eq!(
            session.calls().iter().filter(|c| *c == "close").count(),
            1
        );
    }
}
