// ── Per-device document cache ──
//
// Each source document is fetched at most once per device lifetime and
// reused for every attribute that queries it. The cache is owned by its
// `Device` and never shared across tasks.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;

use tracing::debug;

use crate::document::Document;
use crate::error::CoreError;

/// Which source document an attribute reads from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// `<get-config>` of the running datastore.
    Config,
    /// Chassis inventory RPC reply.
    Inventory,
    /// Reply to an operational command.
    Operational(&'static str),
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config => f.write_str("config"),
            Self::Inventory => f.write_str("inventory"),
            Self::Operational(command) => write!(f, "operational '{command}'"),
        }
    }
}

#[derive(Debug, Default)]
pub struct DocumentCache {
    documents: HashMap<DocumentKind, Document>,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: &DocumentKind) -> Option<&Document> {
        self.documents.get(kind)
    }

    pub fn contains(&self, kind: &DocumentKind) -> bool {
        self.documents.contains_key(kind)
    }

    /// Return the cached document for `kind`, or run `fetch` once and keep
    /// its reply. A failed fetch leaves the slot empty.
    pub async fn get_or_fetch<F, Fut>(
        &mut self,
        kind: DocumentKind,
        fetch: F,
    ) -> Result<&Document, CoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, CoreError>>,
    {
        if !self.documents.contains_key(&kind) {
            debug!(document = %kind, "fetching source document");
            let xml = fetch().await?;
            let doc = Document::parse(kind.to_string(), xml)?;
            self.documents.insert(kind.clone(), doc);
        }
        self.documents
            .get(&kind)
            .ok_or_else(|| CoreError::Internal(format!("{kind} document missing from cache")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn fetches_each_kind_once() {
        let calls = AtomicUsize::new(0);
        let mut cache = DocumentCache::new();

        for _ in 0..3 {
            let doc = cache
                .get_or_fetch(DocumentKind::Config, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("<data><host-name>vsrx</host-name></data>".to_owned())
                })
                .await
                .unwrap();
            assert_eq!(doc.select("//host-name").unwrap(), vec!["vsrx".to_owned()]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache
            .get_or_fetch(DocumentKind::Inventory, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("<chassis-inventory/>".to_owned())
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.contains(&DocumentKind::Config));
        assert!(!cache.contains(&DocumentKind::Operational("show version")));
    }

    #[tokio::test]
    async fn failed_fetch_is_not_cached() {
        let mut cache = DocumentCache::new();
        let err = cache
            .get_or_fetch(DocumentKind::Inventory, || async {
                Err(CoreError::SessionClosed)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::SessionClosed));
        assert!(!cache.contains(&DocumentKind::Inventory));

        let doc = cache
            .get_or_fetch(DocumentKind::Inventory, || async {
                Ok("<chassis-inventory/>".to_owned())
            })
            .await
            .unwrap();
        assert_eq!(doc.label(), "inventory");
    }
}
