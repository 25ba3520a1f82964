// ── Capability-based family detection ──

use tracing::debug;

use crate::error::CoreError;
use crate::model::DeviceFamily;

const CANDIDATE_MARKER: &str = ":candidate";
const BASE_MARKER: &str = "urn:ietf:params:netconf:base:";

/// Classify a device from its hello capabilities.
///
/// A `:candidate` datastore means Junos. Any other device that speaks
/// base NETCONF is assumed to be Nexus, which has no reconciliation
/// support yet.
pub fn detect<S: AsRef<str>>(capabilities: &[S]) -> Result<DeviceFamily, CoreError> {
    let has = |marker: &str| capabilities.iter().any(|c| c.as_ref().contains(marker));

    let family = if has(CANDIDATE_MARKER) {
        DeviceFamily::Junos
    } else if has(BASE_MARKER) {
        DeviceFamily::Nexus
    } else {
        return Err(CoreError::UnsupportedFamily {
            family: "unknown (no NETCONF base capability advertised)".into(),
        });
    };
    debug!(%family, capabilities = capabilities.len(), "detected device family");
    Ok(family)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn candidate_means_junos() {
        let caps = [
            "urn:ietf:params:netconf:base:1.0",
            "urn:ietf:params:netconf:capability:candidate:1.0",
            "http://xml.juniper.net/netconf/junos/1.0",
        ];
        assert_eq!(detect(&caps).unwrap(), DeviceFamily::Junos);
    }

    #[test]
    fn base_without_candidate_means_nexus() {
        let caps = [
            "urn:ietf:params:netconf:base:1.0",
            "urn:ietf:params:netconf:capability:writable-running:1.0",
        ];
        assert_eq!(detect(&caps).unwrap(), DeviceFamily::Nexus);
    }

    #[test]
    fn nothing_recognisable_is_unsupported() {
        let err = detect(&["urn:example:vendor:1.0"]).unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedFamily { .. }));
        let err = detect::<&str>(&[]).unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedFamily { .. }));
    }
}
