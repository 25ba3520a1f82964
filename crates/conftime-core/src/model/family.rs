// ── Device families and their attribute registries ──

use conftime_api::Datastore;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::attribute::{AttributeDescriptor, ValueKind};

/// Junos attributes, in report and update order.
static JUNOS_ATTRIBUTES: [AttributeDescriptor; 6] = [
    AttributeDescriptor::config("hostname", "//host-name", ValueKind::Scalar),
    AttributeDescriptor::config("ntp_servers", "//ntp/server/name", ValueKind::List),
    AttributeDescriptor::config("snmp_communities", "//snmp/community/name", ValueKind::List),
    AttributeDescriptor::inventory(
        "serial",
        "chassis-inventory/chassis/serial-number[1]",
        ValueKind::Scalar,
    ),
    AttributeDescriptor::inventory(
        "model",
        "chassis-inventory/chassis/description[1]",
        ValueKind::Scalar,
    ),
    AttributeDescriptor::command("ifaces", "show interfaces terse", "//name", ValueKind::List),
];

/// A classified device family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeviceFamily {
    Junos,
    /// Recognized but without reconciliation support.
    Nexus,
}

impl DeviceFamily {
    /// The attribute registry, or `None` for families without
    /// reconciliation logic.
    pub fn registry(self) -> Option<&'static [AttributeDescriptor]> {
        match self {
            Self::Junos => Some(&JUNOS_ATTRIBUTES),
            Self::Nexus => None,
        }
    }

    /// Datastore held locked while an edit is submitted.
    pub fn lock_target(self) -> Datastore {
        Datastore::Running
    }

    /// Datastore `<edit-config>` is written to.
    pub fn edit_target(self) -> Datastore {
        match self {
            Self::Junos => Datastore::Candidate,
            Self::Nexus => Datastore::Running,
        }
    }

    /// RPC body returning the chassis inventory.
    pub fn inventory_rpc(self) -> &'static str {
        "<get-chassis-inventory/>"
    }

    /// RPC body running an operational command with XML output.
    pub fn command_rpc(self, command: &str) -> String {
        format!(
            "<command format=\"xml\">{}</command>",
            conftime_api::message::escape_text(command)
        )
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn junos_registry_order() {
        let names: Vec<_> = DeviceFamily::Junos
            .registry()
            .into_iter()
            .flatten()
            .map(|d| d.name)
            .collect();
        assert_eq!(
            names,
            ["hostname", "ntp_servers", "snmp_communities", "serial", "model", "ifaces"]
        );
    }

    #[test]
    fn nexus_has_no_registry() {
        assert!(DeviceFamily::Nexus.registry().is_none());
    }

    #[test]
    fn family_names_round_trip_through_strum() {
        assert_eq!(DeviceFamily::Junos.to_string(), "junos");
        assert_eq!(DeviceFamily::from_str("nexus").ok(), Some(DeviceFamily::Nexus));
    }

    #[test]
    fn command_rpc_escapes_text() {
        assert_eq!(
            DeviceFamily::Junos.command_rpc("show interfaces terse"),
            "<command format=\"xml\">show interfaces terse</command>"
        );
    }
}
