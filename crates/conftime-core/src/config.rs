// ── Runtime connection configuration ──
//
// These types describe *how* to reach a device and *what* a run may do.
// They never touch disk: the CLI builds them from the config file and
// flags and hands them in with each job.

use std::path::PathBuf;
use std::time::Duration;

use conftime_api::ConnectParams;
use serde::{Deserialize, Serialize};

/// Per-job connection parameters.
///
/// Travels inside the queue envelope, so it must stay serializable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionOptions {
    pub port: u16,
    pub username: String,
    pub key_path: PathBuf,
    pub verify_hostkey: bool,
    /// Per-RPC timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            port: 22,
            username: "vagrant".into(),
            key_path: PathBuf::from("vagrant/vagrant.key"),
            verify_hostkey: false,
            timeout_secs: 5,
        }
    }
}

impl ConnectionOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Session parameters for one host.
    pub fn to_connect_params(&self, host: &str) -> ConnectParams {
        ConnectParams {
            host: host.to_owned(),
            port: self.port,
            username: self.username.clone(),
            key_path: self.key_path.clone(),
            verify_hostkey: self.verify_hostkey,
            timeout: self.timeout(),
        }
    }
}

/// Which transaction stages `Device::update` runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyMode {
    pub edit: bool,
    pub commit: bool,
}

impl Default for ApplyMode {
    fn default() -> Self {
        Self {
            edit: true,
            commit: true,
        }
    }
}

impl ApplyMode {
    /// Render payloads only; the device is never written.
    pub const DRY_RUN: Self = Self {
        edit: false,
        commit: false,
    };

    pub fn is_dry_run(self) -> bool {
        !self.edit && !self.commit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_params_carry_host_and_timeout() {
        let opts = ConnectionOptions {
            timeout_secs: 9,
            ..ConnectionOptions::default()
        };
        let params = opts.to_connect_params("vsrx1");
        assert_eq!(params.host, "vsrx1");
        assert_eq!(params.port, 22);
        assert_eq!(params.timeout, Duration::from_secs(9));
        assert!(!params.verify_hostkey);
    }

    #[test]
    fn dry_run_mode() {
        assert!(ApplyMode::DRY_RUN.is_dry_run());
        assert!(!ApplyMode::default().is_dry_run());
        assert!(
            !ApplyMode {
                edit: true,
                commit: false
            }
            .is_dry_run()
        );
    }
}
