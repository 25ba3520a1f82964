// ── Session seam ──
//
// `Device` and the reconcile run talk to devices through these traits so
// the engine can be driven by a scripted session in tests. The production
// implementations wrap `conftime_api::NetconfClient`.

use async_trait::async_trait;
use conftime_api::{Datastore, NetconfClient};
use tracing::debug;

use crate::config::ConnectionOptions;
use crate::error::CoreError;

/// One open device-management session, used strictly sequentially.
#[async_trait]
pub trait Session: Send {
    fn capabilities(&self) -> &[String];

    /// Raw `<get-config>` reply for `source`.
    async fn get_config(&mut self, source: Datastore) -> Result<String, conftime_api::Error>;

    /// Raw reply to an arbitrary RPC body.
    async fn rpc(&mut self, operation: &str) -> Result<String, conftime_api::Error>;

    async fn lock(&mut self, target: Datastore) -> Result<(), conftime_api::Error>;

    async fn unlock(&mut self, target: Datastore) -> Result<(), conftime_api::Error>;

    async fn edit_config(
        &mut self,
        target: Datastore,
        config: &str,
    ) -> Result<(), conftime_api::Error>;

    async fn commit(&mut self) -> Result<(), conftime_api::Error>;

    async fn close(&mut self) -> Result<(), conftime_api::Error>;
}

#[async_trait]
impl Session for NetconfClient {
    fn capabilities(&self) -> &[String] {
        NetconfClient::capabilities(self)
    }

    async fn get_config(&mut self, source: Datastore) -> Result<String, conftime_api::Error> {
        NetconfClient::get_config(self, source).await
    }

    async fn rpc(&mut self, operation: &str) -> Result<String, conftime_api::Error> {
        NetconfClient::rpc(self, operation).await
    }

    async fn lock(&mut self, target: Datastore) -> Result<(), conftime_api::Error> {
        NetconfClient::lock(self, target).await
    }

    async fn unlock(&mut self, target: Datastore) -> Result<(), conftime_api::Error> {
        NetconfClient::unlock(self, target).await
    }

    async fn edit_config(
        &mut self,
        target: Datastore,
        config: &str,
    ) -> Result<(), conftime_api::Error> {
        NetconfClient::edit_config(self, target, config).await
    }

    async fn commit(&mut self) -> Result<(), conftime_api::Error> {
        NetconfClient::commit(self).await
    }

    async fn close(&mut self) -> Result<(), conftime_api::Error> {
        NetconfClient::close(self).await
    }
}

/// Opens sessions to hosts.
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: Session + 'static;

    async fn connect(
        &self,
        host: &str,
        options: &ConnectionOptions,
    ) -> Result<Self::Session, CoreError>;
}

/// Connects over SSH with `NetconfClient`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetconfConnector;

#[async_trait]
impl Connector for NetconfConnector {
    type Session = NetconfClient;

    async fn connect(
        &self,
        host: &str,
        options: &ConnectionOptions,
    ) -> Result<NetconfClient, CoreError> {
        debug!(host, port = options.port, "opening NETCONF session");
        NetconfClient::connect(&options.to_connect_params(host))
            .await
            .map_err(|e| match CoreError::from(e) {
                CoreError::ConnectionFailed { host: h, reason } if h.is_empty() => {
                    CoreError::ConnectionFailed {
                        host: host.to_owned(),
                        reason,
                    }
                }
                other => other,
            })
    }
}
