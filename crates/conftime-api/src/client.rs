// NETCONF session client
//
// Owns one framed byte stream (normally the SSH `netconf` subsystem),
// performs the hello exchange, and issues RPCs strictly one at a time.
// Every round trip is bounded by the session timeout.

use std::pin::Pin;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use crate::error::Error;
use crate::framing::{self, FrameDecoder};
use crate::message::{self, Datastore};
use crate::transport::{self, ConnectParams, SshTransport};

const READ_CHUNK: usize = 16 * 1024;

/// Any duplex byte stream a session can run over.
pub trait Io: AsyncRead + AsyncWrite + Send {}

impl<T: AsyncRead + AsyncWrite + Send> Io for T {}

/// A single NETCONF session.
///
/// Not `Clone`: a session is exclusively owned by whoever opened it.
pub struct NetconfClient {
    io: Pin<Box<dyn Io>>,
    decoder: FrameDecoder,
    host: String,
    capabilities: Vec<String>,
    session_id: Option<u32>,
    next_message_id: u64,
    timeout: Duration,
    ssh: Option<SshTransport>,
    closed: bool,
}

impl std::fmt::Debug for NetconfClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetconfClient")
            .field("host", &self.host)
            .field("session_id", &self.session_id)
            .field("capabilities", &self.capabilities.len())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl NetconfClient {
    /// Open an SSH session to the device and complete the hello exchange.
    pub async fn connect(params: &ConnectParams) -> Result<Self, Error> {
        let (ssh, stream) = transport::open(params).await?;
        let mut client = Self::over(stream, params.host.clone(), params.timeout).await?;
        client.ssh = Some(ssh);
        Ok(client)
    }

    /// Run a session over an already-established stream.
    ///
    /// Sends the client hello and waits for the server's.
    pub async fn over<T>(io: T, host: impl Into<String>, timeout: Duration) -> Result<Self, Error>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let mut client = Self {
            io: Box::pin(io),
            decoder: FrameDecoder::new(),
            host: host.into(),
            capabilities: Vec::new(),
            session_id: None,
            next_message_id: 1,
            timeout,
            ssh: None,
            closed: false,
        };

        client.send(&message::client_hello()).await?;
        let greeting = client.receive("hello").await?;
        let hello = message::parse_hello(&greeting)?;
        debug!(
            host = %client.host,
            session_id = ?hello.session_id,
            capabilities = hello.capabilities.len(),
            "NETCONF session established"
        );
        client.capabilities = hello.capabilities;
        client.session_id = hello.session_id;
        Ok(client)
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Capabilities advertised in the server hello.
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    pub fn session_id(&self) -> Option<u32> {
        self.session_id
    }

    /// Returns `true` if any advertised capability contains `marker`.
    pub fn has_capability(&self, marker: &str) -> bool {
        self.capabilities.iter().any(|c| c.contains(marker))
    }

    // ── Operations ──────────────────────────────────────────────────

    /// `<get-config>` for a whole datastore. Returns the raw reply document.
    pub async fn get_config(&mut self, source: Datastore) -> Result<String, Error> {
        self.rpc(&message::get_config(source)).await
    }

    pub async fn lock(&mut self, target: Datastore) -> Result<(), Error> {
        self.rpc(&message::lock(target)).await.map(drop)
    }

    pub async fn unlock(&mut self, target: Datastore) -> Result<(), Error> {
        self.rpc(&message::unlock(target)).await.map(drop)
    }

    pub async fn edit_config(&mut self, target: Datastore, config: &str) -> Result<(), Error> {
        self.rpc(&message::edit_config(target, config)).await.map(drop)
    }

    pub async fn commit(&mut self) -> Result<(), Error> {
        self.rpc(message::commit()).await.map(drop)
    }

    /// Send an arbitrary operation inside an `<rpc>` envelope and return
    /// the raw `<rpc-reply>` text.
    pub async fn rpc(&mut self, operation: &str) -> Result<String, Error> {
        if self.closed {
            return Err(Error::SessionClosed);
        }
        let id = self.next_message_id;
        self.next_message_id += 1;

        trace!(host = %self.host, message_id = id, operation, "rpc");
        let result = self.exchange(id, operation).await;
        if let Err(ref e) = result {
            if desynchronizes(e) {
                debug!(host = %self.host, message_id = id, error = %e, "reply stream lost, closing");
                self.closed = true;
            }
        }
        result
    }

    async fn exchange(&mut self, id: u64, operation: &str) -> Result<String, Error> {
        self.send(&message::rpc(id, operation)).await?;
        let reply = self.receive("rpc-reply").await?;
        message::check_reply(&reply, id)?;
        Ok(reply)
    }

    /// `<close-session>` followed by SSH disconnect. Idempotent.
    pub async fn close(&mut self) -> Result<(), Error> {
        if self.closed && self.ssh.is_none() {
            return Ok(());
        }
        let result = if self.closed {
            Ok(())
        } else {
            self.rpc(message::close_session()).await.map(drop)
        };
        self.closed = true;
        if let Some(ssh) = self.ssh.take() {
            if let Err(e) = ssh.disconnect().await {
                debug!(host = %self.host, error = %e, "SSH disconnect failed");
            }
        }
        debug!(host = %self.host, "NETCONF session closed");
        result
    }

    // ── Framed I/O ──────────────────────────────────────────────────

    async fn send(&mut self, xml: &str) -> Result<(), Error> {
        let bytes = framing::encode(xml);
        let timeout = self.timeout;
        let io = &mut self.io;
        let written = tokio::time::timeout(timeout, async move {
            io.write_all(&bytes).await?;
            io.flush().await
        })
        .await
        .map_err(|_| Error::Timeout {
            operation: "write",
            timeout_secs: timeout.as_secs(),
        })?;

        match written {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                self.closed = true;
                Err(Error::SessionClosed)
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn receive(&mut self, operation: &'static str) -> Result<String, Error> {
        let timeout = self.timeout;
        tokio::time::timeout(timeout, self.read_message())
            .await
            .map_err(|_| Error::Timeout {
                operation,
                timeout_secs: timeout.as_secs(),
            })?
    }

    async fn read_message(&mut self) -> Result<String, Error> {
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            if let Some(msg) = self.decoder.next_message()? {
                return Ok(msg);
            }
            let n = self.io.read(&mut chunk).await?;
            if n == 0 {
                self.closed = true;
                return Err(Error::SessionClosed);
            }
            self.decoder.extend(&chunk[..n])?;
        }
    }
}

/// Errors after which the reply stream can no longer be matched to requests.
/// An `<rpc-error>` reply is a complete answer and leaves the session usable.
fn desynchronizes(err: &Error) -> bool {
    matches!(
        err,
        Error::Timeout { .. } | Error::Framing(_) | Error::MalformedReply(_) | Error::Io(_)
    )
}
