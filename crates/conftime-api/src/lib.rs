// conftime-api: async NETCONF 1.0 client over SSH

pub mod client;
pub mod error;
pub mod framing;
pub mod message;
pub mod transport;

pub use client::NetconfClient;
pub use error::Error;
pub use message::{Datastore, Hello};
pub use transport::ConnectParams;
