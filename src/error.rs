//! Error types for lwm2m-registration

use thiserror::Error;

/// Result type alias for lwm2m-registration operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in lwm2m-registration operations
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to parse a server endpoint URL
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to build the registration query string list
    #[error("invalid registration query: {0}")]
    InvalidQuery(String),

    /// Rejected server configuration
    #[error("invalid server configuration: {0}")]
    InvalidConfig(String),

    /// Operation requires the client to be online
    #[error("client is offline")]
    Offline,

    /// The SSID does not resolve to an active server
    #[error("no active server with SSID {0}")]
    NoActiveServer(u16),

    /// The scheduler could not accept a job
    #[error("could not schedule job: {0}")]
    Scheduler(String),

    /// Network-level communication failure during a protocol exchange
    #[error("network communication error")]
    Network,

    /// The server no longer recognizes our registration
    #[error("registration update rejected by server")]
    UpdateRejected,

    /// Transport setup failure (socket creation, bind, connect)
    #[error("transport error: {0}")]
    Transport(String),

    /// Protocol failure other than the dedicated variants above
    #[error("protocol error: {0}")]
    Protocol(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
