//! Collaborator interfaces consumed by the lifecycle engine
//!
//! The engine stays polymorphic over the connection subsystem, the
//! registration protocol, and the observe/bootstrap hooks. Everything
//! here is a contract; the implementations live with the transport.

use crate::error::Result;
use crate::server::ActiveServer;

/// Connection and stream management for one client
///
/// The comm stream is a single process-wide resource: it is acquired
/// with [`bind_stream`](Self::bind_stream) at the start of a protocol
/// exchange and must be released on every exit path. Only one exchange
/// holds the stream at a time.
pub trait ConnectionSubsystem {
    /// Ensure the server has a live connection, reconnecting when
    /// `reconnect_required` is set or the current connection is dead;
    /// updates the server's `conn_type`.
    fn refresh(&mut self, server: &mut ActiveServer, reconnect_required: bool) -> Result<()>;

    /// Select and prepare the best connection variant for Register
    fn setup_registration_connection(&mut self, server: &mut ActiveServer) -> Result<()>;

    /// Whether the server's current connection is usable
    fn is_online(&mut self, server: &ActiveServer) -> bool;

    /// Disconnect the server's socket, keeping the connection object so
    /// the next refresh can reconnect with the same `conn_type`
    fn suspend(&mut self, server: &mut ActiveServer);

    /// Bind the comm stream to the server's current connection
    fn bind_stream(&mut self, server: &ActiveServer) -> Result<()>;

    /// Reset the comm stream after a protocol exchange
    fn reset_stream(&mut self);

    /// Release the comm stream
    fn release_stream(&mut self);

    /// Release the comm stream without scheduling queued work on it
    fn release_stream_without_scheduling_queue(&mut self);
}

/// The three LwM2M registration-interface exchanges
///
/// `update` distinguishes its outcomes through the error type:
/// [`Error::UpdateRejected`](crate::Error::UpdateRejected) when the
/// server lost our registration, [`Error::Network`](crate::Error::Network)
/// for transport-level failures, any other error otherwise.
pub trait RegistrationProtocol {
    /// Perform the Register exchange
    fn register(&mut self, server: &ActiveServer) -> Result<()>;

    /// Perform the Update exchange
    fn update(&mut self, server: &ActiveServer) -> Result<()>;

    /// Perform the De-Register exchange
    fn deregister(&mut self, server: &ActiveServer) -> Result<()>;
}

/// Observation subsystem hooks
pub trait ObserveHooks {
    /// Flush observation state on the current connection
    fn flush_current_connection(&mut self);
}

/// Bootstrap subsystem hooks
pub trait BootstrapHooks {
    /// A regular server connection became available
    fn notify_regular_connection_available(&mut self);

    /// The bootstrap server's connection was re-established
    fn update_reconnected(&mut self) -> Result<()>;
}

/// Collaborator bundle passed into job execution
pub struct Collaborators<'a> {
    /// Connection and stream management
    pub connections: &'a mut dyn ConnectionSubsystem,
    /// Registration-interface exchanges
    pub protocol: &'a mut dyn RegistrationProtocol,
    /// Observation hooks
    pub observe: &'a mut dyn ObserveHooks,
    /// Bootstrap hooks
    pub bootstrap: &'a mut dyn BootstrapHooks,
}
