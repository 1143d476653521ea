//! lwm2m-registration: LwM2M client registration lifecycle
//!
//! This crate keeps an LwM2M client registered and reachable with one or
//! more servers over CoAP/DTLS. The heart of it is a cooperative,
//! timer-driven state machine per server: it schedules Updates halfway
//! through the registration lifetime, decides between Update and
//! Re-Register, survives network failures by deferring to an external
//! scheduler's backoff, and folds the bootstrap server into the same
//! pipeline with its own post-reconnect hook.
//!
//! # Key Features
//!
//! - **Update scheduling**: Updates target the midpoint of the lifetime,
//!   floored at one second, leaving a retry window before expiry
//! - **Update vs. Re-Register**: expired or unbound registrations go
//!   through a fresh Register, everything else through Update
//! - **Bounded recovery**: network errors suspend the connection and hand
//!   re-entry timing to the scheduler's retry backoff
//! - **Endpoint URLs**: RFC 3986 parsing of `coap`/`coaps` endpoints with
//!   percent-decoded path and query segments
//!
//! # Example
//!
//! ```ignore
//! use lwm2m_registration::{Client, ServerConfig, Ssid};
//!
//! let mut client = Client::new("urn:dev:os:0023C7-000001", scheduler);
//! client.activate_server(&ServerConfig::from_file("server.json")?)?;
//!
//! // jobs fire through the scheduler; an Update can also be forced:
//! client.schedule_registration_update(Ssid::ANY)?;
//! ```

mod binding;
mod client;
mod config;
mod connection;
mod error;
mod query;
mod rand32;
mod register;
mod sched;
mod server;
mod transport;
mod url;

pub use binding::BindingMode;
pub use client::Client;
pub use config::ServerConfig;
pub use connection::{
    BootstrapHooks, Collaborators, ConnectionSubsystem, ObserveHooks, RegistrationProtocol,
};
pub use error::{Error, Result};
pub use query::{make_query_string_list, LWM2M_VERSION};
pub use rand32::{rand32, rand32_compose, Lcg32};
pub use register::{MIN_UPDATE_INTERVAL, UPDATE_INTERVAL_MARGIN_FACTOR};
pub use sched::{Job, RetryBackoff, SchedHandle, Scheduler, UpdateArgs};
pub use server::{ActiveServer, ConnType, RegistrationInfo, Servers, Ssid, UpdateParams};
pub use transport::{create_connected_socket, SocketKind, TransportConfig};
pub use url::{Endpoint, HOST_MAX, PORT_MAX_DIGITS, SCHEME_MAX};
