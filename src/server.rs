//! Server data model
//!
//! Active server records and their registration state. Jobs address
//! servers by SSID only; the [`Servers`] list is the single owner of the
//! records, which keeps deactivation races benign.

use std::fmt;
use std::time::{Duration, Instant};

use crate::binding::BindingMode;
use crate::error::{Error, Result};
use crate::sched::SchedHandle;
use crate::url::Endpoint;

/// Short Server ID: a 16-bit identifier for a server record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ssid(pub u16);

impl Ssid {
    /// Reserved value addressing all active servers at once
    pub const ANY: Ssid = Ssid(0);
    /// Reserved value of the bootstrap server
    pub const BOOTSTRAP: Ssid = Ssid(u16::MAX);

    /// Whether this is the bootstrap server's SSID
    pub fn is_bootstrap(self) -> bool {
        self == Self::BOOTSTRAP
    }
}

impl fmt::Display for Ssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Connection variant a server's registration is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnType {
    /// UDP (optionally carrying DTLS)
    Udp,
    /// SMS
    Sms,
    /// No connection selected yet; any I/O must first set one up
    Wildcard,
}

/// Parameters carried by the last successful Register or Update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateParams {
    /// Registration lifetime negotiated with the server
    pub lifetime: Duration,
    /// Binding mode advertised to the server
    pub binding_mode: BindingMode,
}

/// Per-server registration state
///
/// Created on activation with no deadline; the deadline is set by the
/// first successful Register and renewed by every successful Update.
#[derive(Debug, Clone)]
pub struct RegistrationInfo {
    /// Connection variant currently selected for the registration
    pub conn_type: ConnType,
    deadline: Option<Instant>,
    last_update_params: UpdateParams,
}

impl RegistrationInfo {
    /// Fresh state for a newly activated server
    pub fn new(params: UpdateParams) -> Self {
        Self {
            conn_type: ConnType::Wildcard,
            deadline: None,
            last_update_params: params,
        }
    }

    /// Record a successful Register or Update at `now`
    pub fn renew(&mut self, now: Instant, params: UpdateParams) {
        self.deadline = Some(now + params.lifetime);
        self.last_update_params = params;
    }

    /// Drop the registration; the next refresh must Re-Register
    pub fn clear(&mut self) {
        self.deadline = None;
        self.conn_type = ConnType::Wildcard;
    }

    /// Parameters of the last successful exchange
    pub fn last_update_params(&self) -> UpdateParams {
        self.last_update_params
    }

    /// Lifetime from the last successful exchange
    pub fn lifetime(&self) -> Duration {
        self.last_update_params.lifetime
    }

    /// Time left until the registration expires; zero when expired or
    /// when there has been no successful Register yet
    pub fn time_remaining(&self, now: Instant) -> Duration {
        match self.deadline {
            Some(deadline) => deadline.saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    /// Whether the registration deadline has passed
    pub fn is_expired(&self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) => deadline < now,
            None => true,
        }
    }
}

/// One active server under the client
#[derive(Debug)]
pub struct ActiveServer {
    ssid: Ssid,
    endpoint: Endpoint,
    sms_msisdn: Option<String>,
    /// Registration state, mutated by the lifecycle engine
    pub registration_info: RegistrationInfo,
    pub(crate) update_handle: Option<SchedHandle>,
}

impl ActiveServer {
    /// Create an active server record with fresh registration state
    pub fn new(
        ssid: Ssid,
        endpoint: Endpoint,
        params: UpdateParams,
        sms_msisdn: Option<String>,
    ) -> Self {
        Self {
            ssid,
            endpoint,
            sms_msisdn,
            registration_info: RegistrationInfo::new(params),
            update_handle: None,
        }
    }

    /// The server's SSID
    pub fn ssid(&self) -> Ssid {
        self.ssid
    }

    /// Endpoint URL the server is reached at
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// MSISDN for SMS binding, if configured
    pub fn sms_msisdn(&self) -> Option<&str> {
        self.sms_msisdn.as_deref()
    }

    /// Whether this is the bootstrap server
    pub fn is_bootstrap(&self) -> bool {
        self.ssid.is_bootstrap()
    }

    /// Handle of the currently scheduled Update job, if any
    pub fn update_handle(&self) -> Option<SchedHandle> {
        self.update_handle
    }
}

/// Ordered list of active servers
#[derive(Debug, Default)]
pub struct Servers {
    active: Vec<ActiveServer>,
}

impl Servers {
    /// Empty server list
    pub fn new() -> Self {
        Self::default()
    }

    /// Find an active server by SSID
    pub fn find_active(&self, ssid: Ssid) -> Option<&ActiveServer> {
        self.active.iter().find(|server| server.ssid == ssid)
    }

    /// Find an active server by SSID, mutably
    pub fn find_active_mut(&mut self, ssid: Ssid) -> Option<&mut ActiveServer> {
        self.active.iter_mut().find(|server| server.ssid == ssid)
    }

    /// Append a server to the active list.
    ///
    /// Rejects the reserved `ANY` SSID and duplicates.
    pub fn activate(&mut self, server: ActiveServer) -> Result<()> {
        if server.ssid == Ssid::ANY {
            return Err(Error::InvalidConfig("SSID 0 is reserved".to_string()));
        }
        if self.find_active(server.ssid).is_some() {
            return Err(Error::InvalidConfig(format!(
                "server with SSID {} is already active",
                server.ssid
            )));
        }
        self.active.push(server);
        Ok(())
    }

    /// Remove a server from the active list, returning its record
    pub fn deactivate(&mut self, ssid: Ssid) -> Option<ActiveServer> {
        let index = self.active.iter().position(|server| server.ssid == ssid)?;
        Some(self.active.remove(index))
    }

    /// Iterate over active servers in activation order
    pub fn iter(&self) -> impl Iterator<Item = &ActiveServer> {
        self.active.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut ActiveServer> {
        self.active.iter_mut()
    }

    /// Number of active servers
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Whether no server is active
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
