//! Server configuration records
//!
//! JSON-loadable description of a server to activate: its SSID, endpoint
//! URI, registration lifetime and binding. Validation happens when the
//! record is turned into an active server.

use std::fs;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::binding::BindingMode;
use crate::error::{Error, Result};
use crate::server::{ActiveServer, Ssid, UpdateParams};
use crate::url::Endpoint;

/// Configuration of one server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Short Server ID; must be non-zero
    pub ssid: u16,
    /// Endpoint URI, e.g. `coaps://server.example.com:5684`
    pub uri: String,
    /// Registration lifetime in seconds; must be positive
    pub lifetime_s: i64,
    /// Binding mode short form; defaults to `U` when absent
    #[serde(default)]
    pub binding: Option<String>,
    /// MSISDN for SMS binding
    #[serde(default)]
    pub sms_msisdn: Option<String>,
}

impl ServerConfig {
    /// Parse a single server configuration from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a list of server configurations from JSON
    pub fn list_from_json(json: &str) -> Result<Vec<Self>> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a single server configuration from a JSON file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Validate the record and build the active server it describes.
    pub(crate) fn to_active_server(&self) -> Result<ActiveServer> {
        let ssid = Ssid(self.ssid);
        if ssid == Ssid::ANY {
            return Err(Error::InvalidConfig("SSID 0 is reserved".to_string()));
        }
        if self.lifetime_s <= 0 {
            return Err(Error::InvalidConfig(format!(
                "lifetime must be positive, got {}",
                self.lifetime_s
            )));
        }

        let endpoint = Endpoint::parse(&self.uri)?;

        let binding_mode = match &self.binding {
            None => BindingMode::U,
            Some(binding) => {
                let mode = BindingMode::from_str(binding);
                if mode == BindingMode::None {
                    return Err(Error::InvalidConfig(format!(
                        "unknown binding mode: {}",
                        binding
                    )));
                }
                mode
            }
        };

        Ok(ActiveServer::new(
            ssid,
            endpoint,
            UpdateParams {
                lifetime: Duration::from_secs(self.lifetime_s as u64),
                binding_mode,
            },
            self.sms_msisdn.clone(),
        ))
    }
}
