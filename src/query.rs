//! Registration query string builder
//!
//! Assembles the ordered `key=value` list for the LwM2M registration URI
//! query: `lwm2m`, `ep`, `lt`, `b`, `sms`, each omitted when absent.

use crate::binding::BindingMode;
use crate::error::{Error, Result};

/// LwM2M enabler version sent as the `lwm2m=` query argument
pub const LWM2M_VERSION: &str = "1.0";

/// Build the registration query list in wire order.
///
/// `lifetime` is formatted as a decimal and must be positive; a
/// non-positive value fails the whole list. A [`BindingMode::None`]
/// binding contributes no `b=` argument.
pub fn make_query_string_list(
    version: Option<&str>,
    endpoint_name: Option<&str>,
    lifetime: Option<i64>,
    binding_mode: BindingMode,
    sms_msisdn: Option<&str>,
) -> Result<Vec<String>> {
    let mut list = Vec::new();

    if let Some(version) = version {
        list.push(format!("lwm2m={}", version));
    }
    if let Some(endpoint_name) = endpoint_name {
        list.push(format!("ep={}", endpoint_name));
    }
    if let Some(lifetime) = lifetime {
        if lifetime <= 0 {
            return Err(Error::InvalidQuery(format!(
                "lifetime must be positive, got {}",
                lifetime
            )));
        }
        list.push(format!("lt={}", lifetime));
    }
    if let Some(binding) = binding_mode.as_str() {
        list.push(format!("b={}", binding));
    }
    if let Some(sms_msisdn) = sms_msisdn {
        list.push(format!("sms={}", sms_msisdn));
    }

    Ok(list)
}
