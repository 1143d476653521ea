//! Binding mode codec
//!
//! Bidirectional mapping between the LwM2M binding mode enumeration and
//! its short string form carried in the registration `b=` query argument.

/// Transports over which a server expects to reach the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingMode {
    /// UDP
    U,
    /// UDP with queue mode
    UQ,
    /// SMS
    S,
    /// SMS with queue mode
    SQ,
    /// UDP and SMS
    US,
    /// UDP with queue mode and SMS
    UQS,
    /// No binding; not representable on the wire
    None,
}

const BINDING_MODE_AS_STR: [(BindingMode, &str); 6] = [
    (BindingMode::U, "U"),
    (BindingMode::UQ, "UQ"),
    (BindingMode::S, "S"),
    (BindingMode::SQ, "SQ"),
    (BindingMode::US, "US"),
    (BindingMode::UQS, "UQS"),
];

impl BindingMode {
    /// Short string form of the binding mode, `None` for the sentinel
    pub fn as_str(self) -> Option<&'static str> {
        BINDING_MODE_AS_STR
            .iter()
            .find(|(mode, _)| *mode == self)
            .map(|(_, s)| *s)
    }

    /// Parse a short string form; unknown input maps to the sentinel with
    /// a warning.
    pub fn from_str(s: &str) -> BindingMode {
        match BINDING_MODE_AS_STR.iter().find(|(_, repr)| *repr == s) {
            Some((mode, _)) => *mode,
            None => {
                log::warn!("unsupported binding mode string: {}", s);
                BindingMode::None
            }
        }
    }
}
