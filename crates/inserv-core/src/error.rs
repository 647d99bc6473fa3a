//! Error types for the gateway boundary and unit handling.
//!
//! [`GatewayError`] is what a transport reports back to the binding engine.
//! The engine never inspects transport internals; it only distinguishes the
//! categories below to decide whether an operation is worth surfacing to the
//! user as a recoverable failure (rejected value, lost connection) or whether
//! it indicates a misuse of the contract (unknown subscription).

use thiserror::Error;

use crate::descriptor::DeviceRef;
use crate::gateway::GatewaySubscription;

/// Convenience alias for results returned by [`Gateway`](crate::Gateway) methods.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Failure reported by the gateway collaborator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// The connection to the instrument server was lost or never established.
    ///
    /// **Error Type**: Transient - the next refresh cycle may succeed.
    #[error("Instrument server unreachable: {0}")]
    Disconnected(String),

    /// The device refused the value or the call.
    ///
    /// **Error Type**: Recoverable - reported on the originating control.
    #[error("Device '{device}' rejected '{name}': {reason}")]
    Rejected {
        /// Device that refused the request
        device: DeviceRef,
        /// Attribute or action name
        name: String,
        /// Reason reported by the device
        reason: String,
    },

    /// No server with this name is known to the gateway.
    #[error("Unknown instrument server '{0}'")]
    UnknownServer(String),

    /// No device with this reference is known to the gateway.
    #[error("Unknown device '{0}'")]
    UnknownDevice(DeviceRef),

    /// The device has no attribute with this name.
    #[error("Device '{device}' has no attribute '{name}'")]
    UnknownAttribute {
        /// Owning device
        device: DeviceRef,
        /// Requested attribute
        name: String,
    },

    /// The device has no action with this name.
    #[error("Device '{device}' has no action '{name}'")]
    UnknownAction {
        /// Owning device
        device: DeviceRef,
        /// Requested action
        name: String,
    },

    /// The subscription token does not identify a live change subscription.
    #[error("Unknown change subscription {0:?}")]
    UnknownSubscription(GatewaySubscription),

    /// Any other transport-level failure.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl GatewayError {
    /// Whether retrying the same call later could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Disconnected(_) | GatewayError::Transport(_))
    }
}

/// Failure converting a quantity between units.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitError {
    /// The two units do not share a base unit.
    #[error("Cannot convert '{from}' to '{to}'")]
    Incompatible {
        /// Source unit
        from: String,
        /// Requested unit
        to: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(GatewayError::Disconnected("link down".into()).is_transient());
        assert!(!GatewayError::UnknownServer("lab".into()).is_transient());
    }

    #[test]
    fn test_rejected_message_names_device() {
        let err = GatewayError::Rejected {
            device: DeviceRef::new("lab", "sig_gen"),
            name: "frequency".into(),
            reason: "out of range".into(),
        };
        assert_eq!(
            err.to_string(),
            "Device 'lab/sig_gen' rejected 'frequency': out of range"
        );
    }
}
