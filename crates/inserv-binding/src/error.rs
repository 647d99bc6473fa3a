//! Error taxonomy of the binding engine.
//!
//! | Error | Raised by | Effect |
//! |-------|-----------|--------|
//! | `ValueNotInDomain`, `ValueKindMismatch` | control selection | that attribute is left out of the tree |
//! | `RemoteRead`, `Subscribe` | binding construction | that attribute is left out of the tree |
//! | `RemoteWrite` | local edit | reported on the control, display not reverted |
//! | `RemoteInvoke` | action trigger | reported on the trigger, trigger kept |
//! | `UnknownSubscription` | release | logged, teardown continues |
//! | `Discovery` | namespace walk | the affected server/device is left empty |
//! | `DuplicateParameter` | parameter form definition | the parameter is not added |

use inserv_core::{GatewayError, UnitError};
use thiserror::Error;

use crate::registry::SubscriptionHandle;

/// Convenience alias for results of binding operations.
pub type BindingResult<T> = std::result::Result<T, BindingError>;

/// Errors raised while building, driving or tearing down bindings.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BindingError {
    /// An enumerated attribute reported a value outside its allowed set.
    #[error("Attribute '{attribute}': value '{value}' is not one of its allowed values")]
    ValueNotInDomain {
        /// Attribute name
        attribute: String,
        /// String form of the offending value
        value: String,
    },

    /// The runtime value does not match the kind declared at discovery.
    #[error("Attribute '{attribute}': expected a {expected} value, got {found}")]
    ValueKindMismatch {
        /// Attribute name
        attribute: String,
        /// Declared kind
        expected: &'static str,
        /// Runtime value type
        found: &'static str,
    },

    /// A dimensioned value could not be expressed in the declared unit.
    #[error("Attribute '{attribute}': {source}")]
    Units {
        /// Attribute name
        attribute: String,
        /// Conversion failure
        #[source]
        source: UnitError,
    },

    /// The initial read failed.
    #[error("Failed to read '{attribute}': {source}")]
    RemoteRead {
        /// Attribute name
        attribute: String,
        /// Gateway failure
        #[source]
        source: GatewayError,
    },

    /// Writing a committed value failed. Recoverable.
    #[error("Failed to write '{attribute}': {source}")]
    RemoteWrite {
        /// Attribute name
        attribute: String,
        /// Gateway failure
        #[source]
        source: GatewayError,
    },

    /// Invoking an action failed. Recoverable.
    #[error("Action '{action}' failed: {source}")]
    RemoteInvoke {
        /// Action name
        action: String,
        /// Gateway failure
        #[source]
        source: GatewayError,
    },

    /// The gateway refused the change subscription.
    #[error("Failed to subscribe to '{attribute}': {source}")]
    Subscribe {
        /// Attribute name
        attribute: String,
        /// Gateway failure
        #[source]
        source: GatewayError,
    },

    /// The gateway failed to drop a released subscription.
    #[error("Failed to unsubscribe from '{attribute}': {source}")]
    Unsubscribe {
        /// Attribute name
        attribute: String,
        /// Gateway failure
        #[source]
        source: GatewayError,
    },

    /// The handle is not (or no longer) registered.
    #[error("Unknown subscription {0}")]
    UnknownSubscription(SubscriptionHandle),

    /// Discovery of a server or device failed.
    #[error("Discovery of '{scope}' failed: {source}")]
    Discovery {
        /// `server` or `server/device`
        scope: String,
        /// Gateway failure
        #[source]
        source: GatewayError,
    },

    /// The control does not accept edits.
    #[error("Attribute '{0}' is read-only")]
    ReadOnly(String),

    /// The edit does not fit the control.
    #[error("Invalid edit for '{attribute}': {reason}")]
    InvalidEdit {
        /// Attribute name
        attribute: String,
        /// What was wrong with it
        reason: String,
    },

    /// The binding has been torn down.
    #[error("Binding for '{0}' is unbound")]
    Unbound(String),

    /// A parameter form already defines this name.
    #[error("Parameter '{0}' is already defined")]
    DuplicateParameter(String),

    /// No control exists at this path.
    #[error("No control at '{0}'")]
    UnknownPath(String),
}

impl BindingError {
    /// Whether the failure leaves the binding usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BindingError::RemoteWrite { .. }
                | BindingError::RemoteInvoke { .. }
                | BindingError::InvalidEdit { .. }
                | BindingError::ReadOnly(_)
        )
    }
}
