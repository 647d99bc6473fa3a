//! `inserv-core`
//!
//! Core types shared by every layer of the instrument manager: the typed
//! description of remote attributes and actions, the runtime values that cross
//! the gateway, unit handling for dimensioned quantities, and the [`Gateway`]
//! contract through which the binding engine reaches the instrument servers.
//!
//! # Crate Layout
//!
//! - [`descriptor`] - attribute/action descriptors, device references, the
//!   discovered [`Namespace`](descriptor::Namespace)
//! - [`value`] - [`AttributeValue`] and [`Quantity`]
//! - [`units`] - SI-prefix unit conversion
//! - [`gateway`] - the collaborator trait and its subscription types
//! - [`error`] - [`GatewayError`] and [`UnitError`]
//!
//! Nothing in this crate performs I/O. Transports implement [`Gateway`];
//! `inserv-binding` consumes it.

pub mod descriptor;
pub mod error;
pub mod gateway;
pub mod units;
pub mod value;

pub use descriptor::{
    ActionDescriptor, ActionPolicy, AttributeDescriptor, DeviceEntry, DeviceRef, EnumOption,
    Namespace, NumericSpec, ServerEntry, ValueKind,
};
pub use error::{GatewayError, GatewayResult, UnitError};
pub use gateway::{ChangeCallback, Gateway, GatewaySubscription};
pub use value::{AttributeValue, Quantity};
