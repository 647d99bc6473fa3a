//! The gateway collaborator contract.
//!
//! A [`Gateway`] is the narrow interface through which the binding engine
//! reaches remote instrument servers. Transport, reconnection and timeout
//! policy all live behind it.
//!
//! # Change notifications
//!
//! [`Gateway::subscribe`] receives a [`ChangeCallback`] and returns a
//! [`GatewaySubscription`] token. The gateway may invoke the callback from
//! any thread, at any time, until [`Gateway::unsubscribe`] is called with
//! that same token. Unsubscribing removes exactly the callback that was
//! registered under the token.

use async_trait::async_trait;
use std::sync::Arc;

use crate::descriptor::{ActionDescriptor, AttributeDescriptor, DeviceRef};
use crate::error::GatewayResult;
use crate::value::AttributeValue;

/// Callback invoked with the new value whenever a remote attribute changes.
///
/// The `Arc` is the callback's identity: the gateway must keep the exact
/// instance it was given and drop it on unsubscribe.
pub type ChangeCallback = Arc<dyn Fn(AttributeValue) + Send + Sync>;

/// Token identifying one change subscription held by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GatewaySubscription(pub u64);

/// Access to the instrument servers of one connection session.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Names of the connected instrument servers, in server order.
    async fn list_servers(&self) -> GatewayResult<Vec<String>>;

    /// Names of the devices hosted by `server`, in insertion order.
    async fn list_devices(&self, server: &str) -> GatewayResult<Vec<String>>;

    /// Descriptors of the attributes of `device`, in insertion order.
    async fn list_attributes(&self, device: &DeviceRef) -> GatewayResult<Vec<AttributeDescriptor>>;

    /// Every action of `device`, including lifecycle hooks.
    async fn list_actions(&self, device: &DeviceRef) -> GatewayResult<Vec<ActionDescriptor>>;

    /// Read the current value of an attribute.
    async fn get_attribute(&self, device: &DeviceRef, name: &str) -> GatewayResult<AttributeValue>;

    /// Write an attribute. Fails on rejection or connectivity loss.
    async fn set_attribute(
        &self,
        device: &DeviceRef,
        name: &str,
        value: AttributeValue,
    ) -> GatewayResult<()>;

    /// Call a zero-argument action.
    async fn invoke_action(&self, device: &DeviceRef, name: &str) -> GatewayResult<()>;

    /// Register `callback` for changes of one attribute.
    async fn subscribe(
        &self,
        device: &DeviceRef,
        name: &str,
        callback: ChangeCallback,
    ) -> GatewayResult<GatewaySubscription>;

    /// Remove the callback registered under `subscription`.
    async fn unsubscribe(&self, subscription: GatewaySubscription) -> GatewayResult<()>;
}
