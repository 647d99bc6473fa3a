//! In-memory gateway implementation.

use async_trait::async_trait;
use inserv_core::{
    ActionDescriptor, AttributeDescriptor, AttributeValue, ChangeCallback, DeviceRef, Gateway,
    GatewayError, GatewayResult, GatewaySubscription,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, trace};

// =============================================================================
// MockDevice - device definition
// =============================================================================

/// Definition of a simulated device: its attributes with initial values and
/// its actions, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct MockDevice {
    attributes: Vec<(AttributeDescriptor, AttributeValue)>,
    actions: Vec<ActionDescriptor>,
}

impl MockDevice {
    /// Device with no members.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute with its initial value.
    pub fn with_attribute(
        mut self,
        descriptor: AttributeDescriptor,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.attributes.push((descriptor, value.into()));
        self
    }

    /// Add an action.
    pub fn with_action(mut self, name: impl Into<String>) -> Self {
        self.actions.push(ActionDescriptor::new(name));
        self
    }
}

// =============================================================================
// Internal state
// =============================================================================

type MemberKey = (DeviceRef, String);

struct DeviceState {
    device: DeviceRef,
    attributes: Vec<(AttributeDescriptor, AttributeValue)>,
    actions: Vec<ActionDescriptor>,
}

impl DeviceState {
    fn attribute_mut(&mut self, name: &str) -> Option<&mut AttributeValue> {
        self.attributes
            .iter_mut()
            .find(|(d, _)| d.name == name)
            .map(|(_, v)| v)
    }

    fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|(d, _)| d.name == name)
    }
}

struct Subscriber {
    device: DeviceRef,
    attribute: String,
    callback: ChangeCallback,
}

#[derive(Default)]
struct Faults {
    disconnected: bool,
    rejected_writes: HashMap<MemberKey, String>,
    failing_reads: HashSet<MemberKey>,
    failing_actions: HashMap<MemberKey, String>,
    failing_listings: HashSet<DeviceRef>,
}

#[derive(Default)]
struct GatewayState {
    servers: Vec<String>,
    devices: Vec<DeviceState>,
    // Ordered by token so fan-out order matches subscription order
    subscribers: BTreeMap<GatewaySubscription, Subscriber>,
    writes: HashMap<MemberKey, Vec<AttributeValue>>,
    invocations: HashMap<MemberKey, u64>,
    faults: Faults,
}

impl GatewayState {
    fn device(&self, device: &DeviceRef) -> GatewayResult<&DeviceState> {
        self.devices
            .iter()
            .find(|d| &d.device == device)
            .ok_or_else(|| GatewayError::UnknownDevice(device.clone()))
    }

    fn device_mut(&mut self, device: &DeviceRef) -> GatewayResult<&mut DeviceState> {
        self.devices
            .iter_mut()
            .find(|d| &d.device == device)
            .ok_or_else(|| GatewayError::UnknownDevice(device.clone()))
    }

    fn ensure_connected(&self) -> GatewayResult<()> {
        if self.faults.disconnected {
            Err(GatewayError::Disconnected("mock gateway offline".into()))
        } else {
            Ok(())
        }
    }

    fn callbacks_for(&self, device: &DeviceRef, name: &str) -> Vec<ChangeCallback> {
        self.subscribers
            .values()
            .filter(|s| &s.device == device && s.attribute == name)
            .map(|s| s.callback.clone())
            .collect()
    }

    /// Store a new value and collect the callbacks to notify.
    fn store(
        &mut self,
        device: &DeviceRef,
        name: &str,
        value: AttributeValue,
    ) -> GatewayResult<Vec<ChangeCallback>> {
        let slot = self
            .device_mut(device)?
            .attribute_mut(name)
            .ok_or_else(|| GatewayError::UnknownAttribute {
                device: device.clone(),
                name: name.to_string(),
            })?;
        *slot = value;
        Ok(self.callbacks_for(device, name))
    }
}

fn key(device: &DeviceRef, name: &str) -> MemberKey {
    (device.clone(), name.to_string())
}

fn fan_out(callbacks: Vec<ChangeCallback>, value: &AttributeValue) -> usize {
    let count = callbacks.len();
    for callback in callbacks {
        callback(value.clone());
    }
    count
}

// =============================================================================
// MockGateway
// =============================================================================

/// Simulated instrument servers held in memory.
///
/// Behaves like a live gateway: writes are stored and echoed to every
/// subscriber of the attribute, and [`drive_attribute`](Self::drive_attribute)
/// emulates a change made by another client or by the device itself. Every
/// call is recorded for assertions, and faults can be injected per member.
///
/// Callbacks are invoked on the calling thread with no internal lock held.
pub struct MockGateway {
    state: Mutex<GatewayState>,
    next_token: AtomicU64,
    latency: Option<Duration>,
    echo_writes: bool,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    /// Empty gateway that echoes writes and answers instantly.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GatewayState::default()),
            next_token: AtomicU64::new(1),
            latency: None,
            echo_writes: true,
        }
    }

    /// Delay every remote call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Store writes without notifying subscribers.
    pub fn without_echo(mut self) -> Self {
        self.echo_writes = false;
        self
    }

    /// Register a server with no devices. Adding twice is a no-op.
    pub fn add_server(&self, name: impl Into<String>) {
        let name = name.into();
        let mut state = self.state.lock();
        if !state.servers.contains(&name) {
            state.servers.push(name);
        }
    }

    /// Add a device, creating its server if needed.
    pub fn add_device(&self, device: DeviceRef, definition: MockDevice) {
        self.add_server(device.server.clone());
        let mut state = self.state.lock();
        state.devices.retain(|d| d.device != device);
        state.devices.push(DeviceState {
            device,
            attributes: definition.attributes,
            actions: definition.actions,
        });
    }

    /// Change an attribute from the device side and notify subscribers.
    ///
    /// Returns the number of callbacks invoked.
    pub fn drive_attribute(
        &self,
        device: &DeviceRef,
        name: &str,
        value: impl Into<AttributeValue>,
    ) -> GatewayResult<usize> {
        let value = value.into();
        let callbacks = self.state.lock().store(device, name, value.clone())?;
        trace!(%device, attribute = name, %value, "Driving remote change");
        Ok(fan_out(callbacks, &value))
    }

    /// Current stored value of an attribute.
    pub fn attribute_value(&self, device: &DeviceRef, name: &str) -> Option<AttributeValue> {
        let state = self.state.lock();
        let dev = state.device(device).ok()?;
        dev.attributes
            .iter()
            .find(|(d, _)| d.name == name)
            .map(|(_, v)| v.clone())
    }

    /// Every value written to an attribute through `set_attribute`.
    pub fn writes(&self, device: &DeviceRef, name: &str) -> Vec<AttributeValue> {
        self.state
            .lock()
            .writes
            .get(&key(device, name))
            .cloned()
            .unwrap_or_default()
    }

    /// Number of `set_attribute` calls that reached an attribute.
    pub fn write_count(&self, device: &DeviceRef, name: &str) -> usize {
        self.writes(device, name).len()
    }

    /// Number of successful `invoke_action` calls for an action.
    pub fn invoke_count(&self, device: &DeviceRef, action: &str) -> u64 {
        self.state
            .lock()
            .invocations
            .get(&key(device, action))
            .copied()
            .unwrap_or(0)
    }

    /// Callbacks currently subscribed to an attribute.
    pub fn subscribers(&self, device: &DeviceRef, name: &str) -> Vec<ChangeCallback> {
        self.state.lock().callbacks_for(device, name)
    }

    /// Number of callbacks currently subscribed to an attribute.
    pub fn subscriber_count(&self, device: &DeviceRef, name: &str) -> usize {
        self.subscribers(device, name).len()
    }

    /// Number of live subscriptions across all attributes.
    pub fn total_subscriptions(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    // -------------------------------------------------------------------------
    // Fault injection
    // -------------------------------------------------------------------------

    /// Simulate connectivity loss (`false`) or recovery (`true`).
    pub fn set_connected(&self, connected: bool) {
        self.state.lock().faults.disconnected = !connected;
    }

    /// Reject every write to an attribute with `reason`.
    pub fn reject_writes(&self, device: &DeviceRef, name: &str, reason: impl Into<String>) {
        self.state
            .lock()
            .faults
            .rejected_writes
            .insert(key(device, name), reason.into());
    }

    /// Accept writes to an attribute again.
    pub fn accept_writes(&self, device: &DeviceRef, name: &str) {
        self.state
            .lock()
            .faults
            .rejected_writes
            .remove(&key(device, name));
    }

    /// Make reads of an attribute fail.
    pub fn fail_reads(&self, device: &DeviceRef, name: &str) {
        self.state.lock().faults.failing_reads.insert(key(device, name));
    }

    /// Make an action fail with `reason`.
    pub fn fail_action(&self, device: &DeviceRef, name: &str, reason: impl Into<String>) {
        self.state
            .lock()
            .faults
            .failing_actions
            .insert(key(device, name), reason.into());
    }

    /// Make attribute and action listing fail for a device.
    pub fn fail_listing(&self, device: &DeviceRef) {
        self.state.lock().faults.failing_listings.insert(device.clone());
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn list_servers(&self) -> GatewayResult<Vec<String>> {
        self.simulate_latency().await;
        let state = self.state.lock();
        state.ensure_connected()?;
        Ok(state.servers.clone())
    }

    async fn list_devices(&self, server: &str) -> GatewayResult<Vec<String>> {
        self.simulate_latency().await;
        let state = self.state.lock();
        state.ensure_connected()?;
        if !state.servers.iter().any(|s| s == server) {
            return Err(GatewayError::UnknownServer(server.to_string()));
        }
        Ok(state
            .devices
            .iter()
            .filter(|d| d.device.server == server)
            .map(|d| d.device.device.clone())
            .collect())
    }

    async fn list_attributes(&self, device: &DeviceRef) -> GatewayResult<Vec<AttributeDescriptor>> {
        self.simulate_latency().await;
        let state = self.state.lock();
        state.ensure_connected()?;
        if state.faults.failing_listings.contains(device) {
            return Err(GatewayError::Transport(format!(
                "descriptor listing failed for '{device}'"
            )));
        }
        Ok(state
            .device(device)?
            .attributes
            .iter()
            .map(|(d, _)| d.clone())
            .collect())
    }

    async fn list_actions(&self, device: &DeviceRef) -> GatewayResult<Vec<ActionDescriptor>> {
        self.simulate_latency().await;
        let state = self.state.lock();
        state.ensure_connected()?;
        if state.faults.failing_listings.contains(device) {
            return Err(GatewayError::Transport(format!(
                "action listing failed for '{device}'"
            )));
        }
        Ok(state.device(device)?.actions.clone())
    }

    async fn get_attribute(&self, device: &DeviceRef, name: &str) -> GatewayResult<AttributeValue> {
        self.simulate_latency().await;
        let state = self.state.lock();
        state.ensure_connected()?;
        if state.faults.failing_reads.contains(&key(device, name)) {
            return Err(GatewayError::Transport(format!(
                "read of '{device}/{name}' failed"
            )));
        }
        state
            .device(device)?
            .attributes
            .iter()
            .find(|(d, _)| d.name == name)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| GatewayError::UnknownAttribute {
                device: device.clone(),
                name: name.to_string(),
            })
    }

    async fn set_attribute(
        &self,
        device: &DeviceRef,
        name: &str,
        value: AttributeValue,
    ) -> GatewayResult<()> {
        self.simulate_latency().await;
        let callbacks = {
            let mut state = self.state.lock();
            state.ensure_connected()?;
            if let Some(reason) = state.faults.rejected_writes.get(&key(device, name)) {
                return Err(GatewayError::Rejected {
                    device: device.clone(),
                    name: name.to_string(),
                    reason: reason.clone(),
                });
            }
            let callbacks = state.store(device, name, value.clone())?;
            state
                .writes
                .entry(key(device, name))
                .or_default()
                .push(value.clone());
            callbacks
        };
        debug!(%device, attribute = name, %value, "Mock write");
        if self.echo_writes {
            fan_out(callbacks, &value);
        }
        Ok(())
    }

    async fn invoke_action(&self, device: &DeviceRef, name: &str) -> GatewayResult<()> {
        self.simulate_latency().await;
        let mut state = self.state.lock();
        state.ensure_connected()?;
        if !state.device(device)?.actions.iter().any(|a| a.name == name) {
            return Err(GatewayError::UnknownAction {
                device: device.clone(),
                name: name.to_string(),
            });
        }
        if let Some(reason) = state.faults.failing_actions.get(&key(device, name)) {
            return Err(GatewayError::Rejected {
                device: device.clone(),
                name: name.to_string(),
                reason: reason.clone(),
            });
        }
        *state.invocations.entry(key(device, name)).or_insert(0) += 1;
        debug!(%device, action = name, "Mock action invoked");
        Ok(())
    }

    async fn subscribe(
        &self,
        device: &DeviceRef,
        name: &str,
        callback: ChangeCallback,
    ) -> GatewayResult<GatewaySubscription> {
        self.simulate_latency().await;
        let mut state = self.state.lock();
        state.ensure_connected()?;
        if !state.device(device)?.has_attribute(name) {
            return Err(GatewayError::UnknownAttribute {
                device: device.clone(),
                name: name.to_string(),
            });
        }
        let token = GatewaySubscription(self.next_token.fetch_add(1, Ordering::Relaxed));
        state.subscribers.insert(
            token,
            Subscriber {
                device: device.clone(),
                attribute: name.to_string(),
                callback,
            },
        );
        Ok(token)
    }

    async fn unsubscribe(&self, subscription: GatewaySubscription) -> GatewayResult<()> {
        self.simulate_latency().await;
        let mut state = self.state.lock();
        state.ensure_connected()?;
        state
            .subscribers
            .remove(&subscription)
            .map(|_| ())
            .ok_or(GatewayError::UnknownSubscription(subscription))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inserv_core::NumericSpec;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn scope() -> DeviceRef {
        DeviceRef::new("lab", "scope")
    }

    fn gateway() -> MockGateway {
        let gw = MockGateway::new();
        gw.add_device(
            scope(),
            MockDevice::new()
                .with_attribute(
                    AttributeDescriptor::numeric("timebase", NumericSpec::float().with_unit("s")),
                    1e-3,
                )
                .with_action("autoscale"),
        );
        gw
    }

    #[tokio::test]
    async fn test_write_is_recorded_and_echoed() {
        let gw = gateway();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let callback: ChangeCallback = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        gw.subscribe(&scope(), "timebase", callback).await.unwrap();

        gw.set_attribute(&scope(), "timebase", 2e-3.into()).await.unwrap();

        assert_eq!(gw.write_count(&scope(), "timebase"), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(
            gw.attribute_value(&scope(), "timebase"),
            Some(AttributeValue::Float(2e-3))
        );
    }

    #[tokio::test]
    async fn test_without_echo_stays_silent() {
        let gw = gateway().without_echo();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        gw.subscribe(
            &scope(),
            "timebase",
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .await
        .unwrap();

        gw.set_attribute(&scope(), "timebase", 5e-3.into()).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_twice_fails() {
        let gw = gateway();
        let token = gw
            .subscribe(&scope(), "timebase", Arc::new(|_| {}))
            .await
            .unwrap();
        gw.unsubscribe(token).await.unwrap();
        assert_eq!(
            gw.unsubscribe(token).await,
            Err(GatewayError::UnknownSubscription(token))
        );
        assert_eq!(gw.total_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_disconnected_gateway_refuses_calls() {
        let gw = gateway();
        gw.set_connected(false);
        assert!(matches!(
            gw.get_attribute(&scope(), "timebase").await,
            Err(GatewayError::Disconnected(_))
        ));
        gw.set_connected(true);
        assert!(gw.get_attribute(&scope(), "timebase").await.is_ok());
    }

    #[tokio::test]
    async fn test_rejected_write_leaves_value() {
        let gw = gateway();
        gw.reject_writes(&scope(), "timebase", "locked");
        let err = gw
            .set_attribute(&scope(), "timebase", 9.0.into())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Rejected { .. }));
        assert_eq!(gw.write_count(&scope(), "timebase"), 0);
        assert_eq!(
            gw.attribute_value(&scope(), "timebase"),
            Some(AttributeValue::Float(1e-3))
        );
    }

    #[tokio::test]
    async fn test_unknown_action() {
        let gw = gateway();
        assert!(matches!(
            gw.invoke_action(&scope(), "self_destruct").await,
            Err(GatewayError::UnknownAction { .. })
        ));
        gw.invoke_action(&scope(), "autoscale").await.unwrap();
        assert_eq!(gw.invoke_count(&scope(), "autoscale"), 1);
    }

    #[tokio::test]
    async fn test_device_order_is_insertion_order() {
        let gw = MockGateway::new();
        for name in ["zeta", "alpha", "mid"] {
            gw.add_device(DeviceRef::new("lab", name), MockDevice::new());
        }
        assert_eq!(
            gw.list_devices("lab").await.unwrap(),
            vec!["zeta", "alpha", "mid"]
        );
    }
}
