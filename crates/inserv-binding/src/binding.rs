//! Attribute bindings.
//!
//! A [`BindingController`] pairs one remote attribute with one local
//! [`Control`] and keeps them in agreement:
//!
//! - **Construction** reads the attribute exactly once, picks the control
//!   and subscribes to remote changes.
//! - **Local edits** ([`BindingController::commit`]) update the display and
//!   issue exactly one write. The binding never writes for any other reason.
//! - **Remote changes** ([`BindingController::apply_remote`]) update the
//!   display and the cached value. They never write.
//!
//! An echo of the binding's own write therefore lands as a display refresh
//! with the value already shown, and the cycle stops there.
//!
//! ```text
//! bind() ──ok──> Bound ──unbind──> Unbound
//!    │
//!    └─ read/selection/subscribe failed: no binding, error returned
//! ```

use inserv_core::{AttributeDescriptor, AttributeValue, DeviceRef, Gateway};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::control::{resolve_edit, select_control, Control, ControlEdit, ControlOptions};
use crate::dispatch::{BindingId, NotificationSender};
use crate::error::{BindingError, BindingResult};
use crate::registry::{SubscriptionHandle, SubscriptionRegistry};

/// Lifecycle state of a binding.
///
/// Construction is a single call to [`BindingController::bind`]; a binding
/// value only exists once it is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    /// Live: edits write, notifications refresh
    Bound,
    /// Torn down: no further writes or refreshes
    Unbound,
}

/// Read/write handle onto one remote attribute.
#[derive(Clone)]
pub struct AttributeAccessor {
    gateway: Arc<dyn Gateway>,
    device: DeviceRef,
    name: String,
}

impl std::fmt::Debug for AttributeAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AttributeAccessor({}/{})", self.device, self.name)
    }
}

impl AttributeAccessor {
    /// Accessor for `device/name` through `gateway`.
    pub fn new(gateway: Arc<dyn Gateway>, device: DeviceRef, name: impl Into<String>) -> Self {
        Self {
            gateway,
            device,
            name: name.into(),
        }
    }

    /// Owning device.
    pub fn device(&self) -> &DeviceRef {
        &self.device
    }

    /// Attribute name.
    pub fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self) -> BindingResult<AttributeValue> {
        self.gateway
            .get_attribute(&self.device, &self.name)
            .await
            .map_err(|source| BindingError::RemoteRead {
                attribute: self.name.clone(),
                source,
            })
    }

    async fn write(&self, value: AttributeValue) -> BindingResult<()> {
        self.gateway
            .set_attribute(&self.device, &self.name, value)
            .await
            .map_err(|source| BindingError::RemoteWrite {
                attribute: self.name.clone(),
                source,
            })
    }
}

/// Binds one remote attribute to one local control.
#[derive(Debug)]
pub struct BindingController {
    id: BindingId,
    descriptor: Arc<AttributeDescriptor>,
    accessor: AttributeAccessor,
    control: Control,
    current_value: AttributeValue,
    state: BindingState,
    subscription: Option<SubscriptionHandle>,
    live: Arc<AtomicBool>,
    registry: Arc<SubscriptionRegistry>,
}

impl BindingController {
    /// Read the attribute once, build its control and subscribe to changes.
    ///
    /// # Errors
    ///
    /// - [`BindingError::RemoteRead`] if the initial read fails
    /// - selection errors if the value does not fit the descriptor
    /// - [`BindingError::Subscribe`] if the gateway refuses the subscription
    ///
    /// On error nothing stays registered.
    #[instrument(skip_all, fields(device = %accessor.device(), attribute = %descriptor.name))]
    pub async fn bind(
        id: BindingId,
        descriptor: Arc<AttributeDescriptor>,
        accessor: AttributeAccessor,
        registry: Arc<SubscriptionRegistry>,
        notifications: &NotificationSender,
        options: &ControlOptions,
    ) -> BindingResult<Self> {
        let value = accessor.read().await?;
        let spec = select_control(&descriptor, &value, options)?;
        let control = Control::new(spec, descriptor.read_once);

        let live = Arc::new(AtomicBool::new(true));
        let callback = notifications.forwarding_callback(id, Arc::clone(&live));
        let handle = registry
            .register(accessor.device(), accessor.name(), callback)
            .await?;
        debug!(%id, control = ?control.kind(), "Attribute bound");

        Ok(Self {
            id,
            descriptor,
            accessor,
            control,
            current_value: value,
            state: BindingState::Bound,
            subscription: Some(handle),
            live,
            registry,
        })
    }

    /// Identity within the tree.
    pub fn id(&self) -> BindingId {
        self.id
    }

    /// Attribute name.
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Owning device.
    pub fn device(&self) -> &DeviceRef {
        self.accessor.device()
    }

    /// Discovery-time description of the attribute.
    pub fn descriptor(&self) -> &AttributeDescriptor {
        &self.descriptor
    }

    /// The displayed control.
    pub fn control(&self) -> &Control {
        &self.control
    }

    /// Last value known from the remote side.
    pub fn current_value(&self) -> &AttributeValue {
        &self.current_value
    }

    /// Lifecycle state.
    pub fn state(&self) -> BindingState {
        self.state
    }

    /// Handle of the change subscription, once bound.
    pub fn subscription(&self) -> Option<SubscriptionHandle> {
        self.subscription
    }

    /// Apply a user edit: update the display, then write exactly once.
    ///
    /// A failed write leaves the new value on display and flags the control.
    /// `current_value` only moves when the remote side reports the change.
    pub async fn commit(&mut self, edit: ControlEdit) -> BindingResult<()> {
        if self.state != BindingState::Bound {
            return Err(BindingError::Unbound(self.descriptor.name.clone()));
        }
        if self.control.is_read_only() {
            return Err(BindingError::ReadOnly(self.descriptor.name.clone()));
        }

        let (shown, remote) = resolve_edit(&self.descriptor, self.control.spec(), edit)?;
        self.control.show(shown);

        debug!(device = %self.accessor.device(), attribute = %self.descriptor.name, value = %remote, "Writing local edit");
        match self.accessor.write(remote).await {
            Ok(()) => {
                self.control.clear_error();
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Remote write failed");
                self.control.flag_error(e.to_string());
                Err(e)
            }
        }
    }

    /// Show a value reported by the remote side. Never writes.
    ///
    /// Returns `Ok(false)` if the binding is no longer bound and the value
    /// was ignored.
    pub fn apply_remote(&mut self, value: AttributeValue) -> BindingResult<bool> {
        if self.state != BindingState::Bound {
            return Ok(false);
        }
        match self.control.refresh(&self.descriptor, &value) {
            Ok(()) => {
                self.control.clear_error();
                self.current_value = value;
                Ok(true)
            }
            Err(e) => {
                warn!(attribute = %self.descriptor.name, error = %e, "Remote value not displayable");
                self.control.flag_error(e.to_string());
                Err(e)
            }
        }
    }

    /// Stop forwarding changes and release the subscription.
    ///
    /// Calling this twice hands the same handle to the registry again, which
    /// reports [`BindingError::UnknownSubscription`].
    pub async fn unbind(&mut self) -> BindingResult<()> {
        self.live.store(false, Ordering::Release);
        self.state = BindingState::Unbound;
        match self.subscription {
            Some(handle) => self.registry.release(handle).await,
            None => Err(BindingError::Unbound(self.descriptor.name.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::NotificationQueue;
    use inserv_core::{GatewayError, NumericSpec, Quantity};
    use inserv_mock::{MockDevice, MockGateway};

    fn psu() -> DeviceRef {
        DeviceRef::new("bench", "psu")
    }

    fn gateway() -> Arc<MockGateway> {
        let gw = Arc::new(MockGateway::new());
        gw.add_device(
            psu(),
            MockDevice::new()
                .with_attribute(
                    AttributeDescriptor::numeric(
                        "voltage",
                        NumericSpec::float().with_unit("V").with_bounds(0.0, 30.0),
                    ),
                    Quantity::new(5.0, "V"),
                )
                .with_attribute(AttributeDescriptor::enumerated("range", ["low", "high"]), "low")
                .with_attribute(AttributeDescriptor::text("serial").read_once(), "PSU-1"),
        );
        gw
    }

    async fn bind(
        gw: &Arc<MockGateway>,
        queue: &NotificationQueue,
        descriptor: AttributeDescriptor,
    ) -> BindingResult<BindingController> {
        let dyn_gw: Arc<dyn Gateway> = gw.clone();
        let registry = Arc::new(SubscriptionRegistry::new(dyn_gw.clone()));
        let name = descriptor.name.clone();
        BindingController::bind(
            BindingId(1),
            Arc::new(descriptor),
            AttributeAccessor::new(dyn_gw, psu(), name),
            registry,
            &queue.sender(),
            &ControlOptions::default(),
        )
        .await
    }

    fn voltage() -> AttributeDescriptor {
        AttributeDescriptor::numeric(
            "voltage",
            NumericSpec::float().with_unit("V").with_bounds(0.0, 30.0),
        )
    }

    #[tokio::test]
    async fn test_bind_reads_and_subscribes() {
        let gw = gateway();
        let queue = NotificationQueue::new();
        let binding = bind(&gw, &queue, voltage()).await.unwrap();

        assert_eq!(binding.state(), BindingState::Bound);
        assert_eq!(binding.control().stepper_value(), Some(5.0));
        assert_eq!(gw.subscriber_count(&psu(), "voltage"), 1);
        assert_eq!(gw.write_count(&psu(), "voltage"), 0);
    }

    #[tokio::test]
    async fn test_bind_fails_on_read_error() {
        let gw = gateway();
        gw.fail_reads(&psu(), "voltage");
        let queue = NotificationQueue::new();
        let err = bind(&gw, &queue, voltage()).await.unwrap_err();
        assert!(matches!(err, BindingError::RemoteRead { .. }));
        assert_eq!(gw.subscriber_count(&psu(), "voltage"), 0);
    }

    #[tokio::test]
    async fn test_commit_writes_once_and_keeps_current_value() {
        let gw = gateway();
        let queue = NotificationQueue::new();
        let mut binding = bind(&gw, &queue, voltage()).await.unwrap();

        binding.commit(ControlEdit::Number(12.0)).await.unwrap();
        assert_eq!(gw.writes(&psu(), "voltage"), vec![AttributeValue::Quantity(Quantity::new(12.0, "V"))]);
        assert_eq!(binding.control().stepper_value(), Some(12.0));
        assert_eq!(binding.current_value(), &AttributeValue::from(Quantity::new(5.0, "V")));
    }

    #[tokio::test]
    async fn test_failed_write_flags_control_without_revert() {
        let gw = gateway();
        gw.reject_writes(&psu(), "voltage", "interlock open");
        let queue = NotificationQueue::new();
        let mut binding = bind(&gw, &queue, voltage()).await.unwrap();

        let err = binding.commit(ControlEdit::Number(20.0)).await.unwrap_err();
        assert!(matches!(
            err,
            BindingError::RemoteWrite {
                source: GatewayError::Rejected { .. },
                ..
            }
        ));
        assert_eq!(binding.control().stepper_value(), Some(20.0));
        assert!(binding.control().error().unwrap().contains("interlock open"));
        assert_eq!(binding.state(), BindingState::Bound);

        gw.accept_writes(&psu(), "voltage");
        binding.commit(ControlEdit::Number(21.0)).await.unwrap();
        assert!(binding.control().error().is_none());
    }

    #[tokio::test]
    async fn test_apply_remote_never_writes() {
        let gw = gateway();
        let queue = NotificationQueue::new();
        let mut binding = bind(
            &gw,
            &queue,
            AttributeDescriptor::enumerated("range", ["low", "high"]),
        )
        .await
        .unwrap();

        assert!(binding.apply_remote("high".into()).unwrap());
        assert_eq!(binding.control().selected_index(), Some(1));
        assert_eq!(binding.current_value(), &AttributeValue::from("high"));
        assert_eq!(gw.write_count(&psu(), "range"), 0);
    }

    #[tokio::test]
    async fn test_apply_remote_outside_domain_flags_control() {
        let gw = gateway();
        let queue = NotificationQueue::new();
        let mut binding = bind(
            &gw,
            &queue,
            AttributeDescriptor::enumerated("range", ["low", "high"]),
        )
        .await
        .unwrap();

        let err = binding.apply_remote("medium".into()).unwrap_err();
        assert!(matches!(err, BindingError::ValueNotInDomain { .. }));
        assert_eq!(binding.control().selected_index(), Some(0));
        assert!(binding.control().error().is_some());
    }

    #[tokio::test]
    async fn test_read_once_rejects_edits() {
        let gw = gateway();
        let queue = NotificationQueue::new();
        let mut binding = bind(&gw, &queue, AttributeDescriptor::text("serial").read_once())
            .await
            .unwrap();

        assert_eq!(
            binding.commit(ControlEdit::Text("hacked".into())).await,
            Err(BindingError::ReadOnly("serial".into()))
        );
        assert_eq!(gw.write_count(&psu(), "serial"), 0);
    }

    #[tokio::test]
    async fn test_unbind_twice_reports_unknown_subscription() {
        let gw = gateway();
        let queue = NotificationQueue::new();
        let mut binding = bind(&gw, &queue, voltage()).await.unwrap();
        let handle = binding.subscription().unwrap();

        binding.unbind().await.unwrap();
        assert_eq!(binding.state(), BindingState::Unbound);
        assert_eq!(gw.subscriber_count(&psu(), "voltage"), 0);
        assert_eq!(
            binding.unbind().await,
            Err(BindingError::UnknownSubscription(handle))
        );
    }

    #[tokio::test]
    async fn test_unbound_ignores_remote_and_refuses_edits() {
        let gw = gateway();
        let queue = NotificationQueue::new();
        let mut binding = bind(&gw, &queue, voltage()).await.unwrap();
        binding.unbind().await.unwrap();

        assert!(!binding.apply_remote(Quantity::new(9.0, "V").into()).unwrap());
        assert_eq!(binding.control().stepper_value(), Some(5.0));
        assert!(matches!(
            binding.commit(ControlEdit::Number(1.0)).await,
            Err(BindingError::Unbound(_))
        ));
    }
}
