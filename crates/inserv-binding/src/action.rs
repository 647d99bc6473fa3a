//! Action triggers.
//!
//! One [`ActionTrigger`] per exposed zero-argument remote operation. Each
//! activation invokes the action exactly once; failures are reported on the
//! trigger, which stays usable.

use inserv_core::{DeviceRef, Gateway};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{BindingError, BindingResult};

/// A button bound to one remote action.
pub struct ActionTrigger {
    gateway: Arc<dyn Gateway>,
    device: DeviceRef,
    name: String,
    activations: u64,
    last_error: Option<String>,
}

impl fmt::Debug for ActionTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionTrigger")
            .field("device", &self.device)
            .field("name", &self.name)
            .field("activations", &self.activations)
            .finish()
    }
}

impl ActionTrigger {
    /// Trigger for `device/name`.
    pub fn new(gateway: Arc<dyn Gateway>, device: DeviceRef, name: impl Into<String>) -> Self {
        Self {
            gateway,
            device,
            name: name.into(),
            activations: 0,
            last_error: None,
        }
    }

    /// Action name, used as the button label.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning device.
    pub fn device(&self) -> &DeviceRef {
        &self.device
    }

    /// Number of activations so far, failed ones included.
    pub fn activations(&self) -> u64 {
        self.activations
    }

    /// Error from the most recent activation, if it failed.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Invoke the action once.
    pub async fn activate(&mut self) -> BindingResult<()> {
        self.activations += 1;
        info!(device = %self.device, action = %self.name, "Invoking action");
        match self.gateway.invoke_action(&self.device, &self.name).await {
            Ok(()) => {
                self.last_error = None;
                Ok(())
            }
            Err(source) => {
                let err = BindingError::RemoteInvoke {
                    action: self.name.clone(),
                    source,
                };
                warn!(device = %self.device, error = %err, "Action failed");
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inserv_mock::{MockDevice, MockGateway};

    fn shutter() -> DeviceRef {
        DeviceRef::new("optics", "shutter")
    }

    #[tokio::test]
    async fn test_each_activation_invokes_once() {
        let gw = Arc::new(MockGateway::new());
        gw.add_device(shutter(), MockDevice::new().with_action("open"));
        let mut trigger = ActionTrigger::new(gw.clone(), shutter(), "open");

        trigger.activate().await.unwrap();
        trigger.activate().await.unwrap();
        assert_eq!(gw.invoke_count(&shutter(), "open"), 2);
        assert_eq!(trigger.activations(), 2);
    }

    #[tokio::test]
    async fn test_failure_is_reported_and_trigger_kept() {
        let gw = Arc::new(MockGateway::new());
        gw.add_device(shutter(), MockDevice::new().with_action("open"));
        gw.fail_action(&shutter(), "open", "motor stalled");
        let mut trigger = ActionTrigger::new(gw.clone(), shutter(), "open");

        let err = trigger.activate().await.unwrap_err();
        assert!(matches!(err, BindingError::RemoteInvoke { .. }));
        assert!(trigger.last_error().unwrap().contains("motor stalled"));
        assert!(err.is_recoverable());
    }
}
