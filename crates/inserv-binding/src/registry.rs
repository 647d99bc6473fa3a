//! Subscription registry.
//!
//! Tracks every change subscription held on behalf of a binding, keyed by an
//! opaque [`SubscriptionHandle`]. Each entry keeps the exact callback
//! instance handed to the gateway together with the gateway's token, so a
//! release removes precisely that callback.
//!
//! # Invariants
//!
//! - An attribute has at most one active subscription per binding.
//! - After [`SubscriptionRegistry::release`] returns, the entry is gone from
//!   the registry and the gateway has been asked to drop the callback.
//! - Releasing an unknown (or already released) handle is an error and
//!   affects no other subscription.

use inserv_core::{ChangeCallback, DeviceRef, Gateway, GatewaySubscription};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{BindingError, BindingResult};

/// Opaque token for one registered subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(u64);

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Entry {
    device: DeviceRef,
    attribute: String,
    callback: ChangeCallback,
    token: GatewaySubscription,
}

/// Registry of active change subscriptions for one gateway session.
pub struct SubscriptionRegistry {
    gateway: Arc<dyn Gateway>,
    entries: Mutex<HashMap<SubscriptionHandle, Entry>>,
    next_id: AtomicU64,
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("active", &self.len())
            .finish()
    }
}

impl SubscriptionRegistry {
    /// Create an empty registry for `gateway`.
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway,
            entries: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribe `callback` to changes of `device/attribute`.
    pub async fn register(
        &self,
        device: &DeviceRef,
        attribute: &str,
        callback: ChangeCallback,
    ) -> BindingResult<SubscriptionHandle> {
        let token = self
            .gateway
            .subscribe(device, attribute, Arc::clone(&callback))
            .await
            .map_err(|source| BindingError::Subscribe {
                attribute: attribute.to_string(),
                source,
            })?;

        let handle = SubscriptionHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().insert(
            handle,
            Entry {
                device: device.clone(),
                attribute: attribute.to_string(),
                callback,
                token,
            },
        );
        debug!(%device, attribute, %handle, "Subscription registered");
        Ok(handle)
    }

    /// Remove the subscription and detach its callback from the gateway.
    ///
    /// The entry is dropped from the registry before the gateway is called,
    /// so even if the gateway fails the handle is no longer active.
    pub async fn release(&self, handle: SubscriptionHandle) -> BindingResult<()> {
        let entry = self
            .entries
            .lock()
            .remove(&handle)
            .ok_or(BindingError::UnknownSubscription(handle))?;

        self.gateway
            .unsubscribe(entry.token)
            .await
            .map_err(|source| BindingError::Unsubscribe {
                attribute: entry.attribute.clone(),
                source,
            })?;
        debug!(device = %entry.device, attribute = %entry.attribute, %handle, "Subscription released");
        Ok(())
    }

    /// Release every active subscription. Never stops early.
    ///
    /// Returns the number released cleanly and the failures.
    pub async fn release_all(&self) -> (usize, Vec<BindingError>) {
        let mut handles: Vec<SubscriptionHandle> = self.entries.lock().keys().copied().collect();
        handles.sort();

        let mut released = 0;
        let mut failures = Vec::new();
        for handle in handles {
            match self.release(handle).await {
                Ok(()) => released += 1,
                Err(e) => {
                    warn!(%handle, error = %e, "Failed to release subscription");
                    failures.push(e);
                }
            }
        }
        (released, failures)
    }

    /// Whether `handle` is still registered.
    pub fn is_active(&self, handle: SubscriptionHandle) -> bool {
        self.entries.lock().contains_key(&handle)
    }

    /// The callback instance registered under `handle`.
    pub fn callback(&self, handle: SubscriptionHandle) -> Option<ChangeCallback> {
        self.entries
            .lock()
            .get(&handle)
            .map(|e| Arc::clone(&e.callback))
    }

    /// Number of active subscriptions.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
