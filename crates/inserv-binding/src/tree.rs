//! Control tree assembly, notification dispatch and teardown.
//!
//! [`assemble`] walks the gateway's namespace (servers, then devices, then
//! attributes and actions, always in the order the gateway reports them) and
//! builds one [`BindingController`] per attribute and one [`ActionTrigger`]
//! per exposed action. The result is a [`ControlTree`] owned by the thread
//! that built it.
//!
//! # Failure isolation
//!
//! A failure to describe a device, read an attribute or subscribe to it is
//! recorded in the tree's [`AssemblyReport`] and only that part is left out.
//! Only an unreachable server list aborts assembly.
//!
//! # Threading
//!
//! `ControlTree` is `!Send`. Change callbacks run on gateway threads and only
//! enqueue; [`ControlTree::process_notifications`] and
//! [`ControlTree::next_notification`] apply queued changes on the owning
//! thread.

use inserv_core::{
    ActionDescriptor, ActionPolicy, AttributeDescriptor, DeviceEntry, DeviceRef, Gateway,
    GatewayResult, Namespace, ServerEntry,
};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::action::ActionTrigger;
use crate::binding::{AttributeAccessor, BindingController, BindingState};
use crate::control::{ControlEdit, ControlOptions};
use crate::dispatch::{BindingId, NotificationQueue, RemoteChange};
use crate::error::{BindingError, BindingResult};
use crate::registry::SubscriptionRegistry;

// =============================================================================
// Options and reports
// =============================================================================

/// Everything assembly needs besides the gateway.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssemblyOptions {
    /// Stepper precision
    pub controls: ControlOptions,
    /// Which actions become triggers
    pub actions: ActionPolicy,
}

/// One part of the namespace left out of the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyFailure {
    /// `server`, `server/device` or `server/device/attribute`
    pub scope: String,
    /// What went wrong
    pub error: BindingError,
}

/// Outcome of assembly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssemblyReport {
    /// Attributes bound
    pub bound: usize,
    /// Triggers created
    pub triggers: usize,
    /// Parts left out
    pub failures: Vec<AssemblyFailure>,
}

/// Outcome of [`ControlTree::teardown`].
#[derive(Debug, Default, PartialEq)]
pub struct TeardownReport {
    /// Subscriptions released cleanly
    pub released: usize,
    /// Releases that failed; teardown continued past each
    pub failures: Vec<BindingError>,
}

// =============================================================================
// Paths
// =============================================================================

/// Address of an attribute or action: `server/device/member`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ControlPath {
    /// Instrument server
    pub server: String,
    /// Device
    pub device: String,
    /// Attribute or action name
    pub member: String,
}

impl FromStr for ControlPath {
    type Err = BindingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        match parts.as_slice() {
            [server, device, member]
                if !server.is_empty() && !device.is_empty() && !member.is_empty() =>
            {
                Ok(ControlPath {
                    server: server.to_string(),
                    device: device.to_string(),
                    member: member.to_string(),
                })
            }
            _ => Err(BindingError::UnknownPath(s.to_string())),
        }
    }
}

impl fmt::Display for ControlPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.server, self.device, self.member)
    }
}

// =============================================================================
// Discovery
// =============================================================================

/// Namespace walk result: what was found plus what could not be described.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Discovery {
    /// Servers, devices and members in gateway order
    pub namespace: Namespace,
    /// Servers or devices that could not be listed
    pub failures: Vec<AssemblyFailure>,
}

async fn describe(
    gateway: &dyn Gateway,
    device: &DeviceRef,
) -> GatewayResult<(Vec<AttributeDescriptor>, Vec<ActionDescriptor>)> {
    let attributes = gateway.list_attributes(device).await?;
    let actions = gateway.list_actions(device).await?;
    Ok((attributes, actions))
}

/// Walk the gateway's namespace without reading any value.
///
/// Actions hidden by `policy` are filtered out here.
pub async fn discover(gateway: &dyn Gateway, policy: &ActionPolicy) -> BindingResult<Discovery> {
    let server_names = gateway
        .list_servers()
        .await
        .map_err(|source| BindingError::Discovery {
            scope: "servers".to_string(),
            source,
        })?;

    let mut discovery = Discovery::default();
    for server in server_names {
        let device_names = match gateway.list_devices(&server).await {
            Ok(names) => names,
            Err(source) => {
                warn!(%server, error = %source, "Failed to list devices");
                discovery.failures.push(AssemblyFailure {
                    scope: server.clone(),
                    error: BindingError::Discovery {
                        scope: server.clone(),
                        source,
                    },
                });
                discovery.namespace.servers.push(ServerEntry {
                    name: server,
                    devices: Vec::new(),
                });
                continue;
            }
        };

        let mut devices = Vec::with_capacity(device_names.len());
        for name in device_names {
            let device = DeviceRef::new(&server, name);
            let (attributes, actions) = match describe(gateway, &device).await {
                Ok(found) => found,
                Err(source) => {
                    warn!(%device, error = %source, "Failed to describe device");
                    discovery.failures.push(AssemblyFailure {
                        scope: device.to_string(),
                        error: BindingError::Discovery {
                            scope: device.to_string(),
                            source,
                        },
                    });
                    (Vec::new(), Vec::new())
                }
            };
            let actions = actions
                .into_iter()
                .filter(|a| policy.is_exposed(&a.name))
                .collect();
            devices.push(DeviceEntry {
                device,
                attributes,
                actions,
            });
        }
        discovery.namespace.servers.push(ServerEntry {
            name: server,
            devices,
        });
    }
    Ok(discovery)
}

// =============================================================================
// Tree nodes
// =============================================================================

/// Controls of one device.
#[derive(Debug)]
pub struct DeviceNode {
    device: DeviceRef,
    attributes: Vec<BindingController>,
    actions: Vec<ActionTrigger>,
}

impl DeviceNode {
    /// The device.
    pub fn device(&self) -> &DeviceRef {
        &self.device
    }

    /// Bound attributes in gateway order.
    pub fn attributes(&self) -> &[BindingController] {
        &self.attributes
    }

    /// Triggers in gateway order.
    pub fn actions(&self) -> &[ActionTrigger] {
        &self.actions
    }
}

/// Devices of one instrument server.
#[derive(Debug)]
pub struct ServerNode {
    name: String,
    devices: Vec<DeviceNode>,
}

impl ServerNode {
    /// Server name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Devices in gateway order.
    pub fn devices(&self) -> &[DeviceNode] {
        &self.devices
    }
}

// =============================================================================
// Assembly
// =============================================================================

/// Discover the namespace and bind every attribute and exposed action.
///
/// # Errors
///
/// Only [`BindingError::Discovery`] when the server list itself cannot be
/// fetched. Everything narrower is recorded in [`ControlTree::report`].
#[instrument(skip_all)]
pub async fn assemble(
    gateway: Arc<dyn Gateway>,
    options: &AssemblyOptions,
) -> BindingResult<ControlTree> {
    let Discovery {
        namespace,
        mut failures,
    } = discover(gateway.as_ref(), &options.actions).await?;

    let registry = Arc::new(SubscriptionRegistry::new(Arc::clone(&gateway)));
    let queue = NotificationQueue::new();
    let sender = queue.sender();

    let mut index = HashMap::new();
    let mut next_id = 0u64;
    let mut servers = Vec::with_capacity(namespace.servers.len());
    let mut triggers = 0;

    for (s, server) in namespace.servers.into_iter().enumerate() {
        let mut devices = Vec::with_capacity(server.devices.len());
        for (d, entry) in server.devices.into_iter().enumerate() {
            let mut attributes = Vec::with_capacity(entry.attributes.len());
            for descriptor in entry.attributes {
                next_id += 1;
                let id = BindingId(next_id);
                let scope = format!("{}/{}", entry.device, descriptor.name);
                let accessor = AttributeAccessor::new(
                    Arc::clone(&gateway),
                    entry.device.clone(),
                    descriptor.name.clone(),
                );
                match BindingController::bind(
                    id,
                    Arc::new(descriptor),
                    accessor,
                    Arc::clone(&registry),
                    &sender,
                    &options.controls,
                )
                .await
                {
                    Ok(binding) => {
                        index.insert(id, (s, d, attributes.len()));
                        attributes.push(binding);
                    }
                    Err(error) => {
                        warn!(%scope, %error, "Attribute left out of the tree");
                        failures.push(AssemblyFailure { scope, error });
                    }
                }
            }

            let actions: Vec<ActionTrigger> = entry
                .actions
                .into_iter()
                .map(|a| ActionTrigger::new(Arc::clone(&gateway), entry.device.clone(), a.name))
                .collect();
            triggers += actions.len();
            devices.push(DeviceNode {
                device: entry.device,
                attributes,
                actions,
            });
        }
        servers.push(ServerNode {
            name: server.name,
            devices,
        });
    }

    let report = AssemblyReport {
        bound: index.len(),
        triggers,
        failures,
    };
    info!(
        servers = servers.len(),
        bound = report.bound,
        triggers = report.triggers,
        failures = report.failures.len(),
        "Control tree assembled"
    );

    Ok(ControlTree {
        servers,
        registry,
        queue,
        index,
        report,
        dropped: 0,
    })
}

// =============================================================================
// Control tree
// =============================================================================

/// The assembled hierarchy of bound controls and triggers.
pub struct ControlTree {
    servers: Vec<ServerNode>,
    registry: Arc<SubscriptionRegistry>,
    queue: NotificationQueue,
    index: HashMap<BindingId, (usize, usize, usize)>,
    report: AssemblyReport,
    dropped: u64,
}

impl fmt::Debug for ControlTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlTree")
            .field("servers", &self.servers.len())
            .field("bindings", &self.index.len())
            .field("subscriptions", &self.registry.len())
            .finish()
    }
}

impl ControlTree {
    /// Servers in gateway order.
    pub fn servers(&self) -> &[ServerNode] {
        &self.servers
    }

    /// What assembly bound and what it left out.
    pub fn report(&self) -> &AssemblyReport {
        &self.report
    }

    /// Registry holding the tree's change subscriptions.
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Notifications dropped because their binding was gone.
    pub fn dropped_notifications(&self) -> u64 {
        self.dropped
    }

    /// Every binding with its path, in tree order.
    pub fn bindings(&self) -> impl Iterator<Item = (ControlPath, &BindingController)> {
        self.servers.iter().flat_map(|server| {
            server.devices.iter().flat_map(move |node| {
                node.attributes.iter().map(move |b| {
                    (
                        ControlPath {
                            server: server.name.clone(),
                            device: node.device.device.clone(),
                            member: b.name().to_string(),
                        },
                        b,
                    )
                })
            })
        })
    }

    /// Path of a binding.
    pub fn path_of(&self, id: BindingId) -> Option<ControlPath> {
        let &(s, d, a) = self.index.get(&id)?;
        let node = &self.servers[s].devices[d];
        Some(ControlPath {
            server: self.servers[s].name.clone(),
            device: node.device.device.clone(),
            member: node.attributes[a].name().to_string(),
        })
    }

    fn device_node(&self, path: &ControlPath) -> Option<(usize, usize)> {
        let s = self.servers.iter().position(|n| n.name == path.server)?;
        let d = self.servers[s]
            .devices
            .iter()
            .position(|n| n.device.device == path.device)?;
        Some((s, d))
    }

    fn binding_index(&self, path: &str) -> BindingResult<(usize, usize, usize)> {
        let parsed: ControlPath = path.parse()?;
        self.device_node(&parsed)
            .and_then(|(s, d)| {
                self.servers[s].devices[d]
                    .attributes
                    .iter()
                    .position(|b| b.name() == parsed.member)
                    .map(|a| (s, d, a))
            })
            .ok_or_else(|| BindingError::UnknownPath(path.to_string()))
    }

    fn trigger_index(&self, path: &str) -> BindingResult<(usize, usize, usize)> {
        let parsed: ControlPath = path.parse()?;
        self.device_node(&parsed)
            .and_then(|(s, d)| {
                self.servers[s].devices[d]
                    .actions
                    .iter()
                    .position(|t| t.name() == parsed.member)
                    .map(|a| (s, d, a))
            })
            .ok_or_else(|| BindingError::UnknownPath(path.to_string()))
    }

    /// Binding at `server/device/attribute`.
    pub fn binding(&self, path: &str) -> BindingResult<&BindingController> {
        let (s, d, a) = self.binding_index(path)?;
        Ok(&self.servers[s].devices[d].attributes[a])
    }

    /// Trigger at `server/device/action`.
    pub fn trigger(&self, path: &str) -> BindingResult<&ActionTrigger> {
        let (s, d, a) = self.trigger_index(path)?;
        Ok(&self.servers[s].devices[d].actions[a])
    }

    /// Commit a user edit on the control at `path`.
    pub async fn commit(&mut self, path: &str, edit: ControlEdit) -> BindingResult<()> {
        let (s, d, a) = self.binding_index(path)?;
        self.servers[s].devices[d].attributes[a].commit(edit).await
    }

    /// Commit text typed by the user, interpreted for the control at `path`.
    pub async fn commit_input(&mut self, path: &str, input: &str) -> BindingResult<()> {
        let (s, d, a) = self.binding_index(path)?;
        let binding = &mut self.servers[s].devices[d].attributes[a];
        let edit = ControlEdit::parse_for(binding.control().spec(), input).ok_or_else(|| {
            BindingError::InvalidEdit {
                attribute: binding.name().to_string(),
                reason: format!("'{input}' does not fit a {:?} control", binding.control().kind()),
            }
        })?;
        binding.commit(edit).await
    }

    /// Activate the trigger at `path`.
    pub async fn activate(&mut self, path: &str) -> BindingResult<()> {
        let (s, d, a) = self.trigger_index(path)?;
        self.servers[s].devices[d].actions[a].activate().await
    }

    /// Unbind one attribute. A second call reports `UnknownSubscription`.
    pub async fn unbind(&mut self, path: &str) -> BindingResult<()> {
        let (s, d, a) = self.binding_index(path)?;
        self.servers[s].devices[d].attributes[a].unbind().await
    }

    fn dispatch(&mut self, change: RemoteChange) -> bool {
        let binding = match self.index.get(&change.binding) {
            Some(&(s, d, a)) => &mut self.servers[s].devices[d].attributes[a],
            None => {
                self.dropped += 1;
                debug!(binding = %change.binding, "Notification for unknown binding dropped");
                return false;
            }
        };
        match binding.apply_remote(change.value) {
            Ok(true) => {
                debug!(device = %binding.device(), attribute = binding.name(), "Remote change applied");
                true
            }
            Ok(false) => {
                self.dropped += 1;
                debug!(binding = %change.binding, "Late notification dropped");
                false
            }
            Err(e) => {
                warn!(binding = %change.binding, error = %e, "Remote change rejected");
                false
            }
        }
    }

    /// Apply every queued remote change. Returns how many were applied.
    pub fn process_notifications(&mut self) -> usize {
        let mut applied = 0;
        while let Some(change) = self.queue.try_next() {
            if self.dispatch(change) {
                applied += 1;
            }
        }
        applied
    }

    /// Wait for the next remote change and apply it.
    ///
    /// Returns the change and whether it reached a bound control.
    pub async fn next_notification(&mut self) -> Option<(RemoteChange, bool)> {
        let change = self.queue.next().await?;
        let applied = self.dispatch(change.clone());
        Some((change, applied))
    }

    /// Unbind every attribute and release every subscription.
    ///
    /// Best-effort: a failed release is recorded and teardown moves on.
    /// Running it again releases nothing.
    #[instrument(skip_all)]
    pub async fn teardown(&mut self) -> TeardownReport {
        let mut report = TeardownReport::default();
        for server in &mut self.servers {
            for node in &mut server.devices {
                for binding in &mut node.attributes {
                    if binding.state() == BindingState::Unbound {
                        continue;
                    }
                    match binding.unbind().await {
                        Ok(()) => report.released += 1,
                        Err(e @ BindingError::UnknownSubscription(_)) => {
                            error!(attribute = binding.name(), error = %e, "Subscription already released");
                            report.failures.push(e);
                        }
                        Err(e) => {
                            warn!(attribute = binding.name(), error = %e, "Release failed");
                            report.failures.push(e);
                        }
                    }
                }
            }
        }

        let (released, failures) = self.registry.release_all().await;
        report.released += released;
        report.failures.extend(failures);

        // Every binding is unbound now; anything still queued is dropped.
        self.process_notifications();
        info!(
            released = report.released,
            failures = report.failures.len(),
            "Control tree torn down"
        );
        report
    }
}

impl Drop for ControlTree {
    fn drop(&mut self) {
        let active = self.registry.len();
        if active > 0 {
            warn!(active, "Control tree dropped without teardown");
        }
    }
}
