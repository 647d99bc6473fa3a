//! Attribute and action descriptors.
//!
//! A descriptor is the typed, discovery-time description of one remote
//! member of a device. The gateway produces descriptors explicitly; nothing
//! downstream introspects remote objects.
//!
//! # Invariants
//!
//! - [`AttributeDescriptor::kind`] is fixed at discovery. Control selection
//!   matches on it once and never re-inspects the runtime value's type to
//!   pick a widget.
//! - Descriptors carry no current value. The last known value belongs to the
//!   single binding that displays the attribute.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value::AttributeValue;

// =============================================================================
// Device references
// =============================================================================

/// Non-owning reference to a device hosted by an instrument server.
///
/// The gateway owns the device; everything else addresses it by
/// `server/device` name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceRef {
    /// Instrument server name
    pub server: String,
    /// Device name, unique within its server
    pub device: String,
}

impl DeviceRef {
    /// Create a device reference.
    pub fn new(server: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            device: device.into(),
        }
    }
}

impl fmt::Display for DeviceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.server, self.device)
    }
}

// =============================================================================
// Attribute descriptors
// =============================================================================

/// One allowed value of an enumerated attribute.
///
/// Reported values are matched with [`AttributeValue::same_value`], so
/// integer and float forms of the same number select the same option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumOption {
    /// Label shown in the choice control
    pub label: String,
    /// Value written to the device when this option is chosen
    pub value: AttributeValue,
}

impl EnumOption {
    /// Option labelled with the string form of its value.
    pub fn new(value: impl Into<AttributeValue>) -> Self {
        let value = value.into();
        Self {
            label: value.to_string(),
            value,
        }
    }

    /// Option with an explicit label.
    pub fn labelled(label: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Configuration of a numeric attribute.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NumericSpec {
    /// Integer-valued attribute (unit step, no fractional display)
    #[serde(default)]
    pub is_integer: bool,
    /// Display unit; dimensioned values are converted into it
    #[serde(default)]
    pub unit: Option<String>,
    /// Lower bound, if declared
    #[serde(default)]
    pub lower_bound: Option<f64>,
    /// Upper bound, if declared
    #[serde(default)]
    pub upper_bound: Option<f64>,
}

impl NumericSpec {
    /// Floating-point attribute without unit or bounds.
    pub fn float() -> Self {
        Self::default()
    }

    /// Integer attribute without unit or bounds.
    pub fn integer() -> Self {
        Self {
            is_integer: true,
            ..Self::default()
        }
    }

    /// Set the display unit.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Declare both bounds.
    pub fn with_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.lower_bound = Some(lower);
        self.upper_bound = Some(upper);
        self
    }

    /// Declare only a lower bound.
    pub fn with_min(mut self, lower: f64) -> Self {
        self.lower_bound = Some(lower);
        self
    }

    /// Declare only an upper bound.
    pub fn with_max(mut self, upper: f64) -> Self {
        self.upper_bound = Some(upper);
        self
    }

    /// Build from a declared limits sequence.
    ///
    /// A sole first element is a minimum, a sole second element is a maximum,
    /// so `[Some(0.0)]` and `[None, Some(5.0)]` declare one bound each.
    pub fn with_limits(mut self, limits: &[Option<f64>]) -> Self {
        self.lower_bound = limits.first().copied().flatten();
        self.upper_bound = limits.get(1).copied().flatten();
        self
    }
}

/// How an attribute's value is typed, decided once at discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValueKind {
    /// Restricted to an ordered set of options
    Enumerated(Vec<EnumOption>),
    /// Integer, float or dimensioned quantity
    Numeric(NumericSpec),
    /// Free-form text
    Text,
    /// Anything else; rendered read-only as its string form
    Opaque,
}

impl ValueKind {
    /// Short name of the kind, for logs and rendering.
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Enumerated(_) => "enumerated",
            ValueKind::Numeric(_) => "numeric",
            ValueKind::Text => "text",
            ValueKind::Opaque => "opaque",
        }
    }
}

/// One remote controllable attribute ("feature") of a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    /// Name, unique within the owning device
    pub name: String,
    /// Typing of the value
    pub kind: ValueKind,
    /// Value is fixed at discovery; the control accepts no edits
    #[serde(default)]
    pub read_once: bool,
}

impl AttributeDescriptor {
    /// Create a descriptor.
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            read_once: false,
        }
    }

    /// Enumerated attribute whose labels are the string forms of `values`.
    pub fn enumerated<V: Into<AttributeValue>>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::new(
            name,
            ValueKind::Enumerated(values.into_iter().map(EnumOption::new).collect()),
        )
    }

    /// Numeric attribute.
    pub fn numeric(name: impl Into<String>, spec: NumericSpec) -> Self {
        Self::new(name, ValueKind::Numeric(spec))
    }

    /// Text attribute.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ValueKind::Text)
    }

    /// Opaque attribute.
    pub fn opaque(name: impl Into<String>) -> Self {
        Self::new(name, ValueKind::Opaque)
    }

    /// Mark the attribute read-once.
    pub fn read_once(mut self) -> Self {
        self.read_once = true;
        self
    }
}

// =============================================================================
// Action descriptors
// =============================================================================

/// A zero-argument remote operation on a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    /// Action name
    pub name: String,
}

impl ActionDescriptor {
    /// Create an action descriptor.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Lifecycle hooks that are never offered as user actions.
pub const RESERVED_ACTIONS: &[&str] = &["initialize", "finalize", "update", "refresh"];

/// Name fragment marking asynchronous variants of an action.
pub const ASYNC_VARIANT_MARKER: &str = "_async";

/// Which discovered actions are surfaced as user-invocable triggers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPolicy {
    /// Exact names that are always hidden
    pub reserved: Vec<String>,
    /// Names containing this fragment are hidden
    pub async_marker: String,
}

impl Default for ActionPolicy {
    fn default() -> Self {
        Self {
            reserved: RESERVED_ACTIONS.iter().map(|s| s.to_string()).collect(),
            async_marker: ASYNC_VARIANT_MARKER.to_string(),
        }
    }
}

impl ActionPolicy {
    /// Whether an action with this name becomes a trigger.
    pub fn is_exposed(&self, name: &str) -> bool {
        if self.reserved.iter().any(|r| r == name) {
            return false;
        }
        self.async_marker.is_empty() || !name.contains(&self.async_marker)
    }
}

// =============================================================================
// Namespace
// =============================================================================

/// Everything discovered about one device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceEntry {
    /// The device
    pub device: DeviceRef,
    /// Attributes in gateway order
    pub attributes: Vec<AttributeDescriptor>,
    /// Exposed actions in gateway order
    pub actions: Vec<ActionDescriptor>,
}

/// Everything discovered about one instrument server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerEntry {
    /// Server name
    pub name: String,
    /// Devices in gateway order
    pub devices: Vec<DeviceEntry>,
}

/// The discovered hierarchy `server -> device -> {attributes, actions}`.
///
/// Built once per session. Order follows what the gateway reported; nothing
/// here sorts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Namespace {
    /// Servers in gateway order
    pub servers: Vec<ServerEntry>,
}

impl Namespace {
    /// Iterate over every device entry, server by server.
    pub fn devices(&self) -> impl Iterator<Item = &DeviceEntry> {
        self.servers.iter().flat_map(|s| s.devices.iter())
    }

    /// Total number of attributes across all devices.
    pub fn attribute_count(&self) -> usize {
        self.devices().map(|d| d.attributes.len()).sum()
    }
}
