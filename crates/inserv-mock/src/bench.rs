//! Bench files: simulated namespaces described in TOML.
//!
//! ```toml
//! [[servers]]
//! name = "local"
//!
//! [[servers.devices]]
//! name = "sig_gen"
//! actions = ["trigger", "initialize"]
//!
//! [[servers.devices.attributes]]
//! name = "frequency"
//! kind = "numeric"
//! unit = "Hz"
//! min = 0.0
//! max = 1e9
//! value = { magnitude = 2.5, unit = "MHz" }
//!
//! [[servers.devices.attributes]]
//! name = "mode"
//! kind = "enumerated"
//! choices = ["auto", "manual"]
//! value = "auto"
//! ```

use anyhow::{Context, Result};
use figment::{
    providers::{Format, Toml},
    Figment,
};
use inserv_core::{AttributeDescriptor, AttributeValue, DeviceRef, NumericSpec, ValueKind};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

use crate::gateway::{MockDevice, MockGateway};

/// Bench file validation errors.
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    /// Enumerated attribute declared without choices
    #[error("Attribute '{0}' is enumerated but declares no choices")]
    NoChoices(String),

    /// Bench file not found
    #[error("Bench file not found: {0}")]
    NotFound(String),
}

/// Attribute kind tag used in bench files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchKind {
    /// Choice among `choices`
    Enumerated,
    /// Integer, float or quantity
    Numeric,
    /// Free-form text
    Text,
    /// Read-only string rendering
    Opaque,
}

/// One attribute of a bench device.
#[derive(Debug, Clone, Deserialize)]
pub struct BenchAttribute {
    /// Attribute name
    pub name: String,
    /// Attribute kind
    pub kind: BenchKind,
    /// Allowed values (enumerated only)
    #[serde(default)]
    pub choices: Vec<AttributeValue>,
    /// Integer-valued (numeric only)
    #[serde(default)]
    pub integer: bool,
    /// Display unit (numeric only)
    #[serde(default)]
    pub unit: Option<String>,
    /// Lower bound (numeric only)
    #[serde(default)]
    pub min: Option<f64>,
    /// Upper bound (numeric only)
    #[serde(default)]
    pub max: Option<f64>,
    /// Value fixed at discovery
    #[serde(default)]
    pub read_once: bool,
    /// Initial value
    pub value: AttributeValue,
}

impl BenchAttribute {
    /// Convert into a descriptor.
    pub fn descriptor(&self) -> Result<AttributeDescriptor, BenchError> {
        let kind = match self.kind {
            BenchKind::Enumerated => {
                if self.choices.is_empty() {
                    return Err(BenchError::NoChoices(self.name.clone()));
                }
                ValueKind::Enumerated(
                    self.choices
                        .iter()
                        .cloned()
                        .map(inserv_core::EnumOption::new)
                        .collect(),
                )
            }
            BenchKind::Numeric => ValueKind::Numeric(NumericSpec {
                is_integer: self.integer,
                unit: self.unit.clone(),
                lower_bound: self.min,
                upper_bound: self.max,
            }),
            BenchKind::Text => ValueKind::Text,
            BenchKind::Opaque => ValueKind::Opaque,
        };
        Ok(AttributeDescriptor {
            name: self.name.clone(),
            kind,
            read_once: self.read_once,
        })
    }
}

/// One bench device.
#[derive(Debug, Clone, Deserialize)]
pub struct BenchDevice {
    /// Device name
    pub name: String,
    /// Attributes in display order
    #[serde(default)]
    pub attributes: Vec<BenchAttribute>,
    /// Action names, lifecycle hooks included
    #[serde(default)]
    pub actions: Vec<String>,
}

/// One bench instrument server.
#[derive(Debug, Clone, Deserialize)]
pub struct BenchServer {
    /// Server name
    pub name: String,
    /// Hosted devices
    #[serde(default)]
    pub devices: Vec<BenchDevice>,
}

/// A complete simulated namespace.
#[derive(Debug, Clone, Deserialize)]
pub struct BenchConfig {
    /// Instrument servers in discovery order
    #[serde(default)]
    pub servers: Vec<BenchServer>,
}

impl BenchConfig {
    /// Parse a bench from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse bench definition")
    }

    /// Load a bench file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BenchError::NotFound(path.display().to_string()).into());
        }
        debug!("Loading bench from: {}", path.display());
        Figment::new()
            .merge(Toml::file(path))
            .extract()
            .with_context(|| format!("Failed to parse bench file: {}", path.display()))
    }

    /// The bench shipped with the console, used when no file is configured.
    pub fn demo() -> Result<Self> {
        Self::from_toml_str(DEMO_BENCH)
    }

    /// Build a gateway serving this bench.
    pub fn into_gateway(self) -> Result<MockGateway> {
        let gateway = MockGateway::new();
        let mut device_count = 0;
        for server in self.servers {
            gateway.add_server(server.name.clone());
            for device in server.devices {
                let mut definition = MockDevice::new();
                for attribute in &device.attributes {
                    let descriptor = attribute
                        .descriptor()
                        .with_context(|| format!("In device '{}/{}'", server.name, device.name))?;
                    definition = definition.with_attribute(descriptor, attribute.value.clone());
                }
                for action in device.actions {
                    definition = definition.with_action(action);
                }
                gateway.add_device(DeviceRef::new(&server.name, &device.name), definition);
                device_count += 1;
            }
        }
        info!(devices = device_count, "Bench gateway ready");
        Ok(gateway)
    }
}

/// Demo bench: a signal generator and a tunable laser on one server, and a
/// lock-in amplifier on another.
pub const DEMO_BENCH: &str = r#"
[[servers]]
name = "local"

[[servers.devices]]
name = "sig_gen"
actions = ["trigger", "reset", "initialize", "finalize", "sweep_async"]

[[servers.devices.attributes]]
name = "frequency"
kind = "numeric"
unit = "Hz"
min = 0.0
max = 1e9
value = { magnitude = 2.5, unit = "MHz" }

[[servers.devices.attributes]]
name = "amplitude"
kind = "numeric"
unit = "V"
max = 10.0
value = { magnitude = 250.0, unit = "mV" }

[[servers.devices.attributes]]
name = "mode"
kind = "enumerated"
choices = ["auto", "manual"]
value = "auto"

[[servers.devices.attributes]]
name = "idn"
kind = "text"
read_once = true
value = "SG-384,s/n 12345"

[[servers.devices]]
name = "laser"
actions = ["open_shutter", "close_shutter", "refresh"]

[[servers.devices.attributes]]
name = "wavelength"
kind = "numeric"
integer = true
unit = "nm"
min = 690.0
max = 1040.0
value = 800

[[servers.devices.attributes]]
name = "emission"
kind = "enumerated"
choices = [true, false]
value = false

[[servers.devices.attributes]]
name = "status"
kind = "opaque"
value = "warming up"

[[servers]]
name = "remote"

[[servers.devices]]
name = "lockin"
actions = ["auto_phase"]

[[servers.devices.attributes]]
name = "time_constant"
kind = "numeric"
unit = "s"
min = 1e-5
value = { magnitude = 100.0, unit = "ms" }

[[servers.devices.attributes]]
name = "harmonic"
kind = "numeric"
integer = true
min = 1.0
value = 1

[[servers.devices.attributes]]
name = "label"
kind = "text"
value = "reference arm"
"#;
