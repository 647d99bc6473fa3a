//! Simulated instrument servers for inserv-manager.
//!
//! This crate provides a [`MockGateway`] that serves devices held in memory,
//! so the binding engine and the console can run without any instrument
//! server or transport.
//!
//! # Building a namespace
//!
//! Programmatically:
//!
//! ```rust
//! use inserv_core::{AttributeDescriptor, DeviceRef, NumericSpec};
//! use inserv_mock::{MockDevice, MockGateway};
//!
//! let gateway = MockGateway::new();
//! gateway.add_device(
//!     DeviceRef::new("local", "sig_gen"),
//!     MockDevice::new()
//!         .with_attribute(
//!             AttributeDescriptor::numeric("frequency", NumericSpec::float().with_unit("Hz")),
//!             1e6,
//!         )
//!         .with_action("trigger"),
//! );
//! ```
//!
//! Or from a TOML bench file via [`BenchConfig`].
//!
//! # Simulating the outside world
//!
//! - [`MockGateway::drive_attribute`] changes a value as another client or the
//!   device itself would, from any thread.
//! - Fault injection: [`MockGateway::set_connected`],
//!   [`MockGateway::reject_writes`], [`MockGateway::fail_reads`],
//!   [`MockGateway::fail_action`], [`MockGateway::fail_listing`].
//! - Call recording: [`MockGateway::write_count`],
//!   [`MockGateway::invoke_count`], [`MockGateway::subscriber_count`].

pub mod bench;
mod gateway;

pub use bench::{BenchConfig, BenchError, DEMO_BENCH};
pub use gateway::{MockDevice, MockGateway};
