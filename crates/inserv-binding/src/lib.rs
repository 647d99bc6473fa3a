//! `inserv-binding`
//!
//! The remote attribute binding and synchronization engine. Given a
//! [`Gateway`](inserv_core::Gateway), it discovers the instrument namespace,
//! builds one interactive control per remote attribute and one trigger per
//! remote action, and keeps every control in agreement with its attribute.
//!
//! # Sync protocol
//!
//! | Event | Display | Remote write |
//! |-------|---------|--------------|
//! | binding constructed | initial read | none |
//! | user commits an edit | updated | exactly one |
//! | remote change notified | updated | none |
//! | echo of own write | updated (same value) | none |
//!
//! Because remote changes never write, a write's echo cannot start a loop.
//!
//! # Crate Layout
//!
//! - [`control`] - control selection policy and the toolkit-neutral control model
//! - [`binding`] - [`BindingController`], one per displayed attribute
//! - [`registry`] - [`SubscriptionRegistry`] of live change subscriptions
//! - [`dispatch`] - moving change notifications onto the tree's thread
//! - [`action`] - [`ActionTrigger`], one per exposed action
//! - [`tree`] - discovery, [`assemble`], [`ControlTree`] and teardown
//! - [`params`] - [`ParamsForm`] for console-side parameters
//!
//! # Example
//!
//! ```rust,no_run
//! use inserv_binding::{assemble, AssemblyOptions, ControlEdit};
//! use inserv_mock::BenchConfig;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = Arc::new(BenchConfig::demo()?.into_gateway()?);
//! let mut tree = assemble(gateway, &AssemblyOptions::default()).await?;
//!
//! tree.commit("local/sig_gen/mode", ControlEdit::Select(1)).await?;
//! tree.process_notifications();
//!
//! tree.teardown().await;
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod binding;
pub mod control;
pub mod dispatch;
pub mod error;
pub mod params;
pub mod registry;
pub mod tree;

pub use action::ActionTrigger;
pub use binding::{AttributeAccessor, BindingController, BindingState};
pub use control::{
    select_control, Control, ControlEdit, ControlKind, ControlOptions, ControlSpec, StepperBounds,
    StepperSpec,
};
pub use dispatch::{BindingId, NotificationQueue, NotificationSender, RemoteChange};
pub use error::{BindingError, BindingResult};
pub use params::ParamsForm;
pub use registry::{SubscriptionHandle, SubscriptionRegistry};
pub use tree::{
    assemble, discover, AssemblyFailure, AssemblyOptions, AssemblyReport, ControlPath,
    ControlTree, DeviceNode, Discovery, ServerNode, TeardownReport,
};
