//! inserv-manager: an instrument manager console.
//!
//! Assembles a live, editable control tree over the attributes and actions
//! of remote instrument servers and keeps it synchronized in both
//! directions. The engine lives in `inserv-binding`; this crate adds the
//! console around it.
//!
//! - [`config`] - layered configuration (defaults, TOML file, `INSERV_` env)
//! - [`logging`] - tracing subscriber setup
//! - [`render`] - text rendering of the control tree
//! - [`shell`] - interactive command prompt

pub mod config;
pub mod logging;
pub mod render;
pub mod shell;

pub use config::AppConfig;
pub use shell::{session_params, Flow, Shell};
