//! Plain-text rendering of the control tree.
//!
//! ```text
//! local
//!   sig_gen
//!     frequency  stepper  2500000.000000 Hz  [0, 1000000000]
//!     mode       choice   auto  {auto|manual}
//!     idn        text ro  SG-384,s/n 12345
//!     > trigger
//! ```

use inserv_binding::{
    AssemblyReport, BindingController, ControlKind, ControlSpec, ControlTree, DeviceNode,
};
use std::fmt::Write;

fn kind_tag(kind: ControlKind) -> &'static str {
    match kind {
        ControlKind::Choice => "choice",
        ControlKind::Stepper => "stepper",
        ControlKind::Text => "text",
        ControlKind::ReadOnlyText => "text ro",
    }
}

/// One line for a bound attribute, without indentation.
pub fn binding_line(binding: &BindingController, name_width: usize) -> String {
    let control = binding.control();
    let mut line = format!(
        "{:<width$}  {:<7}  {}",
        binding.name(),
        kind_tag(control.kind()),
        control.display_text(),
        width = name_width
    );
    match control.spec() {
        ControlSpec::Choice { labels, .. } => {
            let _ = write!(line, "  {{{}}}", labels.join("|"));
        }
        ControlSpec::Stepper { .. } => {
            if let Some(bounds) = control.bounds_interval() {
                let _ = write!(line, "  {bounds}");
            }
        }
        ControlSpec::Text { .. } => {}
    }
    if let Some(error) = control.error() {
        let _ = write!(line, "  !! {error}");
    }
    line
}

fn device_block(out: &mut String, node: &DeviceNode) {
    let _ = writeln!(out, "  {}", node.device().device);
    let width = node
        .attributes()
        .iter()
        .map(|b| b.name().len())
        .max()
        .unwrap_or(0);
    for binding in node.attributes() {
        let _ = writeln!(out, "    {}", binding_line(binding, width));
    }
    for trigger in node.actions() {
        match trigger.last_error() {
            Some(error) => {
                let _ = writeln!(out, "    > {}  !! {error}", trigger.name());
            }
            None => {
                let _ = writeln!(out, "    > {}", trigger.name());
            }
        }
    }
}

/// The whole tree, optionally restricted to a `server` or `server/device`
/// prefix.
pub fn render_tree(tree: &ControlTree, filter: Option<&str>) -> String {
    let (server_filter, device_filter) = match filter.map(|f| f.split_once('/')) {
        Some(Some((server, device))) => (Some(server), Some(device)),
        Some(None) => (filter, None),
        None => (None, None),
    };

    let mut out = String::new();
    for server in tree.servers() {
        if server_filter.is_some_and(|s| s != server.name()) {
            continue;
        }
        let _ = writeln!(out, "{}", server.name());
        for node in server.devices() {
            if device_filter.is_some_and(|d| d != node.device().device) {
                continue;
            }
            device_block(&mut out, node);
        }
    }
    out
}

/// Detailed view of one binding, for `show`.
pub fn render_binding(path: &str, binding: &BindingController) -> String {
    let control = binding.control();
    let mut out = String::new();
    let _ = writeln!(out, "{path}");
    let _ = writeln!(out, "  kind:      {}", binding.descriptor().kind.name());
    let _ = writeln!(out, "  control:   {}", kind_tag(control.kind()));
    let _ = writeln!(out, "  displayed: {}", control.display_text());
    let _ = writeln!(out, "  remote:    {}", binding.current_value());
    if let Some(bounds) = control.bounds_interval() {
        let _ = writeln!(out, "  bounds:    {bounds}");
    }
    if let ControlSpec::Choice { labels, .. } = control.spec() {
        let _ = writeln!(out, "  options:   {}", labels.join(", "));
    }
    if control.is_read_only() {
        let _ = writeln!(out, "  read-only");
    }
    if let Some(error) = control.error() {
        let _ = writeln!(out, "  error:     {error}");
    }
    out
}

/// Summary of assembly failures; empty when everything was bound.
pub fn render_report(report: &AssemblyReport) -> String {
    let mut out = String::new();
    if report.failures.is_empty() {
        return out;
    }
    let _ = writeln!(out, "{} part(s) left out of the tree:", report.failures.len());
    for failure in &report.failures {
        let _ = writeln!(out, "  {}: {}", failure.scope, failure.error);
    }
    out
}
