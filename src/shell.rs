//! Interactive console over an assembled control tree.
//!
//! Commands mirror an instrument server's command prompt:
//!
//! | Command | Effect |
//! |---------|--------|
//! | `list [server[/device]]` | print the tree |
//! | `show <path>` | details of one attribute |
//! | `set <path> <value>` | commit an edit through the attribute's control |
//! | `invoke <path>` | activate a trigger |
//! | `watch [seconds]` | print remote changes as they arrive |
//! | `drive <path> <value>` | change a simulated attribute from another thread |
//! | `params`, `param <name> <value>` | session settings |
//! | `help`, `quit` | |
//!
//! Pending remote changes are applied before every command.

use anyhow::{anyhow, bail, Context, Result};
use inserv_binding::{BindingError, ControlOptions, ControlPath, ControlTree, ParamsForm};
use inserv_core::{AttributeValue, DeviceRef, NumericSpec, Quantity};
use inserv_mock::MockGateway;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

use crate::render;

const HELP: &str = "\
Commands:
  list [server[/device]]   print the control tree
  show <path>              details of one attribute
  set <path> <value>       commit an edit (choice label or index, number, text)
  invoke <path>            activate a trigger
  watch [seconds]          print remote changes as they arrive
  drive <path> <value>     change a simulated attribute as another client would
  params                   show session settings
  param <name> <value>     change a session setting
  help                     this text
  quit                     tear down and exit
Paths are server/device/member.";

/// Whether the shell keeps reading after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next command
    Continue,
    /// Leave the shell
    Quit,
}

/// Interactive session state.
pub struct Shell {
    tree: ControlTree,
    gateway: Arc<MockGateway>,
    params: ParamsForm,
}

/// Session settings offered by `params` and `param`.
///
/// Built before a [`Shell`] takes ownership of the tree, so a failure here
/// leaves the caller free to tear the tree down.
pub fn session_params(options: ControlOptions) -> Result<ParamsForm> {
    let mut params = ParamsForm::new(options);
    params.add_numeric(
        "watch_seconds",
        Some("Default watch duration"),
        NumericSpec::float().with_unit("s").with_bounds(0.0, 3600.0),
        5.0,
    )?;
    params.add_text("prompt", Some("Prompt"), "inserv>")?;
    Ok(params)
}

impl Shell {
    /// Shell over `tree`, whose attributes live in `gateway`.
    pub fn new(tree: ControlTree, gateway: Arc<MockGateway>, params: ParamsForm) -> Self {
        Self {
            tree,
            gateway,
            params,
        }
    }

    /// The tree being driven.
    pub fn tree(&self) -> &ControlTree {
        &self.tree
    }

    /// Give the tree back, for teardown.
    pub fn into_tree(self) -> ControlTree {
        self.tree
    }

    /// Read commands from `input` until `quit` or end of input.
    pub async fn run<R, W>(&mut self, input: R, out: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut lines = input.lines();
        loop {
            let prompt = self
                .params
                .get("prompt")
                .map(|v| v.to_string())
                .unwrap_or_default();
            write!(out, "{prompt} ")?;
            out.flush()?;

            let Some(line) = lines.next_line().await.context("Failed to read command")? else {
                writeln!(out)?;
                return Ok(());
            };
            if self.execute(&line, out).await? == Flow::Quit {
                return Ok(());
            }
        }
    }

    /// Run one command line.
    ///
    /// Command errors are printed and the session continues; only output
    /// failures are returned.
    pub async fn execute<W: Write>(&mut self, line: &str, out: &mut W) -> Result<Flow> {
        let applied = self.tree.process_notifications();
        if applied > 0 {
            debug!(applied, "Applied pending remote changes");
        }

        let line = line.trim();
        let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        let result = match command {
            "" => Ok(()),
            "help" | "?" => writeln!(out, "{HELP}").context("Failed to write help"),
            "quit" | "exit" => return Ok(Flow::Quit),
            "list" | "ls" => self.list(rest, out),
            "show" => self.show(rest, out),
            "set" => self.set(rest, out).await,
            "invoke" => self.invoke(rest, out).await,
            "watch" => self.watch(rest, out).await,
            "drive" => self.drive(rest, out),
            "params" => self.show_params(out),
            "param" => self.set_param(rest, out),
            other => Err(anyhow!("Unknown command '{other}'. Type 'help'.")),
        };

        if let Err(e) = result {
            warn!(command, error = %e, "Command failed");
            writeln!(out, "error: {e:#}")?;
        }
        Ok(Flow::Continue)
    }

    fn list<W: Write>(&self, filter: &str, out: &mut W) -> Result<()> {
        let filter = (!filter.is_empty()).then_some(filter);
        write!(out, "{}", render::render_tree(&self.tree, filter))?;
        Ok(())
    }

    fn show<W: Write>(&self, path: &str, out: &mut W) -> Result<()> {
        let binding = self.tree.binding(path)?;
        write!(out, "{}", render::render_binding(path, binding))?;
        Ok(())
    }

    async fn set<W: Write>(&mut self, args: &str, out: &mut W) -> Result<()> {
        let (path, value) = split_path_value(args)?;
        let outcome = self.tree.commit_input(path, value).await;
        self.tree.process_notifications();
        let binding = self.tree.binding(path)?;
        writeln!(out, "{}", render::binding_line(binding, 0))?;
        outcome.map_err(Into::into)
    }

    async fn invoke<W: Write>(&mut self, path: &str, out: &mut W) -> Result<()> {
        if path.is_empty() {
            bail!("usage: invoke <server/device/action>");
        }
        self.tree.activate(path).await?;
        writeln!(out, "invoked {path}")?;
        Ok(())
    }

    async fn watch<W: Write>(&mut self, args: &str, out: &mut W) -> Result<()> {
        let seconds = if args.is_empty() {
            self.params.get_f64("watch_seconds").unwrap_or(0.0)
        } else {
            args.parse::<f64>()
                .map_err(|_| anyhow!("'{args}' is not a number of seconds"))?
        };
        let duration = Duration::try_from_secs_f64(seconds)
            .map_err(|_| anyhow!("'{seconds}' is not a usable number of seconds"))?;
        writeln!(out, "watching for {seconds} s")?;
        out.flush()?;

        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);
        let mut seen = 0usize;
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                next = self.tree.next_notification() => {
                    let Some((change, applied)) = next else { break };
                    if !applied {
                        continue;
                    }
                    seen += 1;
                    let path = self
                        .tree
                        .path_of(change.binding)
                        .map(|p| p.to_string())
                        .unwrap_or_else(|| change.binding.to_string());
                    writeln!(out, "{path} = {}", change.value)?;
                    out.flush()?;
                }
            }
        }
        writeln!(out, "{seen} change(s)")?;
        Ok(())
    }

    fn drive<W: Write>(&mut self, args: &str, out: &mut W) -> Result<()> {
        let (path, raw) = split_path_value(args)?;
        let path: ControlPath = path.parse()?;
        let device = DeviceRef::new(&path.server, &path.device);
        let value = parse_value(raw);

        // Deliver from a foreign thread, the way a transport would.
        let gateway = Arc::clone(&self.gateway);
        let member = path.member.clone();
        let notified = std::thread::spawn(move || gateway.drive_attribute(&device, &member, value))
            .join()
            .map_err(|_| anyhow!("Driver thread panicked"))??;

        let applied = self.tree.process_notifications();
        writeln!(out, "drove {path} ({notified} subscriber(s), {applied} applied)")?;
        Ok(())
    }

    fn show_params<W: Write>(&self, out: &mut W) -> Result<()> {
        for (name, value) in self.params.all_params() {
            let label = self.params.label(&name).unwrap_or(&name);
            writeln!(out, "{name:<14} {value:<12} {label}")?;
        }
        Ok(())
    }

    fn set_param<W: Write>(&mut self, args: &str, out: &mut W) -> Result<()> {
        let (name, value) = args
            .split_once(char::is_whitespace)
            .ok_or_else(|| anyhow!("usage: param <name> <value>"))?;
        self.params
            .set_input(name, value)
            .map_err(|e| match e {
                BindingError::UnknownPath(name) => anyhow!("Unknown parameter '{name}'"),
                other => other.into(),
            })?;
        let shown = self
            .params
            .control(name)
            .map(|c| c.display_text())
            .unwrap_or_default();
        writeln!(out, "{name} = {shown}")?;
        Ok(())
    }
}

fn split_path_value(args: &str) -> Result<(&str, &str)> {
    args.split_once(char::is_whitespace)
        .map(|(path, value)| (path, value.trim()))
        .filter(|(_, value)| !value.is_empty())
        .ok_or_else(|| anyhow!("usage: <server/device/member> <value>"))
}

/// Interpret typed text as a remote value: `true`/`false`, integers,
/// floats, `<number> <unit>` quantities, anything else as text.
pub fn parse_value(raw: &str) -> AttributeValue {
    let raw = raw.trim();
    if let Ok(flag) = raw.parse::<bool>() {
        return AttributeValue::Bool(flag);
    }
    if let Ok(int) = raw.parse::<i64>() {
        return AttributeValue::Int(int);
    }
    if let Ok(float) = raw.parse::<f64>() {
        return AttributeValue::Float(float);
    }
    if let Some((magnitude, unit)) = raw.split_once(' ') {
        if let Ok(magnitude) = magnitude.parse::<f64>() {
            let unit = unit.trim();
            if !unit.is_empty() && !unit.contains(' ') {
                return AttributeValue::Quantity(Quantity::new(magnitude, unit));
            }
        }
    }
    AttributeValue::Text(raw.to_string())
}
