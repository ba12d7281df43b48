//! Admin command registry (§6): a small name → handler table, driven by an
//! external transport (CLI, socket, etc. — out of scope here).

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Error, Result};

/// A sink for command output: `out` for normal results, `err` for failures,
/// matching the two-sink `(args, out, err)` handler signature (§6).
pub trait OutputSink: Send {
    fn write(&mut self, value: String);
}

/// Collects written values; the simplest `OutputSink`, useful for tests and
/// for demo wiring where output is just printed afterwards.
#[derive(Default)]
pub struct CollectingSink {
    pub lines: Vec<String>,
}

impl OutputSink for CollectingSink {
    fn write(&mut self, value: String) {
        self.lines.push(value);
    }
}

pub type CommandHandler =
    Box<dyn Fn(&[String], &mut dyn OutputSink, &mut dyn OutputSink) + Send + Sync>;

#[derive(Default)]
struct Registry {
    commands: HashMap<String, CommandHandler>,
}

/// Registers and dispatches admin commands by name.
pub struct AdminCommandRegistry {
    inner: Mutex<Registry>,
}

impl Default for AdminCommandRegistry {
    fn default() -> Self {
        AdminCommandRegistry {
            inner: Mutex::new(Registry::default()),
        }
    }
}

impl AdminCommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_command(&self, name: impl Into<String>, handler: CommandHandler) {
        self.inner.lock().unwrap().commands.insert(name.into(), handler);
    }

    /// Looks up `command` and invokes it with `args`, writing results to
    /// `out`. Returns `AdminCommandError` if no handler is registered; a
    /// handler that fails is expected to write its own failure detail to
    /// `err` rather than panic.
    pub fn process_admin_command_request(
        &self,
        command: &str,
        args: &[String],
        out: &mut dyn OutputSink,
        err: &mut dyn OutputSink,
    ) -> Result<()> {
        let commands = self.inner.lock().unwrap();
        match commands.commands.get(command) {
            Some(handler) => {
                handler(args, out, err);
                Ok(())
            }
            None => Err(Error::AdminCommand(format!("no such command: {command}"))),
        }
    }

    pub fn command_list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.lock().unwrap().commands.keys().cloned().collect();
        names.sort();
        names
    }
}
