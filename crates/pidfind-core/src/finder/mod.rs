//! Packet id finder: identifies which definition an observed packet uses.
//!
//! ## Algorithm Overview
//!
//! 1. The operator arms the finder with an optional opcode and a name regex
//! 2. The [`CandidatePool`] narrows every known definition down to those
//!    matching the regex (skipping ones with a real opcode, unless disabled)
//! 3. Each observed packet that passes the gates is decoded under every
//!    candidate, re-encoded with its own opcode and compared byte for byte
//! 4. All candidates that reproduce the packet are reported together
//!
//! The finder is single-threaded. It shares its state with the hook it
//! installs through `Rc<RefCell<_>>`, so commands and deliveries must come
//! from the same thread and never overlap.

mod command;
mod engine;
mod pool;
mod verify;

use crate::error::Result;
use crate::hook::{HookBus, HookFilter, HookId};
use crate::protocol::{RawPacket, SchemaRegistry};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info};

pub use command::{Command, MATCH_ALL};
pub use engine::{on_observation, Candidate, MatchReport};
pub use pool::{is_known_code, CandidatePool, SENTINEL_OPCODE};
pub use verify::{verify, Verdict};

/// Hook order for the finder: after regular handlers have seen the packet
pub const HOOK_ORDER: i32 = 999;

/// Runtime settings of the finder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinderConfig {
    /// Whether observed packets are examined at all
    pub armed: bool,
    /// Only examine packets with this opcode
    pub opcode_filter: Option<u16>,
    /// Case-insensitive regex over definition names
    pub name_filter: String,
    /// Skip packets and definitions that already have a real opcode
    pub exclude_known: bool,
    /// Dump each accepted candidate's decoded record
    pub emit_decoded: bool,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            armed: false,
            opcode_filter: None,
            name_filter: MATCH_ALL.to_string(),
            exclude_known: true,
            emit_decoded: true,
        }
    }
}

impl FinderConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether the finder is armed
    pub fn armed(mut self, armed: bool) -> Self {
        self.armed = armed;
        self
    }

    /// Sets the opcode filter
    pub fn opcode_filter(mut self, opcode: Option<u16>) -> Self {
        self.opcode_filter = opcode;
        self
    }

    /// Sets the name filter
    pub fn name_filter(mut self, pattern: impl Into<String>) -> Self {
        self.name_filter = pattern.into();
        self
    }

    /// Sets known-opcode exclusion
    pub fn exclude_known(mut self, exclude: bool) -> Self {
        self.exclude_known = exclude;
        self
    }

    /// Sets decoded-record dumping
    pub fn emit_decoded(mut self, emit: bool) -> Self {
        self.emit_decoded = emit;
        self
    }
}

/// In-session output channel for status lines and results
pub trait MessageSink {
    /// Delivers one message
    fn message(&self, text: &str);
}

impl<F: Fn(&str)> MessageSink for F {
    fn message(&self, text: &str) {
        self(text)
    }
}

#[derive(Debug)]
struct FinderState {
    config: FinderConfig,
    pool: CandidatePool,
}

/// The armed/disarmed finder, its filters and its hook subscription
pub struct PacketIdFinder {
    state: Rc<RefCell<FinderState>>,
    registry: Rc<dyn SchemaRegistry>,
    sink: Rc<dyn MessageSink>,
    hook: Option<HookId>,
}

impl std::fmt::Debug for PacketIdFinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketIdFinder")
            .field("state", &self.state)
            .field("hook", &self.hook)
            .finish()
    }
}

impl PacketIdFinder {
    /// Creates a disarmed finder over every definition in `registry`
    pub fn new(registry: Rc<dyn SchemaRegistry>, sink: Rc<dyn MessageSink>) -> Self {
        let pool = CandidatePool::new(registry.as_ref());
        debug!("Packet id finder created with {} definitions", pool.all().len());

        Self {
            state: Rc::new(RefCell::new(FinderState {
                config: FinderConfig::default(),
                pool,
            })),
            registry,
            sink,
            hook: None,
        }
    }

    /// Current settings
    pub fn config(&self) -> FinderConfig {
        self.state.borrow().config.clone()
    }

    /// Names currently eligible for matching
    pub fn candidates(&self) -> Vec<String> {
        self.state.borrow().pool.filtered().to_vec()
    }

    /// Returns true if armed
    pub fn is_armed(&self) -> bool {
        self.state.borrow().config.armed
    }

    /// Returns true while the observation hook is installed
    pub fn is_hooked(&self) -> bool {
        self.hook.is_some()
    }

    /// Parses and applies one `fpi` invocation.
    ///
    /// Errors (bad opcode, bad regex) leave the finder exactly as it was.
    pub fn handle_command(
        &mut self,
        arg1: Option<&str>,
        arg2: Option<&str>,
        bus: &mut HookBus,
    ) -> Result<()> {
        let command = Command::parse(arg1, arg2)?;
        self.apply(command, bus)
    }

    /// Applies an already-parsed command
    pub fn apply(&mut self, command: Command, bus: &mut HookBus) -> Result<()> {
        let current = self.config();

        match command {
            Command::Disarm => {
                self.refilter(FinderConfig {
                    armed: false,
                    opcode_filter: None,
                    name_filter: MATCH_ALL.to_string(),
                    ..current
                })?;
                self.report_status();
            }
            Command::Arm { opcode, pattern } => {
                self.refilter(FinderConfig {
                    armed: true,
                    opcode_filter: opcode,
                    name_filter: pattern,
                    ..current
                })?;
                self.report_status();
            }
            Command::ToggleDecoded => {
                let emit = !current.emit_decoded;
                self.state.borrow_mut().config.emit_decoded = emit;
                self.say(&format!(
                    "Decoded candidate dumps {}.",
                    if emit { "enabled" } else { "disabled" }
                ));
            }
            Command::ToggleKnown => {
                let exclude = !current.exclude_known;
                self.refilter(FinderConfig {
                    exclude_known: exclude,
                    ..current
                })?;
                self.say(&format!(
                    "Known packet exclusion {}.",
                    if exclude { "enabled" } else { "disabled" }
                ));
            }
        }

        self.sync_hook(bus);
        Ok(())
    }

    /// Disarms (detaching the hook) if armed
    pub fn shutdown(&mut self, bus: &mut HookBus) {
        if self.is_armed() {
            if let Err(e) = self.apply(Command::Disarm, bus) {
                debug!("Disarm on shutdown failed: {}", e);
            }
        }
        self.sync_hook(bus);
    }

    /// Rebuilds the pool for `next` and commits it only if that succeeds
    fn refilter(&mut self, next: FinderConfig) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.pool.rebuild(&next, self.registry.as_ref())?;
        state.config = next;
        Ok(())
    }

    fn sync_hook(&mut self, bus: &mut HookBus) {
        let armed = self.is_armed();
        match (armed, self.hook) {
            (true, None) => {
                let state = Rc::clone(&self.state);
                let registry = Rc::clone(&self.registry);
                let sink = Rc::clone(&self.sink);
                let id = bus.subscribe(HOOK_ORDER, HookFilter::All, move |packet: &RawPacket| {
                    let state = state.borrow();
                    if let Some(report) =
                        on_observation(packet, &state.config, &state.pool, registry.as_ref())
                    {
                        report.emit(&state.config, sink.as_ref());
                    }
                });
                self.hook = Some(id);
            }
            (false, Some(id)) => {
                bus.unsubscribe(id);
                self.hook = None;
            }
            _ => {}
        }
    }

    fn report_status(&self) {
        let state = self.state.borrow();
        let config = &state.config;
        if config.armed {
            let opcode = match config.opcode_filter {
                Some(opcode) => format!("opcode {}", opcode),
                None => "any opcode".to_string(),
            };
            self.say(&format!(
                "Packet id finder armed ({}, regex /{}/i).",
                opcode, config.name_filter
            ));
            self.say(&format!(
                "Candidate definitions: {}",
                state.pool.filtered().len()
            ));
        } else {
            self.say("Packet id finder disarmed.");
        }
    }

    fn say(&self, text: &str) {
        info!("{}", text);
        self.sink.message(text);
    }
}
