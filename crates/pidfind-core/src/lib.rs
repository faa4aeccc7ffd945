//! # pidfind-core
//!
//! A library for working out which packet definition an unknown opcode uses,
//! by brute-force round-trip validation against a pool of known definitions.
//!
//! This crate provides the core functionality for:
//! - Loading text packet definitions and opcode maps
//! - Decoding and re-encoding packets under a definition
//! - Filtering the candidate pool and matching observed packets against it
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`protocol`]: Definitions, wire codec and the registry seam
//! - [`finder`]: Candidate pool, round-trip verifier, matching engine and the
//!   `fpi` command
//! - [`hook`]: Ordered raw-packet subscriptions
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use pidfind_core::{DefinitionRegistry, Direction, HookBus, PacketIdFinder, RawPacket, RegistryConfig};
//! use std::rc::Rc;
//!
//! let registry = DefinitionRegistry::load("./defs", &RegistryConfig::new().protocol_version(376012))?;
//! let sink = |line: &str| println!("{}", line);
//! let mut finder = PacketIdFinder::new(Rc::new(registry), Rc::new(sink));
//! let mut bus = HookBus::new();
//!
//! // Arm for opcode 100, trying only definitions whose name contains LOGIN
//! finder.handle_command(Some("100"), Some("LOGIN"), &mut bus)?;
//!
//! let packet = RawPacket::from_bytes(vec![8, 0, 100, 0, 1, 0, 0, 0], Direction::Outgoing).unwrap();
//! bus.deliver(&packet);
//!
//! finder.shutdown(&mut bus);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Extensibility
//!
//! - [`SchemaRegistry`]: Plug in a different definition source or codec
//! - [`MessageSink`]: Route status and result lines anywhere
//!

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod error;
pub mod finder;
pub mod hook;
pub mod protocol;

#[cfg(test)]
mod testing;

// Re-export primary types for convenience
pub use error::{Error, Result};
pub use finder::{Command, FinderConfig, MatchReport, MessageSink, PacketIdFinder, Verdict};
pub use hook::{HookBus, HookFilter, HookId};
pub use protocol::{
    DefVersion, Definition, DefinitionRegistry, Direction, OpcodeMap, RawPacket, Record,
    RegistryConfig, SchemaRegistry, Value,
};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
