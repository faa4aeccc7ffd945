//! Packet definitions, the opcode map and the registry seam.
//!
//! The matching engine only talks to the [`SchemaRegistry`] trait. The
//! bundled [`DefinitionRegistry`] loads text definitions from disk and
//! encodes/decodes them with the format described in [`wire`].

mod definition;
mod record;
mod registry;
pub mod wire;

use crate::error::Result;
use std::fmt;

pub use definition::{parse_definition_filename, Definition, Field, FieldType};
pub use record::{Record, Value};
pub use registry::{DefinitionRegistry, OpcodeMap, RegistryConfig};

/// Which way a packet was travelling through the proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Server to client
    Incoming,
    /// Client to server
    Outgoing,
}

impl Direction {
    /// Returns true if a definition with this name may describe a packet
    /// travelling in this direction.
    ///
    /// `C_` names are client-originated and never arrive from the server;
    /// `S_` names are server-originated and never leave the client. Names
    /// without either prefix are allowed both ways.
    pub fn permits(self, name: &str) -> bool {
        match self {
            Direction::Incoming => !name.starts_with("C_"),
            Direction::Outgoing => !name.starts_with("S_"),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Incoming => f.write_str("incoming"),
            Direction::Outgoing => f.write_str("outgoing"),
        }
    }
}

/// A packet observed on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    /// Opcode from the packet header
    pub opcode: u16,
    /// Full packet bytes, header included
    pub data: Vec<u8>,
    /// Direction of travel
    pub direction: Direction,
    /// True if the packet was injected by the proxy rather than a peer
    pub synthetic: bool,
}

impl RawPacket {
    /// Creates a packet observation
    pub fn new(opcode: u16, data: impl Into<Vec<u8>>, direction: Direction) -> Self {
        Self {
            opcode,
            data: data.into(),
            direction,
            synthetic: false,
        }
    }

    /// Builds an observation from raw bytes, reading the opcode from the header
    pub fn from_bytes(data: impl Into<Vec<u8>>, direction: Direction) -> Option<Self> {
        let data = data.into();
        let opcode = wire::read_opcode(&data)?;
        Some(Self::new(opcode, data, direction))
    }

    /// Marks the packet as proxy-injected
    pub fn synthetic(mut self, synthetic: bool) -> Self {
        self.synthetic = synthetic;
        self
    }
}

/// Selects which version of a definition to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DefVersion {
    /// Highest available version (the wildcard context)
    #[default]
    Latest,
    /// A specific version
    Exact(u32),
}

/// Source of packet definitions and the opcode mapping.
///
/// Implementations must be deterministic: decoding the same bytes twice must
/// give the same record, and encoding must not depend on hidden state.
pub trait SchemaRegistry {
    /// Every definition name, de-duplicated, in registration order
    fn schema_names(&self) -> Vec<String>;

    /// Opcode mapped to `name` for the active protocol version
    fn code_for_name(&self, name: &str) -> Option<u16>;

    /// Name mapped to `code` for the active protocol version
    fn name_for_code(&self, code: u16) -> Option<&str>;

    /// Decode a full packet (header included) under `name`
    fn decode(&self, name: &str, version: DefVersion, data: &[u8]) -> Result<Record>;

    /// Encode `record` under `name`, writing `opcode` into the header
    fn encode(&self, name: &str, version: DefVersion, record: &Record, opcode: u16)
        -> Result<Vec<u8>>;
}
