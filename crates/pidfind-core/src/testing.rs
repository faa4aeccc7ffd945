//! Shared fixtures for unit tests.

use crate::error::Result;
use crate::finder::MessageSink;
use crate::protocol::{
    DefVersion, Definition, DefinitionRegistry, OpcodeMap, Record, SchemaRegistry,
};
use std::cell::{Cell, RefCell};
use std::path::Path;

const BASE_DEFINITIONS: &[(&str, &str)] = &[
    ("C_LOGIN", "uint32 account\nstring name\n"),
    ("S_LOGIN_RESULT", "uint32 account\nstring name\n"),
    ("C_MOVE", "vec3 pos\nint16 heading\n"),
];

/// Registry with `C_LOGIN`, `S_LOGIN_RESULT`, `C_MOVE` (in that order),
/// followed by `extra` definitions, and the given opcode mappings.
pub(crate) fn registry(opcodes: &[(&str, u16)], extra: &[(&str, &str)]) -> DefinitionRegistry {
    let mut registry = DefinitionRegistry::new(1);
    for &(name, text) in BASE_DEFINITIONS {
        registry.add_definition(Definition::parse(name, 1, text, Path::new(name)).unwrap());
    }
    for &(name, text) in extra {
        registry.add_definition(Definition::parse(name, 1, text, Path::new(name)).unwrap());
    }

    let mut map = OpcodeMap::new();
    for &(name, code) in opcodes {
        map.insert(name, code);
    }
    registry.with_opcodes(map)
}

/// A `C_LOGIN`/`S_LOGIN_RESULT` shaped packet
pub(crate) fn login_packet(opcode: u16, account: u32, name: &str) -> Vec<u8> {
    let total = (4 + 4 + 2 + name.len()) as u16;
    let mut data = Vec::new();
    data.extend_from_slice(&total.to_le_bytes());
    data.extend_from_slice(&opcode.to_le_bytes());
    data.extend_from_slice(&account.to_le_bytes());
    data.extend_from_slice(&(name.len() as u16).to_le_bytes());
    data.extend_from_slice(name.as_bytes());
    data
}

/// Wraps a registry and counts codec calls
pub(crate) struct CountingRegistry {
    inner: DefinitionRegistry,
    decodes: Cell<usize>,
    encodes: Cell<usize>,
}

impl CountingRegistry {
    pub(crate) fn new(inner: DefinitionRegistry) -> Self {
        Self {
            inner,
            decodes: Cell::new(0),
            encodes: Cell::new(0),
        }
    }

    pub(crate) fn decodes(&self) -> usize {
        self.decodes.get()
    }

    pub(crate) fn calls(&self) -> usize {
        self.decodes.get() + self.encodes.get()
    }
}

impl SchemaRegistry for CountingRegistry {
    fn schema_names(&self) -> Vec<String> {
        self.inner.schema_names()
    }

    fn code_for_name(&self, name: &str) -> Option<u16> {
        self.inner.code_for_name(name)
    }

    fn name_for_code(&self, code: u16) -> Option<&str> {
        self.inner.name_for_code(code)
    }

    fn decode(&self, name: &str, version: DefVersion, data: &[u8]) -> Result<Record> {
        self.decodes.set(self.decodes.get() + 1);
        self.inner.decode(name, version, data)
    }

    fn encode(
        &self,
        name: &str,
        version: DefVersion,
        record: &Record,
        opcode: u16,
    ) -> Result<Vec<u8>> {
        self.encodes.set(self.encodes.get() + 1);
        self.inner.encode(name, version, record, opcode)
    }
}

/// Sink that keeps every message
#[derive(Debug, Default)]
pub(crate) struct MessageLog {
    lines: RefCell<Vec<String>>,
}

impl MessageLog {
    pub(crate) fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }
}

impl MessageSink for MessageLog {
    fn message(&self, text: &str) {
        self.lines.borrow_mut().push(text.to_string());
    }
}
