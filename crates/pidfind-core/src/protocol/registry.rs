//! On-disk definition registry.
//!
//! Layout of a definitions directory:
//!
//! ```text
//! defs/
//!   protocol.376012.map      # opcode map for protocol version 376012
//!   C_LOGIN.1.def
//!   C_LOGIN.2.def
//!   S_LOGIN_RESULT.1.def
//!   chat/S_CHAT.4.def        # subdirectories are walked too
//! ```

use super::definition::{parse_definition_filename, Definition};
use super::record::Record;
use super::wire;
use super::{DefVersion, SchemaRegistry};
use crate::error::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Configuration for loading a [`DefinitionRegistry`]
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// Protocol version whose opcode map is loaded
    pub protocol_version: u32,
    /// Explicit map file, instead of `protocol.<version>.map` in the root
    pub map_file: Option<PathBuf>,
}

impl RegistryConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the protocol version
    pub fn protocol_version(mut self, version: u32) -> Self {
        self.protocol_version = version;
        self
    }

    /// Sets an explicit opcode map file
    pub fn map_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.map_file = Some(path.into());
        self
    }
}

/// Two-way mapping between definition names and opcodes
#[derive(Debug, Clone, Default)]
pub struct OpcodeMap {
    by_name: HashMap<String, u16>,
    by_code: HashMap<u16, String>,
}

impl OpcodeMap {
    /// Creates an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses map text: one `NAME CODE` or `NAME = CODE` per line
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let mut map = Self::new();

        for (index, raw_line) in text.lines().enumerate() {
            let line = match raw_line.find('#') {
                Some(idx) => &raw_line[..idx],
                None => raw_line,
            }
            .trim();
            if line.is_empty() {
                continue;
            }

            let parts: Vec<&str> = line
                .split(|c: char| c.is_whitespace() || c == '=')
                .filter(|part| !part.is_empty())
                .collect();
            let [name, code] = parts.as_slice() else {
                return Err(Error::definition_parse(
                    path,
                    index + 1,
                    format!("expected 'NAME CODE', found '{}'", line),
                ));
            };
            let code: u16 = code.parse().map_err(|_| {
                Error::definition_parse(path, index + 1, format!("invalid opcode '{}'", code))
            })?;

            if let Some(existing) = map.by_code.get(&code) {
                return Err(Error::definition_parse(
                    path,
                    index + 1,
                    format!("opcode {} already mapped to {}", code, existing),
                ));
            }
            if map.by_name.contains_key(*name) {
                return Err(Error::definition_parse(
                    path,
                    index + 1,
                    format!("{} mapped twice", name),
                ));
            }
            map.insert(*name, code);
        }

        Ok(map)
    }

    /// Adds a mapping, replacing any previous mapping for either side
    pub fn insert(&mut self, name: impl Into<String>, code: u16) {
        let name = name.into();
        if let Some(old_code) = self.by_name.insert(name.clone(), code) {
            if old_code != code {
                self.by_code.remove(&old_code);
            }
        }
        if let Some(old_name) = self.by_code.insert(code, name.clone()) {
            if old_name != name {
                self.by_name.remove(&old_name);
            }
        }
    }

    /// Opcode for a name
    pub fn code(&self, name: &str) -> Option<u16> {
        self.by_name.get(name).copied()
    }

    /// Name for an opcode
    pub fn name(&self, code: u16) -> Option<&str> {
        self.by_code.get(&code).map(String::as_str)
    }

    /// Number of mappings
    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    /// Returns true if nothing is mapped
    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

/// Registry backed by text definitions
#[derive(Debug, Clone, Default)]
pub struct DefinitionRegistry {
    protocol_version: u32,
    /// Names in first-registration order
    names: Vec<String>,
    definitions: HashMap<String, BTreeMap<u32, Definition>>,
    opcodes: OpcodeMap,
}

impl DefinitionRegistry {
    /// Creates an empty registry for a protocol version
    pub fn new(protocol_version: u32) -> Self {
        Self {
            protocol_version,
            ..Self::default()
        }
    }

    /// Loads every `NAME.VERSION.def` under `dir` plus the opcode map
    pub fn load(dir: impl AsRef<Path>, config: &RegistryConfig) -> Result<Self> {
        let dir = dir.as_ref();
        let mut registry = Self::new(config.protocol_version);

        for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|source| Error::DirectoryWalk {
                path: dir.to_path_buf(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let Some(file_name) = entry.file_name().to_str() else {
                continue;
            };
            let Some((name, version)) = parse_definition_filename(file_name) else {
                trace!("Skipping non-definition file: {}", entry.path().display());
                continue;
            };

            let text = fs::read_to_string(entry.path())
                .map_err(|e| Error::file_read(entry.path(), e))?;
            let definition = Definition::parse(name, version, &text, entry.path())?;
            registry.add_definition(definition);
        }

        match &config.map_file {
            Some(map_path) => registry.opcodes = read_opcode_map(map_path)?,
            None => {
                let map_path = dir.join(format!("protocol.{}.map", config.protocol_version));
                if map_path.is_file() {
                    registry.opcodes = read_opcode_map(&map_path)?;
                } else {
                    debug!("No opcode map at {}, all opcodes unknown", map_path.display());
                }
            }
        }

        debug!(
            "Loaded {} definitions and {} opcodes from {}",
            registry.names.len(),
            registry.opcodes.len(),
            dir.display()
        );
        Ok(registry)
    }

    /// Registers one version of a definition
    pub fn add_definition(&mut self, definition: Definition) {
        if !self.definitions.contains_key(&definition.name) {
            self.names.push(definition.name.clone());
        }
        self.definitions
            .entry(definition.name.clone())
            .or_default()
            .insert(definition.version, definition);
    }

    /// Replaces the opcode map
    pub fn set_opcodes(&mut self, opcodes: OpcodeMap) {
        self.opcodes = opcodes;
    }

    /// Builder form of [`DefinitionRegistry::set_opcodes`]
    pub fn with_opcodes(mut self, opcodes: OpcodeMap) -> Self {
        self.opcodes = opcodes;
        self
    }

    /// Active protocol version
    pub fn protocol_version(&self) -> u32 {
        self.protocol_version
    }

    /// The opcode map for the active protocol version
    pub fn opcodes(&self) -> &OpcodeMap {
        &self.opcodes
    }

    /// Resolves a definition by name and version selector
    pub fn definition(&self, name: &str, version: DefVersion) -> Result<&Definition> {
        let versions = self
            .definitions
            .get(name)
            .ok_or_else(|| Error::UnknownDefinition(name.to_string()))?;
        let found = match version {
            DefVersion::Latest => versions.values().next_back(),
            DefVersion::Exact(v) => versions.get(&v),
        };
        found.ok_or_else(|| Error::UnknownDefinition(name.to_string()))
    }
}

fn read_opcode_map(path: &Path) -> Result<OpcodeMap> {
    let text = fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
    OpcodeMap::parse(&text, path)
}

impl SchemaRegistry for DefinitionRegistry {
    fn schema_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn code_for_name(&self, name: &str) -> Option<u16> {
        self.opcodes.code(name)
    }

    fn name_for_code(&self, code: u16) -> Option<&str> {
        self.opcodes.name(code)
    }

    fn decode(&self, name: &str, version: DefVersion, data: &[u8]) -> Result<Record> {
        wire::decode_packet(self.definition(name, version)?, data)
    }

    fn encode(
        &self,
        name: &str,
        version: DefVersion,
        record: &Record,
        opcode: u16,
    ) -> Result<Vec<u8>> {
        wire::encode_packet(self.definition(name, version)?, record, opcode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Value;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, text: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, text).unwrap();
    }

    #[test]
    fn test_opcode_map_parse() {
        let text = "# map\nC_LOGIN 100\nS_LOGIN_RESULT = 101\n\n";
        let map = OpcodeMap::parse(text, Path::new("protocol.1.map")).unwrap();
        assert_eq!(map.code("C_LOGIN"), Some(100));
        assert_eq!(map.name(101), Some("S_LOGIN_RESULT"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_opcode_map_parse_errors() {
        let path = Path::new("protocol.1.map");
        assert!(OpcodeMap::parse("C_LOGIN\n", path).is_err());
        assert!(OpcodeMap::parse("C_LOGIN 70000\n", path).is_err());
        assert!(OpcodeMap::parse("C_A 1\nC_B 1\n", path).is_err());
        assert!(OpcodeMap::parse("C_A 1\nC_A 2\n", path).is_err());
    }

    #[test]
    fn test_opcode_map_insert_replaces() {
        let mut map = OpcodeMap::new();
        map.insert("C_A", 1);
        map.insert("C_A", 2);
        assert_eq!(map.code("C_A"), Some(2));
        assert_eq!(map.name(1), None);
        assert_eq!(map.name(2), Some("C_A"));
    }

    #[test]
    fn test_load_directory() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        write(dir, "C_LOGIN.1.def", "uint32 id\n");
        write(dir, "C_LOGIN.2.def", "uint32 id\nstring name\n");
        write(dir, "chat/S_CHAT.1.def", "string text\n");
        write(dir, "README.md", "not a definition");
        write(dir, "protocol.7.map", "C_LOGIN 100\n");

        let registry =
            DefinitionRegistry::load(dir, &RegistryConfig::new().protocol_version(7)).unwrap();

        assert_eq!(registry.schema_names(), vec!["C_LOGIN", "S_CHAT"]);
        assert_eq!(registry.code_for_name("C_LOGIN"), Some(100));
        assert_eq!(registry.name_for_code(100), Some("C_LOGIN"));
        assert_eq!(registry.code_for_name("S_CHAT"), None);
        assert_eq!(registry.definition("C_LOGIN", DefVersion::Latest).unwrap().version, 2);
        assert_eq!(registry.definition("C_LOGIN", DefVersion::Exact(1)).unwrap().fields.len(), 1);
        assert!(registry.definition("C_LOGIN", DefVersion::Exact(3)).is_err());
    }

    #[test]
    fn test_load_without_map() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "S_CHAT.1.def", "string text\n");

        let registry = DefinitionRegistry::load(temp_dir.path(), &RegistryConfig::new()).unwrap();
        assert!(registry.opcodes().is_empty());
        assert_eq!(registry.schema_names(), vec!["S_CHAT"]);
    }

    #[test]
    fn test_load_explicit_map_file() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "S_CHAT.1.def", "string text\n");
        write(temp_dir.path(), "maps/live.map", "S_CHAT 20\n");

        let config = RegistryConfig::new().map_file(temp_dir.path().join("maps/live.map"));
        let registry = DefinitionRegistry::load(temp_dir.path(), &config).unwrap();
        assert_eq!(registry.name_for_code(20), Some("S_CHAT"));

        let config = RegistryConfig::new().map_file(temp_dir.path().join("missing.map"));
        let err = DefinitionRegistry::load(temp_dir.path(), &config).unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
    }

    #[test]
    fn test_load_reports_bad_definition() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "S_CHAT.1.def", "string\n");

        let err = DefinitionRegistry::load(temp_dir.path(), &RegistryConfig::new()).unwrap_err();
        assert!(matches!(err, Error::DefinitionParse { line: 1, .. }));
    }

    #[test]
    fn test_decode_encode_through_registry() {
        let text = "uint16 x\n";
        let mut registry = DefinitionRegistry::new(1);
        registry.add_definition(Definition::parse("S_X", 1, text, Path::new("S_X.1.def")).unwrap());

        let record = registry.decode("S_X", DefVersion::Latest, &[6, 0, 9, 0, 5, 0]).unwrap();
        assert_eq!(record.get("x"), Some(&Value::UInt16(5)));
        assert_eq!(
            registry.encode("S_X", DefVersion::Latest, &record, 9).unwrap(),
            vec![6, 0, 9, 0, 5, 0]
        );
        assert!(matches!(
            registry.decode("S_MISSING", DefVersion::Latest, &[4, 0, 0, 0]),
            Err(Error::UnknownDefinition(_))
        ));
    }
}
