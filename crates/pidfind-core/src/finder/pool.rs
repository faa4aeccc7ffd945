//! Candidate definition pool.

use super::FinderConfig;
use crate::error::{Error, Result};
use crate::protocol::SchemaRegistry;
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;
use tracing::debug;

/// Opcode reserved for "provisionally tracked, no real mapping"
pub const SENTINEL_OPCODE: u16 = u16::MAX;

/// The full set of definition names and the filtered subset eligible for
/// matching.
#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    all: Vec<String>,
    filtered: Vec<String>,
    /// Names annotated with [`SENTINEL_OPCODE`]; only ever grows
    provisional: HashSet<String>,
}

impl CandidatePool {
    /// Snapshots every name the registry knows. The filtered set starts empty.
    pub fn new(registry: &dyn SchemaRegistry) -> Self {
        let mut seen = HashSet::new();
        let all = registry
            .schema_names()
            .into_iter()
            .filter(|name| seen.insert(name.clone()))
            .collect();

        Self {
            all,
            filtered: Vec::new(),
            provisional: HashSet::new(),
        }
    }

    /// Recomputes the filtered set for `config`.
    ///
    /// On an invalid name filter the previous filtered set is kept.
    pub fn rebuild(&mut self, config: &FinderConfig, registry: &dyn SchemaRegistry) -> Result<()> {
        let regex = compile_filter(&config.name_filter)?;

        let mut filtered = Vec::new();
        for name in &self.all {
            let known = is_known_code(registry.code_for_name(name));
            if known && config.exclude_known {
                continue;
            }
            if regex.is_match(name) {
                if !known {
                    self.provisional.insert(name.clone());
                }
                filtered.push(name.clone());
            }
        }

        debug!(
            "Candidate pool rebuilt: {} of {} definitions match /{}/i",
            filtered.len(),
            self.all.len(),
            config.name_filter
        );
        self.filtered = filtered;
        Ok(())
    }

    /// Every definition name, in registry order
    pub fn all(&self) -> &[String] {
        &self.all
    }

    /// Names eligible for matching, in registry order
    pub fn filtered(&self) -> &[String] {
        &self.filtered
    }

    /// Opcode annotation for a name that has no real mapping
    pub fn provisional_opcode(&self, name: &str) -> Option<u16> {
        self.provisional.contains(name).then_some(SENTINEL_OPCODE)
    }

    /// Returns true if `name` carries the sentinel annotation
    pub fn is_provisional(&self, name: &str) -> bool {
        self.provisional.contains(name)
    }
}

/// An opcode counts as a real mapping unless absent or the sentinel
pub fn is_known_code(code: Option<u16>) -> bool {
    matches!(code, Some(code) if code != SENTINEL_OPCODE)
}

fn compile_filter(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| Error::invalid_filter(pattern, e))
}
