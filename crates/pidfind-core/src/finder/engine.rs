//! Matching a packet against the whole candidate pool.

use super::pool::CandidatePool;
use super::verify::{verify, Verdict};
use super::{FinderConfig, MessageSink};
use crate::protocol::{RawPacket, Record, SchemaRegistry};
use tracing::{debug, info, warn};

/// A definition that reproduced the observed packet
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Definition name
    pub name: String,
    /// The packet decoded under this definition
    pub record: Record,
}

/// Every candidate accepted for one packet, in pool order
#[derive(Debug, Clone, PartialEq)]
pub struct MatchReport {
    /// Opcode of the observed packet
    pub opcode: u16,
    /// Accepted candidates; ties are all kept
    pub candidates: Vec<Candidate>,
}

impl MatchReport {
    /// Names of the accepted candidates
    pub fn names(&self) -> Vec<&str> {
        self.candidates.iter().map(|c| c.name.as_str()).collect()
    }

    /// The one-line summary
    pub fn summary(&self) -> String {
        format!(
            "Candidates for opcode {}: [{}].",
            self.opcode,
            self.names().join(", ")
        )
    }

    /// Writes the summary, and the decoded dumps if enabled, to the log and
    /// the sink.
    pub fn emit(&self, config: &FinderConfig, sink: &dyn MessageSink) {
        let summary = self.summary();
        info!("{}", summary);
        sink.message(&summary);

        if !config.emit_decoded {
            return;
        }
        for candidate in &self.candidates {
            match candidate.record.to_json_pretty() {
                Ok(json) => {
                    info!("{} as {}:\n{}", self.opcode, candidate.name, json);
                    sink.message(&format!("{} as {}:", self.opcode, candidate.name));
                    sink.message(&json);
                }
                Err(e) => warn!("Cannot render {} as {}: {}", self.opcode, candidate.name, e),
            }
        }
    }
}

/// Runs the gates and, if they pass, verifies every filtered candidate.
///
/// Returns `None` when a gate short-circuits or nothing was accepted.
pub fn on_observation(
    packet: &RawPacket,
    config: &FinderConfig,
    pool: &CandidatePool,
    registry: &dyn SchemaRegistry,
) -> Option<MatchReport> {
    if !config.armed {
        return None;
    }
    if config.opcode_filter.is_some_and(|opcode| opcode != packet.opcode) {
        return None;
    }
    if config.exclude_known && is_known_opcode(packet.opcode, pool, registry) {
        return None;
    }

    let candidates: Vec<Candidate> = pool
        .filtered()
        .iter()
        .filter_map(|name| {
            match verify(name, &packet.data, packet.opcode, packet.direction, registry) {
                Verdict::Accepted(record) => Some(Candidate {
                    name: name.clone(),
                    record,
                }),
                _ => None,
            }
        })
        .collect();

    debug!(
        "Opcode {} ({}, {} bytes): {} of {} candidates accepted",
        packet.opcode,
        packet.direction,
        packet.data.len(),
        candidates.len(),
        pool.filtered().len()
    );

    if candidates.is_empty() {
        return None;
    }
    Some(MatchReport {
        opcode: packet.opcode,
        candidates,
    })
}

/// An opcode is known if the registry maps it to a name that is not merely a
/// provisional placeholder.
fn is_known_opcode(opcode: u16, pool: &CandidatePool, registry: &dyn SchemaRegistry) -> bool {
    registry
        .name_for_code(opcode)
        .is_some_and(|name| !pool.is_provisional(name))
}
