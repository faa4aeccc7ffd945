//! Round-trip verification of a single candidate.
//!
//! A candidate is accepted only when decoding the observed bytes under it and
//! encoding the result again (with the observed opcode) reproduces the input
//! byte for byte.

use crate::protocol::{DefVersion, Direction, Record, SchemaRegistry};
use tracing::trace;

/// Outcome of checking one candidate against one packet
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Round trip reproduced the packet; carries the decoded record
    Accepted(Record),
    /// Naming convention says the definition flows the other way
    WrongDirection,
    /// The bytes do not decode under the definition
    DecodeFailed,
    /// The decoded record could not be encoded again
    EncodeFailed,
    /// Re-encoded bytes differ from the observed packet
    Mismatch,
}

impl Verdict {
    /// Returns true for [`Verdict::Accepted`]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted(_))
    }

    /// The decoded record, if accepted
    pub fn into_record(self) -> Option<Record> {
        match self {
            Verdict::Accepted(record) => Some(record),
            _ => None,
        }
    }
}

/// Checks whether `name` plausibly describes `data`. Never fails: registry
/// errors become rejections.
pub fn verify(
    name: &str,
    data: &[u8],
    opcode: u16,
    direction: Direction,
    registry: &dyn SchemaRegistry,
) -> Verdict {
    if !direction.permits(name) {
        return Verdict::WrongDirection;
    }

    let record = match registry.decode(name, DefVersion::Latest, data) {
        Ok(record) => record,
        Err(e) => {
            trace!("{} rejected: {}", name, e);
            return Verdict::DecodeFailed;
        }
    };

    match definition_is_wrong(name, &record, data, opcode, direction, registry) {
        Some(verdict) => verdict,
        None => Verdict::Accepted(record),
    }
}

/// Returns the rejection verdict if the decoded record does not reproduce
/// `data`, or `None` if it does.
fn definition_is_wrong(
    name: &str,
    record: &Record,
    data: &[u8],
    opcode: u16,
    direction: Direction,
    registry: &dyn SchemaRegistry,
) -> Option<Verdict> {
    if !direction.permits(name) {
        return Some(Verdict::WrongDirection);
    }

    let encoded = match registry.encode(name, DefVersion::Latest, record, opcode) {
        Ok(encoded) => encoded,
        Err(e) => {
            trace!("{} rejected on re-encode: {}", name, e);
            return Some(Verdict::EncodeFailed);
        }
    };

    if encoded.len() != data.len() || encoded != data {
        trace!(
            "{} rejected: re-encoded {} bytes, observed {}",
            name,
            encoded.len(),
            data.len()
        );
        return Some(Verdict::Mismatch);
    }
    None
}
