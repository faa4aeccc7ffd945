//! The `fpi` control command.

use crate::error::{Error, Result};

/// Name filter that matches every definition
pub const MATCH_ALL: &str = ".*";

/// A parsed `fpi` invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Stop matching and reset both filters
    Disarm,
    /// Start matching, optionally restricted to one opcode
    Arm {
        /// Only packets with this opcode are examined
        opcode: Option<u16>,
        /// Regular expression over definition names
        pattern: String,
    },
    /// Flip whether decoded records are dumped with each match
    ToggleDecoded,
    /// Flip whether packets and definitions with a known opcode are skipped
    ToggleKnown,
}

impl Command {
    /// Interprets up to two command arguments.
    ///
    /// ```
    /// use pidfind_core::finder::Command;
    ///
    /// assert_eq!(Command::parse(None, None).unwrap(), Command::Disarm);
    /// assert_eq!(
    ///     Command::parse(Some("100"), Some("LOGIN")).unwrap(),
    ///     Command::Arm { opcode: Some(100), pattern: "LOGIN".into() },
    /// );
    /// ```
    pub fn parse(arg1: Option<&str>, arg2: Option<&str>) -> Result<Self> {
        let Some(arg1) = arg1 else {
            return Ok(Command::Disarm);
        };

        let lower = arg1.to_lowercase();
        if matches!(lower.as_str(), "d" | "disabled" | "false" | "no" | "0") {
            return Ok(Command::Disarm);
        }

        if !arg1.is_empty() && arg1.bytes().all(|b| b.is_ascii_digit()) {
            let opcode = arg1
                .parse::<u16>()
                .map_err(|_| Error::InvalidOpcode(arg1.to_string()))?;
            return Ok(Command::Arm {
                opcode: Some(opcode),
                pattern: arg2.unwrap_or(MATCH_ALL).to_string(),
            });
        }

        if lower == "json" {
            return Ok(Command::ToggleDecoded);
        }
        if matches!(arg1, "k" | "known" | "u" | "unk" | "unknown") {
            return Ok(Command::ToggleKnown);
        }

        Ok(Command::Arm {
            opcode: None,
            pattern: arg1.to_string(),
        })
    }

    /// Splits a command line (without the `fpi` word) on whitespace and parses
    /// the first two words.
    pub fn parse_line(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        Self::parse(words.next(), words.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn arm(opcode: Option<u16>, pattern: &str) -> Command {
        Command::Arm {
            opcode,
            pattern: pattern.to_string(),
        }
    }

    #[test]
    fn test_disarm_words() {
        for word in ["d", "disabled", "false", "no", "0", "D", "No", "FALSE"] {
            assert_eq!(Command::parse(Some(word), None).unwrap(), Command::Disarm, "{word}");
        }
        assert_eq!(Command::parse(None, Some("ignored")).unwrap(), Command::Disarm);
        assert_eq!(Command::parse_line("").unwrap(), Command::Disarm);
    }

    #[test]
    fn test_numeric_arms_with_opcode() {
        assert_eq!(Command::parse(Some("100"), None).unwrap(), arm(Some(100), MATCH_ALL));
        assert_eq!(Command::parse_line("100 LOGIN").unwrap(), arm(Some(100), "LOGIN"));
        assert_eq!(Command::parse(Some("00"), None).unwrap(), arm(Some(0), MATCH_ALL));
        assert!(matches!(
            Command::parse(Some("70000"), None),
            Err(Error::InvalidOpcode(_))
        ));
    }

    #[test]
    fn test_toggles() {
        assert_eq!(Command::parse(Some("json"), None).unwrap(), Command::ToggleDecoded);
        assert_eq!(Command::parse(Some("JSON"), None).unwrap(), Command::ToggleDecoded);
        for word in ["k", "known", "u", "unk", "unknown"] {
            assert_eq!(Command::parse(Some(word), None).unwrap(), Command::ToggleKnown);
        }
    }

    #[test]
    fn test_anything_else_is_a_pattern() {
        assert_eq!(Command::parse(Some("^S_CHAT"), None).unwrap(), arm(None, "^S_CHAT"));
        // Known-toggle words are case sensitive
        assert_eq!(Command::parse(Some("Known"), None).unwrap(), arm(None, "Known"));
        assert_eq!(Command::parse(Some("-1"), None).unwrap(), arm(None, "-1"));
    }
}
