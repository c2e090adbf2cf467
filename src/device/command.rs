use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// Every command (except the escape stop) ends with a carriage return.
pub const TERMINATOR: u8 = b'\r';
const ESCAPE: u8 = 0x1b;

// ---------------------------------------------------------------------------
// Power supply command sets
// ---------------------------------------------------------------------------

/// Which supply is on the other end of the port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Dialect {
    /// BK Precision 1696-series programmable supply.
    #[default]
    BkPrecision,
    /// MasTech supply behind a PSoC UART bridge.
    Mastech,
}

impl Dialect {
    pub fn name(self) -> &'static str {
        match self {
            Dialect::BkPrecision => "BK Precision",
            Dialect::Mastech => "MasTech",
        }
    }

    /// Whether the supply answers each command with a `\r`-terminated line.
    pub fn acknowledges(self) -> bool {
        matches!(self, Dialect::BkPrecision)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The commands this program actually issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PowerSupplyCommand {
    /// Connect the outputs.
    OutputOn,
    /// Run a stored program. BK: repeat count; MasTech: slot number.
    Run { slot: u16 },
    /// Stop whatever is running.
    Stop,
    /// Ask for the maximum voltage / current.
    QueryMaxRatings,
    /// Free-form text typed by the user.
    Raw(String),
}

impl PowerSupplyCommand {
    fn name(&self) -> &'static str {
        match self {
            PowerSupplyCommand::OutputOn => "output on",
            PowerSupplyCommand::Run { .. } => "run",
            PowerSupplyCommand::Stop => "stop",
            PowerSupplyCommand::QueryMaxRatings => "query max ratings",
            PowerSupplyCommand::Raw(_) => "raw",
        }
    }

    /// Wire bytes for this command in the given dialect.
    pub fn encode(&self, dialect: Dialect, address: u8) -> Result<Vec<u8>, ChannelError> {
        let text = match (dialect, self) {
            (Dialect::BkPrecision, PowerSupplyCommand::OutputOn) => format!("SOUT{address:02}0\r"),
            (Dialect::BkPrecision, PowerSupplyCommand::Run { slot }) => {
                format!("RUNP{address:02}{slot:04}\r")
            }
            (Dialect::BkPrecision, PowerSupplyCommand::Stop) => format!("STOP{address:02}\r"),
            (Dialect::BkPrecision, PowerSupplyCommand::QueryMaxRatings) => {
                format!("GMAX{address:02}\r")
            }
            (Dialect::Mastech, PowerSupplyCommand::Run { slot }) => format!("R {slot}\r"),
            (Dialect::Mastech, PowerSupplyCommand::Stop) => return Ok(vec![ESCAPE]),
            (_, PowerSupplyCommand::Raw(text)) => format!("{text}\r"),
            (Dialect::Mastech, other) => {
                return Err(ChannelError::Unsupported {
                    command: other.name(),
                    dialect: dialect.name(),
                })
            }
        };
        Ok(text.into_bytes())
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Answer to [`PowerSupplyCommand::QueryMaxRatings`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaxRatings {
    pub volts: f64,
    pub amps: f64,
}

impl MaxRatings {
    /// Parse a `VVVCCC` reply: volts in tenths, amps in hundredths.
    pub fn parse(response: &[u8]) -> Result<Self, ChannelError> {
        let text = String::from_utf8_lossy(response);
        let digits = text.trim();
        let bad = || ChannelError::BadResponse(text.to_string());
        if digits.len() < 6 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(bad());
        }
        let volts: u32 = digits[0..3].parse().map_err(|_| bad())?;
        let amps: u32 = digits[3..6].parse().map_err(|_| bad())?;
        Ok(Self {
            volts: volts as f64 / 10.0,
            amps: amps as f64 / 100.0,
        })
    }
}

/// Render bytes for the console: printable ASCII as-is, the rest escaped.
pub fn printable(bytes: &[u8]) -> String {
    bytes.escape_ascii().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bk_commands_are_fixed_width() {
        let enc = |c: PowerSupplyCommand| c.encode(Dialect::BkPrecision, 0).unwrap();
        assert_eq!(enc(PowerSupplyCommand::OutputOn), b"SOUT000\r");
        assert_eq!(enc(PowerSupplyCommand::Run { slot: 1 }), b"RUNP000001\r");
        assert_eq!(enc(PowerSupplyCommand::Stop), b"STOP00\r");
        assert_eq!(enc(PowerSupplyCommand::QueryMaxRatings), b"GMAX00\r");
    }

    #[test]
    fn mastech_uses_slot_and_escape() {
        let run = PowerSupplyCommand::Run { slot: 3 }
            .encode(Dialect::Mastech, 0)
            .unwrap();
        assert_eq!(run, b"R 3\r");
        let stop = PowerSupplyCommand::Stop.encode(Dialect::Mastech, 0).unwrap();
        assert_eq!(stop, vec![0x1b]);
        assert!(matches!(
            PowerSupplyCommand::QueryMaxRatings.encode(Dialect::Mastech, 0),
            Err(ChannelError::Unsupported { .. })
        ));
    }

    #[test]
    fn max_ratings_reply_is_decoded() {
        let r = MaxRatings::parse(b"180200\r").unwrap();
        assert_eq!(r.volts, 18.0);
        assert_eq!(r.amps, 2.0);
        assert!(MaxRatings::parse(b"OK\r").is_err());
    }

    #[test]
    fn escape_byte_is_printable() {
        assert_eq!(printable(b"STOP00\r"), "STOP00\\r");
        assert_eq!(printable(&[0x1b]), "\\x1b");
    }
}
