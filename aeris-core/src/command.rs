//! Inbound command grammar
//!
//! Commands arrive as a single string payload on the command topic, fields
//! joined by `-`:
//!
//! ```text
//! reboot
//! update-<filename>[-<sha256>]
//! toggleled
//! changeinterval-<seconds>
//! syncds3231
//! config-<json dict>
//! logs
//! maintenance
//! ```
//!
//! Parsing is strict but failure is cheap: the dispatcher logs malformed
//! commands and drops them. There is no error reply channel.

use crate::errors::CommandError;

/// A parsed remote command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Restart the device after a one-second delay.
    Reboot,
    /// Download a replacement file over the air.
    Update {
        /// File to fetch and replace.
        filename: String,
        /// Optional sha256 hex digest to validate the download.
        checksum: Option<String>,
    },
    /// Toggle the status LED.
    ToggleLed,
    /// Change the steady-state tick interval, effective at the next sleep.
    ChangeInterval(u64),
    /// Re-sync the hardware RTC with the time source.
    SyncRtc,
    /// Apply runtime configuration overrides from a JSON dict.
    Config(serde_json::Map<String, serde_json::Value>),
    /// Publish the tail of the local log file to the status topic.
    Logs,
    /// Enter maintenance mode.
    Maintenance,
}

fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit())
}

impl Command {
    /// Parse one inbound payload. Whitespace is trimmed and the verb is
    /// case-insensitive, matching what operators actually type.
    pub fn parse(payload: &str) -> Result<Self, CommandError> {
        let payload = payload.trim();
        let (verb, rest) = match payload.split_once('-') {
            Some((verb, rest)) => (verb, Some(rest)),
            None => (payload, None),
        };

        match verb.to_ascii_lowercase().as_str() {
            "reboot" => Ok(Command::Reboot),
            "toggleled" => Ok(Command::ToggleLed),
            "syncds3231" => Ok(Command::SyncRtc),
            "logs" => Ok(Command::Logs),
            "maintenance" => Ok(Command::Maintenance),
            "update" => {
                let rest = rest.filter(|r| !r.is_empty()).ok_or_else(|| {
                    CommandError::BadArgument {
                        verb: "update",
                        reason: "missing filename".into(),
                    }
                })?;
                // A trailing 64-hex field is the checksum; filenames may
                // themselves contain dashes.
                match rest.rsplit_once('-') {
                    Some((filename, digest)) if is_sha256_hex(digest) && !filename.is_empty() => {
                        Ok(Command::Update {
                            filename: filename.to_string(),
                            checksum: Some(digest.to_ascii_lowercase()),
                        })
                    }
                    _ => Ok(Command::Update {
                        filename: rest.to_string(),
                        checksum: None,
                    }),
                }
            }
            "changeinterval" => {
                let rest = rest.unwrap_or_default();
                let seconds = rest
                    .parse::<u64>()
                    .map_err(|_| CommandError::BadArgument {
                        verb: "changeinterval",
                        reason: format!("not a number of seconds: {rest:?}"),
                    })?;
                if seconds == 0 {
                    return Err(CommandError::BadArgument {
                        verb: "changeinterval",
                        reason: "interval must be positive".into(),
                    });
                }
                Ok(Command::ChangeInterval(seconds))
            }
            "config" => {
                let rest = rest.unwrap_or_default();
                let value: serde_json::Value =
                    serde_json::from_str(rest).map_err(|e| CommandError::BadArgument {
                        verb: "config",
                        reason: e.to_string(),
                    })?;
                match value {
                    serde_json::Value::Object(map) => Ok(Command::Config(map)),
                    _ => Err(CommandError::BadArgument {
                        verb: "config",
                        reason: "expected a JSON object".into(),
                    }),
                }
            }
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}
