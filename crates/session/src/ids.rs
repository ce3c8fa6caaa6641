use std::fmt::{self, Write as _};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use snafu::{ResultExt, ensure};

use crate::error::{InvalidSessionIdSnafu, SessionError, SessionIdEntropySnafu, SessionResult};

/// Raw entropy drawn for one session id.
pub const SESSION_ID_BYTES: usize = 16;
/// Hex-encoded length of a session id.
pub const SESSION_ID_HEX_LEN: usize = SESSION_ID_BYTES * 2;

// Message and step ids share the view-model counter, so both wrappers stay structurally identical.
macro_rules! define_local_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }
    };
}

define_local_id!(MessageId);
define_local_id!(StepId);

/// Identifier correlating push events with the run started by this client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Draws 16 bytes from the OS CSPRNG and hex-encodes them.
    pub fn generate() -> SessionResult<Self> {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        getrandom::fill(&mut bytes).context(SessionIdEntropySnafu {
            stage: "generate-session-id",
        })?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn from_bytes(bytes: [u8; SESSION_ID_BYTES]) -> Self {
        let mut encoded = String::with_capacity(SESSION_ID_HEX_LEN);
        for byte in bytes {
            let _ = write!(encoded, "{byte:02x}");
        }
        Self(encoded)
    }

    pub fn parse(raw: &str) -> SessionResult<Self> {
        ensure!(
            raw.len() == SESSION_ID_HEX_LEN
                && raw
                    .bytes()
                    .all(|byte| byte.is_ascii_digit() || (b'a'..=b'f').contains(&byte)),
            InvalidSessionIdSnafu {
                stage: "parse-session-id",
                raw: raw.to_string(),
            }
        );
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when an inbound event tag refers to this session.
    pub fn matches(&self, tag: Option<&str>) -> bool {
        tag == Some(self.0.as_str())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl FromStr for SessionId {
    type Err = SessionError;

    fn from_str(raw: &str) -> SessionResult<Self> {
        Self::parse(raw)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_32_lowercase_hex_chars() {
        let first = SessionId::generate().expect("os rng available");
        let second = SessionId::generate().expect("os rng available");

        assert_eq!(first.as_str().len(), SESSION_ID_HEX_LEN);
        assert!(SessionId::parse(first.as_str()).is_ok());
        assert_ne!(first, second);
    }

    #[test]
    fn hex_encoding_zero_pads_each_byte() {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        bytes[0] = 0x0a;
        bytes[15] = 0xff;

        let id = SessionId::from_bytes(bytes);
        assert_eq!(id.as_str(), "0a0000000000000000000000000000ff");
    }

    #[test]
    fn parse_rejects_uppercase_and_wrong_length() {
        assert!(SessionId::parse("0A0000000000000000000000000000FF").is_err());
        assert!(SessionId::parse("abc").is_err());
    }

    #[test]
    fn matches_requires_present_equal_tag() {
        let id = SessionId::from_bytes([7u8; SESSION_ID_BYTES]);
        assert!(id.matches(Some(id.as_str())));
        assert!(!id.matches(None));
        assert!(!id.matches(Some("0707")));
    }
}
