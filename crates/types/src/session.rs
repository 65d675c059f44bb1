//! Session identity: the 32-byte hex hash that names one protocol run and
//! the stream protocol id derived from it (spec §3, §4.5).

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte hex string identifying one protocol run.
///
/// For signing this is `keccak256(message)`; for DKG it is randomly chosen
/// by the originator. It also names the protocol id `/<hash>/1.0.0` used to
/// demultiplex inbound peer streams onto this session's engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionHash(String);

impl SessionHash {
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The protocol id this session's stream handler is installed on.
    ///
    /// Self-host split ids carry a `-N` suffix (`<hash>-0`, `-1`, `-2`) used
    /// only to separate store keys; the three in-process nodes must still
    /// install handlers under the *same* protocol id, so the suffix is
    /// stripped here (§9 "Self-host split session ids").
    pub fn protocol_id(&self) -> String {
        let base = self.root_hash();
        format!("/{base}/1.0.0")
    }

    /// The hash with any self-host `-N` suffix stripped.
    pub fn root_hash(&self) -> &str {
        match self.0.split_once('-') {
            Some((root, _)) => root,
            None => &self.0,
        }
    }

    /// Build the `"<hash>-<n>"` sub-session id used by the self-host harness.
    pub fn sub_session(&self, n: u8) -> SessionHash {
        SessionHash(format!("{}-{}", self.0, n))
    }
}

impl fmt::Display for SessionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionHash {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionHash {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Which protocol a Session is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionRole {
    Dkg,
    Sign,
    Reshare,
}

impl fmt::Display for SessionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionRole::Dkg => write!(f, "dkg"),
            SessionRole::Sign => write!(f, "sign"),
            SessionRole::Reshare => write!(f, "reshare"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_id_strips_self_host_suffix() {
        let hash = SessionHash::new("abc123-1");
        assert_eq!(hash.protocol_id(), "/abc123/1.0.0");
        assert_eq!(hash.root_hash(), "abc123");
    }

    #[test]
    fn protocol_id_plain_hash() {
        let hash = SessionHash::new("abc123");
        assert_eq!(hash.protocol_id(), "/abc123/1.0.0");
    }

    #[test]
    fn sub_session_appends_suffix() {
        let hash = SessionHash::new("deadbeef");
        assert_eq!(hash.sub_session(0).as_str(), "deadbeef-0");
        assert_eq!(hash.sub_session(2).as_str(), "deadbeef-2");
    }
}
