//! JSON frames exchanged with the pairing service.

use crate::error::{HarnessError, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Control frame sent by the service right after a connection is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Path the peer must connect to, e.g. `/v1/ws/<id>`.
    pub link: String,
    /// Identifier of the channel this connection belongs to.
    pub channel_id: String,
}

#[derive(Deserialize)]
struct RawHandshake {
    link: String,
    #[serde(default, alias = "channel_id", alias = "channelId")]
    channelid: Option<String>,
}

impl Handshake {
    /// Decode a handshake frame.
    ///
    /// The channel identifier comes from the `channelid` field when present,
    /// otherwise from the last segment of `link`.
    pub fn parse(text: &str) -> Result<Self> {
        let raw: RawHandshake =
            serde_json::from_str(text).map_err(|e| HarnessError::Handshake(e.to_string()))?;

        let channel_id = match raw.channelid {
            Some(id) if !id.is_empty() => id,
            _ => link_tail(&raw.link).to_string(),
        };
        if channel_id.is_empty() {
            return Err(HarnessError::Handshake(format!(
                "no channel id in frame and none derivable from link {:?}",
                raw.link
            )));
        }

        Ok(Self {
            link: raw.link,
            channel_id,
        })
    }

    /// The link with its channel segment removed (`/v1/ws/abc` → `/v1/ws`).
    pub fn link_base(&self) -> &str {
        self.link
            .trim_end_matches('/')
            .rsplit_once('/')
            .map(|(base, _)| base)
            .unwrap_or("")
    }
}

/// Last non-empty path segment of a link.
pub fn link_tail(link: &str) -> &str {
    link.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}

/// A message relayed by the service from the other party.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayFrame {
    /// The payload exactly as the sender sent it.
    pub message: String,
    /// Metadata the service attaches about the sender.
    pub sender: Map<String, Value>,
}

impl RelayFrame {
    /// Decode a relay frame.
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| HarnessError::Frame(format!("{e}: {text:.80}")))
    }

    /// Whether the sender metadata identifies a remote originator.
    pub fn has_remote_sender(&self) -> bool {
        self.sender.contains_key("remote")
    }
}
