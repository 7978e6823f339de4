//! Message payloads used by the scenarios.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;

/// Random bytes encoded as printable text.
///
/// The service only relays text frames, so raw bytes are base64 encoded. The
/// result is at least `min_len` characters long.
pub fn printable(min_len: usize) -> String {
    let mut bytes = vec![0u8; min_len];
    rand::rng().fill_bytes(&mut bytes);
    STANDARD.encode(&bytes)
}

/// Numbered message used by the exchange and lifetime scenarios.
pub fn numbered(index: u32) -> String {
    format!("This is message #{index}")
}
