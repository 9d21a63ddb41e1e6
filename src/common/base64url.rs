//! base64url encoding used for the `raw` field of outbound messages and for
//! decoding the unverified payload segment of a provider ID token.
//!
//! This is the "unpadded" variant the provider APIs expect: standard base64
//! alphabet with `+` -> `-`, `/` -> `_`, and trailing `=` padding stripped.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(s)
}
