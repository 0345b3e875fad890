//! Minimal hex encode/decode, used by the v2.1 proof construction and for
//! nonce/id generation. Kept local rather than pulling in another crate for
//! a handful of lines of formatting.

pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    bytes
        .as_ref()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
