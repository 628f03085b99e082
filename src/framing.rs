//! Checksum framing for native payloads.
//!
//! Wire layout:
//!
//! ```text
//! MM\n
//! <40 lowercase hex chars of SHA-1(payload)>\n
//! <payload bytes>
//! ```
//!
//! Firmware reads the two header lines, skips the refresh when the digest
//! matches the one it last displayed, and otherwise streams the payload into
//! the panel driver.

use sha1::{Digest, Sha1};

use crate::error::Error;

/// Magic line that opens every frame.
pub const MAGIC: &[u8] = b"MM\n";

/// Length of the hex digest line, excluding its newline.
pub const DIGEST_HEX_LEN: usize = 40;

/// Total header length: magic line plus digest line.
pub const HEADER_LEN: usize = MAGIC.len() + DIGEST_HEX_LEN + 1;

/// Lowercase hex SHA-1 of `payload`.
pub fn checksum_hex(payload: &[u8]) -> String {
    let digest = Sha1::digest(payload);
    let mut out = String::with_capacity(DIGEST_HEX_LEN);
    for b in digest {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// Prepend the magic line and digest line to `payload`.
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let checksum = checksum_hex(payload);
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(checksum.as_bytes());
    out.push(b'\n');
    out.extend_from_slice(payload);
    out
}

/// A parsed, digest-verified frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<'a> {
    /// Hex digest from the header
    pub checksum: &'a str,
    /// Packed bit-plane payload
    pub payload: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Split a framed buffer and verify its digest.
    ///
    /// ```
    /// use epaper_bitmap::framing::{frame, Frame};
    ///
    /// let framed = frame(&[0xFF, 0x00]);
    /// let parsed = Frame::parse(&framed).unwrap();
    /// assert_eq!(parsed.payload, &[0xFF, 0x00]);
    /// ```
    pub fn parse(bytes: &'a [u8]) -> Result<Self, Error> {
        let rest = bytes
            .strip_prefix(MAGIC)
            .ok_or_else(|| Error::Frame("missing magic line".to_string()))?;

        if rest.len() < DIGEST_HEX_LEN + 1 || rest[DIGEST_HEX_LEN] != b'\n' {
            return Err(Error::Frame("truncated digest line".to_string()));
        }
        let checksum = std::str::from_utf8(&rest[..DIGEST_HEX_LEN])
            .ok()
            .filter(|s| s.bytes().all(|c| matches!(c, b'0'..=b'9' | b'a'..=b'f')))
            .ok_or_else(|| Error::Frame("digest is not lowercase hex".to_string()))?;
        let payload = &rest[DIGEST_HEX_LEN + 1..];

        let actual = checksum_hex(payload);
        if actual != checksum {
            return Err(Error::Frame(format!(
                "digest mismatch: header {}, payload {}",
                checksum, actual
            )));
        }

        Ok(Self { checksum, payload })
    }

    /// Whether this frame shows the same content as the last one displayed.
    pub fn is_unchanged(&self, last_checksum: &str) -> bool {
        self.checksum == last_checksum
    }
}
