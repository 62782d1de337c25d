//! Purpose: Container header layout and on-disk format versioning.
//! Exports: `ContainerHeader`, `HEADER_LEN`, `CONTAINER_FORMAT_VERSION`, `metadata_digest`.
//! Role: Shared policy for gating on-disk compatibility on the create and open paths.
//! Invariants: The header is fixed-size, little-endian, and precedes the schema metadata blob.
//! Invariants: `record_count` stays `UNKNOWN_RECORD_COUNT` until a writer closes cleanly.
//! Invariants: Version list is additive; bump only for incompatible on-disk changes.

use sha2::{Digest, Sha256};

use crate::core::error::{Error, ErrorKind, FormatError};

pub const MAGIC: [u8; 4] = *b"RCF1";
pub const CONTAINER_FORMAT_VERSION: u32 = 1;
pub const SUPPORTED_FORMAT_VERSIONS: &[u32] = &[CONTAINER_FORMAT_VERSION];
pub const ENDIANNESS_LE: u8 = 1;
pub const HEADER_LEN: usize = 64;
pub const RECORD_COUNT_OFFSET: u64 = 16;
pub const UNKNOWN_RECORD_COUNT: u64 = u64::MAX;
pub const MAX_METADATA_LEN: u32 = 16 * 1024 * 1024;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ContainerHeader {
    pub version: u32,
    pub meta_len: u32,
    pub record_count: u64,
    pub meta_digest: [u8; 32],
}

impl ContainerHeader {
    pub fn new(metadata: &[u8]) -> Result<Self, Error> {
        let meta_len = u32::try_from(metadata.len())
            .ok()
            .filter(|len| *len <= MAX_METADATA_LEN)
            .ok_or_else(|| {
                Error::new(ErrorKind::Usage).with_message("schema metadata is too large")
            })?;
        Ok(Self {
            version: CONTAINER_FORMAT_VERSION,
            meta_len,
            record_count: UNKNOWN_RECORD_COUNT,
            meta_digest: metadata_digest(metadata),
        })
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4..8].copy_from_slice(&self.version.to_le_bytes());
        buf[8] = ENDIANNESS_LE;
        buf[12..16].copy_from_slice(&self.meta_len.to_le_bytes());
        buf[16..24].copy_from_slice(&self.record_count.to_le_bytes());
        buf[32..64].copy_from_slice(&self.meta_digest);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < HEADER_LEN {
            return Err(corrupt_header("header too small"));
        }
        if buf[0..4] != MAGIC {
            return Err(corrupt_header("bad magic"));
        }
        let version = u32::from_le_bytes(read_4(buf, 4));
        if !SUPPORTED_FORMAT_VERSIONS.contains(&version) {
            return Err(format_version_error(version));
        }
        if buf[8] != ENDIANNESS_LE {
            return Err(corrupt_header("unsupported endianness"));
        }
        let meta_len = u32::from_le_bytes(read_4(buf, 12));
        if meta_len == 0 || meta_len > MAX_METADATA_LEN {
            return Err(corrupt_header("invalid metadata length"));
        }
        let record_count = u64::from_le_bytes(read_8(buf, 16));
        let mut meta_digest = [0u8; 32];
        meta_digest.copy_from_slice(&buf[32..64]);

        Ok(Self {
            version,
            meta_len,
            record_count,
            meta_digest,
        })
    }

    pub fn verify_metadata(&self, metadata: &[u8]) -> Result<(), Error> {
        if metadata_digest(metadata) != self.meta_digest {
            return Err(corrupt_header("metadata digest mismatch"));
        }
        Ok(())
    }

    pub fn known_record_count(&self) -> Option<u64> {
        (self.record_count != UNKNOWN_RECORD_COUNT).then_some(self.record_count)
    }
}

pub fn metadata_digest(metadata: &[u8]) -> [u8; 32] {
    Sha256::digest(metadata).into()
}

pub fn format_version_error(detected: u32) -> Error {
    let supported = SUPPORTED_FORMAT_VERSIONS
        .iter()
        .map(|version| version.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Error::new(ErrorKind::Format(FormatError::UnsupportedVersion))
        .with_message(format!(
            "unsupported container format version {detected} (supported: {supported})"
        ))
        .with_hint("Upgrade recfile to read this container.")
}

fn corrupt_header(message: &str) -> Error {
    Error::new(ErrorKind::Format(FormatError::CorruptHeader)).with_message(message)
}

fn read_4(buf: &[u8], offset: usize) -> [u8; 4] {
    let mut out = [0u8; 4];
    out.copy_from_slice(&buf[offset..offset + 4]);
    out
}

fn read_8(buf: &[u8], offset: usize) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&buf[offset..offset + 8]);
    out
}

#[cfg(test)]
mod tests {
    use super::{ContainerHeader, HEADER_LEN, RECORD_COUNT_OFFSET, UNKNOWN_RECORD_COUNT};
    use crate::core::error::{ErrorKind, FormatError};

    #[test]
    fn header_round_trip() {
        let mut header = ContainerHeader::new(br#"{"fields":[]}"#).expect("header");
        assert_eq!(header.record_count, UNKNOWN_RECORD_COUNT);
        assert_eq!(header.known_record_count(), None);
        header.record_count = 12;
        let buf = header.encode();
        let decoded = ContainerHeader::decode(&buf).expect("decode");
        assert_eq!(decoded, header);
        assert_eq!(decoded.known_record_count(), Some(12));
        let offset = RECORD_COUNT_OFFSET as usize;
        assert_eq!(buf[offset..offset + 8], 12u64.to_le_bytes());
    }

    #[test]
    fn bad_magic_is_corrupt_header() {
        let mut buf = ContainerHeader::new(b"{}").expect("header").encode();
        buf[0..4].copy_from_slice(b"NOPE");
        let err = ContainerHeader::decode(&buf).expect_err("magic");
        assert_eq!(err.kind(), ErrorKind::Format(FormatError::CorruptHeader));

        let err = ContainerHeader::decode(&buf[..HEADER_LEN - 1]).expect_err("short");
        assert_eq!(err.kind(), ErrorKind::Format(FormatError::CorruptHeader));
    }

    #[test]
    fn future_version_is_unsupported() {
        let mut header = ContainerHeader::new(b"{}").expect("header");
        header.version = 9;
        let err = ContainerHeader::decode(&header.encode()).expect_err("version");
        assert_eq!(err.kind(), ErrorKind::Format(FormatError::UnsupportedVersion));
        assert!(err.hint().is_some());
    }

    #[test]
    fn digest_detects_tampered_metadata() {
        let header = ContainerHeader::new(b"{\"a\":1}").expect("header");
        header.verify_metadata(b"{\"a\":1}").expect("match");
        let err = header.verify_metadata(b"{\"a\":2}").expect_err("tampered");
        assert_eq!(err.kind(), ErrorKind::Format(FormatError::CorruptHeader));
    }
}
