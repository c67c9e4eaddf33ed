//! On-disk container: a fixed 128-byte header followed by ciphertext.
//!
//! ```text
//!   0..8    magic "VAULTDB\0"
//!   8..12   container version (u32 LE)
//!  12..16   flags (bit 0: payload is zstd-compressed)
//!  16..28   argon2 time cost, memory KiB, parallelism (u32 LE each)
//!  28..60   salt
//!  60..84   nonce
//!  84..100  poly1305 tag
//! 100..128  reserved, zero
//! ```
//!
//! Bytes `0..84` are authenticated as associated data, so a flipped flag or
//! KDF parameter fails the same way a wrong password does.

use tracing::warn;
use zeroize::Zeroizing;

use crate::crypto::{self, NONCE_LEN, SALT_LEN, TAG_LEN};
use crate::error::{DatabaseError, Result};
use crate::settings::{DatabaseConfig, KdfParams};

pub const CONTAINER_MAGIC: &[u8; 8] = b"VAULTDB\0";
pub const CONTAINER_VERSION: u32 = 1;
pub const HEADER_SIZE: usize = 128;

const AAD_END: usize = 84;
const FLAG_COMPRESSED: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    pub version: u32,
    pub flags: u32,
    pub kdf: KdfParams,
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN],
    pub tag: [u8; TAG_LEN],
}

impl ContainerHeader {
    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[..8].copy_from_slice(CONTAINER_MAGIC);
        buf[8..12].copy_from_slice(&self.version.to_le_bytes());
        buf[12..16].copy_from_slice(&self.flags.to_le_bytes());
        buf[16..20].copy_from_slice(&self.kdf.time_cost.to_le_bytes());
        buf[20..24].copy_from_slice(&self.kdf.memory_kib.to_le_bytes());
        buf[24..28].copy_from_slice(&self.kdf.parallelism.to_le_bytes());
        buf[28..60].copy_from_slice(&self.salt);
        buf[60..84].copy_from_slice(&self.nonce);
        buf[84..100].copy_from_slice(&self.tag);
        // remaining bytes stay zero
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(DatabaseError::Malformed(format!(
                "file too short for header ({} bytes)",
                buf.len()
            )));
        }
        if &buf[..8] != CONTAINER_MAGIC {
            return Err(DatabaseError::Malformed("invalid magic".into()));
        }
        let version = read_u32(buf, 8);
        if version != CONTAINER_VERSION {
            return Err(DatabaseError::Malformed(format!(
                "unsupported container version {version}"
            )));
        }
        let kdf = KdfParams {
            time_cost: read_u32(buf, 16),
            memory_kib: read_u32(buf, 20),
            parallelism: read_u32(buf, 24),
        };
        kdf.validate()
            .map_err(|e| DatabaseError::Malformed(format!("header kdf parameters: {e}")))?;

        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&buf[28..60]);
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&buf[60..84]);
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&buf[84..100]);

        Ok(Self {
            version,
            flags: read_u32(buf, 12),
            kdf,
            salt,
            nonce,
            tag,
        })
    }
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

/// Seal `plaintext` under `password` with a fresh salt and nonce.
pub fn encrypt(plaintext: &[u8], password: &str, config: &DatabaseConfig) -> Result<Vec<u8>> {
    config.kdf.validate()?;
    let compressed = plaintext.len() > config.compression_threshold;
    let mut payload = Zeroizing::new(if compressed {
        zstd::encode_all(plaintext, 3)?
    } else {
        plaintext.to_vec()
    });

    let mut header = ContainerHeader {
        version: CONTAINER_VERSION,
        flags: if compressed { FLAG_COMPRESSED } else { 0 },
        kdf: config.kdf,
        salt: crypto::generate_salt(),
        nonce: crypto::generate_nonce(),
        tag: [0u8; TAG_LEN],
    };
    let key = crypto::derive_key(password, &header.salt, &header.kdf)?;
    let aad = header.to_bytes();
    header.tag = crypto::seal(&key, &header.nonce, &aad[..AAD_END], &mut payload)?;

    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Authenticate and decrypt a container. No plaintext is returned unless the
/// tag verifies.
pub fn decrypt(container: &[u8], password: &str) -> Result<Zeroizing<Vec<u8>>> {
    let header = ContainerHeader::from_bytes(container)?;
    let key = crypto::derive_key(password, &header.salt, &header.kdf)?;
    let mut payload = Zeroizing::new(container[HEADER_SIZE..].to_vec());
    if let Err(err) = crypto::open(
        &key,
        &header.nonce,
        &container[..AAD_END],
        &mut payload,
        &header.tag,
    ) {
        warn!("container authentication failed");
        return Err(err);
    }
    if header.is_compressed() {
        let inflated = zstd::decode_all(&payload[..])
            .map_err(|e| DatabaseError::Malformed(format!("decompress payload: {e}")))?;
        return Ok(Zeroizing::new(inflated));
    }
    Ok(payload)
}
