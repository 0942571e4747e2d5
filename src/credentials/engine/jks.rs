//! Java keystore (`JKS`) reader and writer.
//!
//! Layout, all integers big-endian:
//!
//! ```text
//! u32 magic (0xFEEDFEED) | u32 version (1 or 2) | u32 entry count
//! entry*: u32 tag | utf alias | u64 created (ms)
//!   tag 1: u32 len, protected key | u32 chain len | cert*
//!   tag 2: cert
//! cert: [utf type, version 2 only] | u32 len | DER
//! 20 byte SHA-1 over utf16be(password) ++ "Mighty Aphrodite" ++ everything above
//! ```
//!
//! Private keys stay in their protected form. Unwrapping them needs the
//! per-entry key password and is left to the consumer of the store.

use chrono::{DateTime, Utc};
use openssl::{memcmp, sha::Sha1};
use rustls_pki_types::CertificateDer;
use zeroize::Zeroizing;

use crate::credentials::{KeyMaterial, PasswordHandle, StoreEntry, StoreErrorKind};

const MAGIC: u32 = 0xFEED_FEED;
const VERSION_1: u32 = 1;
const VERSION_2: u32 = 2;
const TAG_PRIVATE_KEY: u32 = 1;
const TAG_TRUSTED_CERT: u32 = 2;
const DIGEST_LEN: usize = 20;
const WHITENER: &[u8] = b"Mighty Aphrodite";
const X509: &str = "X.509";

/// Decodes a JKS byte stream and verifies its integrity digest.
///
/// # Errors
/// Returns `FormatOrPassword` for malformed input, unsupported certificate
/// types, or a digest that does not match the password.
pub fn decode(bytes: &[u8], password: &PasswordHandle) -> Result<Vec<StoreEntry>, StoreErrorKind> {
    if bytes.len() < DIGEST_LEN {
        return Err(StoreErrorKind::format("keystore is truncated"));
    }
    let (body, expected) = bytes.split_at(bytes.len() - DIGEST_LEN);
    let mut reader = Reader::new(body);

    if reader.u32()? != MAGIC {
        return Err(StoreErrorKind::format("invalid keystore format"));
    }
    let version = reader.u32()?;
    if version != VERSION_1 && version != VERSION_2 {
        return Err(StoreErrorKind::format(format!(
            "unsupported keystore version {version}"
        )));
    }

    let count = reader.u32()?;
    let mut entries = Vec::new();
    for _ in 0..count {
        entries.push(read_entry(&mut reader, version)?);
    }

    if !reader.is_exhausted() {
        return Err(StoreErrorKind::format("trailing data after keystore entries"));
    }

    let actual = digest(password, body)?;
    if !memcmp::eq(&actual, expected) {
        return Err(StoreErrorKind::format(
            "keystore was tampered with, or password was incorrect",
        ));
    }

    Ok(entries)
}

fn read_entry(reader: &mut Reader<'_>, version: u32) -> Result<StoreEntry, StoreErrorKind> {
    let tag = reader.u32()?;
    let alias = reader.utf()?;
    let created = DateTime::<Utc>::from_timestamp_millis(reader.u64()? as i64);

    match tag {
        TAG_PRIVATE_KEY => {
            let key_len = reader.length()?;
            let key = reader.take(key_len)?.to_vec();
            let chain_len = reader.u32()?;
            let mut chain = Vec::new();
            for _ in 0..chain_len {
                chain.push(read_certificate(reader, version)?);
            }
            Ok(StoreEntry::PrivateKey {
                alias,
                key: KeyMaterial::Protected(key),
                chain,
                created,
            })
        }
        TAG_TRUSTED_CERT => Ok(StoreEntry::TrustedCertificate {
            alias,
            certificate: read_certificate(reader, version)?,
            created,
        }),
        other => Err(StoreErrorKind::format(format!(
            "unrecognized keystore entry tag {other}"
        ))),
    }
}

fn read_certificate(
    reader: &mut Reader<'_>,
    version: u32,
) -> Result<CertificateDer<'static>, StoreErrorKind> {
    if version == VERSION_2 {
        let cert_type = reader.utf()?;
        if cert_type != X509 {
            return Err(StoreErrorKind::format(format!(
                "unsupported certificate type '{cert_type}'"
            )));
        }
    }
    let len = reader.length()?;
    Ok(CertificateDer::from(reader.take(len)?.to_vec()))
}

/// SHA-1 over the UTF-16BE password, the whitener and the keystore body.
fn digest(password: &PasswordHandle, body: &[u8]) -> Result<[u8; DIGEST_LEN], StoreErrorKind> {
    let text = password
        .expose_str()
        .map_err(|_| StoreErrorKind::format("keystore password is not valid UTF-8"))?;
    let encoded: Zeroizing<Vec<u8>> =
        Zeroizing::new(text.encode_utf16().flat_map(u16::to_be_bytes).collect());

    let mut hasher = Sha1::new();
    hasher.update(&encoded);
    hasher.update(WHITENER);
    hasher.update(body);
    Ok(hasher.finish())
}

struct Reader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], StoreErrorKind> {
        let end = self
            .position
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| StoreErrorKind::format("keystore is truncated"))?;
        let bytes = self.bytes;
        let slice = &bytes[self.position..end];
        self.position = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], StoreErrorKind> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u16(&mut self) -> Result<u16, StoreErrorKind> {
        self.array().map(u16::from_be_bytes)
    }

    fn u32(&mut self) -> Result<u32, StoreErrorKind> {
        self.array().map(u32::from_be_bytes)
    }

    fn u64(&mut self) -> Result<u64, StoreErrorKind> {
        self.array().map(u64::from_be_bytes)
    }

    fn length(&mut self) -> Result<usize, StoreErrorKind> {
        let len = self.u32()?;
        usize::try_from(len).map_err(|_| StoreErrorKind::format("entry length overflow"))
    }

    fn utf(&mut self) -> Result<String, StoreErrorKind> {
        let len = usize::from(self.u16()?);
        Ok(String::from_utf8_lossy(self.take(len)?).into_owned())
    }

    fn is_exhausted(&self) -> bool {
        self.position == self.bytes.len()
    }
}

enum PendingEntry {
    PrivateKey {
        alias: String,
        protected_key: Vec<u8>,
        chain: Vec<Vec<u8>>,
    },
    TrustedCertificate {
        alias: String,
        certificate: Vec<u8>,
    },
}

/// Writes version 2 JKS keystores.
///
/// Private keys must already be in JKS protected form.
///
/// ```rust
/// use storewatch::credentials::{PasswordHandle, engine::jks::JksBuilder};
///
/// let bytes = JksBuilder::new()
///     .trusted_certificate("root", vec![0x30, 0x00])
///     .build(&PasswordHandle::from("changeit"))
///     .unwrap();
/// assert_eq!(&bytes[..4], &[0xFE, 0xED, 0xFE, 0xED]);
/// ```
#[derive(Default)]
pub struct JksBuilder {
    entries: Vec<PendingEntry>,
    created: Option<DateTime<Utc>>,
}

impl JksBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the creation time written for every entry. Defaults to now.
    pub fn created_at(mut self, created: DateTime<Utc>) -> Self {
        self.created = Some(created);
        self
    }

    /// Adds a private key entry.
    pub fn private_key(
        mut self,
        alias: impl Into<String>,
        protected_key: Vec<u8>,
        chain: Vec<Vec<u8>>,
    ) -> Self {
        self.entries.push(PendingEntry::PrivateKey {
            alias: alias.into(),
            protected_key,
            chain,
        });
        self
    }

    /// Adds a trusted certificate entry.
    pub fn trusted_certificate(mut self, alias: impl Into<String>, certificate: Vec<u8>) -> Self {
        self.entries.push(PendingEntry::TrustedCertificate {
            alias: alias.into(),
            certificate,
        });
        self
    }

    /// Serializes the keystore and appends the integrity digest.
    ///
    /// # Errors
    /// Returns `FormatOrPassword` if an alias or blob does not fit the format
    /// or the password is not valid UTF-8.
    pub fn build(self, password: &PasswordHandle) -> Result<Vec<u8>, StoreErrorKind> {
        let created = self.created.unwrap_or_else(Utc::now).timestamp_millis() as u64;
        let mut out = Vec::new();

        out.extend_from_slice(&MAGIC.to_be_bytes());
        out.extend_from_slice(&VERSION_2.to_be_bytes());
        write_length(&mut out, self.entries.len())?;

        for entry in &self.entries {
            match entry {
                PendingEntry::PrivateKey {
                    alias,
                    protected_key,
                    chain,
                } => {
                    out.extend_from_slice(&TAG_PRIVATE_KEY.to_be_bytes());
                    write_utf(&mut out, alias)?;
                    out.extend_from_slice(&created.to_be_bytes());
                    write_blob(&mut out, protected_key)?;
                    write_length(&mut out, chain.len())?;
                    for certificate in chain {
                        write_certificate(&mut out, certificate)?;
                    }
                }
                PendingEntry::TrustedCertificate { alias, certificate } => {
                    out.extend_from_slice(&TAG_TRUSTED_CERT.to_be_bytes());
                    write_utf(&mut out, alias)?;
                    out.extend_from_slice(&created.to_be_bytes());
                    write_certificate(&mut out, certificate)?;
                }
            }
        }

        let digest = digest(password, &out)?;
        out.extend_from_slice(&digest);
        Ok(out)
    }
}

fn write_length(out: &mut Vec<u8>, len: usize) -> Result<(), StoreErrorKind> {
    let len = u32::try_from(len).map_err(|_| StoreErrorKind::format("length exceeds u32"))?;
    out.extend_from_slice(&len.to_be_bytes());
    Ok(())
}

fn write_blob(out: &mut Vec<u8>, blob: &[u8]) -> Result<(), StoreErrorKind> {
    write_length(out, blob.len())?;
    out.extend_from_slice(blob);
    Ok(())
}

fn write_utf(out: &mut Vec<u8>, text: &str) -> Result<(), StoreErrorKind> {
    let len = u16::try_from(text.len()).map_err(|_| StoreErrorKind::format("alias too long"))?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(text.as_bytes());
    Ok(())
}

fn write_certificate(out: &mut Vec<u8>, certificate: &[u8]) -> Result<(), StoreErrorKind> {
    write_utf(out, X509)?;
    write_blob(out, certificate)
}
