//! Parsers for the supported credential store formats.

pub mod jks;
mod pem;
mod pkcs12;

use std::{fmt, str::FromStr};

use super::{CredentialStore, PasswordHandle, StoreErrorKind};

/// Store type used when a configuration does not name one.
pub const DEFAULT_STORE_TYPE: &str = "JKS";

/// Credential store formats understood by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreType {
    /// Java keystore, `0xFEEDFEED` format with SHA-1 integrity digest
    Jks,
    /// PKCS#12 archive
    Pkcs12,
    /// PEM encoded certificates and unencrypted private keys
    Pem,
}

impl StoreType {
    /// Canonical name of the type.
    pub fn name(self) -> &'static str {
        match self {
            StoreType::Jks => "JKS",
            StoreType::Pkcs12 => "PKCS12",
            StoreType::Pem => "PEM",
        }
    }

    /// Whether the format only exists on disk and cannot be created empty.
    pub fn requires_location(self) -> bool {
        matches!(self, StoreType::Jks | StoreType::Pkcs12)
    }

    /// Parses `bytes` into a store tagged with `declared_type`.
    ///
    /// # Errors
    /// Returns the classified parse failure.
    pub fn load(
        self,
        bytes: &[u8],
        password: &PasswordHandle,
        declared_type: &str,
    ) -> Result<CredentialStore, StoreErrorKind> {
        let entries = match self {
            StoreType::Jks => jks::decode(bytes, password)?,
            StoreType::Pkcs12 => pkcs12::decode(bytes, password)?,
            StoreType::Pem => pem::decode(bytes)?,
        };

        Ok(CredentialStore::new(declared_type, entries))
    }
}

impl FromStr for StoreType {
    type Err = StoreErrorKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "JKS" => Ok(StoreType::Jks),
            "PKCS12" | "P12" => Ok(StoreType::Pkcs12),
            "PEM" => Ok(StoreType::Pem),
            _ => Err(StoreErrorKind::engine(
                value,
                "no provider supports this store type",
            )),
        }
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
