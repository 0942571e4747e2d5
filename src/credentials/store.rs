use std::fmt;

use chrono::{DateTime, Utc};
use rustls_pki_types::{CertificateDer, PrivateKeyDer};

/// Private key material held by a store entry.
pub enum KeyMaterial {
    /// Key still wrapped in the store's own protection format (JKS keeps keys
    /// encrypted until they are requested with a key password).
    Protected(Vec<u8>),
    /// Decoded private key.
    Plain(PrivateKeyDer<'static>),
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMaterial::Protected(bytes) => write!(f, "Protected({} bytes)", bytes.len()),
            KeyMaterial::Plain(_) => f.write_str("Plain([REDACTED])"),
        }
    }
}

/// A single aliased entry of a credential store.
#[derive(Debug)]
pub enum StoreEntry {
    /// A private key together with its certificate chain, leaf first.
    PrivateKey {
        /// Entry alias
        alias: String,
        /// Key material
        key: KeyMaterial,
        /// Certificate chain
        chain: Vec<CertificateDer<'static>>,
        /// Creation time recorded in the store, when the format has one
        created: Option<DateTime<Utc>>,
    },
    /// A certificate trusted as an anchor.
    TrustedCertificate {
        /// Entry alias
        alias: String,
        /// DER encoded certificate
        certificate: CertificateDer<'static>,
        /// Creation time recorded in the store, when the format has one
        created: Option<DateTime<Utc>>,
    },
}

impl StoreEntry {
    /// The entry's alias.
    pub fn alias(&self) -> &str {
        match self {
            StoreEntry::PrivateKey { alias, .. } | StoreEntry::TrustedCertificate { alias, .. } => {
                alias
            }
        }
    }

    /// Whether the entry carries a private key.
    pub fn is_key_entry(&self) -> bool {
        matches!(self, StoreEntry::PrivateKey { .. })
    }

    /// Certificates carried by the entry.
    pub fn certificates(&self) -> &[CertificateDer<'static>] {
        match self {
            StoreEntry::PrivateKey { chain, .. } => chain,
            StoreEntry::TrustedCertificate { certificate, .. } => std::slice::from_ref(certificate),
        }
    }
}

/// A loaded keystore or truststore.
///
/// Immutable once built. A changed file on disk is picked up by building a new
/// store, never by mutating an existing one.
#[derive(Debug)]
pub struct CredentialStore {
    store_type: String,
    entries: Vec<StoreEntry>,
}

impl CredentialStore {
    /// Creates a store of the given type with the given entries.
    pub fn new(store_type: impl Into<String>, entries: Vec<StoreEntry>) -> Self {
        Self {
            store_type: store_type.into(),
            entries,
        }
    }

    /// Creates a store with no entries.
    pub fn empty(store_type: impl Into<String>) -> Self {
        Self::new(store_type, Vec::new())
    }

    /// The declared store type.
    pub fn store_type(&self) -> &str {
        &self.store_type
    }

    /// All entries in store order.
    pub fn entries(&self) -> &[StoreEntry] {
        &self.entries
    }

    /// Looks up an entry by alias.
    ///
    /// Aliases are compared case-insensitively, as keystore aliases are.
    pub fn entry(&self, alias: &str) -> Option<&StoreEntry> {
        self.entries
            .iter()
            .find(|entry| entry.alias().eq_ignore_ascii_case(alias))
    }

    /// Aliases in store order.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(StoreEntry::alias)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every certificate in the store, across all entries.
    pub fn certificates(&self) -> impl Iterator<Item = &CertificateDer<'static>> {
        self.entries.iter().flat_map(StoreEntry::certificates)
    }
}
