use std::io::BufReader;

use rustls_pemfile::Item;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};

use crate::credentials::{KeyMaterial, StoreEntry, StoreErrorKind};

/// Decodes PEM sections into store entries.
///
/// With a private key present, all certificates form that key's chain in file
/// order. Without one, every certificate becomes a trusted entry. Encrypted
/// keys are not supported by this format and are ignored.
pub(super) fn decode(bytes: &[u8]) -> Result<Vec<StoreEntry>, StoreErrorKind> {
    let mut reader = BufReader::new(bytes);
    let mut certificates: Vec<CertificateDer<'static>> = Vec::new();
    let mut keys: Vec<PrivateKeyDer<'static>> = Vec::new();

    for item in rustls_pemfile::read_all(&mut reader) {
        match item.map_err(|e| StoreErrorKind::format(format!("invalid PEM section: {e}")))? {
            Item::X509Certificate(certificate) => certificates.push(certificate),
            Item::Pkcs1Key(key) => keys.push(key.into()),
            Item::Pkcs8Key(key) => keys.push(key.into()),
            Item::Sec1Key(key) => keys.push(key.into()),
            _ => {}
        }
    }

    if certificates.is_empty() && keys.is_empty() {
        return Err(StoreErrorKind::format(
            "no certificates or private keys found in PEM data",
        ));
    }

    let mut keys = keys.into_iter();
    let entries = match (keys.next(), keys.next()) {
        (Some(key), None) => {
            if certificates.is_empty() {
                return Err(StoreErrorKind::format(
                    "PEM private key has no certificate chain",
                ));
            }
            vec![StoreEntry::PrivateKey {
                alias: "key".to_string(),
                key: KeyMaterial::Plain(key),
                chain: certificates,
                created: None,
            }]
        }
        (Some(_), Some(_)) => {
            return Err(StoreErrorKind::format(
                "PEM data contains more than one private key",
            ));
        }
        (None, _) => certificates
            .into_iter()
            .enumerate()
            .map(|(index, certificate)| StoreEntry::TrustedCertificate {
                alias: format!("cert-{index}"),
                certificate,
                created: None,
            })
            .collect(),
    };

    Ok(entries)
}
