use openssl::{error::ErrorStack, pkcs12::Pkcs12, x509::X509Ref};
use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

use crate::credentials::{KeyMaterial, PasswordHandle, StoreEntry, StoreErrorKind};

const DEFAULT_KEY_ALIAS: &str = "1";

pub(super) fn decode(
    bytes: &[u8],
    password: &PasswordHandle,
) -> Result<Vec<StoreEntry>, StoreErrorKind> {
    let password = password
        .expose_str()
        .map_err(|_| StoreErrorKind::format("PKCS12 password is not valid UTF-8"))?;

    let archive = Pkcs12::from_der(bytes).map_err(|e| classify(&e))?;
    let parsed = archive.parse2(password).map_err(|e| classify(&e))?;

    let mut extra = Vec::new();
    if let Some(ca) = &parsed.ca {
        for certificate in ca.iter() {
            extra.push(certificate_der(certificate)?);
        }
    }

    let mut entries = Vec::new();
    match (parsed.pkey, parsed.cert) {
        (Some(pkey), Some(cert)) => {
            let key = pkey.private_key_to_pkcs8().map_err(|e| classify(&e))?;
            let alias = alias_of(&cert).unwrap_or_else(|| DEFAULT_KEY_ALIAS.to_string());
            let mut chain = vec![certificate_der(&cert)?];
            chain.append(&mut extra);
            entries.push(StoreEntry::PrivateKey {
                alias,
                key: KeyMaterial::Plain(PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key))),
                chain,
                created: None,
            });
        }
        (Some(_), None) => {
            return Err(StoreErrorKind::format(
                "PKCS12 private key has no matching certificate",
            ));
        }
        (None, cert) => {
            let mut certificates: Vec<_> = cert
                .as_deref()
                .map(certificate_der)
                .transpose()?
                .into_iter()
                .collect();
            certificates.append(&mut extra);
            for (index, certificate) in certificates.into_iter().enumerate() {
                entries.push(StoreEntry::TrustedCertificate {
                    alias: index.to_string(),
                    certificate,
                    created: None,
                });
            }
        }
    }

    Ok(entries)
}

fn certificate_der(certificate: &X509Ref) -> Result<CertificateDer<'static>, StoreErrorKind> {
    certificate
        .to_der()
        .map(CertificateDer::from)
        .map_err(|e| classify(&e))
}

fn alias_of(certificate: &X509Ref) -> Option<String> {
    certificate
        .alias()
        .map(|alias| String::from_utf8_lossy(alias).into_owned())
}

/// Maps an OpenSSL error stack onto the store taxonomy by its reason strings.
fn classify(error: &ErrorStack) -> StoreErrorKind {
    let reasons: Vec<String> = error
        .errors()
        .iter()
        .filter_map(|e| e.reason())
        .map(str::to_ascii_lowercase)
        .collect();
    let details = error.to_string();

    if reasons.iter().any(|r| r.contains("unsupported")) {
        return StoreErrorKind::AlgorithmUnavailable { details };
    }

    let format_markers = [
        "mac verify",
        "asn1",
        "wrong tag",
        "header too long",
        "too long",
        "decode",
        "nested asn1",
        "bad decrypt",
        "parse error",
    ];
    if reasons.is_empty()
        || reasons
            .iter()
            .any(|r| format_markers.iter().any(|marker| r.contains(marker)))
    {
        return StoreErrorKind::format(details);
    }

    StoreErrorKind::engine("PKCS12", details)
}
