use std::{
    fs::File,
    io::{self, Read},
    path::PathBuf,
    sync::mpsc,
    thread,
    time::Duration,
};

use percent_encoding::percent_decode_str;
use tracing::debug;

/// A location resolved to something that can be opened.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolvedSource {
    /// A file on the local filesystem
    File(PathBuf),
}

impl ResolvedSource {
    /// The local file backing this source, if any.
    ///
    /// Only file-backed sources can be watched for changes.
    pub fn watch_path(&self) -> Option<&PathBuf> {
        match self {
            ResolvedSource::File(path) => Some(path),
        }
    }
}

/// Resolves a path or URI to a concrete source.
///
/// Plain paths and `file:` URIs are accepted. `file:` URIs may carry an empty
/// or `localhost` authority and percent-encoded characters.
///
/// # Errors
/// Returns `io::ErrorKind::Unsupported` for any other URI scheme and
/// `io::ErrorKind::InvalidInput` for a malformed `file:` URI.
pub fn resolve(location: &str) -> io::Result<ResolvedSource> {
    let Some((scheme, rest)) = split_scheme(location) else {
        return Ok(ResolvedSource::File(PathBuf::from(location)));
    };

    if !scheme.eq_ignore_ascii_case("file") {
        return Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("unsupported location scheme '{scheme}'"),
        ));
    }

    let path = match rest.strip_prefix("//") {
        Some(authority_and_path) => {
            let (authority, path) = match authority_and_path.find('/') {
                Some(index) => authority_and_path.split_at(index),
                None => (authority_and_path, ""),
            };
            if !authority.is_empty() && !authority.eq_ignore_ascii_case("localhost") {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("remote file authority '{authority}' is not supported"),
                ));
            }
            path
        }
        None => rest,
    };

    if path.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "file URI has no path",
        ));
    }

    let decoded = percent_decode_str(path)
        .decode_utf8()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    Ok(ResolvedSource::File(PathBuf::from(decoded.as_ref())))
}

/// Reads the whole source into memory.
///
/// The file is opened and released on a helper thread so that a hung
/// filesystem cannot block the caller for longer than `timeout`. The stream
/// is closed before this function returns in every non-timeout case.
///
/// # Errors
/// Returns the open/read error, or `io::ErrorKind::TimedOut` when the read
/// does not finish within `timeout`.
pub fn read_all(source: &ResolvedSource, timeout: Duration) -> io::Result<Vec<u8>> {
    let ResolvedSource::File(path) = source;
    let path = path.clone();
    let (tx, rx) = mpsc::sync_channel(1);

    thread::Builder::new()
        .name("storewatch-source".to_string())
        .spawn(move || {
            let result = File::open(&path).and_then(|mut file| {
                let mut bytes = Vec::new();
                file.read_to_end(&mut bytes)?;
                Ok(bytes)
            });
            let _ = tx.send(result);
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => {
            if let Ok(bytes) = &result {
                debug!(bytes = bytes.len(), "Read credential source");
            }
            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("reading credential source exceeded {timeout:?}"),
        )),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(io::Error::other(
            "credential source reader terminated unexpectedly",
        )),
    }
}

/// Splits `scheme:rest`, ignoring Windows drive letters such as `C:\`.
fn split_scheme(location: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = location.split_once(':')?;

    let valid = scheme.len() > 1
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));

    valid.then_some((scheme, rest))
}
