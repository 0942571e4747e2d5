use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
    str,
};

use zeroize::{Zeroize, Zeroizing};

use super::StoreErrorKind;

/// Owned secret buffer that can be erased in place.
///
/// The handle is never cloned. Erasing overwrites every byte with zero and
/// keeps the length, so callers can verify that a buffer has been wiped.
/// The buffer is also wiped when the handle is dropped.
pub struct PasswordHandle {
    bytes: Zeroizing<Vec<u8>>,
}

impl PasswordHandle {
    /// Takes ownership of the given bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    /// Creates an empty password.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Borrows the secret bytes.
    pub fn expose_secret(&self) -> &[u8] {
        &self.bytes
    }

    /// Borrows the secret as UTF-8 text.
    ///
    /// # Errors
    /// Returns error if the bytes are not valid UTF-8.
    pub fn expose_str(&self) -> Result<&str, str::Utf8Error> {
        str::from_utf8(&self.bytes)
    }

    /// Length of the secret in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the secret has no bytes at all.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Overwrites every byte with zero.
    pub fn erase(&mut self) {
        self.bytes.as_mut_slice().zeroize();
    }

    /// Whether every byte of the buffer is zero.
    pub fn is_erased(&self) -> bool {
        self.bytes.iter().all(|b| *b == 0)
    }
}

impl From<&str> for PasswordHandle {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes().to_vec())
    }
}

impl From<String> for PasswordHandle {
    fn from(value: String) -> Self {
        Self::new(value.into_bytes())
    }
}

impl From<Vec<u8>> for PasswordHandle {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for PasswordHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHandle([REDACTED])")
    }
}

/// Erases a borrowed password when it goes out of scope.
///
/// Covers every return path of the code that holds it, including early
/// returns through `?`.
pub(crate) struct ErasureGuard<'a> {
    password: &'a mut PasswordHandle,
}

impl<'a> ErasureGuard<'a> {
    pub(crate) fn new(password: &'a mut PasswordHandle) -> Self {
        Self { password }
    }

    pub(crate) fn password(&self) -> &PasswordHandle {
        self.password
    }
}

impl Drop for ErasureGuard<'_> {
    fn drop(&mut self) {
        self.password.erase();
    }
}

/// Source of store passwords.
///
/// Every call hands out a fresh handle that the caller owns and erases, so a
/// provider can be asked again when a configuration is rebuilt after a change.
pub trait PasswordProvider: Send + Sync + fmt::Debug {
    /// Produces a new password handle.
    ///
    /// # Errors
    /// Returns error if the underlying secret cannot be read.
    fn password(&self) -> Result<PasswordHandle, StoreErrorKind>;
}

/// Keeps the password in memory for the lifetime of the provider.
pub struct MemoryPasswordProvider {
    secret: Zeroizing<Vec<u8>>,
}

impl MemoryPasswordProvider {
    /// Copies the handle's secret into the provider and erases the handle.
    pub fn new(mut password: PasswordHandle) -> Self {
        let secret = Zeroizing::new(password.expose_secret().to_vec());
        password.erase();
        Self { secret }
    }
}

impl PasswordProvider for MemoryPasswordProvider {
    fn password(&self) -> Result<PasswordHandle, StoreErrorKind> {
        Ok(PasswordHandle::new(self.secret.to_vec()))
    }
}

impl fmt::Debug for MemoryPasswordProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MemoryPasswordProvider")
    }
}

/// Reads the password from an environment variable on every call.
#[derive(Debug, Clone)]
pub struct EnvironmentPasswordProvider {
    variable: String,
}

impl EnvironmentPasswordProvider {
    /// Creates a provider for the named variable.
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
        }
    }
}

impl PasswordProvider for EnvironmentPasswordProvider {
    fn password(&self) -> Result<PasswordHandle, StoreErrorKind> {
        let value = env::var_os(&self.variable).ok_or_else(|| {
            StoreErrorKind::InvalidConfig(format!(
                "environment variable '{}' is not set",
                self.variable
            ))
        })?;

        Ok(PasswordHandle::new(value.into_encoded_bytes()))
    }
}

/// Reads the password from a file on every call.
///
/// A single trailing line ending is stripped so that files written by
/// editors or `echo` work as expected. An unreadable file is a configuration
/// error naming the password file, never a missing store.
#[derive(Debug, Clone)]
pub struct FilePasswordProvider {
    path: PathBuf,
}

impl FilePasswordProvider {
    /// Creates a provider for the given file.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl PasswordProvider for FilePasswordProvider {
    fn password(&self) -> Result<PasswordHandle, StoreErrorKind> {
        let mut bytes = fs::read(&self.path).map_err(|e| {
            StoreErrorKind::InvalidConfig(format!(
                "cannot read password file '{}': {e}",
                self.path.display()
            ))
        })?;

        if bytes.last() == Some(&b'\n') {
            bytes.pop();
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
        }

        Ok(PasswordHandle::new(bytes))
    }
}
