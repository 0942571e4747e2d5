//! Credential store loading.
//!
//! Resolves a store location, reads and parses it with the engine for its
//! type, erases the password on every path, and starts watching the file so
//! that changes to certificate material can be picked up without a restart.

mod configuration;
pub mod engine;
mod error;
mod loader;
mod password;
pub mod source;
mod store;

#[cfg(test)]
pub(crate) mod tests;

pub use configuration::{SslConfiguration, StoreConfiguration, StoreContext, StoreRole};
pub use engine::{DEFAULT_STORE_TYPE, StoreType};
pub use error::{StoreConfigError, StoreErrorKind};
pub use loader::{DEFAULT_LOAD_TIMEOUT, LoadedStore, StoreLoader};
pub use password::{
    EnvironmentPasswordProvider, FilePasswordProvider, MemoryPasswordProvider, PasswordHandle,
    PasswordProvider,
};
pub use store::{CredentialStore, KeyMaterial, StoreEntry};
