//! Storewatch - hot-reloadable TLS credential stores.
//!
//! Loads key stores and trust stores from files, erases the passwords used
//! to open them, and watches the files so that rotated certificates can be
//! picked up without a restart. The main features include:
//!
//! - JKS, PKCS12 and PEM stores behind one loading path
//! - Classified load failures tagged with the store location
//! - One shared watch per file, however many stores read it
//! - Debounced `ConfigurationChanged` events on a shared notifier
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use storewatch::{
//!     credentials::{MemoryPasswordProvider, StoreConfiguration, StoreContext, StoreRole},
//!     events::{ChangeNotifier, EventType},
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let notifier = ChangeNotifier::new();
//! let _subscription = notifier.subscribe(EventType::ConfigurationChanged, |event| {
//!     println!("{} changed", event.source_path.display());
//! });
//!
//! let context = StoreContext::new(Arc::clone(&notifier), Duration::from_millis(500))?;
//! let key_store = StoreConfiguration::new(
//!     StoreRole::KeyStore,
//!     Some("/etc/service/keystore.p12".to_string()),
//!     Arc::new(MemoryPasswordProvider::new("changeit".into())),
//!     Some("PKCS12".to_string()),
//!     &context,
//! )?;
//! println!("{} entries", key_store.credential_store().len());
//! # Ok(())
//! # }
//! ```

/// Credential store loading and configuration.
pub mod credentials;

/// Change events and the notifier that delivers them.
pub mod events;

/// File watching with shared, reference-counted watches.
pub mod watch;

/// Settings file schema and locations.
pub mod settings;

/// Command-line interface for inspecting and watching stores.
pub mod cli;

/// Tracing subscriber setup.
pub mod tracing_config;

pub use credentials::{StoreConfigError, StoreErrorKind};
pub use watch::WatchError;
