//! Change events and the notifier that fans them out to listeners.

mod event;
mod notifier;

pub use event::{ChangeEvent, EventType};
pub use notifier::{ChangeNotifier, Subscription};
