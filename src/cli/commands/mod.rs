mod inspect;
mod watch;

pub use inspect::inspect;
pub use watch::watch;
