pub mod defaults;
pub mod loader;
pub mod types;

pub use defaults::{DEFAULT_REFRESH_INTERVAL_SECS, DEFAULT_SESSION_HOURS, MAX_LOADER_THREADS, MAX_SESSION_HOURS};
pub use loader::ConfigLoader;
pub use types::Config;
