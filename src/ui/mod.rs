//! Terminal dashboard built on ratatui.

pub mod app;
pub mod components;
pub mod refresher;
pub mod state;

pub use app::App;
pub use refresher::{RefreshMessage, Refresher};
pub use state::{AppState, PopupType};
