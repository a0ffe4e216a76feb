pub mod data_loader;
pub mod paths;
pub mod transcript;

pub use data_loader::DataLoader;
pub use paths::{candidate_data_paths, discover_claude_data_paths};
pub use transcript::{extract_session_id, parse_line, ParsedLine, TranscriptError};
