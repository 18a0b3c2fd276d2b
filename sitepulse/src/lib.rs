pub mod commands;

// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

pub use handlers::{archive_path, build_config, cleanup_artifacts, distribution_lines};
