mod admin;
mod files;
mod reactions;

pub use admin::{admin_purge, health, stats};
pub use files::{delete_file, get_file, list_files, record_view, upload_file};
pub use reactions::{apply_reaction, user_reactions};
