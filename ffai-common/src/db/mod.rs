//! Database initialization and settings-table helpers

pub mod init;
pub mod settings;

pub use init::{create_settings_table, init_database, init_memory_database};
pub use settings::{get_setting, set_setting};
