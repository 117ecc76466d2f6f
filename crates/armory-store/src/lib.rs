//! Persistence and configuration for the armory: a SQLite preference
//! store implementing [`armory_core::KeyValueStore`], TOML config loading
//! and JSON snapshot import/export.

pub mod config;
pub mod error;
pub mod json_bridge;
pub mod schema;
pub mod store;

pub use config::{
    CONFIG_FILE, DATA_DIR_ENV, config_path, default_base_dir, load_config, parse_config,
    render_config,
};
pub use error::{Result, StoreError};
pub use json_bridge::{
    export_json_file, export_json_string, import_json_file, import_json_str, parse_snapshot,
};
pub use store::{DB_FILE, PrefsStore};
