pub mod config;
pub mod device;
pub mod error;
pub mod json_bridge;
pub mod schema;
pub mod store;

pub use config::{CONFIG_FILE, EngageConfig};
pub use device::{DeviceStore, default_base_dir};
pub use error::{Result, StoreError};
pub use json_bridge::{export_json_file, import_json_file};
pub use store::Store;
