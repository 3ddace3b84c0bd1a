pub mod layout;
pub mod loader;
pub mod region;
pub mod schema;

pub use layout::Layout;
pub use loader::{load_config, load_config_from_str};
pub use schema::{BackupSettings, ControllerSettings, OverwriteProtocol, PhpSettings, UnitConfig};
