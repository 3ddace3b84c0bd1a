pub mod command;
pub mod config;
pub mod drift;
pub mod error;
pub mod event;
pub mod occ;
pub mod peer;
pub mod reconciler;
pub mod render;
pub mod retry;
pub mod role;
pub mod sanitize;
pub mod secrets;
pub mod state;
pub mod status;
pub mod storage;
pub mod stub;
pub mod system;

pub use config::{load_config, Layout, UnitConfig};
pub use error::{ConfigError, ErrorClass, NodeError, Result, StorageError, ValidationError};
pub use event::{ActionRequest, DatabaseFields, Event};
pub use occ::{OccShell, RemoteConfigCli};
pub use peer::{PeerSnapshot, PeerStore, PeerWrite};
pub use reconciler::{Outcome, Reconciled, Reconciler};
pub use render::{ConfigRenderer, TemplateEngine};
pub use role::{Role, RoleContext, UnitId};
pub use secrets::CredentialVault;
pub use state::{DatabaseRecord, LifecycleState, StateStore};
pub use status::DisplayStatus;
pub use system::{CommandSystem, UnitSystem};
