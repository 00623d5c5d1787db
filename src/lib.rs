pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod storage;

pub use config::{Protocol, RemoteConfig, RunConfig};
pub use core::{run_with_config, SyncConfig, SyncEngine, SyncReport};
pub use error::{Phase, SyncError};
pub use storage::{MockClient, RemoteClient, TransferClient, TransferError};
