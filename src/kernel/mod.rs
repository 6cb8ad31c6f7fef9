//! Headless engine: workspace state, bootstrap machine, mount transform,
//! write-through sync.

pub mod bootstrap;
pub mod sync;
pub mod transform;
pub mod workspace;

pub use bootstrap::{
    BootstrapConfig, BootstrapError, BootstrapLog, BootstrapMachine, BootstrapStage, CommandSpec,
};
pub use sync::SyncQueue;
pub use transform::{from_mount_tree, to_mount_tree};
pub use workspace::{OpenFile, SaveReport, Workspace, WorkspaceError};
