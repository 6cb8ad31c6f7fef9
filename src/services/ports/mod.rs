//! Service ports: traits + data contracts.

pub mod editor;
pub mod runtime;
pub mod sandbox;
pub mod store;

pub use editor::{CursorPosition, EditorSurface};
pub use runtime::BoxFuture;
pub use sandbox::{
    MountNode, MountTree, SandboxError, SandboxProcess, SandboxService, ServerReady,
};
pub use store::{ProjectStore, StoreError};
