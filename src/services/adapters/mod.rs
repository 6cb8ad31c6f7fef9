//! Concrete implementations of the service ports.

pub mod buffer;
pub mod json_store;
pub mod local_sandbox;

pub use buffer::PlainBuffer;
pub use json_store::JsonProjectStore;
pub use local_sandbox::LocalSandbox;
