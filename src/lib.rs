//! playbox - in-memory project workspace with sandboxed preview bootstrap
//!
//! Module structure:
//! - models: data model (VFolder/VFile tree, directory import)
//! - kernel: workspace store, bootstrap state machine, mount transform, sync queue
//! - services: port contracts and their adapters (LocalSandbox, JsonProjectStore, PlainBuffer)
//! - logging: tracing setup with a rolling file appender

pub mod kernel;
pub mod logging;
pub mod models;
pub mod services;
