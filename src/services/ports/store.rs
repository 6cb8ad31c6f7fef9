//! Project store port: durable persistence of a project's serialized tree,
//! keyed by project id.

use std::fmt;

use crate::models::VFolder;

use super::runtime::BoxFuture;

#[derive(Debug)]
pub enum StoreError {
    NotFound(String),
    Unavailable(String),
    Serialize(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "no stored project for id {id}"),
            StoreError::Unavailable(msg) => write!(f, "project store unavailable: {msg}"),
            StoreError::Serialize(msg) => write!(f, "project tree serialization failed: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

pub type Result<T> = std::result::Result<T, StoreError>;

pub trait ProjectStore: Send + Sync {
    fn load<'a>(&'a self, project_id: &'a str) -> BoxFuture<'a, Result<VFolder>>;

    /// Durably writes the full tree. `Ok(Some(_))` carries the stored copy
    /// when the store normalizes it; failure is an error, never a silent
    /// `None`.
    fn persist<'a>(
        &'a self,
        project_id: &'a str,
        tree: VFolder,
    ) -> BoxFuture<'a, Result<Option<VFolder>>>;
}
