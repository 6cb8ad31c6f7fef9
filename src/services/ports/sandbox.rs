//! Sandbox service port: an opaque external runtime that can mount a
//! filesystem, spawn processes, and announce when a dev server is up.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use super::runtime::BoxFuture;

#[derive(Debug)]
pub enum SandboxError {
    Io(std::io::Error),
    Spawn(String),
    Disconnected,
}

impl fmt::Display for SandboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SandboxError::Io(e) => write!(f, "sandbox io error: {e}"),
            SandboxError::Spawn(cmd) => write!(f, "failed to spawn process: {cmd}"),
            SandboxError::Disconnected => write!(f, "sandbox instance is gone"),
        }
    }
}

impl std::error::Error for SandboxError {}

impl From<std::io::Error> for SandboxError {
    fn from(e: std::io::Error) -> Self {
        SandboxError::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, SandboxError>;

/// The sandbox's mount descriptor format: a directory is a keyed map of
/// child name to descriptor, a file a leaf carrying its full text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountNode {
    File { contents: String },
    Directory(BTreeMap<String, MountNode>),
}

pub type MountTree = BTreeMap<String, MountNode>;

/// A process running inside the sandbox. Output arrives line-by-line on an
/// unbounded channel; the exit code resolves once.
#[derive(Debug)]
pub struct SandboxProcess {
    pub output: mpsc::UnboundedReceiver<String>,
    pub exit: oneshot::Receiver<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerReady {
    pub port: u16,
    pub url: String,
}

/// One logical instance per workspace session. Any call may fail; callers
/// must not assume the filesystem exists before a successful `mount`.
pub trait SandboxService: Send + Sync {
    fn mount(&self, files: MountTree) -> BoxFuture<'_, Result<()>>;

    fn spawn(&self, command: String, args: Vec<String>) -> BoxFuture<'_, Result<SandboxProcess>>;

    fn write_file<'a>(&'a self, path: &'a str, content: &'a str) -> BoxFuture<'a, Result<()>>;

    fn path_exists<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<bool>>;

    /// Resolves when the sandboxed dev server reports ready. Consumed once
    /// per bootstrap run.
    fn server_ready(&self) -> BoxFuture<'_, Result<ServerReady>>;
}
