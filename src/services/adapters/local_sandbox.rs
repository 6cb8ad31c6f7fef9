//! Sandbox adapter backed by a local directory and real OS processes.
//!
//! Mounts materialize under a root directory, processes run with that
//! directory as cwd, and the server-ready signal comes from probing the
//! configured TCP port until something accepts a connection.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};

use crate::services::ports::sandbox::{
    MountNode, MountTree, Result, SandboxError, SandboxProcess, SandboxService, ServerReady,
};
use crate::services::ports::BoxFuture;

const READY_PROBE_INTERVAL: Duration = Duration::from_millis(200);

pub struct LocalSandbox {
    root: PathBuf,
    ready_port: u16,
}

impl LocalSandbox {
    pub fn new(root: impl Into<PathBuf>, ready_port: u16) -> Self {
        Self {
            root: root.into(),
            ready_port,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

async fn pump_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).is_err() {
            break;
        }
    }
}

impl SandboxService for LocalSandbox {
    fn mount(&self, files: MountTree) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            tokio::fs::create_dir_all(&self.root).await?;
            let mut stack: Vec<(PathBuf, MountNode)> = files
                .into_iter()
                .map(|(name, node)| (self.root.join(name), node))
                .collect();

            while let Some((path, node)) = stack.pop() {
                match node {
                    MountNode::File { contents } => {
                        if let Some(parent) = path.parent() {
                            tokio::fs::create_dir_all(parent).await?;
                        }
                        tokio::fs::write(&path, contents).await?;
                    }
                    MountNode::Directory(children) => {
                        tokio::fs::create_dir_all(&path).await?;
                        for (name, child) in children {
                            stack.push((path.join(name), child));
                        }
                    }
                }
            }
            Ok(())
        })
    }

    fn spawn(&self, command: String, args: Vec<String>) -> BoxFuture<'_, Result<SandboxProcess>> {
        Box::pin(async move {
            let mut child = Command::new(&command)
                .args(&args)
                .current_dir(&self.root)
                .stdin(std::process::Stdio::null())
                .stdout(std::process::Stdio::piped())
                .stderr(std::process::Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| SandboxError::Spawn(format!("{command}: {e}")))?;

            let (line_tx, line_rx) = mpsc::unbounded_channel();
            if let Some(stdout) = child.stdout.take() {
                tokio::spawn(pump_lines(stdout, line_tx.clone()));
            }
            if let Some(stderr) = child.stderr.take() {
                tokio::spawn(pump_lines(stderr, line_tx.clone()));
            }
            drop(line_tx);

            let (exit_tx, exit_rx) = oneshot::channel();
            tokio::spawn(async move {
                let code = match child.wait().await {
                    Ok(status) => status.code().unwrap_or(-1),
                    Err(e) => {
                        tracing::error!(error = %e, "waiting on sandbox process failed");
                        -1
                    }
                };
                let _ = exit_tx.send(code);
            });

            Ok(SandboxProcess {
                output: line_rx,
                exit: exit_rx,
            })
        })
    }

    fn write_file<'a>(&'a self, path: &'a str, content: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let target = self.root.join(path);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&target, content).await?;
            Ok(())
        })
    }

    fn path_exists<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            let exists = tokio::fs::try_exists(self.root.join(path)).await?;
            Ok(exists)
        })
    }

    fn server_ready(&self) -> BoxFuture<'_, Result<ServerReady>> {
        Box::pin(async move {
            let port = self.ready_port;
            loop {
                match TcpStream::connect(("127.0.0.1", port)).await {
                    Ok(_) => {
                        return Ok(ServerReady {
                            port,
                            url: format!("http://localhost:{port}"),
                        });
                    }
                    Err(_) => tokio::time::sleep(READY_PROBE_INTERVAL).await,
                }
            }
        })
    }
}
