//! Staged sandbox bootstrap: transform the tree, mount it, install
//! dependencies, start the dev server, report the preview URL.
//!
//! One machine per sandbox instance. The happy path is linear
//! (`Idle → Transforming → Mounting → Installing → Starting → Ready`);
//! any stage failure lands in `Failed` and stays there until an explicit
//! reset. A sandbox whose filesystem already carries the setup marker is
//! treated as a reconnect: install and spawn are skipped and the machine
//! waits only for the server-ready signal.

use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::models::VFolder;
use crate::services::ports::{SandboxError, SandboxService};

use super::sync::SyncQueue;
use super::transform::to_mount_tree;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapStage {
    Idle,
    Transforming,
    Mounting,
    Installing,
    Starting,
    Ready,
    Failed,
}

impl fmt::Display for BootstrapStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BootstrapStage::Idle => "idle",
            BootstrapStage::Transforming => "transforming",
            BootstrapStage::Mounting => "mounting",
            BootstrapStage::Installing => "installing",
            BootstrapStage::Starting => "starting",
            BootstrapStage::Ready => "ready",
            BootstrapStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum BootstrapError {
    /// `run` was called while a previous run is in flight, finished, or
    /// failed. A failed machine never auto-retries; reset it first.
    NotIdle(BootstrapStage),
    Sandbox(SandboxError),
    Install(i32),
    Start(String),
}

impl fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootstrapError::NotIdle(stage) => {
                write!(f, "bootstrap already ran (stage: {stage})")
            }
            BootstrapError::Sandbox(e) => write!(f, "sandbox failure: {e}"),
            BootstrapError::Install(code) => {
                write!(f, "dependency install exited with code {code}")
            }
            BootstrapError::Start(msg) => write!(f, "dev server failed to start: {msg}"),
        }
    }
}

impl std::error::Error for BootstrapError {}

impl From<SandboxError> for BootstrapError {
    fn from(e: SandboxError) -> Self {
        BootstrapError::Sandbox(e)
    }
}

#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub install: CommandSpec,
    pub start: CommandSpec,
    /// File probed in the live filesystem to detect an already-initialized
    /// instance. A present manifest is taken to mean dependencies were
    /// installed; this is a heuristic, not a guarantee.
    pub setup_marker: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            install: CommandSpec::new("npm", &["install"]),
            start: CommandSpec::new("npm", &["run", "start"]),
            setup_marker: "package.json".to_string(),
        }
    }
}

#[derive(Default)]
struct LogInner {
    lines: Vec<String>,
    subscribers: Vec<mpsc::UnboundedSender<String>>,
}

/// Append-only log of the bootstrap run. Lines accumulate for cumulative
/// rendering; subscribers get past lines replayed plus everything after.
/// Appending never blocks on a consumer.
#[derive(Clone, Default)]
pub struct BootstrapLog {
    inner: Arc<Mutex<LogInner>>,
}

impl BootstrapLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, line: impl Into<String>) {
        let line = line.into();
        if let Ok(mut inner) = self.inner.lock() {
            inner.subscribers.retain(|tx| tx.send(line.clone()).is_ok());
            inner.lines.push(line);
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|inner| inner.lines.clone())
            .unwrap_or_default()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut inner) = self.inner.lock() {
            for line in &inner.lines {
                let _ = tx.send(line.clone());
            }
            inner.subscribers.push(tx);
        }
        rx
    }
}

pub struct BootstrapMachine {
    sandbox: Arc<dyn SandboxService>,
    sync: Arc<Mutex<SyncQueue>>,
    config: BootstrapConfig,
    stage: BootstrapStage,
    stage_tx: watch::Sender<BootstrapStage>,
    log: BootstrapLog,
    preview_url: Option<String>,
    output_pump: Option<JoinHandle<()>>,
    // Set by `reset`: the reconnect shortcut is only for an instance that
    // was initialized before this machine ever ran, not for a filesystem
    // this machine's own mount populated.
    force_setup: bool,
}

impl BootstrapMachine {
    pub fn new(
        sandbox: Arc<dyn SandboxService>,
        sync: Arc<Mutex<SyncQueue>>,
        config: BootstrapConfig,
    ) -> Self {
        let (stage_tx, _) = watch::channel(BootstrapStage::Idle);
        Self {
            sandbox,
            sync,
            config,
            stage: BootstrapStage::Idle,
            stage_tx,
            log: BootstrapLog::new(),
            preview_url: None,
            output_pump: None,
            force_setup: false,
        }
    }

    pub fn stage(&self) -> BootstrapStage {
        self.stage
    }

    pub fn subscribe_stage(&self) -> watch::Receiver<BootstrapStage> {
        self.stage_tx.subscribe()
    }

    pub fn log(&self) -> &BootstrapLog {
        &self.log
    }

    pub fn preview_url(&self) -> Option<&str> {
        self.preview_url.as_deref()
    }

    fn set_stage(&mut self, stage: BootstrapStage) {
        tracing::debug!(stage = %stage, "bootstrap stage");
        self.stage = stage;
        let _ = self.stage_tx.send(stage);
    }

    /// Drives the sandbox from the current tree to a running preview URL.
    /// Errors once the machine has left `Idle`; a prior `Failed` requires
    /// an explicit [`reset`](Self::reset).
    pub async fn run(&mut self, tree: &VFolder) -> Result<String, BootstrapError> {
        if self.stage != BootstrapStage::Idle {
            return Err(BootstrapError::NotIdle(self.stage));
        }

        match self.run_stages(tree).await {
            Ok(url) => Ok(url),
            Err(e) => {
                tracing::warn!(error = %e, "bootstrap failed");
                self.log.append(format!("error: {e}"));
                self.set_stage(BootstrapStage::Failed);
                Err(e)
            }
        }
    }

    async fn run_stages(&mut self, tree: &VFolder) -> Result<String, BootstrapError> {
        // An instance whose filesystem already carries the manifest was set
        // up by a previous session: skip install and wait for the server.
        // Not after a reset: a forced re-run must remount and reinstall
        // even though our own earlier mount left the manifest behind.
        if !self.force_setup && self.probe_existing_setup().await {
            self.log
                .append("Existing setup detected, reconnecting to running server");
            self.flush_deferred_writes().await?;
            return self.await_server_ready().await;
        }

        self.set_stage(BootstrapStage::Transforming);
        self.log.append("Transforming project files");
        let files = to_mount_tree(tree);

        self.set_stage(BootstrapStage::Mounting);
        self.log.append("Mounting files into sandbox");
        self.sandbox.mount(files).await?;
        self.flush_deferred_writes().await?;

        self.set_stage(BootstrapStage::Installing);
        self.log
            .append(format!("Installing dependencies: {}", self.config.install));
        let install = self.config.install.clone();
        let mut process = self
            .sandbox
            .spawn(install.program, install.args)
            .await?;
        while let Some(line) = process.output.recv().await {
            self.log.append(line);
        }
        let code = process
            .exit
            .await
            .map_err(|_| BootstrapError::Sandbox(SandboxError::Disconnected))?;
        if code != 0 {
            return Err(BootstrapError::Install(code));
        }

        self.set_stage(BootstrapStage::Starting);
        self.log
            .append(format!("Starting development server: {}", self.config.start));
        let start = self.config.start.clone();
        let mut process = self
            .sandbox
            .spawn(start.program, start.args)
            .await
            .map_err(|e| BootstrapError::Start(e.to_string()))?;

        // Server output keeps streaming while we wait for the ready
        // signal, and after it.
        let log = self.log.clone();
        let mut exit = process.exit;
        let mut output = process.output;
        self.output_pump = Some(tokio::spawn(async move {
            while let Some(line) = output.recv().await {
                log.append(line);
            }
        }));

        tokio::select! {
            ready = self.await_server_ready() => ready,
            code = &mut exit => {
                let code = code.unwrap_or(-1);
                Err(BootstrapError::Start(format!("process exited with code {code}")))
            }
        }
    }

    async fn await_server_ready(&mut self) -> Result<String, BootstrapError> {
        let ready = self
            .sandbox
            .server_ready()
            .await
            .map_err(|e| BootstrapError::Start(e.to_string()))?;
        self.log.append(format!("Server ready at {}", ready.url));
        self.preview_url = Some(ready.url.clone());
        self.set_stage(BootstrapStage::Ready);
        tracing::info!(url = %ready.url, port = ready.port, "sandbox ready");
        Ok(ready.url)
    }

    async fn probe_existing_setup(&self) -> bool {
        self.sandbox
            .path_exists(&self.config.setup_marker)
            .await
            .unwrap_or(false)
    }

    /// Marks the sandbox filesystem live and replays saves that were
    /// deferred while it did not exist yet.
    async fn flush_deferred_writes(&self) -> Result<(), BootstrapError> {
        let drained = match self.sync.lock() {
            Ok(mut queue) => queue.mark_mounted(),
            Err(_) => Vec::new(),
        };
        for (path, content) in drained {
            tracing::debug!(path = %path, "replaying deferred write");
            self.sandbox.write_file(&path, &content).await?;
        }
        Ok(())
    }

    /// Forced reset back to `Idle`: discards the preview URL, aborts the
    /// output pump so a stale run can never fire a duplicate ready, and
    /// re-arms write deferral for the coming re-mount. The next run does a
    /// full re-setup; the reconnect shortcut no longer applies.
    pub fn reset(&mut self) {
        if let Some(pump) = self.output_pump.take() {
            pump.abort();
        }
        self.force_setup = true;
        self.preview_url = None;
        if let Ok(mut queue) = self.sync.lock() {
            queue.mark_unmounted();
        }
        self.log.append("Bootstrap reset");
        self.set_stage(BootstrapStage::Idle);
    }
}

impl Drop for BootstrapMachine {
    fn drop(&mut self) {
        if let Some(pump) = self.output_pump.take() {
            pump.abort();
        }
    }
}
