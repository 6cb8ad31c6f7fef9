#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use tokio::sync::{mpsc, oneshot};

use playbox::models::VFolder;
use playbox::services::ports::sandbox::{
    MountNode, MountTree, Result as SandboxResult, SandboxError, SandboxProcess, SandboxService,
    ServerReady,
};
use playbox::services::ports::store::{ProjectStore, Result as StoreResult, StoreError};
use playbox::services::ports::BoxFuture;

/// One spawn's scripted behavior: emitted output lines, then an exit code,
/// or no exit at all for a process that keeps running.
pub struct ScriptedProcess {
    pub output: Vec<String>,
    pub exit_code: Option<i32>,
}

impl ScriptedProcess {
    pub fn new(output: &[&str], exit_code: i32) -> Self {
        Self {
            output: output.iter().map(|s| s.to_string()).collect(),
            exit_code: Some(exit_code),
        }
    }

    /// A process that emits its output and then stays alive, like a dev
    /// server that reached steady state.
    pub fn running(output: &[&str]) -> Self {
        Self {
            output: output.iter().map(|s| s.to_string()).collect(),
            exit_code: None,
        }
    }
}

/// How `server_ready` behaves for the run under test.
pub enum ReadyBehavior {
    /// Resolves immediately with this port.
    Immediate(u16),
    /// Never resolves; used to race the dev server's exit.
    Never,
}

struct MockState {
    scripted: VecDeque<ScriptedProcess>,
    spawned: Vec<String>,
    mounted: Vec<MountTree>,
    writes: Vec<(String, String)>,
    existing_paths: HashSet<String>,
    // Keeps still-running processes' exit senders alive so their
    // receivers stay pending.
    held_exits: Vec<oneshot::Sender<i32>>,
}

/// Sandbox double: mounts and writes are recorded, spawns pop scripted
/// processes in order, `path_exists` answers from a path set fed by mounts,
/// writes, and explicit seeding.
pub struct MockSandbox {
    state: Mutex<MockState>,
    ready: ReadyBehavior,
}

impl MockSandbox {
    pub fn new(ready: ReadyBehavior) -> Self {
        Self {
            state: Mutex::new(MockState {
                scripted: VecDeque::new(),
                spawned: Vec::new(),
                mounted: Vec::new(),
                writes: Vec::new(),
                existing_paths: HashSet::new(),
                held_exits: Vec::new(),
            }),
            ready,
        }
    }

    pub fn script(&self, process: ScriptedProcess) {
        self.state.lock().unwrap().scripted.push_back(process);
    }

    /// Seeds a path as already present, as if a previous session set the
    /// instance up.
    pub fn seed_path(&self, path: &str) {
        self.state
            .lock()
            .unwrap()
            .existing_paths
            .insert(path.to_string());
    }

    pub fn spawned_commands(&self) -> Vec<String> {
        self.state.lock().unwrap().spawned.clone()
    }

    pub fn mounted_trees(&self) -> Vec<MountTree> {
        self.state.lock().unwrap().mounted.clone()
    }

    pub fn writes(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().writes.clone()
    }
}

fn collect_paths(prefix: &str, node: &MountNode, out: &mut HashSet<String>) {
    match node {
        MountNode::File { .. } => {
            out.insert(prefix.to_string());
        }
        MountNode::Directory(children) => {
            out.insert(prefix.to_string());
            for (name, child) in children {
                collect_paths(&format!("{prefix}/{name}"), child, out);
            }
        }
    }
}

impl SandboxService for MockSandbox {
    fn mount(&self, files: MountTree) -> BoxFuture<'_, SandboxResult<()>> {
        let mut state = self.state.lock().unwrap();
        for (name, node) in &files {
            collect_paths(name, node, &mut state.existing_paths);
        }
        state.mounted.push(files);
        Box::pin(async { Ok(()) })
    }

    fn spawn(
        &self,
        command: String,
        args: Vec<String>,
    ) -> BoxFuture<'_, SandboxResult<SandboxProcess>> {
        let mut state = self.state.lock().unwrap();
        let mut display = command;
        for arg in &args {
            display.push(' ');
            display.push_str(arg);
        }
        state.spawned.push(display.clone());

        let result = match state.scripted.pop_front() {
            Some(script) => {
                let (line_tx, line_rx) = mpsc::unbounded_channel();
                for line in script.output {
                    let _ = line_tx.send(line);
                }
                drop(line_tx);
                let (exit_tx, exit_rx) = oneshot::channel();
                match script.exit_code {
                    Some(code) => {
                        let _ = exit_tx.send(code);
                    }
                    None => state.held_exits.push(exit_tx),
                }
                Ok(SandboxProcess {
                    output: line_rx,
                    exit: exit_rx,
                })
            }
            None => Err(SandboxError::Spawn(format!("unscripted: {display}"))),
        };
        Box::pin(async { result })
    }

    fn write_file<'a>(&'a self, path: &'a str, content: &'a str) -> BoxFuture<'a, SandboxResult<()>> {
        let mut state = self.state.lock().unwrap();
        state.existing_paths.insert(path.to_string());
        state.writes.push((path.to_string(), content.to_string()));
        Box::pin(async { Ok(()) })
    }

    fn path_exists<'a>(&'a self, path: &'a str) -> BoxFuture<'a, SandboxResult<bool>> {
        let exists = self.state.lock().unwrap().existing_paths.contains(path);
        Box::pin(async move { Ok(exists) })
    }

    fn server_ready(&self) -> BoxFuture<'_, SandboxResult<ServerReady>> {
        match self.ready {
            ReadyBehavior::Immediate(port) => Box::pin(async move {
                Ok(ServerReady {
                    port,
                    url: format!("http://localhost:{port}"),
                })
            }),
            ReadyBehavior::Never => Box::pin(std::future::pending()),
        }
    }
}

/// In-memory project store for workspace tests.
#[derive(Default)]
pub struct MemoryStore {
    projects: Mutex<HashMap<String, VFolder>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(&self, project_id: &str) -> Option<VFolder> {
        self.projects.lock().unwrap().get(project_id).cloned()
    }

    pub fn put(&self, project_id: &str, tree: VFolder) {
        self.projects
            .lock()
            .unwrap()
            .insert(project_id.to_string(), tree);
    }
}

impl ProjectStore for MemoryStore {
    fn load<'a>(&'a self, project_id: &'a str) -> BoxFuture<'a, StoreResult<VFolder>> {
        let result = self
            .projects
            .lock()
            .unwrap()
            .get(project_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(project_id.to_string()));
        Box::pin(async { result })
    }

    fn persist<'a>(
        &'a self,
        project_id: &'a str,
        tree: VFolder,
    ) -> BoxFuture<'a, StoreResult<Option<VFolder>>> {
        self.projects
            .lock()
            .unwrap()
            .insert(project_id.to_string(), tree);
        Box::pin(async { Ok(None) })
    }
}
