//! Workspace store: the single source of truth for what files exist and
//! what is open, plus the persistence hand-off after every structural
//! mutation.
//!
//! One workspace per interactive session. All mutations go through the
//! methods here; nothing else touches the tree.

use std::fmt;
use std::sync::{Arc, Mutex};

use compact_str::CompactString;
use rustc_hash::FxHashMap;
use tokio::task::JoinSet;

use crate::models::{TreeError, VFile, VFolder};
use crate::services::ports::{
    EditorSurface, ProjectStore, SandboxError, SandboxService, StoreError,
};

use super::sync::SyncQueue;

#[derive(Debug)]
pub enum WorkspaceError {
    PathNotFound(String),
    DuplicateEntry(String),
    Persistence(StoreError),
    SandboxIo(SandboxError),
}

impl fmt::Display for WorkspaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkspaceError::PathNotFound(path) => write!(f, "path not found: {path}"),
            WorkspaceError::DuplicateEntry(name) => write!(f, "entry already exists: {name}"),
            WorkspaceError::Persistence(e) => write!(f, "persistence failure: {e}"),
            WorkspaceError::SandboxIo(e) => write!(f, "sandbox io failure: {e}"),
        }
    }
}

impl std::error::Error for WorkspaceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorkspaceError::Persistence(e) => Some(e),
            WorkspaceError::SandboxIo(e) => Some(e),
            _ => None,
        }
    }
}

fn tree_error(e: TreeError, subject: &str) -> WorkspaceError {
    match e {
        TreeError::PathNotFound => WorkspaceError::PathNotFound(subject.to_string()),
        TreeError::DuplicateEntry => WorkspaceError::DuplicateEntry(subject.to_string()),
    }
}

fn join_path(parent: &str, leaf: &str) -> String {
    let parent = parent.trim_matches('/');
    if parent.is_empty() {
        leaf.to_string()
    } else {
        format!("{parent}/{leaf}")
    }
}

/// A projection of a file plus transient edit state. The buffer may
/// diverge from the tree's copy until an explicit save.
#[derive(Debug, Clone)]
pub struct OpenFile {
    pub id: String,
    pub filename: CompactString,
    pub file_extension: CompactString,
    pub content: String,
    pub original_content: String,
}

impl OpenFile {
    pub fn has_unsaved_changes(&self) -> bool {
        self.content != self.original_content
    }

    pub fn display_name(&self) -> String {
        if self.file_extension.is_empty() {
            self.filename.to_string()
        } else {
            format!("{}.{}", self.filename, self.file_extension)
        }
    }
}

/// Aggregate result of [`Workspace::save_all`]. Partial failure is
/// reported here instead of aborting the batch.
#[derive(Debug, Default)]
pub struct SaveReport {
    pub saved: usize,
    pub failed: usize,
    pub errors: Vec<(String, WorkspaceError)>,
}

pub struct Workspace {
    project_id: String,
    tree: VFolder,
    open_files: Vec<OpenFile>,
    active_file_id: Option<String>,
    store: Arc<dyn ProjectStore>,
    sandbox: Option<Arc<dyn SandboxService>>,
    sync: Arc<Mutex<SyncQueue>>,
}

impl Workspace {
    /// Loads the project tree from the store and builds the workspace
    /// context around it.
    pub async fn init(
        project_id: impl Into<String>,
        store: Arc<dyn ProjectStore>,
    ) -> Result<Self, WorkspaceError> {
        let project_id = project_id.into();
        let tree = store
            .load(&project_id)
            .await
            .map_err(WorkspaceError::Persistence)?;
        tracing::info!(project_id = %project_id, "workspace initialized");
        Ok(Self::from_tree(project_id, tree, store))
    }

    /// Builds a workspace around an already-materialized tree, e.g. a
    /// freshly imported project that has not been persisted yet.
    pub fn from_tree(
        project_id: impl Into<String>,
        tree: VFolder,
        store: Arc<dyn ProjectStore>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            tree,
            open_files: Vec::new(),
            active_file_id: None,
            store,
            sandbox: None,
            sync: Arc::new(Mutex::new(SyncQueue::new())),
        }
    }

    pub fn dispose(mut self) {
        self.close_all_files();
        self.sandbox = None;
        tracing::info!(project_id = %self.project_id, "workspace disposed");
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn tree(&self) -> &VFolder {
        &self.tree
    }

    pub fn open_files(&self) -> &[OpenFile] {
        &self.open_files
    }

    pub fn active_file_id(&self) -> Option<&str> {
        self.active_file_id.as_deref()
    }

    pub fn active_file(&self) -> Option<&OpenFile> {
        let id = self.active_file_id.as_deref()?;
        self.open_files.iter().find(|t| t.id == id)
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.open_files.iter().any(|t| t.has_unsaved_changes())
    }

    /// The sync queue shared with the bootstrap machine, so a save racing
    /// the initial mount defers instead of writing into a filesystem that
    /// does not exist yet.
    pub fn sync_queue(&self) -> Arc<Mutex<SyncQueue>> {
        Arc::clone(&self.sync)
    }

    pub fn attach_sandbox(&mut self, sandbox: Arc<dyn SandboxService>) {
        self.sandbox = Some(sandbox);
    }

    pub fn detach_sandbox(&mut self) {
        self.sandbox = None;
        if let Ok(mut queue) = self.sync.lock() {
            queue.mark_unmounted();
        }
    }

    // ---- structural mutations -------------------------------------------

    pub async fn add_file(&mut self, file: VFile, parent_path: &str) -> Result<(), WorkspaceError> {
        let display = file.display_name();
        self.tree
            .insert_file(parent_path, file.clone())
            .map_err(|e| match e {
                TreeError::PathNotFound => tree_error(e, parent_path),
                TreeError::DuplicateEntry => tree_error(e, &display),
            })?;

        let path = join_path(parent_path, &display);
        self.write_through(&path, &file.content).await?;
        self.persist_current().await
    }

    pub async fn add_folder(
        &mut self,
        folder: VFolder,
        parent_path: &str,
    ) -> Result<(), WorkspaceError> {
        let name = folder.folder_name.to_string();
        self.tree
            .insert_folder(parent_path, folder)
            .map_err(|e| match e {
                TreeError::PathNotFound => tree_error(e, parent_path),
                TreeError::DuplicateEntry => tree_error(e, &name),
            })?;
        // No sandbox write for an empty folder; the first file underneath
        // materializes it.
        self.persist_current().await
    }

    pub async fn delete_file(
        &mut self,
        file: &VFile,
        parent_path: &str,
    ) -> Result<(), WorkspaceError> {
        let id = join_path(parent_path, &file.display_name());
        self.tree
            .remove_file(parent_path, file)
            .map_err(|e| tree_error(e, &id))?;
        self.close_file(&id);
        self.persist_current().await
    }

    pub async fn delete_folder(
        &mut self,
        folder_name: &str,
        parent_path: &str,
    ) -> Result<(), WorkspaceError> {
        let folder_path = join_path(parent_path, folder_name);
        let descendant_ids = self
            .tree
            .folder_at_path(&folder_path)
            .map(|folder| folder.file_paths(&folder_path))
            .ok_or_else(|| WorkspaceError::PathNotFound(folder_path.clone()))?;

        for id in &descendant_ids {
            self.close_file(id);
        }

        self.tree
            .remove_folder(parent_path, folder_name)
            .map_err(|e| tree_error(e, &folder_path))?;
        self.persist_current().await
    }

    /// Renames a file and regenerates the id of its open tab, carrying any
    /// unsaved buffer content over to the new id.
    pub async fn rename_file(
        &mut self,
        file: &VFile,
        new_name: &str,
        new_extension: &str,
        parent_path: &str,
    ) -> Result<(), WorkspaceError> {
        let old_id = join_path(parent_path, &file.display_name());
        self.tree
            .rename_file(parent_path, file, new_name, new_extension)
            .map_err(|e| match e {
                TreeError::PathNotFound => tree_error(e, &old_id),
                TreeError::DuplicateEntry => {
                    tree_error(e, &join_path(parent_path, new_name))
                }
            })?;

        let renamed = VFile::new(new_name, new_extension, "");
        let new_id = join_path(parent_path, &renamed.display_name());
        if let Some(tab) = self.open_files.iter_mut().find(|t| t.id == old_id) {
            tab.id = new_id.clone();
            tab.filename = new_name.into();
            tab.file_extension = new_extension.into();
        }
        if self.active_file_id.as_deref() == Some(old_id.as_str()) {
            self.active_file_id = Some(new_id);
        }

        self.persist_current().await
    }

    pub async fn rename_folder(
        &mut self,
        old_name: &str,
        new_name: &str,
        parent_path: &str,
    ) -> Result<(), WorkspaceError> {
        self.tree
            .rename_folder(parent_path, old_name, new_name)
            .map_err(|e| match e {
                TreeError::PathNotFound => tree_error(e, &join_path(parent_path, old_name)),
                TreeError::DuplicateEntry => tree_error(e, &join_path(parent_path, new_name)),
            })?;

        // Tab ids are path-based, so every descendant tab gets a new id.
        let old_prefix = format!("{}/", join_path(parent_path, old_name));
        let new_prefix = format!("{}/", join_path(parent_path, new_name));
        for tab in &mut self.open_files {
            if let Some(rest) = tab.id.strip_prefix(old_prefix.as_str()) {
                let new_id = format!("{new_prefix}{rest}");
                if self.active_file_id.as_deref() == Some(tab.id.as_str()) {
                    self.active_file_id = Some(new_id.clone());
                }
                tab.id = new_id;
            }
        }

        self.persist_current().await
    }

    // ---- tab management -------------------------------------------------

    /// Activates the existing tab for this file, or opens a fresh one with
    /// a clean buffer. Returns the tab id.
    pub fn open_file(&mut self, file: &VFile) -> String {
        let id = self.tree.derive_id(file);
        if !self.open_files.iter().any(|t| t.id == id) {
            self.open_files.push(OpenFile {
                id: id.clone(),
                filename: file.filename.clone(),
                file_extension: file.file_extension.clone(),
                content: file.content.clone(),
                original_content: file.content.clone(),
            });
        }
        self.active_file_id = Some(id.clone());
        id
    }

    /// Closes a tab. When the active tab closes, the most recently opened
    /// remaining tab becomes active.
    pub fn close_file(&mut self, id: &str) -> bool {
        let before = self.open_files.len();
        self.open_files.retain(|t| t.id != id);
        let removed = self.open_files.len() != before;
        if removed && self.active_file_id.as_deref() == Some(id) {
            self.active_file_id = self.open_files.last().map(|t| t.id.clone());
        }
        removed
    }

    pub fn close_all_files(&mut self) -> bool {
        let removed = !self.open_files.is_empty();
        self.open_files.clear();
        self.active_file_id = None;
        removed
    }

    /// Updates only the tab buffer; the backing tree is untouched until an
    /// explicit save.
    pub fn update_file_content(&mut self, id: &str, content: &str) -> bool {
        let Some(tab) = self.open_files.iter_mut().find(|t| t.id == id) else {
            return false;
        };
        if tab.content == content {
            return false;
        }
        tab.content = content.to_string();
        true
    }

    pub fn pull_from_editor(&mut self, id: &str, editor: &dyn EditorSurface) -> bool {
        self.update_file_content(id, &editor.buffer_content())
    }

    // ---- saving ---------------------------------------------------------

    /// Commits a tab's buffer: resolves the file in the current tree,
    /// writes through to a live sandbox, persists, and only then marks the
    /// tab clean. On any failure the tab keeps its dirty state.
    pub async fn save(&mut self, id: &str) -> Result<(), WorkspaceError> {
        let (path, content) = {
            let tab = self
                .open_files
                .iter()
                .find(|t| t.id == id)
                .ok_or_else(|| WorkspaceError::PathNotFound(id.to_string()))?;
            let probe = VFile::new(tab.filename.clone(), tab.file_extension.clone(), "");
            // The file may have been deleted while the tab stayed open.
            let path = self
                .tree
                .resolve_path(&probe)
                .ok_or_else(|| WorkspaceError::PathNotFound(tab.display_name()))?;
            (path, tab.content.clone())
        };

        let mut updated = self.tree.clone();
        updated
            .set_file_content(&path, &content)
            .map_err(|e| tree_error(e, &path))?;

        self.write_through(&path, &content).await?;

        let stored = self
            .store
            .persist(&self.project_id, updated.clone())
            .await
            .map_err(WorkspaceError::Persistence)?;
        self.tree = stored.unwrap_or(updated);

        if let Some(tab) = self.open_files.iter_mut().find(|t| t.id == id) {
            tab.original_content = content;
        }
        tracing::debug!(path = %path, "file saved");
        Ok(())
    }

    /// Saves every dirty tab. Sandbox write-throughs fan out concurrently;
    /// persists run one change at a time against the accumulating tree, so
    /// every successful save ends up in the durable copy and no save
    /// overwrites another's. Tabs are only marked clean once their change
    /// is durable. One bad file does not block the rest.
    pub async fn save_all(&mut self) -> SaveReport {
        let mut report = SaveReport::default();
        let mut prepared = Vec::new();

        let dirty: Vec<(String, VFile, String)> = self
            .open_files
            .iter()
            .filter(|t| t.has_unsaved_changes())
            .map(|t| {
                (
                    t.id.clone(),
                    VFile::new(t.filename.clone(), t.file_extension.clone(), ""),
                    t.content.clone(),
                )
            })
            .collect();

        for (id, probe, content) in dirty {
            let Some(path) = self.tree.resolve_path(&probe) else {
                report
                    .errors
                    .push((id, WorkspaceError::PathNotFound(probe.display_name())));
                continue;
            };
            prepared.push((id, path, content));
        }

        let mut tasks = JoinSet::new();
        for (id, path, content) in &prepared {
            let sandbox = self.sandbox.clone();
            let sync = Arc::clone(&self.sync);
            let id = id.clone();
            let path = path.clone();
            let content = content.clone();
            tasks.spawn(async move {
                let result = write_through_with(sandbox.as_deref(), &sync, &path, &content).await;
                (id, result)
            });
        }

        let mut write_results: FxHashMap<String, Result<(), WorkspaceError>> =
            FxHashMap::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, result)) => {
                    write_results.insert(id, result);
                }
                Err(e) => {
                    tracing::error!(error = %e, "save task aborted");
                    report.errors.push((
                        String::new(),
                        WorkspaceError::Persistence(StoreError::Unavailable(e.to_string())),
                    ));
                }
            }
        }

        for (id, path, content) in prepared {
            match write_results.remove(&id) {
                Some(Ok(())) => {}
                Some(Err(e)) => {
                    tracing::warn!(tab = %id, error = %e, "save failed");
                    report.errors.push((id, e));
                    continue;
                }
                // Task aborted; already reported above.
                None => continue,
            }

            // A failed persist must not leak this change into later
            // candidates, so each one starts from the last durable tree.
            let mut candidate = self.tree.clone();
            if let Err(e) = candidate.set_file_content(&path, &content) {
                report.errors.push((id, tree_error(e, &path)));
                continue;
            }
            match self.store.persist(&self.project_id, candidate.clone()).await {
                Ok(stored) => {
                    self.tree = stored.unwrap_or(candidate);
                    if let Some(tab) = self.open_files.iter_mut().find(|t| t.id == id) {
                        tab.original_content = content;
                    }
                    report.saved += 1;
                }
                Err(e) => {
                    tracing::warn!(tab = %id, error = %e, "save failed");
                    report.errors.push((id, WorkspaceError::Persistence(e)));
                }
            }
        }

        report.failed = report.errors.len();
        tracing::info!(saved = report.saved, failed = report.failed, "save all finished");
        report
    }

    async fn write_through(&self, path: &str, content: &str) -> Result<(), WorkspaceError> {
        write_through_with(self.sandbox.as_deref(), &self.sync, path, content).await
    }

    async fn persist_current(&mut self) -> Result<(), WorkspaceError> {
        let stored = self
            .store
            .persist(&self.project_id, self.tree.clone())
            .await
            .map_err(WorkspaceError::Persistence)?;
        if let Some(normalized) = stored {
            self.tree = normalized;
        }
        Ok(())
    }
}

/// Shared write-through used by both the workspace and detached save
/// tasks: writes to the live sandbox filesystem, or defers into the sync
/// queue while the initial mount has not completed.
async fn write_through_with(
    sandbox: Option<&dyn SandboxService>,
    sync: &Mutex<SyncQueue>,
    path: &str,
    content: &str,
) -> Result<(), WorkspaceError> {
    let Some(sandbox) = sandbox else {
        return Ok(());
    };

    let deferred = match sync.lock() {
        Ok(mut queue) if !queue.is_mounted() => {
            queue.defer(path, content);
            true
        }
        _ => false,
    };
    if deferred {
        tracing::debug!(path = %path, "write deferred until sandbox mount");
        return Ok(());
    }

    sandbox
        .write_file(path, content)
        .await
        .map_err(WorkspaceError::SandboxIo)
}
