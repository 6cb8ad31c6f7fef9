//! Virtual project tree: the in-memory representation of a multi-file
//! project, independent of any on-disk or sandbox copy.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved name of the folder that represents the whole project.
pub const ROOT_FOLDER_NAME: &str = "root";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeError {
    PathNotFound,
    DuplicateEntry,
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeError::PathNotFound => write!(f, "path does not resolve to a folder"),
            TreeError::DuplicateEntry => write!(f, "name already exists in parent"),
        }
    }
}

impl std::error::Error for TreeError {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VFile {
    pub filename: CompactString,
    pub file_extension: CompactString,
    pub content: String,
}

impl VFile {
    pub fn new(
        filename: impl Into<CompactString>,
        file_extension: impl Into<CompactString>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            file_extension: file_extension.into(),
            content: content.into(),
        }
    }

    /// `name.ext`, or just `name` for extension-less files.
    pub fn display_name(&self) -> String {
        if self.file_extension.is_empty() {
            self.filename.to_string()
        } else {
            format!("{}.{}", self.filename, self.file_extension)
        }
    }

    fn matches(&self, other: &VFile) -> bool {
        self.filename == other.filename && self.file_extension == other.file_extension
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VFolder {
    pub folder_name: CompactString,
    pub items: Vec<VNode>,
}

/// A folder object carries `folderName` + `items` on the wire, a file
/// object `filename` + `fileExtension` + `content`, so the variants are
/// distinguishable without a tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VNode {
    Folder(VFolder),
    File(VFile),
}

impl VNode {
    pub fn as_file(&self) -> Option<&VFile> {
        match self {
            VNode::File(f) => Some(f),
            VNode::Folder(_) => None,
        }
    }

    pub fn as_folder(&self) -> Option<&VFolder> {
        match self {
            VNode::Folder(f) => Some(f),
            VNode::File(_) => None,
        }
    }
}

impl VFolder {
    pub fn new(folder_name: impl Into<CompactString>) -> Self {
        Self {
            folder_name: folder_name.into(),
            items: Vec::new(),
        }
    }

    pub fn new_root() -> Self {
        Self::new(ROOT_FOLDER_NAME)
    }

    /// Depth-first search for a file matching on (filename, extension).
    /// Returns the slash-joined path relative to this folder, the folder's
    /// own name excluded. Absence is an ordinary outcome, not an error.
    pub fn resolve_path(&self, file: &VFile) -> Option<String> {
        fn walk(folder: &VFolder, file: &VFile, so_far: &mut Vec<String>) -> Option<String> {
            for item in &folder.items {
                match item {
                    VNode::Folder(sub) => {
                        so_far.push(sub.folder_name.to_string());
                        if let Some(found) = walk(sub, file, so_far) {
                            return Some(found);
                        }
                        so_far.pop();
                    }
                    VNode::File(f) => {
                        if f.matches(file) {
                            let mut parts = so_far.clone();
                            parts.push(f.display_name());
                            return Some(parts.join("/"));
                        }
                    }
                }
            }
            None
        }

        walk(self, file, &mut Vec::new())
    }

    /// Stable path-based identity for a file, falling back to its display
    /// name while the file is not yet attached to the tree.
    pub fn derive_id(&self, file: &VFile) -> String {
        self.resolve_path(file)
            .unwrap_or_else(|| file.display_name())
    }

    /// Navigates a slash-separated path of folder names. An empty path (or
    /// `"/"`) is this folder itself.
    pub fn folder_at_path(&self, path: &str) -> Option<&VFolder> {
        let mut current = self;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            current = current.items.iter().find_map(|item| match item {
                VNode::Folder(f) if f.folder_name == part => Some(f),
                _ => None,
            })?;
        }
        Some(current)
    }

    pub fn folder_at_path_mut(&mut self, path: &str) -> Option<&mut VFolder> {
        let mut current = self;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            current = current.items.iter_mut().find_map(|item| match item {
                VNode::Folder(f) if f.folder_name == part => Some(f),
                _ => None,
            })?;
        }
        Some(current)
    }

    fn has_file(&self, filename: &str, extension: &str) -> bool {
        self.items.iter().any(|item| {
            matches!(item, VNode::File(f)
                if f.filename == filename && f.file_extension == extension)
        })
    }

    fn has_folder(&self, name: &str) -> bool {
        self.items
            .iter()
            .any(|item| matches!(item, VNode::Folder(f) if f.folder_name == name))
    }

    pub fn insert_file(&mut self, parent_path: &str, file: VFile) -> Result<(), TreeError> {
        let parent = self
            .folder_at_path_mut(parent_path)
            .ok_or(TreeError::PathNotFound)?;
        if parent.has_file(&file.filename, &file.file_extension) {
            return Err(TreeError::DuplicateEntry);
        }
        parent.items.push(VNode::File(file));
        Ok(())
    }

    pub fn insert_folder(&mut self, parent_path: &str, folder: VFolder) -> Result<(), TreeError> {
        let parent = self
            .folder_at_path_mut(parent_path)
            .ok_or(TreeError::PathNotFound)?;
        if parent.has_folder(&folder.folder_name) {
            return Err(TreeError::DuplicateEntry);
        }
        parent.items.push(VNode::Folder(folder));
        Ok(())
    }

    pub fn remove_file(&mut self, parent_path: &str, file: &VFile) -> Result<VFile, TreeError> {
        let parent = self
            .folder_at_path_mut(parent_path)
            .ok_or(TreeError::PathNotFound)?;
        let index = parent
            .items
            .iter()
            .position(|item| matches!(item, VNode::File(f) if f.matches(file)))
            .ok_or(TreeError::PathNotFound)?;
        match parent.items.remove(index) {
            VNode::File(f) => Ok(f),
            VNode::Folder(_) => unreachable!("position matched a file"),
        }
    }

    pub fn remove_folder(&mut self, parent_path: &str, name: &str) -> Result<VFolder, TreeError> {
        let parent = self
            .folder_at_path_mut(parent_path)
            .ok_or(TreeError::PathNotFound)?;
        let index = parent
            .items
            .iter()
            .position(|item| matches!(item, VNode::Folder(f) if f.folder_name == name))
            .ok_or(TreeError::PathNotFound)?;
        match parent.items.remove(index) {
            VNode::Folder(f) => Ok(f),
            VNode::File(_) => unreachable!("position matched a folder"),
        }
    }

    /// Renames a file in place. Validation happens before any mutation,
    /// so a failure leaves the tree untouched.
    pub fn rename_file(
        &mut self,
        parent_path: &str,
        file: &VFile,
        new_name: &str,
        new_extension: &str,
    ) -> Result<(), TreeError> {
        let parent = self
            .folder_at_path_mut(parent_path)
            .ok_or(TreeError::PathNotFound)?;

        let changed = file.filename != new_name || file.file_extension != new_extension;
        if changed && parent.has_file(new_name, new_extension) {
            return Err(TreeError::DuplicateEntry);
        }

        let target = parent
            .items
            .iter_mut()
            .find_map(|item| match item {
                VNode::File(f) if f.matches(file) => Some(f),
                _ => None,
            })
            .ok_or(TreeError::PathNotFound)?;

        target.filename = new_name.into();
        target.file_extension = new_extension.into();
        Ok(())
    }

    pub fn rename_folder(
        &mut self,
        parent_path: &str,
        old_name: &str,
        new_name: &str,
    ) -> Result<(), TreeError> {
        let parent = self
            .folder_at_path_mut(parent_path)
            .ok_or(TreeError::PathNotFound)?;

        if old_name != new_name && parent.has_folder(new_name) {
            return Err(TreeError::DuplicateEntry);
        }

        let target = parent
            .items
            .iter_mut()
            .find_map(|item| match item {
                VNode::Folder(f) if f.folder_name == old_name => Some(f),
                _ => None,
            })
            .ok_or(TreeError::PathNotFound)?;

        target.folder_name = new_name.into();
        Ok(())
    }

    /// Replaces the content of the file at a slash-joined path (as returned
    /// by [`resolve_path`](Self::resolve_path)).
    pub fn set_file_content(&mut self, path: &str, content: &str) -> Result<(), TreeError> {
        let (dir, leaf) = match path.rsplit_once('/') {
            Some((dir, leaf)) => (dir, leaf),
            None => ("", path),
        };
        let parent = self
            .folder_at_path_mut(dir)
            .ok_or(TreeError::PathNotFound)?;
        let target = parent
            .items
            .iter_mut()
            .find_map(|item| match item {
                VNode::File(f) if f.display_name() == leaf => Some(f),
                _ => None,
            })
            .ok_or(TreeError::PathNotFound)?;
        target.content = content.to_string();
        Ok(())
    }

    /// Slash-joined paths of every file in this subtree, each prefixed with
    /// `prefix` (pass the subtree's own path, or `""` for the root).
    pub fn file_paths(&self, prefix: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack: Vec<(String, &VFolder)> = vec![(prefix.to_string(), self)];
        while let Some((base, folder)) = stack.pop() {
            for item in &folder.items {
                match item {
                    VNode::File(f) => {
                        if base.is_empty() {
                            out.push(f.display_name());
                        } else {
                            out.push(format!("{}/{}", base, f.display_name()));
                        }
                    }
                    VNode::Folder(sub) => {
                        let path = if base.is_empty() {
                            sub.folder_name.to_string()
                        } else {
                            format!("{}/{}", base, sub.folder_name)
                        };
                        stack.push((path, sub));
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> VFolder {
        let mut root = VFolder::new_root();
        root.insert_folder("", VFolder::new("src")).unwrap();
        root.insert_file("src", VFile::new("index", "ts", "hello"))
            .unwrap();
        root.insert_file("", VFile::new("package", "json", "{}"))
            .unwrap();
        root
    }

    #[test]
    fn resolve_path_finds_nested_file() {
        let root = sample_tree();
        let probe = VFile::new("index", "ts", "");
        assert_eq!(root.resolve_path(&probe).as_deref(), Some("src/index.ts"));
    }

    #[test]
    fn resolve_path_returns_none_for_absent_file() {
        let root = sample_tree();
        let probe = VFile::new("missing", "ts", "");
        assert_eq!(root.resolve_path(&probe), None);
    }

    #[test]
    fn derive_id_falls_back_to_display_name() {
        let root = sample_tree();
        let detached = VFile::new("new", "rs", "");
        assert_eq!(root.derive_id(&detached), "new.rs");
        let attached = VFile::new("index", "ts", "");
        assert_eq!(root.derive_id(&attached), "src/index.ts");
    }

    #[test]
    fn display_name_omits_empty_extension() {
        let file = VFile::new("Makefile", "", "");
        assert_eq!(file.display_name(), "Makefile");
    }

    #[test]
    fn insert_file_rejects_duplicates() {
        let mut root = sample_tree();
        let err = root
            .insert_file("src", VFile::new("index", "ts", "again"))
            .unwrap_err();
        assert_eq!(err, TreeError::DuplicateEntry);
    }

    #[test]
    fn insert_file_rejects_missing_parent() {
        let mut root = sample_tree();
        let err = root
            .insert_file("nope", VFile::new("a", "ts", ""))
            .unwrap_err();
        assert_eq!(err, TreeError::PathNotFound);
    }

    #[test]
    fn same_name_different_extension_is_allowed() {
        let mut root = sample_tree();
        root.insert_file("src", VFile::new("index", "css", ""))
            .unwrap();
    }

    #[test]
    fn rename_file_validates_before_applying() {
        let mut root = sample_tree();
        root.insert_file("src", VFile::new("other", "ts", ""))
            .unwrap();

        let probe = VFile::new("other", "ts", "");
        let err = root
            .rename_file("src", &probe, "index", "ts")
            .unwrap_err();
        assert_eq!(err, TreeError::DuplicateEntry);
        // Failed rename is a no-op.
        assert!(root.resolve_path(&probe).is_some());
    }

    #[test]
    fn rename_folder_updates_paths() {
        let mut root = sample_tree();
        root.rename_folder("", "src", "lib").unwrap();
        let probe = VFile::new("index", "ts", "");
        assert_eq!(root.resolve_path(&probe).as_deref(), Some("lib/index.ts"));
    }

    #[test]
    fn set_file_content_by_path() {
        let mut root = sample_tree();
        root.set_file_content("src/index.ts", "updated").unwrap();
        let src = root.folder_at_path("src").unwrap();
        assert_eq!(src.items[0].as_file().unwrap().content, "updated");

        let err = root.set_file_content("src/gone.ts", "x").unwrap_err();
        assert_eq!(err, TreeError::PathNotFound);
    }

    #[test]
    fn file_paths_lists_whole_subtree() {
        let root = sample_tree();
        let mut paths = root.file_paths("");
        paths.sort();
        assert_eq!(paths, vec!["package.json", "src/index.ts"]);
    }

    #[test]
    fn serde_round_trip_keeps_wire_format() {
        let root = sample_tree();
        let json = serde_json::to_string(&root).unwrap();
        assert!(json.contains("\"folderName\":\"root\""));
        assert!(json.contains("\"fileExtension\":\"ts\""));
        let back: VFolder = serde_json::from_str(&json).unwrap();
        assert_eq!(back, root);
    }
}
