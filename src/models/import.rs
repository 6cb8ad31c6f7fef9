//! Builds a virtual tree from an on-disk project directory.

use std::io;
use std::path::Path;

use super::vtree::{VFile, VFolder, VNode};

pub fn should_ignore(name: &str) -> bool {
    matches!(
        name,
        ".DS_Store"
            | ".Spotlight-V100"
            | ".Trashes"
            | ".fseventsd"
            | ".TemporaryItems"
            | "Thumbs.db"
            | "desktop.ini"
            | ".git"
            | "node_modules"
            | "target"
    )
}

/// Splits a leaf name into (filename, extension) at the last dot.
/// `Makefile` has no extension, `archive.tar.gz` splits as (`archive.tar`, `gz`).
fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx + 1..]),
        _ => (name, ""),
    }
}

fn read_folder(dir: &Path, name: &str) -> io::Result<VFolder> {
    let mut folder = VFolder::new(name);

    let mut entries: Vec<_> = std::fs::read_dir(dir)?.collect::<io::Result<_>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let entry_name = entry.file_name();
        let entry_name = entry_name.to_string_lossy();
        if should_ignore(&entry_name) {
            continue;
        }

        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            folder
                .items
                .push(VNode::Folder(read_folder(&entry.path(), &entry_name)?));
        } else if file_type.is_file() {
            // Binary files are skipped; the sandbox mount format carries text.
            let Ok(content) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            let (filename, extension) = split_name(&entry_name);
            folder
                .items
                .push(VNode::File(VFile::new(filename, extension, content)));
        }
    }

    Ok(folder)
}

/// Reads a project directory into a virtual tree rooted at the reserved
/// root folder name. Junk and dependency directories are skipped.
pub fn import_dir(path: &Path) -> io::Result<VFolder> {
    let mut root = read_folder(path, "")?;
    root.folder_name = super::vtree::ROOT_FOLDER_NAME.into();
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn split_name_handles_dotfiles_and_multi_dots() {
        assert_eq!(split_name("index.ts"), ("index", "ts"));
        assert_eq!(split_name("Makefile"), ("Makefile", ""));
        assert_eq!(split_name(".gitignore"), (".gitignore", ""));
        assert_eq!(split_name("archive.tar.gz"), ("archive.tar", "gz"));
    }

    #[test]
    fn import_dir_builds_nested_tree() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/index.ts"), "hello").unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        std::fs::create_dir(dir.path().join("node_modules")).unwrap();
        std::fs::write(dir.path().join("node_modules/junk.js"), "x").unwrap();

        let root = import_dir(dir.path()).unwrap();
        let probe = VFile::new("index", "ts", "");
        assert_eq!(root.resolve_path(&probe).as_deref(), Some("src/index.ts"));

        let mut paths = root.file_paths("");
        paths.sort();
        assert_eq!(paths, vec!["package.json", "src/index.ts"]);
    }
}
