//! Mapping between the virtual tree and the sandbox's mount format.
//!
//! This is the single seam to keep in sync if the sandbox ever changes its
//! descriptor layout.

use std::collections::BTreeMap;

use crate::models::{VFile, VFolder, VNode};
use crate::services::ports::{MountNode, MountTree};

fn node_key(node: &VNode) -> String {
    match node {
        VNode::File(f) => f.display_name(),
        VNode::Folder(f) => f.folder_name.to_string(),
    }
}

fn to_mount_node(node: &VNode) -> MountNode {
    match node {
        VNode::File(f) => MountNode::File {
            contents: f.content.clone(),
        },
        VNode::Folder(folder) => {
            let mut children = BTreeMap::new();
            for item in &folder.items {
                children.insert(node_key(item), to_mount_node(item));
            }
            MountNode::Directory(children)
        }
    }
}

/// Transforms a tree into the sandbox mount descriptor. The root folder's
/// own name is excluded; its children become the top-level entries.
/// Deterministic and total over any well-formed tree.
pub fn to_mount_tree(root: &VFolder) -> MountTree {
    let mut out = BTreeMap::new();
    for item in &root.items {
        out.insert(node_key(item), to_mount_node(item));
    }
    out
}

fn from_mount_node(name: &str, node: &MountNode) -> VNode {
    match node {
        MountNode::File { contents } => {
            let (filename, extension) = match name.rfind('.') {
                Some(idx) if idx > 0 => (&name[..idx], &name[idx + 1..]),
                _ => (name, ""),
            };
            VNode::File(VFile::new(filename, extension, contents.clone()))
        }
        MountNode::Directory(children) => {
            let mut folder = VFolder::new(name);
            for (child_name, child) in children {
                folder.items.push(from_mount_node(child_name, child));
            }
            VNode::Folder(folder)
        }
    }
}

/// Reverses [`to_mount_tree`]. File names split at the last dot, so
/// trees without empty folders round-trip up to item ordering.
pub fn from_mount_tree(tree: &MountTree) -> VFolder {
    let mut root = VFolder::new_root();
    for (name, node) in tree {
        root.items.push(from_mount_node(name, node));
    }
    root
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VFile;

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
    fn folders_become_directories_and_files_leaves() {
        let mounted = to_mount_tree(&sample_tree());

        let MountNode::Directory(src) = &mounted["src"] else {
            panic!("src should be a directory");
        };
        assert_eq!(
            src["index.ts"],
            MountNode::File {
                contents: "hello".to_string()
            }
        );
        assert_eq!(
            mounted["package.json"],
            MountNode::File {
                contents: "{}".to_string()
            }
        );
    }

    #[test]
    fn wire_format_matches_sandbox_contract() {
        let mounted = to_mount_tree(&sample_tree());
        let json = serde_json::to_value(&mounted).unwrap();
        assert_eq!(json["package.json"]["file"]["contents"], "{}");
        assert_eq!(json["src"]["directory"]["index.ts"]["file"]["contents"], "hello");
    }

    #[test]
    fn round_trip_without_empty_folders() {
        let original = sample_tree();
        let back = from_mount_tree(&to_mount_tree(&original));

        // BTreeMap ordering may reorder siblings; compare by resolved paths.
        let mut a = original.file_paths("");
        let mut b = back.file_paths("");
        a.sort();
        b.sort();
        assert_eq!(a, b);

        let probe = VFile::new("index", "ts", "");
        let path = back.resolve_path(&probe).unwrap();
        let folder = back.folder_at_path("src").unwrap();
        assert_eq!(path, "src/index.ts");
        assert_eq!(folder.items[0].as_file().unwrap().content, "hello");
    }
}
