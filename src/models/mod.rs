//! Pure data models.

pub mod import;
pub mod vtree;

pub use import::{import_dir, should_ignore};
pub use vtree::{TreeError, VFile, VFolder, VNode, ROOT_FOLDER_NAME};
