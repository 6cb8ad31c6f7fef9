//! Project store adapter writing one pretty-printed JSON document per
//! project under a base directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::models::VFolder;
use crate::services::ports::store::{ProjectStore, Result, StoreError};
use crate::services::ports::BoxFuture;

pub struct JsonProjectStore {
    dir: PathBuf,
}

impl JsonProjectStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn document_path(&self, project_id: &str) -> PathBuf {
        self.dir.join(format!("{project_id}.json"))
    }
}

impl ProjectStore for JsonProjectStore {
    fn load<'a>(&'a self, project_id: &'a str) -> BoxFuture<'a, Result<VFolder>> {
        Box::pin(async move {
            let path = self.document_path(project_id);
            let raw = match tokio::fs::read_to_string(&path).await {
                Ok(raw) => raw,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(StoreError::NotFound(project_id.to_string()));
                }
                Err(e) => return Err(StoreError::Unavailable(e.to_string())),
            };
            serde_json::from_str(&raw).map_err(|e| StoreError::Serialize(e.to_string()))
        })
    }

    fn persist<'a>(
        &'a self,
        project_id: &'a str,
        tree: VFolder,
    ) -> BoxFuture<'a, Result<Option<VFolder>>> {
        Box::pin(async move {
            let doc = serde_json::to_string_pretty(&tree)
                .map_err(|e| StoreError::Serialize(e.to_string()))?;
            tokio::fs::create_dir_all(&self.dir)
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            tokio::fs::write(self.document_path(project_id), doc)
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            Ok(None)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{VFile, VFolder, VNode, ROOT_FOLDER_NAME};
    use tempfile::tempdir;

    fn sample_tree() -> VFolder {
        VFolder {
            folder_name: ROOT_FOLDER_NAME.into(),
            items: vec![VNode::File(VFile {
                filename: "main".into(),
                file_extension: "rs".into(),
                content: "fn main() {}".to_string(),
            })],
        }
    }

    #[tokio::test]
    async fn persist_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = JsonProjectStore::new(dir.path());

        store.persist("p1", sample_tree()).await.unwrap();
        let loaded = store.load("p1").await.unwrap();
        assert_eq!(loaded, sample_tree());
    }

    #[tokio::test]
    async fn load_missing_project_reports_not_found() {
        let dir = tempdir().unwrap();
        let store = JsonProjectStore::new(dir.path());

        let err = store.load("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn load_rejects_corrupt_document() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{ not json").unwrap();
        let store = JsonProjectStore::new(dir.path());

        let err = store.load("bad").await.unwrap_err();
        assert!(matches!(err, StoreError::Serialize(_)));
    }
}
