//! Write-through buffering between the workspace and the sandbox
//! filesystem.
//!
//! A save can race the bootstrap's mount: a write that arrives before the
//! initial mount completes must not land in a filesystem that does not yet
//! exist. Such writes are buffered here, last-write-wins per path, and
//! replayed by the bootstrap machine right after mounting.

use rustc_hash::FxHashMap;

#[derive(Debug, Default)]
pub struct SyncQueue {
    mounted: bool,
    pending: FxHashMap<String, String>,
}

impl SyncQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Buffers a write for replay after mount. Later writes to the same
    /// path replace earlier ones.
    pub fn defer(&mut self, path: &str, content: &str) {
        self.pending.insert(path.to_string(), content.to_string());
    }

    /// Marks the sandbox filesystem live and drains everything buffered
    /// so far, ready to be written through.
    pub fn mark_mounted(&mut self) -> Vec<(String, String)> {
        self.mounted = true;
        let mut drained: Vec<_> = self.pending.drain().collect();
        drained.sort();
        drained
    }

    /// Re-arms deferral, e.g. before a forced re-mount.
    pub fn mark_unmounted(&mut self) {
        self.mounted = false;
    }
}
