//! The host document: the registry of attached visual trees.
//!
//! This is the one shared mutable resource of the export pipeline. Every tree an export
//! mounts is created, read and removed within that export; `MountGuard` makes the
//! removal unconditional. Capture passes never read the live entry directly: they take
//! a `RealizedTree`, an immutable snapshot that later mutations cannot reach.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::render::tree::VisualTree;

/// Where off-screen trees are attached, in document coordinates.
pub const OFFSCREEN_ORIGIN: (f32, f32) = (-10000.0, -10000.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// An on-screen preview at the document origin.
    Visible,
    /// Laid out normally but positioned far outside the viewport.
    OffScreen,
    /// Attached under a collapsed ancestor; measures as zero size.
    Hidden,
}

impl Placement {
    fn origin(self) -> (f32, f32) {
        match self {
            Placement::OffScreen => OFFSCREEN_ORIGIN,
            Placement::Visible | Placement::Hidden => (0.0, 0.0),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("element '{0}' is already mounted")]
    AlreadyMounted(String),

    #[error("element '{0}' is not mounted")]
    NotMounted(String),
}

struct MountedTree {
    tree: Arc<VisualTree>,
    placement: Placement,
}

/// A settled, immutable view of one mounted tree.
#[derive(Debug, Clone)]
pub struct RealizedTree {
    pub id: String,
    pub tree: Arc<VisualTree>,
    pub origin: (f32, f32),
    pub placement: Placement,
}

impl RealizedTree {
    /// Measured content box. Zero for trees under a collapsed ancestor.
    pub fn measured_size(&self) -> (f32, f32) {
        match self.placement {
            Placement::Hidden => (0.0, 0.0),
            _ => self.tree.size(),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.tree.epoch()
    }
}

pub struct HostDocument {
    trees: Mutex<HashMap<String, MountedTree>>,
    settle: Duration,
}

impl HostDocument {
    pub fn new(settle: Duration) -> Self {
        HostDocument {
            trees: Mutex::new(HashMap::new()),
            settle,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, MountedTree>> {
        self.trees.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attaches `tree` under `id`. Ids are unique within the document.
    pub fn mount(&self, id: &str, tree: VisualTree, placement: Placement) -> Result<(), HostError> {
        let mut trees = self.lock();
        if trees.contains_key(id) {
            return Err(HostError::AlreadyMounted(id.to_string()));
        }
        debug!(id, ?placement, nodes = tree.len(), "Mounting visual tree");
        trees.insert(
            id.to_string(),
            MountedTree {
                tree: Arc::new(tree),
                placement,
            },
        );
        Ok(())
    }

    /// Attaches `tree` under `id`, replacing whatever was mounted there.
    pub fn remount(&self, id: &str, tree: VisualTree, placement: Placement) {
        debug!(id, ?placement, nodes = tree.len(), "Remounting visual tree");
        self.lock().insert(
            id.to_string(),
            MountedTree {
                tree: Arc::new(tree),
                placement,
            },
        );
    }

    /// Moves a mounted tree. Returns false when `id` is not mounted.
    pub fn set_placement(&self, id: &str, placement: Placement) -> bool {
        match self.lock().get_mut(id) {
            Some(mounted) => {
                mounted.placement = placement;
                true
            }
            None => false,
        }
    }

    /// Mounts `tree` and returns a guard that detaches it when dropped.
    pub fn mount_scoped(
        self: &Arc<Self>,
        id: &str,
        tree: VisualTree,
        placement: Placement,
    ) -> Result<MountGuard, HostError> {
        self.mount(id, tree, placement)?;
        Ok(MountGuard {
            host: Arc::clone(self),
            id: id.to_string(),
        })
    }

    /// Detaches `id`. Returns whether anything was removed.
    pub fn unmount(&self, id: &str) -> bool {
        let removed = self.lock().remove(id).is_some();
        if removed {
            debug!(id, "Unmounted visual tree");
        }
        removed
    }

    #[cfg(test)]
    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    #[cfg(test)]
    pub fn mounted_count(&self) -> usize {
        self.lock().len()
    }

    pub fn snapshot(&self, id: &str) -> Option<RealizedTree> {
        self.lock().get(id).map(|mounted| RealizedTree {
            id: id.to_string(),
            tree: Arc::clone(&mounted.tree),
            origin: mounted.placement.origin(),
            placement: mounted.placement,
        })
    }

    /// Mutates a mounted tree in place and returns its new layout epoch.
    ///
    /// Snapshots taken earlier keep the state they captured.
    pub fn update<F>(&self, id: &str, f: F) -> Result<u64, HostError>
    where
        F: FnOnce(&mut VisualTree),
    {
        let mut trees = self.lock();
        let mounted = trees
            .get_mut(id)
            .ok_or_else(|| HostError::NotMounted(id.to_string()))?;
        let tree = Arc::make_mut(&mut mounted.tree);
        f(tree);
        Ok(tree.epoch())
    }

    pub fn measured_size(&self, id: &str) -> Option<(f32, f32)> {
        self.snapshot(id).map(|realized| realized.measured_size())
    }

    /// Waits for one layout+paint cycle: the configured timer, then a cooperative yield.
    pub async fn settle(&self) {
        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }
        tokio::task::yield_now().await;
    }
}

/// Detaches its tree from the host document on drop, on every exit path.
pub struct MountGuard {
    host: Arc<HostDocument>,
    id: String,
}

#[cfg(test)]
impl MountGuard {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for MountGuard {
    fn drop(&mut self) {
        self.host.unmount(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::style::ComputedStyle;

    fn tree(height: f32) -> VisualTree {
        let mut tree = VisualTree::new(ComputedStyle::default(), 100.0);
        tree.rect_mut(tree.root()).height = height;
        tree
    }

    #[test]
    fn test_mount_rejects_duplicate_ids() {
        let host = HostDocument::new(Duration::ZERO);
        host.mount("preview", tree(10.0), Placement::Visible).unwrap();
        assert_eq!(
            host.mount("preview", tree(10.0), Placement::Visible),
            Err(HostError::AlreadyMounted("preview".into()))
        );
    }

    #[test]
    fn test_guard_unmounts_on_drop() {
        let host = Arc::new(HostDocument::new(Duration::ZERO));
        {
            let guard = host.mount_scoped("export-1", tree(10.0), Placement::OffScreen).unwrap();
            assert!(host.contains(guard.id()));
        }
        assert!(!host.contains("export-1"), "guard drop must detach the tree");
        assert_eq!(host.mounted_count(), 0);
    }

    #[test]
    fn test_hidden_tree_measures_zero() {
        let host = HostDocument::new(Duration::ZERO);
        host.mount("hidden", tree(50.0), Placement::Hidden).unwrap();
        assert_eq!(host.measured_size("hidden"), Some((0.0, 0.0)));
        host.mount("shown", tree(50.0), Placement::Visible).unwrap();
        assert_eq!(host.measured_size("shown"), Some((100.0, 50.0)));
    }

    #[test]
    fn test_offscreen_origin() {
        let host = HostDocument::new(Duration::ZERO);
        host.mount("off", tree(5.0), Placement::OffScreen).unwrap();
        assert_eq!(host.snapshot("off").unwrap().origin, OFFSCREEN_ORIGIN);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_updates() {
        let host = HostDocument::new(Duration::ZERO);
        host.mount("t", tree(10.0), Placement::Visible).unwrap();
        let before = host.snapshot("t").unwrap();
        let epoch = host
            .update("t", |tree| tree.rect_mut(tree.root()).height = 99.0)
            .unwrap();
        assert!(epoch > before.epoch());
        assert_eq!(before.tree.size().1, 10.0, "snapshot keeps captured layout");
        assert_eq!(host.measured_size("t"), Some((100.0, 99.0)));
    }

    #[test]
    fn test_update_unknown_id() {
        let host = HostDocument::new(Duration::ZERO);
        assert_eq!(
            host.update("nope", |_| {}),
            Err(HostError::NotMounted("nope".into()))
        );
    }

    #[test]
    fn test_remount_replaces_and_placement_moves() {
        let host = HostDocument::new(Duration::ZERO);
        host.remount("preview", tree(10.0), Placement::Visible);
        host.remount("preview", tree(20.0), Placement::Visible);
        assert_eq!(host.mounted_count(), 1);
        assert_eq!(host.measured_size("preview"), Some((100.0, 20.0)));

        assert!(host.set_placement("preview", Placement::Hidden));
        assert_eq!(host.measured_size("preview"), Some((0.0, 0.0)));
        assert!(!host.set_placement("missing", Placement::Visible));
    }

    #[tokio::test]
    async fn test_settle_completes() {
        let host = HostDocument::new(Duration::from_millis(1));
        host.settle().await;
    }
}
