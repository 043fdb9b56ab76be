//! Publication of mapping tables to concurrent readers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use arc_swap::ArcSwap;
use tracing::debug;

use crate::mapping::table::MappingTable;
use crate::mapping::types::Block;

/// Owns the current [`MappingTable`].
///
/// Readers take an `Arc` snapshot and keep using it for as long as they
/// like; a rebuild publishes its table with a single pointer swap, so a
/// reader sees either the old table or the new one, never a partial build.
#[derive(Debug)]
pub struct MappingStore {
    current: ArcSwap<MappingTable>,
    next_epoch: AtomicU64,
}

impl Default for MappingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MappingStore {
    /// Create a store holding an empty table.
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(MappingTable::default()),
            next_epoch: AtomicU64::new(1),
        }
    }

    /// Current table.
    pub fn snapshot(&self) -> Arc<MappingTable> {
        self.current.load_full()
    }

    /// Build and publish a table on the calling thread.
    pub fn rebuild(&self, blocks: Vec<Block>) -> Arc<MappingTable> {
        let epoch = self.reserve_epoch();
        self.publish(Arc::new(MappingTable::build(blocks).with_epoch(epoch)))
    }

    /// Build and publish a table on a worker thread.
    ///
    /// The epoch is reserved before spawning, so a slow worker can never
    /// replace a table from a later layout pass.
    pub fn spawn_rebuild(self: &Arc<Self>, blocks: Vec<Block>) -> JoinHandle<()> {
        let epoch = self.reserve_epoch();
        let store = Arc::clone(self);
        thread::spawn(move || {
            let table = MappingTable::build(blocks).with_epoch(epoch);
            store.publish(Arc::new(table));
        })
    }

    fn reserve_epoch(&self) -> u64 {
        self.next_epoch.fetch_add(1, Ordering::Relaxed)
    }

    fn publish(&self, table: Arc<MappingTable>) -> Arc<MappingTable> {
        let epoch = table.epoch();
        let previous = self.current.rcu(|cur| {
            if cur.epoch() > epoch {
                Arc::clone(cur)
            } else {
                Arc::clone(&table)
            }
        });
        if previous.epoch() > epoch {
            debug!(stale = epoch, current = previous.epoch(), "dropped stale mapping rebuild");
        } else {
            debug!(epoch, blocks = table.len(), "published mapping table");
        }
        self.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::types::BlockKind;

    fn layout(lines: usize, height: usize) -> Vec<Block> {
        (0..lines)
            .map(|i| {
                Block::new(i as u64, BlockKind::Paragraph)
                    .lines(i, i)
                    .offsets(i * height, (i + 1) * height)
            })
            .collect()
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = MappingStore::new();
        assert!(store.snapshot().is_empty());
        assert_eq!(store.snapshot().epoch(), 0);
    }

    #[test]
    fn test_rebuild_replaces_table_and_bumps_epoch() {
        let store = MappingStore::new();
        let first = store.rebuild(layout(3, 10));
        let second = store.rebuild(layout(5, 10));
        assert!(second.epoch() > first.epoch());
        assert_eq!(store.snapshot().len(), 5);
    }

    #[test]
    fn test_held_snapshot_survives_rebuild() {
        let store = MappingStore::new();
        store.rebuild(layout(3, 10));
        let held = store.snapshot();
        store.rebuild(layout(8, 4));
        assert_eq!(held.len(), 3);
        assert_eq!(held.source_line_to_offset(2), 20);
        assert_eq!(store.snapshot().source_line_to_offset(2), 8);
    }

    #[test]
    fn test_stale_rebuild_does_not_overwrite_newer_table() {
        let store = MappingStore::new();
        let stale_epoch = store.reserve_epoch();
        store.rebuild(layout(4, 10));
        store.publish(Arc::new(MappingTable::build(layout(9, 10)).with_epoch(stale_epoch)));
        assert_eq!(store.snapshot().len(), 4);
    }

    #[test]
    fn test_spawn_rebuild_publishes_from_worker() {
        let store = Arc::new(MappingStore::new());
        store.spawn_rebuild(layout(6, 3)).join().unwrap();
        assert_eq!(store.snapshot().len(), 6);
    }

    #[test]
    fn test_readers_only_see_complete_tables() {
        let store = Arc::new(MappingStore::new());
        store.rebuild(layout(10, 2));
        thread::scope(|scope| {
            let writer = Arc::clone(&store);
            scope.spawn(move || {
                for n in 1..50 {
                    writer.rebuild(layout(10 + n, 2));
                }
            });
            for _ in 0..200 {
                let table = store.snapshot();
                assert!(table.repairs().is_empty());
                assert_eq!(table.total_offset(), table.len() * 2);
                assert_eq!(table.last_line() + 1, table.len());
            }
        });
    }
}
