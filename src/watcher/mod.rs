//! File watching for the previewed document.
//!
//! Uses notify crate for cross-platform file system events and reduces them
//! to the three things the preview cares about: [`WatchEvent`].
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, trace};

/// What happened to the watched file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Changed,
    Deleted,
    Moved(PathBuf),
}

/// Raw observation before debouncing.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Observed {
    Touched,
    Renamed(PathBuf),
}

/// Watches a single file and emits debounced [`WatchEvent`]s.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
    watch_root: PathBuf,
    target_path: PathBuf,
    target_name: Option<OsString>,
    debounce: Duration,
    pending_since: Option<Instant>,
}

impl FileWatcher {
    /// Create a watcher for `path`.
    ///
    /// # Errors
    /// Returns an error if the file watcher cannot be created or the path cannot be watched.
    pub fn new(path: impl AsRef<Path>, debounce: Duration) -> notify::Result<Self> {
        // Canonicalize so event paths from the OS (which are always absolute
        // and canonical) match our stored paths.
        let target_path = path
            .as_ref()
            .canonicalize()
            .unwrap_or_else(|_| path.as_ref().to_path_buf());
        let target_name = target_path.file_name().map(std::ffi::OsStr::to_os_string);
        let watch_root = watch_root_for(&target_path);

        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        watcher.watch(&watch_root, RecursiveMode::NonRecursive)?;

        Ok(Self {
            _watcher: watcher,
            rx,
            watch_root,
            target_path,
            target_name,
            debounce,
            pending_since: None,
        })
    }

    /// The canonical path of the file being watched.
    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    /// Drain OS events and return the next debounced [`WatchEvent`].
    ///
    /// Renames are reported immediately. Other activity is held until the
    /// file has been quiet for the debounce period and then reported as
    /// `Changed` or `Deleted` depending on whether the file still exists, so
    /// an editor's remove-then-create save shows up as a single change.
    pub fn take_event(&mut self) -> Option<WatchEvent> {
        let mut touched = false;
        while let Ok(event) = self.rx.try_recv() {
            match event {
                Ok(ev) => match self.classify(&ev) {
                    Some(Observed::Renamed(to)) => {
                        debug!(from = %self.target_path.display(), to = %to.display(), "watched file moved");
                        self.retarget(to.clone());
                        self.pending_since = None;
                        return Some(WatchEvent::Moved(to));
                    }
                    Some(Observed::Touched) => touched = true,
                    None => trace!(kind = ?ev.kind, paths = ?ev.paths, "irrelevant watch event"),
                },
                Err(err) => debug!(%err, "watch error"),
            }
        }

        if touched {
            self.pending_since = Some(Instant::now());
        }
        let pending_since = self.pending_since?;
        if pending_since.elapsed() < self.debounce {
            return None;
        }
        self.pending_since = None;
        if self.target_path.exists() {
            Some(WatchEvent::Changed)
        } else {
            Some(WatchEvent::Deleted)
        }
    }

    fn classify(&self, event: &Event) -> Option<Observed> {
        match event.kind {
            EventKind::Access(_) => None,
            EventKind::Modify(ModifyKind::Name(RenameMode::Both))
                if event.paths.len() == 2 && self.is_target(&event.paths[0]) =>
            {
                Some(Observed::Renamed(event.paths[1].clone()))
            }
            _ if self.is_relevant(event) => Some(Observed::Touched),
            _ => None,
        }
    }

    fn is_target(&self, path: &Path) -> bool {
        path == self.target_path
            || self
                .target_name
                .as_ref()
                .is_some_and(|name| path.file_name().is_some_and(|f| f == name))
    }

    fn is_relevant(&self, event: &Event) -> bool {
        event
            .paths
            .iter()
            .any(|path| path == &self.watch_root || self.is_target(path))
    }

    fn retarget(&mut self, path: PathBuf) {
        self.target_name = path.file_name().map(std::ffi::OsStr::to_os_string);
        self.target_path = path;
    }
}

fn watch_root_for(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};
    use tempfile::tempdir;

    fn event(kind: EventKind, paths: Vec<PathBuf>) -> Event {
        Event {
            kind,
            paths,
            attrs: notify::event::EventAttributes::new(),
        }
    }

    fn watched(name: &str) -> (tempfile::TempDir, PathBuf, FileWatcher) {
        let dir = tempdir().expect("tempdir");
        let canonical_dir = dir.path().canonicalize().expect("canonicalize");
        let path = canonical_dir.join(name);
        std::fs::write(&path, "# hi").expect("write");
        let watcher = FileWatcher::new(&path, Duration::from_millis(10)).expect("watcher");
        (dir, path, watcher)
    }

    #[test]
    fn test_directory_level_event_is_relevant_for_watched_file() {
        let (_dir, path, watcher) = watched("doc.md");
        let root = path.parent().unwrap().to_path_buf();
        let ev = event(EventKind::Any, vec![root]);
        assert_eq!(watcher.classify(&ev), Some(Observed::Touched));
    }

    #[test]
    fn test_rename_of_target_is_a_move() {
        let (_dir, path, watcher) = watched("doc.md");
        let to = path.with_file_name("renamed.md");
        let ev = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            vec![path, to.clone()],
        );
        assert_eq!(watcher.classify(&ev), Some(Observed::Renamed(to)));
    }

    #[test]
    fn test_unrelated_sibling_and_access_events_are_ignored() {
        let (_dir, path, watcher) = watched("doc.md");
        let sibling = path.with_file_name("other.md");
        let ev = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            vec![sibling],
        );
        assert_eq!(watcher.classify(&ev), None);
        let ev = event(EventKind::Access(notify::event::AccessKind::Any), vec![path]);
        assert_eq!(watcher.classify(&ev), None);
    }

    #[test]
    fn test_remove_and_create_are_touches() {
        let (_dir, path, watcher) = watched("doc.md");
        for kind in [
            EventKind::Remove(RemoveKind::File),
            EventKind::Create(CreateKind::File),
        ] {
            let ev = event(kind, vec![path.clone()]);
            assert_eq!(watcher.classify(&ev), Some(Observed::Touched));
        }
    }

    #[test]
    fn test_watch_root_for_relative_file_is_dot() {
        let root = watch_root_for(Path::new("TEST-README.md"));
        assert_eq!(root, PathBuf::from("."));
    }

    fn wait_for_event(watcher: &mut FileWatcher) -> Option<WatchEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Some(ev) = watcher.take_event() {
                return Some(ev);
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        None
    }

    #[test]
    fn test_real_file_modification_detected() {
        let (_dir, path, mut watcher) = watched("watched.md");

        // Give the backend time to register the watch
        std::thread::sleep(Duration::from_millis(500));
        std::fs::write(&path, "modified").expect("write");

        assert_eq!(wait_for_event(&mut watcher), Some(WatchEvent::Changed));
    }

    #[test]
    fn test_real_file_deletion_detected() {
        let (_dir, path, mut watcher) = watched("doomed.md");

        std::thread::sleep(Duration::from_millis(500));
        std::fs::remove_file(&path).expect("remove");

        assert_eq!(wait_for_event(&mut watcher), Some(WatchEvent::Deleted));
    }
}
