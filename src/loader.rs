//! Asynchronous file loading for the preview panel.
//!
//! Loads run off the interaction thread and report back as [`LoadOutcome`]s
//! that the panel matches against the [`LoadTicket`] it is waiting for.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use tracing::debug;

use crate::error::PreviewError;
use crate::panel::LoadTicket;

/// Finished load.
#[derive(Debug)]
pub struct LoadOutcome {
    pub ticket: LoadTicket,
    pub path: PathBuf,
    pub result: Result<String, PreviewError>,
}

/// Handle to an in-flight load.
#[derive(Debug, Clone)]
pub struct LoadHandle {
    ticket: LoadTicket,
    cancelled: Arc<AtomicBool>,
}

impl LoadHandle {
    pub fn new(ticket: LoadTicket) -> Self {
        Self {
            ticket,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub const fn ticket(&self) -> LoadTicket {
        self.ticket
    }

    /// Ask the load to drop its result instead of reporting it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Something that can read files in the background.
pub trait Loader: Send {
    /// Begin loading `path`; the outcome is reported through [`Loader::drain`].
    fn start(&mut self, ticket: LoadTicket, path: &Path) -> LoadHandle;

    /// Collect loads that have finished since the last call.
    fn drain(&mut self) -> Vec<LoadOutcome>;
}

/// Reads each file on its own thread.
#[derive(Debug)]
pub struct ThreadLoader {
    tx: Sender<LoadOutcome>,
    rx: Receiver<LoadOutcome>,
}

impl Default for ThreadLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadLoader {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }
}

impl Loader for ThreadLoader {
    fn start(&mut self, ticket: LoadTicket, path: &Path) -> LoadHandle {
        let handle = LoadHandle::new(ticket);
        let worker = handle.clone();
        let tx = self.tx.clone();
        let path = path.to_path_buf();
        debug!(%ticket, path = %path.display(), "starting load");
        thread::spawn(move || {
            let result = fs::read_to_string(&path).map_err(|err| PreviewError::from_io(path.clone(), err));
            if worker.is_cancelled() {
                debug!(%ticket, "dropping cancelled load");
                return;
            }
            let outcome = LoadOutcome {
                ticket,
                path,
                result,
            };
            if tx.send(outcome).is_err() {
                debug!(%ticket, "load finished after its loader was dropped");
            }
        });
        handle
    }

    fn drain(&mut self) -> Vec<LoadOutcome> {
        self.rx.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tempfile::tempdir;

    fn first_ticket() -> LoadTicket {
        let mut panel = crate::panel::PanelMachine::new(50);
        panel.apply(
            crate::panel::PanelEvent::ToggleOpen {
                path: Some(PathBuf::from("x.md")),
            },
            0,
        );
        panel.pending_load().map(|(t, _)| t).unwrap()
    }

    fn wait(loader: &mut ThreadLoader) -> Vec<LoadOutcome> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let done = loader.drain();
            if !done.is_empty() || Instant::now() > deadline {
                return done;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_thread_loader_reads_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.md");
        std::fs::write(&path, "# Title\n\nbody").unwrap();

        let mut loader = ThreadLoader::new();
        let ticket = first_ticket();
        loader.start(ticket, &path);
        let done = wait(&mut loader);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].ticket, ticket);
        assert_eq!(done[0].result.as_deref().unwrap(), "# Title\n\nbody");
    }

    #[test]
    fn test_missing_file_reports_not_found() {
        let dir = tempdir().unwrap();
        let mut loader = ThreadLoader::new();
        loader.start(first_ticket(), &dir.path().join("missing.md"));
        let done = wait(&mut loader);
        assert!(matches!(
            done[0].result,
            Err(PreviewError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_load_outliving_its_loader_finishes_quietly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.md");
        std::fs::write(&path, "late").unwrap();

        let mut loader = ThreadLoader::new();
        let handle = loader.start(first_ticket(), &path);
        drop(loader);
        std::thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_cancelled());

        let mut loader = ThreadLoader::new();
        loader.start(first_ticket(), &path);
        let done = wait(&mut loader);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].result.as_deref().unwrap(), "late");
    }

    #[test]
    fn test_cancelled_handle_reports_cancellation() {
        let handle = LoadHandle::new(first_ticket());
        let clone = handle.clone();
        assert!(!clone.is_cancelled());
        handle.cancel();
        assert!(clone.is_cancelled());
    }
}
