//! Side effects of [`Preview::update`]: starting loads, collecting their
//! results and firing timers.

use tracing::{debug, info, warn};

use crate::loader::LoadOutcome;
use crate::panel::PanelEvent;
use crate::preview::Preview;
use crate::sync::SyncCommand;

impl Preview {
    /// Make the loader match what the panel is waiting for.
    pub(super) fn sync_load_requests(&mut self) {
        let wanted = self
            .panel
            .pending_load()
            .map(|(ticket, path)| (ticket, path.to_path_buf()));
        let running = self.active_load.as_ref().map(crate::loader::LoadHandle::ticket);

        match wanted {
            Some((ticket, _)) if running == Some(ticket) => {}
            Some((ticket, path)) => {
                if let Some(stale) = self.active_load.take() {
                    debug!(ticket = %stale.ticket(), "cancelling superseded load");
                    stale.cancel();
                }
                self.active_load = Some(self.loader.start(ticket, &path));
            }
            None => {
                if let Some(stale) = self.active_load.take() {
                    debug!(ticket = %stale.ticket(), "cancelling unwanted load");
                    stale.cancel();
                }
            }
        }
    }

    /// Apply finished loads, then fire due sync commands and settle timers.
    pub(super) fn poll_at(&mut self, now: u64) -> Vec<SyncCommand> {
        for outcome in self.loader.drain() {
            self.apply_load(outcome, now);
        }

        let mut commands = Vec::new();
        if self.panel.state().is_live() {
            let table = self.mapping.snapshot();
            if let Some(cmd) = self.sync.poll(now, &table) {
                self.panel.apply(PanelEvent::Activity, now);
                commands.push(cmd);
            }
        } else if self.sync.has_pending() {
            debug!(state = ?self.panel.state(), "dropping scroll queued before panel left view");
            self.sync.cancel_pending();
        }
        self.panel.poll(now);
        commands
    }

    fn apply_load(&mut self, outcome: LoadOutcome, now: u64) {
        let LoadOutcome {
            ticket,
            path,
            result,
        } = outcome;
        if self
            .active_load
            .as_ref()
            .is_some_and(|handle| handle.ticket() == ticket)
        {
            self.active_load = None;
        }

        match result {
            Ok(text) => {
                if self.panel.apply(PanelEvent::LoadSucceeded(ticket), now).is_ignored() {
                    debug!(%ticket, "discarding stale load");
                    return;
                }
                info!(path = %path.display(), bytes = text.len(), "file loaded");
                self.source = Some(text);
                self.session.set_last_file_path(path);
            }
            Err(err) => {
                let message = err.to_string();
                if self.panel.apply(PanelEvent::LoadFailed(ticket, err), now).is_ignored() {
                    debug!(%ticket, "discarding stale load failure");
                    return;
                }
                warn!(path = %path.display(), "load failed: {message}");
                self.source = None;
            }
        }
    }
}
