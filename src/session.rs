//! Per-user preview session: panel width, zoom, sync mode and last file.
//!
//! Values are written through to disk on every change and read back when
//! the panel opens.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{self, MAX_WIDTH, MIN_WIDTH, PreviewConfig};
use crate::sync::SyncMode;

pub const MIN_ZOOM: u16 = 50;
pub const MAX_ZOOM: u16 = 200;

/// Discrete font sizes `zoom_in`/`zoom_out` step through.
pub const FONT_SCALE_PX: [u16; 7] = [10, 12, 14, 16, 18, 20, 24];

/// Persisted session layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionState {
    pub width: u16,
    /// Percent of the base font size.
    pub zoom_level: u16,
    pub sync_mode: SyncMode,
    pub last_file_path: Option<PathBuf>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            width: 400,
            zoom_level: 100,
            sync_mode: SyncMode::SourceDriven,
            last_file_path: None,
        }
    }
}

impl SessionState {
    /// Fresh session seeded from configuration.
    pub fn from_config(config: &PreviewConfig) -> Self {
        Self {
            width: config.width,
            sync_mode: config.sync,
            ..Self::default()
        }
        .clamped()
    }

    /// Pull out-of-range values (e.g. from a hand-edited file) back in range.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.width = self.width.clamp(MIN_WIDTH, MAX_WIDTH);
        self.zoom_level = self.zoom_level.clamp(MIN_ZOOM, MAX_ZOOM);
        self
    }
}

/// Where a session is persisted.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    path: Option<PathBuf>,
}

impl SessionStore {
    /// Persist to `path` as JSON.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Keep the session in memory only.
    pub const fn in_memory() -> Self {
        Self { path: None }
    }

    /// Default on-disk location next to the global config.
    pub fn default_path() -> PathBuf {
        config::config_dir().join("session.json")
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read the stored session, falling back to `defaults` when there is no
    /// file or it cannot be parsed.
    pub fn load_or(&self, defaults: SessionState) -> SessionState {
        let Some(path) = &self.path else {
            return defaults;
        };
        if !path.exists() {
            return defaults;
        }
        match read_session(path) {
            Ok(state) => state.clamped(),
            Err(err) => {
                warn!("ignoring unreadable session {}: {err:#}", path.display());
                defaults
            }
        }
    }

    /// Write `state`. A no-op for in-memory stores.
    pub fn save(&self, state: &SessionState) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create session dir {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(state).context("Failed to encode session")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write session {}", path.display()))
    }
}

fn read_session(path: &Path) -> Result<SessionState> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read session {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse session {}", path.display()))
}

/// Session values plus write-through persistence.
#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
    store: SessionStore,
    base_font_px: u16,
}

impl Session {
    /// Load the session from `store`, seeding a missing one from `defaults`.
    pub fn open(store: SessionStore, defaults: SessionState, base_font_px: u16) -> Self {
        let state = store.load_or(defaults);
        Self {
            state,
            store,
            base_font_px: base_font_px.max(1),
        }
    }

    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    pub const fn load_width(&self) -> u16 {
        self.state.width
    }

    /// Store a new panel width, clamped to the allowed range.
    pub fn save_width(&mut self, width: u16) -> u16 {
        let width = width.clamp(MIN_WIDTH, MAX_WIDTH);
        if width != self.state.width {
            self.state.width = width;
            self.persist();
        }
        width
    }

    /// Zoom as a percentage of the base font size.
    pub const fn zoom(&self) -> u16 {
        self.state.zoom_level
    }

    /// Set zoom to any percentage within range.
    pub fn set_zoom(&mut self, percent: u16) -> u16 {
        let percent = percent.clamp(MIN_ZOOM, MAX_ZOOM);
        if percent != self.state.zoom_level {
            self.state.zoom_level = percent;
            self.persist();
        }
        percent
    }

    /// Step up to the next size in [`FONT_SCALE_PX`]. Past the largest size
    /// the zoom is left alone.
    pub fn zoom_in(&mut self) -> u16 {
        let current = self.font_px();
        let Some(next) = FONT_SCALE_PX.into_iter().find(|&px| px > current) else {
            return self.zoom();
        };
        self.set_zoom(self.percent_for(next).max(self.zoom()))
    }

    /// Step down to the previous size in [`FONT_SCALE_PX`]. Below the
    /// smallest size the zoom is left alone.
    pub fn zoom_out(&mut self) -> u16 {
        let current = self.font_px();
        let Some(next) = FONT_SCALE_PX.into_iter().rev().find(|&px| px < current) else {
            return self.zoom();
        };
        self.set_zoom(self.percent_for(next).min(self.zoom()))
    }

    /// Effective font size for the current zoom.
    pub fn font_px(&self) -> u16 {
        let px = (u32::from(self.base_font_px) * u32::from(self.state.zoom_level) + 50) / 100;
        u16::try_from(px).unwrap_or(u16::MAX)
    }

    pub const fn sync_mode(&self) -> SyncMode {
        self.state.sync_mode
    }

    pub fn set_sync_mode(&mut self, mode: SyncMode) {
        if mode != self.state.sync_mode {
            self.state.sync_mode = mode;
            self.persist();
        }
    }

    pub fn last_file_path(&self) -> Option<&Path> {
        self.state.last_file_path.as_deref()
    }

    pub fn set_last_file_path(&mut self, path: PathBuf) {
        if self.state.last_file_path.as_ref() != Some(&path) {
            self.state.last_file_path = Some(path);
            self.persist();
        }
    }

    fn percent_for(&self, px: u16) -> u16 {
        let base = u32::from(self.base_font_px);
        let percent = (u32::from(px) * 100 + base / 2) / base;
        u16::try_from(percent).unwrap_or(MAX_ZOOM)
    }

    fn persist(&self) {
        if let Err(err) = self.store.save(&self.state) {
            warn!("failed to persist preview session: {err:#}");
        }
    }
}
