//! Pane / window / session registry: an owning session -> window -> pane
//! tree, kept consistent as control-mode records arrive out of order or
//! reference ids that no longer exist.

use std::collections::HashMap;

use log::warn;

use crate::layout::PaneBox;
use crate::term::Screen;

/// A tmux session (`$1`, ...).
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub name: String,
    pub window_ids: Vec<String>,
    pub active_window_id: Option<String>,
}

/// A tmux window (`@3`, ...). `session_id` is `None` for an unlinked
/// window (`%unlinked-window-add`), which exists outside any session.
#[derive(Debug, Clone)]
pub struct Window {
    pub id: String,
    pub name: String,
    pub session_id: Option<String>,
    pub layout: String,
    pub pane_ids: Vec<String>,
    pub active_pane_id: Option<String>,
    pub width: u64,
    pub height: u64,
    /// The zoomed pane, if the window is currently zoomed. Tracked
    /// alongside `active_pane_id` but distinct: a zoomed pane is also
    /// active, but not every active pane is zoomed.
    pub zoomed_pane: Option<String>,
}

/// A tmux pane (`%7`, ...), owning its emulator [`Screen`].
pub struct Pane {
    pub id: String,
    pub window_id: String,
    pub is_active: bool,
    pub working_directory: Option<String>,
    pub title: String,
    pub screen: Screen,
}

impl Pane {
    pub fn rows(&self) -> u64 {
        self.screen.rows() as u64
    }

    pub fn cols(&self) -> u64 {
        self.screen.cols() as u64
    }
}

/// In-memory typed store owned by a connection. Violating inputs (unknown
/// ids) are logged and ignored rather than propagated as errors — the
/// registry never aborts an ingest loop over a single malformed mutation.
#[derive(Default)]
pub struct Registry {
    sessions: HashMap<String, Session>,
    windows: HashMap<String, Window>,
    panes: HashMap<String, Pane>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn window(&self, id: &str) -> Option<&Window> {
        self.windows.get(id)
    }

    pub fn pane(&self, id: &str) -> Option<&Pane> {
        self.panes.get(id)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn panes(&self) -> impl Iterator<Item = &Pane> {
        self.panes.values()
    }

    pub fn panes_of_window(&self, window_id: &str) -> Vec<&Pane> {
        self.windows
            .get(window_id)
            .map(|w| w.pane_ids.iter().filter_map(|id| self.panes.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn windows_of_session(&self, session_id: &str) -> Vec<&Window> {
        self.sessions
            .get(session_id)
            .map(|s| {
                s.window_ids
                    .iter()
                    .filter_map(|id| self.windows.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// `setSession(id, name)`: creates the session if absent, otherwise
    /// renames it.
    pub fn set_session(&mut self, id: &str, name: &str) {
        self.sessions
            .entry(id.to_string())
            .and_modify(|s| s.name = name.to_string())
            .or_insert_with(|| Session {
                id: id.to_string(),
                name: name.to_string(),
                window_ids: Vec::new(),
                active_window_id: None,
            });
    }

    /// `closeSession(id)`: cascades to every owned window (and transitively
    /// every pane). Unknown ids are logged and ignored.
    pub fn close_session(&mut self, id: &str) {
        let Some(session) = self.sessions.remove(id) else {
            warn!("close_session: unknown session {id}");
            return;
        };
        for window_id in session.window_ids {
            self.close_window(&window_id);
        }
    }

    /// `addWindow(id, name)`. A window with no session yet is linked to
    /// `session_id` when provided (tmux delivers this via the session
    /// context at the time of the `%window-add`/`%unlinked-window-add`
    /// record).
    pub fn add_window(&mut self, id: &str, name: Option<&str>, session_id: Option<&str>) {
        if self.windows.contains_key(id) {
            return;
        }
        self.windows.insert(
            id.to_string(),
            Window {
                id: id.to_string(),
                name: name.unwrap_or_default().to_string(),
                session_id: session_id.map(str::to_string),
                layout: String::new(),
                pane_ids: Vec::new(),
                active_pane_id: None,
                width: 0,
                height: 0,
                zoomed_pane: None,
            },
        );
        if let Some(session_id) = session_id {
            if let Some(session) = self.sessions.get_mut(session_id) {
                if !session.window_ids.iter().any(|w| w == id) {
                    session.window_ids.push(id.to_string());
                }
            }
        }
    }

    pub fn rename_window(&mut self, id: &str, name: &str) {
        match self.windows.get_mut(id) {
            Some(w) => w.name = name.to_string(),
            None => warn!("rename_window: unknown window {id}"),
        }
    }

    /// `closeWindow(id)`: cascades to panes and unlinks from its session.
    pub fn close_window(&mut self, id: &str) {
        let Some(window) = self.windows.remove(id) else {
            warn!("close_window: unknown window {id}");
            return;
        };
        for pane_id in &window.pane_ids {
            self.panes.remove(pane_id);
        }
        if let Some(session_id) = &window.session_id {
            if let Some(session) = self.sessions.get_mut(session_id) {
                session.window_ids.retain(|w| w != id);
                if session.active_window_id.as_deref() == Some(id) {
                    session.active_window_id = None;
                }
            }
        }
    }

    /// `setActivePane(windowId, paneId)`: clears every other pane's active
    /// flag in the same window atomically (invariant 2 — exactly one
    /// active pane per window).
    pub fn set_active_pane(&mut self, window_id: &str, pane_id: &str) {
        let Some(window) = self.windows.get_mut(window_id) else {
            warn!("set_active_pane: unknown window {window_id}");
            return;
        };
        if !window.pane_ids.iter().any(|p| p == pane_id) {
            warn!("set_active_pane: pane {pane_id} not in window {window_id}");
            return;
        }
        window.active_pane_id = Some(pane_id.to_string());
        for pid in window.pane_ids.clone() {
            if let Some(p) = self.panes.get_mut(&pid) {
                p.is_active = pid == pane_id;
            }
        }
    }

    pub fn set_zoomed_pane(&mut self, window_id: &str, pane_id: Option<&str>) {
        match self.windows.get_mut(window_id) {
            Some(w) => w.zoomed_pane = pane_id.map(str::to_string),
            None => warn!("set_zoomed_pane: unknown window {window_id}"),
        }
    }

    pub fn set_pane_title(&mut self, pane_id: &str, title: &str) {
        match self.panes.get_mut(pane_id) {
            Some(p) => p.title = title.to_string(),
            None => warn!("set_pane_title: unknown pane {pane_id}"),
        }
    }

    pub fn set_pane_working_directory(&mut self, pane_id: &str, cwd: Option<String>) {
        match self.panes.get_mut(pane_id) {
            Some(p) => p.working_directory = cwd,
            None => warn!("set_pane_working_directory: unknown pane {pane_id}"),
        }
    }

    /// Feed pane output bytes to the pane's emulator, returning the rows
    /// that changed (empty if the pane is unknown). Also pulls the
    /// emulator's OSC 7 working-directory and OSC 0/1/2 title hints, if
    /// any, onto the pane so they become visible outside `Screen`.
    pub fn apply_pane_output(&mut self, pane_id: &str, bytes: &[u8]) -> Vec<usize> {
        let Some(p) = self.panes.get_mut(pane_id) else {
            warn!("apply_pane_output: unknown pane {pane_id}");
            return Vec::new();
        };
        let changed = p.screen.process(bytes).changed_rows;
        let cwd = p.screen.working_directory().map(str::to_string);
        let title = p.screen.title().map(str::to_string);

        if let Some(cwd) = cwd {
            self.set_pane_working_directory(pane_id, Some(cwd));
        }
        if let Some(title) = title {
            self.set_pane_title(pane_id, &title);
        }
        changed
    }

    /// `applyLayout(windowId, boxes)`: create any missing panes, update
    /// dimensions, drop panes absent from the new layout (freeing their
    /// screens), and update the window's own size to the layout's bounds.
    pub fn apply_layout(&mut self, window_id: &str, layout_descriptor: &str, boxes: &[PaneBox]) {
        let Some(window) = self.windows.get_mut(window_id) else {
            warn!("apply_layout: unknown window {window_id}");
            return;
        };
        window.layout = layout_descriptor.to_string();

        let mut max_w = 0u64;
        let mut max_h = 0u64;
        let mut seen = Vec::with_capacity(boxes.len());
        for b in boxes {
            max_w = max_w.max(b.x + b.width);
            max_h = max_h.max(b.y + b.height);
            seen.push(b.pane_id.clone());

            if let Some(pane) = self.panes.get_mut(&b.pane_id) {
                pane.screen.resize(b.height as usize, b.width as usize);
            } else {
                let screen = Screen::new(b.height as usize, b.width as usize);
                self.panes.insert(
                    b.pane_id.clone(),
                    Pane {
                        id: b.pane_id.clone(),
                        window_id: window_id.to_string(),
                        is_active: false,
                        working_directory: None,
                        title: String::new(),
                        screen,
                    },
                );
            }
        }

        let window = self.windows.get_mut(window_id).expect("checked above");
        if max_w > 0 {
            window.width = max_w;
        }
        if max_h > 0 {
            window.height = max_h;
        }

        let stale: Vec<String> = window
            .pane_ids
            .iter()
            .filter(|id| !seen.contains(id))
            .cloned()
            .collect();
        window.pane_ids = seen;
        if let Some(active) = &window.active_pane_id {
            if !window.pane_ids.iter().any(|p| p == active) {
                window.active_pane_id = None;
            }
        }
        for pane_id in stale {
            self.panes.remove(&pane_id);
        }
    }
}
