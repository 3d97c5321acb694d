//! Read-only snapshots and the change-notification hook.
//!
//! [`ChangeSignal`] is a coalescing level-trigger rather than a
//! message-per-mutation channel: consumers only ever want the latest
//! state, never a backlog of intermediate mutation events, so a full
//! notification stream is collapsed down to "something changed, go
//! re-read".

use chrono::{DateTime, Utc};

use crate::connection::ConnectionPhase;
use crate::registry::{Pane, Registry};
use crate::term::Cell;

/// A copy-on-read view of one pane, safe to hold after the registry has
/// moved on: nothing here is a reference into mutable state that could
/// change out from under a consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct PaneSnapshot {
    pub id: String,
    pub window_id: String,
    pub rows: u64,
    pub cols: u64,
    pub is_active: bool,
    pub working_directory: Option<String>,
    pub title: String,
    pub grid_rows: Vec<Vec<Cell>>,
    pub cursor: (usize, usize),
}

impl PaneSnapshot {
    pub fn from_pane(pane: &Pane) -> Self {
        PaneSnapshot {
            id: pane.id.clone(),
            window_id: pane.window_id.clone(),
            rows: pane.rows(),
            cols: pane.cols(),
            is_active: pane.is_active,
            working_directory: pane.working_directory.clone(),
            title: pane.title.clone(),
            grid_rows: pane.screen.grid().clone(),
            cursor: pane.screen.cursor(),
        }
    }
}

/// Value snapshot of a connection record's mutable state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSnapshot {
    pub phase: ConnectionPhase,
    pub first_connected_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub session_name: String,
    pub active_pane_count: usize,
    pub active_window_count: usize,
}

/// All panes belonging to a host's registry, as snapshots.
pub fn panes_snapshot(registry: &Registry) -> Vec<PaneSnapshot> {
    registry.panes().map(PaneSnapshot::from_pane).collect()
}

/// A level-triggered, coalescing change notification. Any number of
/// `notify()` calls before the next `changed()` wake up exactly one
/// waiter once — consumers re-read the relevant snapshot rather than
/// being told what changed.
pub struct ChangeSignal {
    tx: async_channel::Sender<()>,
    rx: async_channel::Receiver<()>,
}

impl ChangeSignal {
    pub fn new() -> Self {
        let (tx, rx) = async_channel::bounded(1);
        ChangeSignal { tx, rx }
    }

    /// Mark state as changed. Coalesced: if a notification is already
    /// pending, this is a no-op.
    pub fn notify(&self) {
        let _ = self.tx.try_send(());
    }

    /// Suspends until the next coalesced notification.
    pub async fn changed(&self) {
        let _ = self.rx.recv().await;
    }
}

impl Default for ChangeSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ChangeSignal {
    fn clone(&self) -> Self {
        ChangeSignal {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::parse_layout;
    use crate::term::Screen;

    #[test]
    fn pane_snapshot_copies_grid_and_cursor() {
        let mut pane = Pane {
            id: "1".to_string(),
            window_id: "@1".to_string(),
            is_active: true,
            working_directory: Some("/tmp".to_string()),
            title: "shell".to_string(),
            screen: Screen::new(2, 2),
        };
        pane.screen.process(b"hi");
        let snap = PaneSnapshot::from_pane(&pane);
        assert_eq!(snap.id, "1");
        assert_eq!(snap.cursor, (0, 2));
        assert_eq!(snap.grid_rows[0][0].ch, 'h');
    }

    #[test]
    fn osc7_working_directory_is_visible_via_pane_snapshot() {
        let mut reg = Registry::new();
        reg.add_window("@1", None, None);
        reg.apply_layout("@1", "", &parse_layout("c000,40x20,0,0,1"));
        reg.apply_pane_output("1", b"\x1b]7;file://host/home/itmux/project\x07");

        let snaps = panes_snapshot(&reg);
        let snap = snaps.iter().find(|p| p.id == "1").unwrap();
        assert_eq!(
            snap.working_directory.as_deref(),
            Some("/home/itmux/project")
        );
    }

    #[test]
    fn osc_title_is_visible_via_pane_snapshot() {
        let mut reg = Registry::new();
        reg.add_window("@1", None, None);
        reg.apply_layout("@1", "", &parse_layout("c000,40x20,0,0,1"));
        reg.apply_pane_output("1", b"\x1b]2;ssh itmux@host\x07");

        let snaps = panes_snapshot(&reg);
        let snap = snaps.iter().find(|p| p.id == "1").unwrap();
        assert_eq!(snap.title, "ssh itmux@host");
    }

    #[test]
    fn change_signal_coalesces_repeated_notifications() {
        smol::block_on(async {
            let signal = ChangeSignal::new();
            signal.notify();
            signal.notify();
            signal.notify();
            signal.changed().await;
            assert!(signal.rx.is_empty());
        });
    }
}
