//! Connection manager, per-host state machine, and ingest task.
//!
//! The ingest loop races two event sources with `smol::future::or`: "an
//! outbound command/keystroke batch was queued" against "the transport has
//! bytes to read". Whichever resolves first is handled, and the loop goes
//! back to racing the next pair of futures.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::control::{ControlMessage, ControlStream};
use crate::error::Error;
use crate::host::HostProfile;
use crate::layout::parse_layout;
use crate::registry::Registry;
use crate::snapshot::{panes_snapshot, ChangeSignal, HostSnapshot, PaneSnapshot};
use crate::transport::{Channel, Credential, SshTransport, TransportError};

use super::command::{quote, TmuxCommand};

/// Per-host connection phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Idle,
    Connecting,
    Authenticating,
    StartingTmux,
    Connected,
    Failed,
    Closed,
}

struct ConnectionState {
    phase: ConnectionPhase,
    first_connected_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    session_name: String,
    current_session_id: Option<String>,
    registry: Registry,
}

struct ConnectionRecord {
    shared: Arc<Mutex<ConnectionState>>,
    change_signal: ChangeSignal,
    outbound_tx: Option<async_channel::Sender<Vec<u8>>>,
    ingest_task: Option<smol::Task<()>>,
}

/// Maintains a process-wide collection of host profiles and, for each, at
/// most one connection record.
pub struct ConnectionManager<T: SshTransport> {
    transport: T,
    hosts: HashMap<Uuid, HostProfile>,
    connections: HashMap<Uuid, ConnectionRecord>,
}

impl<T: SshTransport + 'static> ConnectionManager<T> {
    pub fn new(transport: T) -> Self {
        ConnectionManager {
            transport,
            hosts: HashMap::new(),
            connections: HashMap::new(),
        }
    }

    pub fn add_host(&mut self, profile: HostProfile) {
        self.hosts.insert(profile.id, profile);
    }

    pub fn update_host(&mut self, profile: HostProfile) {
        self.hosts.insert(profile.id, profile);
    }

    /// `removeHost(id)`: disconnects first.
    pub fn remove_host(&mut self, id: Uuid) {
        self.disconnect(id);
        self.hosts.remove(&id);
    }

    pub fn host(&self, id: Uuid) -> Option<&HostProfile> {
        self.hosts.get(&id)
    }

    pub fn list_hosts(&self) -> Vec<HostProfile> {
        self.hosts.values().cloned().collect()
    }

    pub fn host_connection_state(&self, id: Uuid) -> Option<HostSnapshot> {
        self.connections.get(&id).map(|record| {
            let st = record.shared.lock();
            HostSnapshot {
                phase: st.phase,
                first_connected_at: st.first_connected_at,
                last_error: st.last_error.clone(),
                session_name: st.session_name.clone(),
                active_pane_count: st.registry.panes().count(),
                active_window_count: st.registry.sessions().map(|s| s.window_ids.len()).sum(),
            }
        })
    }

    pub fn panes(&self, id: Uuid) -> Vec<PaneSnapshot> {
        self.connections
            .get(&id)
            .map(|record| panes_snapshot(&record.shared.lock().registry))
            .unwrap_or_default()
    }

    pub fn change_signal(&self, id: Uuid) -> Option<ChangeSignal> {
        self.connections.get(&id).map(|r| r.change_signal.clone())
    }

    /// Drives the connection through
    /// `Connecting -> Authenticating -> StartingTmux`;
    /// the transition to `Connected` happens inside the ingest task once
    /// the first `%session-changed` record arrives.
    pub async fn connect(
        &mut self,
        host_id: Uuid,
        credential: Credential,
        session_name: &str,
    ) -> Result<(), Error> {
        let profile = self
            .hosts
            .get(&host_id)
            .cloned()
            .ok_or(Error::HostUnknown(host_id))?;

        let shared = Arc::new(Mutex::new(ConnectionState {
            phase: ConnectionPhase::Connecting,
            first_connected_at: None,
            last_error: None,
            session_name: session_name.to_string(),
            current_session_id: None,
            registry: Registry::new(),
        }));
        self.connections.insert(
            host_id,
            ConnectionRecord {
                shared: shared.clone(),
                change_signal: ChangeSignal::new(),
                outbound_tx: None,
                ingest_task: None,
            },
        );
        info!("itmux: host {host_id} Idle -> Connecting");

        let mut session = match self.transport.open(&profile.hostname, profile.port).await {
            Ok(s) => s,
            Err(e) => return Err(self.fail(host_id, Error::TransportError(e.to_string()))),
        };

        shared.lock().phase = ConnectionPhase::Authenticating;
        info!("itmux: host {host_id} Connecting -> Authenticating");
        if let Err(e) = self
            .transport
            .authenticate(session.as_mut(), &profile.username, &credential)
            .await
        {
            return Err(self.fail(host_id, Error::AuthError(e.to_string())));
        }

        shared.lock().phase = ConnectionPhase::StartingTmux;
        info!("itmux: host {host_id} Authenticating -> StartingTmux");
        let command = format!("tmux -CC new-session -A -s {}", quote(session_name));
        let channel = match session.open_channel(&command).await {
            Ok(c) => c,
            Err(e) => return Err(self.fail(host_id, Error::TransportError(e.to_string()))),
        };
        shared.lock().first_connected_at = Some(Utc::now());

        let (outbound_tx, outbound_rx) = async_channel::unbounded();
        let change_signal = self
            .connections
            .get(&host_id)
            .expect("inserted above")
            .change_signal
            .clone();
        let task = smol::spawn(run_ingest(channel, shared.clone(), change_signal, outbound_rx));

        if let Some(record) = self.connections.get_mut(&host_id) {
            record.outbound_tx = Some(outbound_tx);
            record.ingest_task = Some(task);
        }
        Ok(())
    }

    fn fail(&mut self, host_id: Uuid, error: Error) -> Error {
        if let Some(record) = self.connections.get(&host_id) {
            let mut st = record.shared.lock();
            st.phase = ConnectionPhase::Failed;
            st.last_error = Some(error.to_string());
        }
        error!("itmux: host {host_id} connection failed: {error}");
        error
    }

    /// `send(hostId, bytes)`: enqueue raw bytes to the transport. Legal
    /// only in `Connected`.
    pub async fn send(&self, host_id: Uuid, bytes: Vec<u8>) -> Result<(), Error> {
        let record = self.connections.get(&host_id).ok_or(Error::NotConnected)?;
        if record.shared.lock().phase != ConnectionPhase::Connected {
            return Err(Error::NotConnected);
        }
        let tx = record.outbound_tx.as_ref().ok_or(Error::NotConnected)?;
        tx.send(bytes).await.map_err(|_| Error::NotConnected)
    }

    /// `sendCommand(hostId, tmuxCommand)`: serialize and append a newline.
    ///
    /// A `ResizePane { zoom: true, .. }` command also marks the target pane
    /// as its window's zoomed pane optimistically, ahead of the
    /// `%layout-change` that will eventually confirm (or contradict) it.
    pub async fn send_command(&self, host_id: Uuid, command: TmuxCommand) -> Result<(), Error> {
        if let Some(record) = self.connections.get(&host_id) {
            apply_zoom_optimistic(&mut record.shared.lock(), &command);
        }
        let mut line = command.to_wire();
        line.push('\n');
        self.send(host_id, line.into_bytes()).await
    }

    /// `disconnect(hostId)`: cancels the ingest task promptly and discards
    /// the registry. Idempotent — a second call on an already-closed or
    /// never-connected host is a no-op.
    pub fn disconnect(&mut self, host_id: Uuid) {
        let Some(mut record) = self.connections.remove(&host_id) else {
            return;
        };
        // Dropping the sender makes the ingest loop's `outbound_rx.recv()`
        // resolve to an error on its next poll, which wins the race
        // against a pending read and ends the loop promptly.
        record.outbound_tx.take();
        {
            let mut st = record.shared.lock();
            st.phase = ConnectionPhase::Closed;
        }
        if let Some(task) = record.ingest_task.take() {
            task.detach();
        }
        info!("itmux: host {host_id} disconnected");
    }
}

enum IngestItem {
    Outbound(Result<Vec<u8>, async_channel::RecvError>),
    Read(Result<usize, TransportError>),
}

async fn run_ingest(
    mut channel: Box<dyn Channel>,
    state: Arc<Mutex<ConnectionState>>,
    change_signal: ChangeSignal,
    outbound_rx: async_channel::Receiver<Vec<u8>>,
) {
    let mut control = ControlStream::new();
    let mut buf = [0u8; 4096];

    loop {
        let outbound_fut = async { IngestItem::Outbound(outbound_rx.recv().await) };
        let read_fut = async { IngestItem::Read(channel.read(&mut buf).await) };

        match smol::future::or(outbound_fut, read_fut).await {
            IngestItem::Outbound(Ok(bytes)) => {
                if let Err(e) = channel.write(&bytes).await {
                    warn!("itmux: outbound write failed: {e}");
                }
            }
            IngestItem::Outbound(Err(_)) => {
                debug!("itmux: disconnect requested, ending ingest task");
                break;
            }
            IngestItem::Read(Ok(0)) => {
                close_with(&state, Error::RemoteExit("transport closed".to_string()));
                break;
            }
            IngestItem::Read(Ok(n)) => {
                let messages = match control.feed(&buf[..n]) {
                    Ok(messages) => messages,
                    Err(Error::OverlongFrame) => {
                        close_with(&state, Error::OverlongFrame);
                        break;
                    }
                    Err(_) => Vec::new(),
                };
                let mut exited = false;
                {
                    let mut st = state.lock();
                    for msg in messages {
                        if dispatch(&mut st, msg) {
                            exited = true;
                        }
                    }
                }
                change_signal.notify();
                if exited {
                    break;
                }
            }
            IngestItem::Read(Err(e)) => {
                close_with(&state, Error::TransportError(e.to_string()));
                break;
            }
        }
    }

    let _ = channel.close().await;
    change_signal.notify();
}

fn close_with(state: &Arc<Mutex<ConnectionState>>, error: Error) {
    error!("itmux: connection closing: {error}");
    let mut st = state.lock();
    st.phase = ConnectionPhase::Closed;
    st.last_error = Some(error.to_string());
}

/// `-Z` toggles zoom rather than setting it, so a `zoom: false` call (which
/// never emits `-Z`, see `TmuxCommand::to_wire`) leaves the registry's zoom
/// state untouched rather than guessing which way the toggle went.
fn apply_zoom_optimistic(state: &mut ConnectionState, command: &TmuxCommand) {
    if let TmuxCommand::ResizePane { target, zoom: true, .. } = command {
        if let Some(window_id) = state.registry.pane(target).map(|p| p.window_id.clone()) {
            state.registry.set_zoomed_pane(&window_id, Some(target));
        }
    }
}

/// Applies one decoded control message to the registry. Returns `true`
/// when the message ends the connection (`%exit`).
fn dispatch(state: &mut ConnectionState, msg: ControlMessage) -> bool {
    match msg {
        ControlMessage::Output { pane_id, payload } => {
            state.registry.apply_pane_output(&pane_id, &payload);
        }
        ControlMessage::LayoutChange { window_id, layout } => {
            let boxes = parse_layout(&layout);
            state.registry.apply_layout(&window_id, &layout, &boxes);
        }
        ControlMessage::WindowAdd {
            window_id,
            window_name,
        } => {
            let session_id = state.current_session_id.clone();
            state
                .registry
                .add_window(&window_id, window_name.as_deref(), session_id.as_deref());
        }
        ControlMessage::WindowClose { window_id } => state.registry.close_window(&window_id),
        ControlMessage::WindowRenamed {
            window_id,
            new_name,
        } => state.registry.rename_window(&window_id, &new_name),
        ControlMessage::SessionChanged {
            session_id,
            session_name,
        } => {
            state.registry.set_session(&session_id, &session_name);
            state.current_session_id = Some(session_id);
            state.session_name = session_name;
            if state.phase == ConnectionPhase::StartingTmux {
                state.phase = ConnectionPhase::Connected;
                info!("itmux: StartingTmux -> Connected");
            }
        }
        ControlMessage::SessionClosed { session_id } => state.registry.close_session(&session_id),
        ControlMessage::PaneMode { pane_id, mode_name } => {
            debug!("itmux: pane {pane_id} mode -> {mode_name}");
        }
        ControlMessage::PaneFocusIn { pane_id } => {
            if let Some(window_id) = state.registry.pane(&pane_id).map(|p| p.window_id.clone()) {
                state.registry.set_active_pane(&window_id, &pane_id);
            }
        }
        ControlMessage::PaneFocusOut { .. } => {}
        ControlMessage::PaneSetClipboard { pane_id, payload } => {
            debug!(
                "itmux: clipboard set from pane {pane_id} ({} bytes)",
                payload.map(|p| p.len()).unwrap_or(0)
            );
        }
        ControlMessage::Exit { reason } => {
            state.phase = ConnectionPhase::Closed;
            state.last_error = Some(Error::RemoteExit(reason.unwrap_or_default()).to_string());
            return true;
        }
        ControlMessage::Features { .. } | ControlMessage::Subscriptions { .. } => {}
        ControlMessage::Unknown { raw } => {
            debug!("itmux: unrecognized control-mode record: {raw}");
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_state() -> ConnectionState {
        ConnectionState {
            phase: ConnectionPhase::StartingTmux,
            first_connected_at: None,
            last_error: None,
            session_name: String::new(),
            current_session_id: None,
            registry: Registry::new(),
        }
    }

    #[test]
    fn session_changed_transitions_to_connected() {
        let mut st = base_state();
        let exited = dispatch(
            &mut st,
            ControlMessage::SessionChanged {
                session_id: "$1".to_string(),
                session_name: "itmux".to_string(),
            },
        );
        assert!(!exited);
        assert_eq!(st.phase, ConnectionPhase::Connected);
        assert!(st.registry.session("$1").is_some());
    }

    #[test]
    fn exit_closes_connection_with_remote_exit_error() {
        let mut st = base_state();
        st.phase = ConnectionPhase::Connected;
        let exited = dispatch(
            &mut st,
            ControlMessage::Exit {
                reason: Some("client-detached".to_string()),
            },
        );
        assert!(exited);
        assert_eq!(st.phase, ConnectionPhase::Closed);
        assert_eq!(
            st.last_error,
            Some(Error::RemoteExit("client-detached".to_string()).to_string())
        );
    }

    #[test]
    fn unknown_window_close_is_absorbed_not_fatal() {
        let mut st = base_state();
        let exited = dispatch(
            &mut st,
            ControlMessage::WindowClose {
                window_id: "@99".to_string(),
            },
        );
        assert!(!exited);
    }

    #[test]
    fn window_add_links_to_current_session() {
        let mut st = base_state();
        st.registry.set_session("$1", "itmux");
        st.current_session_id = Some("$1".to_string());
        dispatch(
            &mut st,
            ControlMessage::WindowAdd {
                window_id: "@1".to_string(),
                window_name: Some("main".to_string()),
            },
        );
        assert_eq!(
            st.registry.window("@1").unwrap().session_id.as_deref(),
            Some("$1")
        );
    }

    #[test]
    fn resize_pane_zoom_marks_window_zoomed_pane() {
        let mut st = base_state();
        st.registry.add_window("@1", None, None);
        st.registry.apply_layout(
            "@1",
            "",
            &crate::layout::parse_layout("c000,40x20,0,0,1"),
        );
        apply_zoom_optimistic(
            &mut st,
            &TmuxCommand::ResizePane {
                target: "1".to_string(),
                width: None,
                height: None,
                zoom: true,
            },
        );
        assert_eq!(
            st.registry.window("@1").unwrap().zoomed_pane.as_deref(),
            Some("1")
        );
    }

    #[test]
    fn resize_pane_without_zoom_flag_leaves_zoom_state_untouched() {
        let mut st = base_state();
        st.registry.add_window("@1", None, None);
        st.registry.apply_layout(
            "@1",
            "",
            &crate::layout::parse_layout("c000,40x20,0,0,1"),
        );
        apply_zoom_optimistic(
            &mut st,
            &TmuxCommand::ResizePane {
                target: "1".to_string(),
                width: Some(80),
                height: None,
                zoom: false,
            },
        );
        assert!(st.registry.window("@1").unwrap().zoomed_pane.is_none());
    }

    #[test]
    fn pane_focus_in_sets_active_pane_via_window_lookup() {
        let mut st = base_state();
        st.registry.add_window("@1", None, None);
        st.registry.apply_layout(
            "@1",
            "",
            &crate::layout::parse_layout("c000,40x20,0,0,1"),
        );
        dispatch(
            &mut st,
            ControlMessage::PaneFocusIn {
                pane_id: "1".to_string(),
            },
        );
        assert!(st.registry.pane("1").unwrap().is_active);
    }
}
