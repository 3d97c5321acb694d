//! Typed control-mode messages.

/// A decoded tmux control-mode record.
///
/// Unrecognized or malformed records become [`ControlMessage::Unknown`]
/// rather than aborting the stream — see the framer's error policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// `%output %<pane> <payload>` — decoded pane output bytes.
    Output { pane_id: String, payload: Vec<u8> },
    /// `%layout-change @<window> <layout>`.
    LayoutChange {
        window_id: String,
        layout: String,
    },
    /// `%window-add @<window> [name]`.
    WindowAdd {
        window_id: String,
        window_name: Option<String>,
    },
    /// `%window-close @<window>` (also covers `%unlinked-window-close`).
    WindowClose { window_id: String },
    /// `%window-renamed @<window> <name>` (also covers
    /// `%unlinked-window-renamed`).
    WindowRenamed { window_id: String, new_name: String },
    /// `%session-changed $<session> <name>` (also emitted for
    /// `%client-session-changed`).
    SessionChanged {
        session_id: String,
        session_name: String,
    },
    /// `%session-closed $<session>`.
    SessionClosed { session_id: String },
    /// `%pane-mode-changed %<pane> <mode>` (also covers `%pause`/`%continue`,
    /// which carry a synthetic mode of `"paused"`/`"running"`).
    PaneMode { pane_id: String, mode_name: String },
    /// `%pane-focus-in %<pane>`.
    PaneFocusIn { pane_id: String },
    /// `%pane-focus-out %<pane>`.
    PaneFocusOut { pane_id: String },
    /// `%pane-set-clipboard %<pane> [base64 payload]`.
    PaneSetClipboard {
        pane_id: String,
        payload: Option<Vec<u8>>,
    },
    /// `%exit [reason]` (also emitted for `%client-detached <name>`, using
    /// the client name as the reason).
    Exit { reason: Option<String> },
    /// `%features <raw>`.
    Features { raw: String },
    /// `%subscription-changed <raw>`.
    Subscriptions { raw: String },
    /// Any record that doesn't begin with `%`, or a `%`-command this crate
    /// doesn't recognize at all.
    Unknown { raw: String },
}
