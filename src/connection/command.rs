//! Typed outbound tmux commands and their wire serialization.
//!
//! Quoting wraps an argument in single quotes whenever it contains a
//! space, quote character, or is empty, escaping embedded `'` as `'\''` —
//! the same rule tmux's own shell-quoting helpers use.

/// A typed tmux command, serialized by [`TmuxCommand::to_wire`] into the
/// plain-text line form the control-mode channel expects (without the
/// trailing `\n`, which the connection manager appends).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TmuxCommand {
    ListSessions,
    ListWindows { session_name: Option<String> },
    ListPanes { target: Option<String> },
    NewWindow { name: Option<String> },
    SelectPane { target: String },
    ResizePane {
        target: String,
        width: Option<u32>,
        height: Option<u32>,
        zoom: bool,
    },
    SendKeys { target: String, keys: String, literal: bool },
    KillWindow { target: String },
    KillPane { target: String },
    KillSession { target: Option<String> },
    DetachClient,
    RefreshClient,
    SetOptionGlobal { name: String, value: String },
    SetOptionWindow { target: String, name: String, value: String },
    SplitWindow { target: String, horizontal: bool },
    SwapPane { target_a: String, target_b: String },
    RotateWindow { target: Option<String> },
    /// Reconciles a pane's screen contents after reconnect, since the
    /// emulator keeps no scrollback of its own and `%output` only streams
    /// new bytes.
    CapturePane { target: String },
}

/// Wraps `s` in single quotes (escaping embedded `'`) if it contains
/// whitespace, a quote character, or is empty; otherwise returns it as-is.
pub(crate) fn quote(s: &str) -> String {
    if s.is_empty() || s.chars().any(|c| c.is_whitespace() || c == '\'' || c == '"') {
        format!("'{}'", s.replace('\'', "'\\''"))
    } else {
        s.to_string()
    }
}

impl TmuxCommand {
    pub fn to_wire(&self) -> String {
        match self {
            TmuxCommand::ListSessions => "list-sessions".to_string(),
            TmuxCommand::ListWindows { session_name } => match session_name {
                Some(name) => format!("list-windows -t {}", quote(name)),
                None => "list-windows".to_string(),
            },
            TmuxCommand::ListPanes { target } => match target {
                Some(t) => format!("list-panes -t {}", quote(t)),
                None => "list-panes".to_string(),
            },
            TmuxCommand::NewWindow { name } => match name {
                Some(n) => format!("new-window -n {}", quote(n)),
                None => "new-window".to_string(),
            },
            TmuxCommand::SelectPane { target } => format!("select-pane -t {}", quote(target)),
            TmuxCommand::ResizePane {
                target,
                width,
                height,
                zoom,
            } => {
                let mut cmd = format!("resize-pane -t {}", quote(target));
                if let Some(w) = width {
                    cmd.push_str(&format!(" -x {w}"));
                }
                if let Some(h) = height {
                    cmd.push_str(&format!(" -y {h}"));
                }
                if *zoom {
                    cmd.push_str(" -Z");
                }
                cmd
            }
            TmuxCommand::SendKeys { target, keys, literal } => {
                let mut cmd = format!("send-keys -t {}", quote(target));
                if *literal {
                    cmd.push_str(" -l");
                }
                cmd.push(' ');
                cmd.push_str(&quote(keys));
                cmd
            }
            TmuxCommand::KillWindow { target } => format!("kill-window -t {}", quote(target)),
            TmuxCommand::KillPane { target } => format!("kill-pane -t {}", quote(target)),
            TmuxCommand::KillSession { target } => match target {
                Some(t) => format!("kill-session -t {}", quote(t)),
                None => "kill-session".to_string(),
            },
            TmuxCommand::DetachClient => "detach-client".to_string(),
            TmuxCommand::RefreshClient => "refresh-client".to_string(),
            TmuxCommand::SetOptionGlobal { name, value } => {
                format!("set-option -g {} {}", quote(name), quote(value))
            }
            TmuxCommand::SetOptionWindow {
                target,
                name,
                value,
            } => format!(
                "set-option -w -t {} {} {}",
                quote(target),
                quote(name),
                quote(value)
            ),
            TmuxCommand::SplitWindow { target, horizontal } => {
                let flag = if *horizontal { "-h" } else { "-v" };
                format!("split-window {flag} -t {}", quote(target))
            }
            TmuxCommand::SwapPane { target_a, target_b } => {
                format!("swap-pane -s {} -t {}", quote(target_a), quote(target_b))
            }
            TmuxCommand::RotateWindow { target } => match target {
                Some(t) => format!("rotate-window -t {}", quote(t)),
                None => "rotate-window".to_string(),
            },
            TmuxCommand::CapturePane { target } => format!("capture-pane -t {} -p", quote(target)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_pane_wire_form() {
        let cmd = TmuxCommand::SelectPane {
            target: "%3".to_string(),
        };
        assert_eq!(cmd.to_wire(), "select-pane -t %3");
    }

    #[test]
    fn send_keys_quotes_and_literal_flag() {
        let cmd = TmuxCommand::SendKeys {
            target: "%0".to_string(),
            keys: "echo it's fine".to_string(),
            literal: true,
        };
        assert_eq!(
            cmd.to_wire(),
            "send-keys -t %0 -l 'echo it'\\''s fine'"
        );
    }

    #[test]
    fn empty_key_argument_is_quoted() {
        let cmd = TmuxCommand::SendKeys {
            target: "%0".to_string(),
            keys: String::new(),
            literal: false,
        };
        assert_eq!(cmd.to_wire(), "send-keys -t %0 ''");
    }

    #[test]
    fn resize_pane_with_zoom() {
        let cmd = TmuxCommand::ResizePane {
            target: "%1".to_string(),
            width: Some(80),
            height: None,
            zoom: true,
        };
        assert_eq!(cmd.to_wire(), "resize-pane -t %1 -x 80 -Z");
    }

    #[test]
    fn split_window_horizontal() {
        let cmd = TmuxCommand::SplitWindow {
            target: "@2".to_string(),
            horizontal: true,
        };
        assert_eq!(cmd.to_wire(), "split-window -h -t @2");
    }

    #[test]
    fn list_windows_without_target() {
        assert_eq!(
            TmuxCommand::ListWindows { session_name: None }.to_wire(),
            "list-windows"
        );
    }
}
