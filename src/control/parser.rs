//! Decode a single framed control-mode record into a [`ControlMessage`].
//!
//! The vis-style octal decoder is the wire-format inverse of tmux's own
//! `vis(3)`-style encoder: any byte outside printable ASCII (plus `\`
//! itself) is escaped as `\NNN`.

use base64::Engine;

use super::message::ControlMessage;

/// Decode one `%output`-style payload from its backslash-escaped-octal wire
/// form back into raw bytes.
///
/// - `\NNN` (1-3 octal digits, consumed greedily) decodes to that byte.
/// - `\\` decodes to a literal backslash.
/// - Any other `\x` is taken literally as both bytes (`\` and `x`).
/// - A bare trailing `\` decodes to a literal `\`.
pub fn vis_decode(s: &str) -> Vec<u8> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        // Saw a backslash.
        if i + 1 >= bytes.len() {
            // Bare trailing backslash.
            out.push(b'\\');
            i += 1;
            continue;
        }
        let next = bytes[i + 1];
        if next == b'\\' {
            out.push(b'\\');
            i += 2;
            continue;
        }
        if (b'0'..=b'7').contains(&next) {
            let mut digits = 0;
            let mut value: u32 = 0;
            let mut j = i + 1;
            while digits < 3 && j < bytes.len() && (b'0'..=b'7').contains(&bytes[j]) {
                value = value * 8 + (bytes[j] - b'0') as u32;
                j += 1;
                digits += 1;
            }
            out.push((value & 0xff) as u8);
            i = j;
            continue;
        }
        // Any other `\x` form: literal.
        out.push(b'\\');
        out.push(next);
        i += 2;
    }
    out
}

/// Split on ASCII space with a bounded max-split so the final field (a
/// payload that may itself contain spaces) is preserved intact.
fn split_args(s: &str, max_parts: usize) -> Vec<&str> {
    s.splitn(max_parts, ' ').collect()
}

/// Parse one line (without its trailing `\n`) into a [`ControlMessage`].
///
/// Lines not beginning with `%` and unrecognized `%`-commands both become
/// [`ControlMessage::Unknown`] — this function never fails.
pub fn parse_record(line: &[u8]) -> ControlMessage {
    let raw = String::from_utf8_lossy(line).into_owned();

    if !raw.starts_with('%') {
        return ControlMessage::Unknown { raw };
    }

    let parts = split_args(&raw, 2);
    let (cmd, rest) = (parts[0], parts.get(1).copied().unwrap_or(""));

    match cmd {
        "%output" => parse_output(rest, &raw),
        "%layout-change" => parse_two_fields(rest, &raw, |window_id, layout| {
            ControlMessage::LayoutChange {
                window_id: window_id.to_string(),
                layout: layout.to_string(),
            }
        }),
        "%window-add" => {
            let fields = split_args(rest, 2);
            match fields.first() {
                Some(&id) if !id.is_empty() => ControlMessage::WindowAdd {
                    window_id: id.to_string(),
                    window_name: fields.get(1).map(|s| s.to_string()),
                },
                _ => ControlMessage::Unknown { raw },
            }
        }
        "%unlinked-window-add" => {
            let fields = split_args(rest, 2);
            match fields.first() {
                Some(&id) if !id.is_empty() => ControlMessage::WindowAdd {
                    window_id: id.to_string(),
                    window_name: fields.get(1).map(|s| s.to_string()),
                },
                _ => ControlMessage::Unknown { raw },
            }
        }
        "%window-close" | "%unlinked-window-close" => parse_one_field(rest, &raw, |id| {
            ControlMessage::WindowClose {
                window_id: id.to_string(),
            }
        }),
        "%window-renamed" | "%unlinked-window-renamed" => {
            parse_two_fields(rest, &raw, |window_id, name| ControlMessage::WindowRenamed {
                window_id: window_id.to_string(),
                new_name: name.to_string(),
            })
        }
        "%session-changed" | "%client-session-changed" => {
            parse_two_fields(rest, &raw, |session_id, name| ControlMessage::SessionChanged {
                session_id: session_id.to_string(),
                session_name: name.to_string(),
            })
        }
        "%session-closed" => parse_one_field(rest, &raw, |id| ControlMessage::SessionClosed {
            session_id: id.to_string(),
        }),
        "%pane-mode-changed" => {
            parse_two_fields(rest, &raw, |pane_id, mode| ControlMessage::PaneMode {
                pane_id: pane_id.to_string(),
                mode_name: mode.to_string(),
            })
        }
        "%pause" => parse_one_field(rest, &raw, |pane_id| ControlMessage::PaneMode {
            pane_id: pane_id.to_string(),
            mode_name: "paused".to_string(),
        }),
        "%continue" => parse_one_field(rest, &raw, |pane_id| ControlMessage::PaneMode {
            pane_id: pane_id.to_string(),
            mode_name: "running".to_string(),
        }),
        "%pane-focus-in" => parse_one_field(rest, &raw, |id| ControlMessage::PaneFocusIn {
            pane_id: id.to_string(),
        }),
        "%pane-focus-out" => parse_one_field(rest, &raw, |id| ControlMessage::PaneFocusOut {
            pane_id: id.to_string(),
        }),
        "%pane-set-clipboard" => parse_clipboard(rest, &raw),
        "%exit" => {
            let reason = rest.trim();
            ControlMessage::Exit {
                reason: if reason.is_empty() {
                    None
                } else {
                    Some(reason.to_string())
                },
            }
        }
        "%client-detached" => {
            let name = rest.trim();
            ControlMessage::Exit {
                reason: if name.is_empty() {
                    None
                } else {
                    Some(name.to_string())
                },
            }
        }
        "%features" => ControlMessage::Features {
            raw: rest.to_string(),
        },
        "%subscription-changed" => ControlMessage::Subscriptions {
            raw: rest.to_string(),
        },
        _ => ControlMessage::Unknown { raw },
    }
}

fn parse_output(rest: &str, raw: &str) -> ControlMessage {
    let fields = split_args(rest, 2);
    match fields.as_slice() {
        [pane_id] if !pane_id.is_empty() => ControlMessage::Output {
            pane_id: pane_id.to_string(),
            payload: Vec::new(),
        },
        [pane_id, payload] if !pane_id.is_empty() => ControlMessage::Output {
            pane_id: pane_id.to_string(),
            payload: vis_decode(payload),
        },
        _ => ControlMessage::Unknown {
            raw: raw.to_string(),
        },
    }
}

fn parse_clipboard(rest: &str, raw: &str) -> ControlMessage {
    let fields = split_args(rest, 2);
    match fields.as_slice() {
        [pane_id] if !pane_id.is_empty() => ControlMessage::PaneSetClipboard {
            pane_id: pane_id.to_string(),
            payload: None,
        },
        [pane_id, b64] if !pane_id.is_empty() => match decode_clipboard_payload(b64) {
            Ok(bytes) => ControlMessage::PaneSetClipboard {
                pane_id: pane_id.to_string(),
                payload: Some(bytes),
            },
            Err(_) => ControlMessage::Unknown {
                raw: raw.to_string(),
            },
        },
        _ => ControlMessage::Unknown {
            raw: raw.to_string(),
        },
    }
}

/// Inner fallible decode used by [`parse_clipboard`]; a malformed base64
/// payload is absorbed into `ControlMessage::Unknown` by the caller rather
/// than failing the whole record.
fn decode_clipboard_payload(b64: &str) -> anyhow::Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(b64.trim())
        .map_err(|e| anyhow::anyhow!("invalid base64 clipboard payload: {e}"))
}

fn parse_one_field<'a>(
    rest: &'a str,
    raw: &str,
    build: impl FnOnce(&'a str) -> ControlMessage,
) -> ControlMessage {
    let id = rest.trim();
    if id.is_empty() {
        ControlMessage::Unknown {
            raw: raw.to_string(),
        }
    } else {
        build(id)
    }
}

fn parse_two_fields<'a>(
    rest: &'a str,
    raw: &str,
    build: impl FnOnce(&'a str, &'a str) -> ControlMessage,
) -> ControlMessage {
    let fields = split_args(rest, 2);
    match fields.as_slice() {
        [a, b] if !a.is_empty() => build(a, b),
        _ => ControlMessage::Unknown {
            raw: raw.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vis_decode_plain() {
        assert_eq!(vis_decode("hello"), b"hello");
    }

    #[test]
    fn vis_decode_octal_space_and_newline() {
        assert_eq!(vis_decode("hello\\040world\\012"), b"hello world\n");
    }

    #[test]
    fn vis_decode_backslash() {
        assert_eq!(vis_decode("back\\\\slash"), b"back\\slash");
    }

    #[test]
    fn vis_decode_greedy_octal_digits() {
        // \1 followed by a non-octal digit should only consume the one digit.
        assert_eq!(vis_decode("\\101"), vec![0o101u8]);
        assert_eq!(vis_decode("\\1a"), {
            let mut v = vec![1u8];
            v.push(b'a');
            v
        });
    }

    #[test]
    fn vis_decode_trailing_bare_backslash() {
        assert_eq!(vis_decode("abc\\"), b"abc\\");
    }

    #[test]
    fn vis_decode_unknown_escape_is_literal() {
        assert_eq!(vis_decode("\\n"), b"\\n");
    }

    #[test]
    fn round_trip_property() {
        // Encoding then decoding must equal the original bytes, for an
        // arbitrary byte sequence including all control bytes.
        fn vis_encode(data: &[u8]) -> String {
            use std::fmt::Write;
            let mut out = String::new();
            for &b in data {
                if b < 0x20 || b == b'\\' {
                    write!(out, "\\{:03o}", b).unwrap();
                } else {
                    out.push(b as char);
                }
            }
            out
        }

        let samples: Vec<Vec<u8>> = vec![
            b"hello world".to_vec(),
            b"\r\n\t\0".to_vec(),
            (0u8..=255).collect(),
            b"\x1b[31mred\x1b[0m".to_vec(),
            b"".to_vec(),
        ];
        for sample in samples {
            let encoded = vis_encode(&sample);
            assert_eq!(vis_decode(&encoded), sample);
        }
    }

    #[test]
    fn session_changed_is_decoded() {
        let msg = parse_record(b"%session-changed $1 itmux");
        assert_eq!(
            msg,
            ControlMessage::SessionChanged {
                session_id: "$1".to_string(),
                session_name: "itmux".to_string(),
            }
        );
    }

    #[test]
    fn output_payload_is_decoded() {
        let msg = parse_record(b"%output %0 hello\\040world\\012");
        match msg {
            ControlMessage::Output { pane_id, payload } => {
                assert_eq!(pane_id, "%0");
                assert_eq!(payload, b"hello world\n");
                assert_eq!(payload.len(), 12);
                assert_eq!(*payload.last().unwrap(), 0x0A);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn layout_change_is_decoded() {
        let msg = parse_record(b"%layout-change @3 c3b2,80x24,0,0,1");
        assert_eq!(
            msg,
            ControlMessage::LayoutChange {
                window_id: "@3".to_string(),
                layout: "c3b2,80x24,0,0,1".to_string(),
            }
        );
    }

    #[test]
    fn exit_with_reason_is_decoded() {
        let msg = parse_record(b"%exit client-detached");
        assert_eq!(
            msg,
            ControlMessage::Exit {
                reason: Some("client-detached".to_string()),
            }
        );
    }

    #[test]
    fn exit_no_reason() {
        assert_eq!(parse_record(b"%exit"), ControlMessage::Exit { reason: None });
    }

    #[test]
    fn non_percent_line_is_unknown() {
        match parse_record(b"tmux 3.3a") {
            ControlMessage::Unknown { raw } => assert_eq!(raw, "tmux 3.3a"),
            other => panic!("expected Unknown, got {other:?}"),
        }
    }

    #[test]
    fn unrecognized_percent_command_is_unknown() {
        match parse_record(b"%not-a-real-command foo") {
            ControlMessage::Unknown { .. } => {}
            other => panic!("expected Unknown, got {other:?}"),
        }
    }

    #[test]
    fn malformed_window_add_is_unknown() {
        match parse_record(b"%window-add") {
            ControlMessage::Unknown { .. } => {}
            other => panic!("expected Unknown, got {other:?}"),
        }
    }

    #[test]
    fn pane_set_clipboard_with_payload() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"copied text");
        let line = format!("%pane-set-clipboard %2 {encoded}");
        let msg = parse_record(line.as_bytes());
        assert_eq!(
            msg,
            ControlMessage::PaneSetClipboard {
                pane_id: "%2".to_string(),
                payload: Some(b"copied text".to_vec()),
            }
        );
    }

    #[test]
    fn pane_set_clipboard_absent_payload() {
        let msg = parse_record(b"%pane-set-clipboard %2");
        assert_eq!(
            msg,
            ControlMessage::PaneSetClipboard {
                pane_id: "%2".to_string(),
                payload: None,
            }
        );
    }

    #[test]
    fn pause_and_continue_map_to_pane_mode() {
        assert_eq!(
            parse_record(b"%pause %1"),
            ControlMessage::PaneMode {
                pane_id: "%1".to_string(),
                mode_name: "paused".to_string(),
            }
        );
        assert_eq!(
            parse_record(b"%continue %1"),
            ControlMessage::PaneMode {
                pane_id: "%1".to_string(),
                mode_name: "running".to_string(),
            }
        );
    }

    #[test]
    fn client_detached_maps_to_exit() {
        assert_eq!(
            parse_record(b"%client-detached main"),
            ControlMessage::Exit {
                reason: Some("main".to_string()),
            }
        );
    }
}
