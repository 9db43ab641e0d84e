use serde::{Deserialize, Serialize};

/// Client -> server frames on the terminal websocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TermClientMsg {
  /// Bytes for the PTY's stdin. `data` is utf-8 text, or base64 when
  /// `encoding` says so.
  Stdin {
    data: String,
    #[serde(default)]
    encoding: StdinEncoding,
  },
  Resize {
    rows: u16,
    cols: u16,
  },
  Ping,
}

#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum StdinEncoding {
  #[default]
  Utf8,
  Base64,
}

/// Server -> client frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TermServerMsg {
  Stdout { data: String },
  Stderr { data: String },
  Exit { code: i32 },
  Pong,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn stdin_frame_accepts_plain_text() {
    let msg: TermClientMsg =
      serde_json::from_str(r#"{"type":"stdin","data":"echo hi\n"}"#)
        .unwrap();
    assert_eq!(
      msg,
      TermClientMsg::Stdin {
        data: "echo hi\n".to_string(),
        encoding: StdinEncoding::Utf8,
      }
    );
  }

  #[test]
  fn resize_and_control_frames() {
    let msg: TermClientMsg = serde_json::from_str(
      r#"{"type":"resize","rows":40,"cols":120}"#,
    )
    .unwrap();
    assert_eq!(msg, TermClientMsg::Resize { rows: 40, cols: 120 });
    let msg: TermClientMsg =
      serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
    assert_eq!(msg, TermClientMsg::Ping);
  }

  #[test]
  fn exit_frame_wire_format() {
    assert_eq!(
      serde_json::to_string(&TermServerMsg::Exit { code: 0 }).unwrap(),
      r#"{"type":"exit","code":0}"#
    );
    assert_eq!(
      serde_json::to_string(&TermServerMsg::Pong).unwrap(),
      r#"{"type":"pong"}"#
    );
  }
}
