use std::time::Duration;

use axum::{
  extract::{
    Path, State, WebSocketUpgrade,
    ws::{Message, Utf8Bytes, WebSocket},
  },
  http::HeaderMap,
  response::Response,
};
use base64::Engine;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use runtime::{PtyInput, PtyOutput, TerminalSize};
use vibeman_client::entities::{
  error::Error,
  terminal::{StdinEncoding, TermClientMsg, TermServerMsg},
  worktree::WorktreeStatus,
};

use crate::server::{
  AppState, coordinator::ai_container_name, db_error,
  error::ApiResult,
};

/// `GET /api/ai/attach/{worktree}`: upgrade to a websocket bridged
/// onto the worktree's AI container PTY. The origin is checked
/// before the upgrade; disallowed origins never reach the PTY.
pub async fn attach(
  State(app): State<AppState>,
  Path(worktree): Path<String>,
  headers: HeaderMap,
  ws: WebSocketUpgrade,
) -> ApiResult<Response> {
  check_origin(&app, &headers)?;

  // accept either the worktree id or its unique-enough name
  let worktree = match app.db.get_worktree(&worktree).await {
    Ok(worktree) => worktree,
    Err(_) => app
      .db
      .list_worktrees(None, None)
      .await
      .map_err(db_error)?
      .into_iter()
      .find(|candidate| candidate.name == worktree)
      .ok_or_else(|| Error::not_found("worktree", &worktree))?,
  };
  if worktree.status != WorktreeStatus::Running {
    return Err(
      Error::invalid_state(format!(
        "worktree {} is not running",
        worktree.name
      ))
      .into(),
    );
  }
  let repo = app
    .db
    .get_repository(&worktree.repository_id)
    .await
    .map_err(db_error)?;

  let container_name = ai_container_name(&repo.name, &worktree.name);
  let container = app
    .runtime
    .get_by_name(&container_name)
    .await?
    .ok_or_else(|| {
      Error::not_found("AI container", &container_name)
    })?;

  Ok(ws.on_upgrade(move |socket| async move {
    bridge(app, socket, container.name).await;
  }))
}

/// The bridge loop: client json frames in, PTY bytes out.
async fn bridge(app: AppState, socket: WebSocket, container: String) {
  let (mut ws_write, mut ws_read) = socket.split();

  let mut pty = match app
    .runtime
    .attach_pty(&container, "zsh", TerminalSize::default())
    .await
  {
    Ok(pty) => pty,
    Err(e) => {
      let _ = ws_write
        .send(Message::Text(Utf8Bytes::from(format!("ERROR: {e:#}"))))
        .await;
      let _ = ws_write.close().await;
      return;
    }
  };

  let idle_timeout =
    Duration::from_secs(app.config.terminal.idle_timeout_secs);
  let idle = tokio::time::sleep(idle_timeout);
  tokio::pin!(idle);

  loop {
    tokio::select! {
      msg = ws_read.next() => {
        idle.as_mut().reset(tokio::time::Instant::now() + idle_timeout);
        match msg {
          Some(Ok(Message::Text(text))) => {
            match serde_json::from_str::<TermClientMsg>(text.as_str()) {
              Ok(TermClientMsg::Stdin { data, encoding }) => {
                let bytes = match encoding {
                  StdinEncoding::Utf8 => Bytes::from(data.into_bytes()),
                  StdinEncoding::Base64 => {
                    match base64::engine::general_purpose::STANDARD.decode(&data) {
                      Ok(bytes) => Bytes::from(bytes),
                      Err(e) => {
                        debug!("bad base64 stdin frame: {e}");
                        continue;
                      }
                    }
                  }
                };
                if pty.stdin.send(PtyInput::Bytes(bytes)).await.is_err() {
                  debug!("pty stdin closed");
                  break;
                }
              }
              Ok(TermClientMsg::Resize { rows, cols }) => {
                if pty.stdin.send(PtyInput::Resize { rows, cols }).await.is_err() {
                  debug!("pty stdin closed on resize");
                  break;
                }
              }
              Ok(TermClientMsg::Ping) => {
                if send_frame(&mut ws_write, &TermServerMsg::Pong).await.is_err() {
                  break;
                }
              }
              Err(e) => {
                debug!("unparseable terminal frame: {e}");
              }
            }
          }
          // raw binary frames pass straight through to stdin
          Some(Ok(Message::Binary(bytes))) => {
            if pty.stdin.send(PtyInput::Bytes(bytes)).await.is_err() {
              break;
            }
          }
          Some(Ok(Message::Close(_))) | None => {
            debug!("terminal ws closed by client");
            break;
          }
          Some(Ok(_)) => {}
          Some(Err(e)) => {
            debug!("terminal ws read error: {e}");
            break;
          }
        }
      }
      out = pty.output.recv() => match out {
        Some(PtyOutput::Stdout(bytes)) => {
          let msg = TermServerMsg::Stdout {
            data: String::from_utf8_lossy(&bytes).to_string(),
          };
          if send_frame(&mut ws_write, &msg).await.is_err() {
            break;
          }
        }
        Some(PtyOutput::Stderr(bytes)) => {
          let msg = TermServerMsg::Stderr {
            data: String::from_utf8_lossy(&bytes).to_string(),
          };
          if send_frame(&mut ws_write, &msg).await.is_err() {
            break;
          }
        }
        None => {
          debug!("pty output ended");
          break;
        }
      },
      _ = pty.cancel.cancelled() => {
        debug!("pty cancelled");
        break;
      }
      _ = &mut idle => {
        debug!("terminal ws idle timeout");
        break;
      }
    }
  }

  // tear the PTY down and report the exit code as the final frame
  pty.cancel.cancel();
  let code = pty.wait().await;
  let _ =
    send_frame(&mut ws_write, &TermServerMsg::Exit { code }).await;
  let _ = ws_write.close().await;
}

async fn send_frame(
  ws_write: &mut futures::stream::SplitSink<WebSocket, Message>,
  msg: &TermServerMsg,
) -> Result<(), axum::Error> {
  let text = serde_json::to_string(msg)
    .expect("terminal frames serialize");
  ws_write.send(Message::Text(Utf8Bytes::from(text))).await
}

/// Reject disallowed origins before the upgrade. No configured list
/// means browser clients must come from this host; non-browser
/// clients (no Origin header) always pass.
fn check_origin(
  app: &AppState,
  headers: &HeaderMap,
) -> Result<(), Error> {
  let Some(origin) = headers.get("origin") else {
    return Ok(());
  };
  let origin = origin.to_str().unwrap_or_default();
  let allowed = &app.config.terminal.allowed_origins;
  let ok = if allowed.is_empty() {
    origin_host(origin)
      .map(|host| {
        host == "localhost" || host == "127.0.0.1" || host == "[::1]"
      })
      .unwrap_or(false)
  } else {
    allowed.iter().any(|entry| entry == origin)
  };
  if ok {
    Ok(())
  } else {
    Err(Error::invalid_input(format!(
      "origin {origin} is not allowed"
    )))
  }
}

fn origin_host(origin: &str) -> Option<&str> {
  let rest = origin.split_once("://").map(|(_, rest)| rest)?;
  let rest = rest.split('/').next().unwrap_or(rest);
  // strip a port, careful with ipv6 brackets
  if let Some(end) = rest.find(']') {
    return Some(&rest[..=end]);
  }
  Some(rest.split(':').next().unwrap_or(rest))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn origin_host_extraction() {
    assert_eq!(
      origin_host("http://localhost:3000"),
      Some("localhost")
    );
    assert_eq!(
      origin_host("https://app.example.com"),
      Some("app.example.com")
    );
    assert_eq!(
      origin_host("http://[::1]:8080"),
      Some("[::1]")
    );
    assert_eq!(origin_host("garbage"), None);
  }
}
