use std::time::Duration;

use bytes::Bytes;
use portable_pty::{CommandBuilder, PtySize, native_pty_system};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use vibeman_client::entities::container::ContainerErrorKind;

use crate::ContainerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSize {
  pub rows: u16,
  pub cols: u16,
}

impl Default for TerminalSize {
  fn default() -> Self {
    TerminalSize { rows: 24, cols: 80 }
  }
}

#[derive(Debug, Clone)]
pub enum PtyInput {
  Bytes(Bytes),
  Resize { rows: u16, cols: u16 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PtyOutput {
  Stdout(Bytes),
  /// A PTY merges the streams; this variant exists for runtimes that
  /// keep them separate (and for test doubles).
  Stderr(Bytes),
}

/// Handle to a live PTY session inside a container.
pub struct PtyHandle {
  pub stdin: mpsc::Sender<PtyInput>,
  pub output: mpsc::Receiver<PtyOutput>,
  pub cancel: CancellationToken,
  exit: watch::Receiver<Option<i32>>,
}

impl PtyHandle {
  /// Assemble a handle from raw channel halves. The runtime's attach
  /// uses this; so do test doubles.
  pub fn from_parts(
    stdin: mpsc::Sender<PtyInput>,
    output: mpsc::Receiver<PtyOutput>,
    cancel: CancellationToken,
    exit: watch::Receiver<Option<i32>>,
  ) -> PtyHandle {
    PtyHandle {
      stdin,
      output,
      cancel,
      exit,
    }
  }

  /// Wait for the child to exit. Cancellation counts as exit code -1
  /// when no real code was observed.
  pub async fn wait(&mut self) -> i32 {
    loop {
      if let Some(code) = *self.exit.borrow() {
        return code;
      }
      tokio::select! {
        res = self.exit.changed() => {
          if res.is_err() {
            return self.exit.borrow().unwrap_or(-1);
          }
        }
        _ = self.cancel.cancelled() => {
          return self.exit.borrow().unwrap_or(-1);
        }
      }
    }
  }

  pub fn exit_code(&self) -> Option<i32> {
    *self.exit.borrow()
  }
}

/// Spawn `docker exec -it <container> <shell>` under a native PTY and
/// wire it to channels: a writer task draining stdin messages (bytes
/// and resizes), a reader task pumping output, and a wait task
/// watching the child.
pub(crate) async fn attach(
  engine: &str,
  container: &str,
  shell: &str,
  size: TerminalSize,
) -> Result<PtyHandle, ContainerError> {
  let pty = native_pty_system()
    .openpty(PtySize {
      rows: size.rows,
      cols: size.cols,
      pixel_width: 0,
      pixel_height: 0,
    })
    .map_err(|e| {
      ContainerError::new(
        ContainerErrorKind::ExecError,
        format!("failed to open pty: {e}"),
      )
    })?;

  let mut cmd = CommandBuilder::new(engine);
  cmd.args(["exec", "-it", container, shell]);
  cmd.env("TERM", "xterm-256color");
  cmd.env("COLORTERM", "truecolor");

  let mut child =
    pty.slave.spawn_command(cmd).map_err(|e| {
      ContainerError::new(
        ContainerErrorKind::ExecError,
        format!("failed to spawn exec under pty: {e}"),
      )
    })?;

  // Catch an exec that dies immediately (missing container, missing
  // shell) before wiring anything up.
  tokio::time::sleep(Duration::from_millis(100)).await;
  if let Ok(Some(status)) = child.try_wait() {
    return Err(ContainerError::new(
      ContainerErrorKind::ExecError,
      format!(
        "exec exited immediately with code {}",
        status.exit_code()
      ),
    ));
  }

  let mut pty_write = pty.master.take_writer().map_err(|e| {
    ContainerError::new(
      ContainerErrorKind::ExecError,
      format!("failed to take pty writer: {e}"),
    )
  })?;
  let mut pty_read =
    pty.master.try_clone_reader().map_err(|e| {
      ContainerError::new(
        ContainerErrorKind::ExecError,
        format!("failed to clone pty reader: {e}"),
      )
    })?;

  let cancel = CancellationToken::new();
  let (exit_tx, exit_rx) = watch::channel(None);

  // CHILD WAIT TASK
  let _cancel = cancel.clone();
  tokio::task::spawn_blocking(move || {
    loop {
      if _cancel.is_cancelled() {
        trace!("pty wait: cancelled from outside");
        if let Err(e) = child.kill() {
          debug!("failed to kill exec child | {e:?}");
        }
        break;
      }
      match child.try_wait() {
        Ok(Some(status)) => {
          debug!("exec child exited with {status:?}");
          let _ = exit_tx.send(Some(status.exit_code() as i32));
          _cancel.cancel();
          break;
        }
        Ok(None) => {
          std::thread::sleep(Duration::from_millis(100));
        }
        Err(e) => {
          debug!("failed to wait for exec child | {e:?}");
          _cancel.cancel();
          break;
        }
      }
    }
  });

  // CHANNEL -> PTY STDIN TASK
  let (stdin, mut stdin_rx) = mpsc::channel::<PtyInput>(8192);
  let _cancel = cancel.clone();
  tokio::task::spawn_blocking(move || {
    loop {
      if _cancel.is_cancelled() {
        trace!("pty write: cancelled from outside");
        break;
      }
      match stdin_rx.blocking_recv() {
        Some(PtyInput::Bytes(bytes)) => {
          if let Err(e) = pty_write.write_all(&bytes) {
            debug!("failed to write to pty: {e:?}");
            _cancel.cancel();
            break;
          }
        }
        Some(PtyInput::Resize { rows, cols }) => {
          if let Err(e) = pty.master.resize(PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
          }) {
            debug!("failed to resize pty | {e:?}");
            _cancel.cancel();
            break;
          }
        }
        None => {
          debug!("pty stdin channel disconnected");
          _cancel.cancel();
          break;
        }
      }
    }
  });

  // PTY -> CHANNEL OUTPUT TASK
  let (output_tx, output) = mpsc::channel::<PtyOutput>(8192);
  let _cancel = cancel.clone();
  tokio::task::spawn_blocking(move || {
    let mut buf = [0u8; 8192];
    loop {
      if _cancel.is_cancelled() {
        trace!("pty read: cancelled from outside");
        break;
      }
      match pty_read.read(&mut buf) {
        Ok(0) => {
          trace!("pty read EOF");
          _cancel.cancel();
          break;
        }
        Ok(n) => {
          if output_tx
            .blocking_send(PtyOutput::Stdout(Bytes::copy_from_slice(
              &buf[..n],
            )))
            .is_err()
          {
            debug!("pty output channel disconnected");
            _cancel.cancel();
            break;
          }
        }
        Err(e) => {
          debug!("failed to read from pty: {e:?}");
          _cancel.cancel();
          break;
        }
      }
    }
  });

  trace!("pty tasks spawned for container {container}");

  Ok(PtyHandle::from_parts(stdin, output, cancel, exit_rx))
}
