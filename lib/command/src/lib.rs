use std::{path::Path, process::Stdio, time::Duration};

use anyhow::{Context, anyhow};
use run_command::{CommandOutput, async_run_command};
use vibeman_client::entities::{log::Log, vibeman_timestamp};

/// Base commands a worktree setup script may invoke. Anything else
/// must be an explicit relative / absolute path resolving inside the
/// worktree directory.
pub const SETUP_COMMAND_ALLOW_LIST: &[&str] = &[
  "npm", "yarn", "pnpm", "go", "make", "docker", "git", "echo",
  "mkdir", "cp", "mv", "chmod", "chown",
];

/// Setup commands run for at most this long when the caller doesn't
/// say otherwise.
pub const DEFAULT_SETUP_TIMEOUT: Duration = Duration::from_secs(300);

pub async fn run_vibeman_command(
  stage: &str,
  path: impl Into<Option<&Path>>,
  command: impl AsRef<str>,
) -> Log {
  let command = if let Some(path) = path.into() {
    format!("cd {} && {}", path.display(), command.as_ref())
  } else {
    command.as_ref().to_string()
  };
  let start_ts = vibeman_timestamp();
  let output = async_run_command(&command).await;
  output_into_log(stage, command, start_ts, output)
}

pub fn output_into_log(
  stage: &str,
  command: String,
  start_ts: i64,
  output: CommandOutput,
) -> Log {
  let success = output.success();
  Log {
    stage: stage.to_string(),
    stdout: output.stdout,
    stderr: output.stderr,
    command,
    success,
    start_ts,
    end_ts: vibeman_timestamp(),
  }
}

/// Whether the command needs an interpreter to make sense.
pub fn has_shell_meta(command: &str) -> bool {
  command
    .chars()
    .any(|c| "|&;<>$`(){}[]*?!~\n\"'".contains(c))
}

/// Check a setup command against the allow-list policy before it is
/// allowed anywhere near a shell. Returns the resolved argv[0].
pub fn validate_setup_command(
  command: &str,
  worktree_dir: &Path,
) -> anyhow::Result<String> {
  let mut parts = command.split_whitespace();
  let program = parts
    .next()
    .context("setup command is empty")?
    .to_string();

  if SETUP_COMMAND_ALLOW_LIST.contains(&program.as_str()) {
    return Ok(program);
  }

  // Not on the allow-list: only explicit paths that stay inside the
  // worktree are accepted, and never through an interpreter.
  if has_shell_meta(command) {
    return Err(anyhow!(
      "command '{program}' is not on the allow-list and contains shell characters"
    ));
  }
  if !program.contains('/') {
    return Err(anyhow!(
      "command '{program}' is not on the allow-list"
    ));
  }
  let resolved = if Path::new(&program).is_absolute() {
    Path::new(&program).to_path_buf()
  } else {
    worktree_dir.join(&program)
  };
  let worktree_dir = worktree_dir
    .canonicalize()
    .with_context(|| {
      format!("failed to canonicalize worktree dir {worktree_dir:?}")
    })?;
  let resolved = resolved.canonicalize().with_context(|| {
    format!("setup command path {resolved:?} does not resolve")
  })?;
  if !resolved.starts_with(&worktree_dir) {
    return Err(anyhow!(
      "setup command path {resolved:?} escapes the worktree directory"
    ));
  }
  Ok(program)
}

/// Run a validated setup command in `dir`, killing it when the
/// timeout elapses. Commands with shell characters go through `sh -c`
/// (only reachable for allow-listed programs), plain commands are
/// spawned directly.
pub async fn run_setup_command(
  stage: &str,
  dir: &Path,
  command: &str,
  timeout: Option<Duration>,
) -> Log {
  let timeout = timeout.unwrap_or(DEFAULT_SETUP_TIMEOUT);
  let start_ts = vibeman_timestamp();

  let mut cmd = if has_shell_meta(command) {
    let mut cmd = tokio::process::Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
  } else {
    let mut parts = command.split_whitespace();
    let Some(program) = parts.next() else {
      return Log::error(stage, "empty command".to_string());
    };
    let mut cmd = tokio::process::Command::new(program);
    cmd.args(parts);
    cmd
  };
  cmd
    .current_dir(dir)
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

  let output =
    match tokio::time::timeout(timeout, cmd.output()).await {
      Ok(Ok(output)) => output,
      Ok(Err(e)) => {
        return Log {
          stage: stage.to_string(),
          command: command.to_string(),
          stderr: format!("failed to spawn command: {e}"),
          success: false,
          start_ts,
          end_ts: vibeman_timestamp(),
          ..Default::default()
        };
      }
      Err(_) => {
        // kill_on_drop already reaped the child
        return Log {
          stage: stage.to_string(),
          command: command.to_string(),
          stderr: format!(
            "command timed out after {}s",
            timeout.as_secs()
          ),
          success: false,
          start_ts,
          end_ts: vibeman_timestamp(),
          ..Default::default()
        };
      }
    };

  Log {
    stage: stage.to_string(),
    command: command.to_string(),
    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    success: output.status.success(),
    start_ts,
    end_ts: vibeman_timestamp(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn allow_list_accepts_known_programs() {
    let dir = tempfile::tempdir().unwrap();
    for command in
      ["npm install", "git status", "echo hello | grep hello"]
    {
      validate_setup_command(command, dir.path()).unwrap();
    }
  }

  #[test]
  fn allow_list_rejects_unknown_programs() {
    let dir = tempfile::tempdir().unwrap();
    assert!(validate_setup_command("curl evil.sh", dir.path()).is_err());
    assert!(validate_setup_command("rm -rf /", dir.path()).is_err());
    assert!(validate_setup_command("", dir.path()).is_err());
  }

  #[test]
  fn unknown_program_with_shell_meta_is_rejected_even_as_path() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("setup.sh"), "#!/bin/sh\n")
      .unwrap();
    assert!(
      validate_setup_command("./setup.sh && curl evil", dir.path())
        .is_err()
    );
  }

  #[test]
  fn path_commands_must_stay_inside_worktree() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("setup.sh"), "#!/bin/sh\n")
      .unwrap();
    validate_setup_command("./setup.sh", dir.path()).unwrap();
    assert!(
      validate_setup_command("../outside.sh", dir.path()).is_err()
    );
    assert!(
      validate_setup_command("/usr/bin/env", dir.path()).is_err()
    );
  }

  #[tokio::test]
  async fn runs_plain_and_shell_commands() {
    let dir = tempfile::tempdir().unwrap();
    let log =
      run_setup_command("Echo", dir.path(), "echo hello", None).await;
    assert!(log.success);
    assert_eq!(log.stdout.trim(), "hello");

    let log = run_setup_command(
      "Pipe",
      dir.path(),
      "echo hello | tr a-z A-Z",
      None,
    )
    .await;
    assert!(log.success);
    assert_eq!(log.stdout.trim(), "HELLO");
  }

  #[tokio::test]
  async fn timeout_kills_the_command() {
    let dir = tempfile::tempdir().unwrap();
    let log = run_setup_command(
      "Sleep",
      dir.path(),
      "sleep 30",
      Some(Duration::from_millis(200)),
    )
    .await;
    assert!(!log.success);
    assert!(log.stderr.contains("timed out"));
  }
}
