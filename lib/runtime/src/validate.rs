use std::{
  path::{Component, Path},
  sync::OnceLock,
};

use regex::Regex;
use vibeman_client::entities::container::ContainerErrorKind;

use crate::ContainerError;

/// Commands allowed as argv[0] of a container exec.
const EXEC_ALLOW_LIST: &[&str] = &[
  "sh", "bash", "zsh", "env", "ls", "cat", "echo", "tail", "ps",
  "claude",
];

fn container_ref_regex() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]{0,127}$").unwrap()
  })
}

fn port_mapping_regex() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| {
    Regex::new(
      r"^(\d{1,3}(\.\d{1,3}){3}:)?\d{1,5}:\d{1,5}(/(tcp|udp))?$",
    )
    .unwrap()
  })
}

/// Container ids and names share the engine's naming charset.
pub fn validate_container_ref(
  id: &str,
) -> Result<(), ContainerError> {
  if container_ref_regex().is_match(id) {
    Ok(())
  } else {
    Err(ContainerError::new(
      ContainerErrorKind::ConfigError,
      format!("invalid container reference: {id:?}"),
    ))
  }
}

/// `[host_ip:]host_port:container_port[/tcp|/udp]`
pub fn validate_port_mapping(
  mapping: &str,
) -> Result<(), ContainerError> {
  if port_mapping_regex().is_match(mapping) {
    Ok(())
  } else {
    Err(ContainerError::new(
      ContainerErrorKind::ConfigError,
      format!("invalid port mapping: {mapping:?}"),
    ))
  }
}

/// Host paths handed to the engine must be absolute and must not
/// escape upward once cleaned.
pub fn validate_host_path(path: &Path) -> Result<(), ContainerError> {
  if !path.is_absolute() {
    return Err(ContainerError::new(
      ContainerErrorKind::ConfigError,
      format!("path must be absolute: {path:?}"),
    ));
  }
  if path
    .components()
    .any(|component| matches!(component, Component::ParentDir))
  {
    return Err(ContainerError::new(
      ContainerErrorKind::ConfigError,
      format!("path must not contain '..': {path:?}"),
    ));
  }
  Ok(())
}

/// Exec argv is restricted to an allow-list of base commands.
pub fn validate_exec_command(
  argv: &[String],
) -> Result<(), ContainerError> {
  let Some(program) = argv.first() else {
    return Err(ContainerError::new(
      ContainerErrorKind::ExecError,
      "exec command is empty",
    ));
  };
  let base = program.rsplit('/').next().unwrap_or(program);
  if !EXEC_ALLOW_LIST.contains(&base) {
    return Err(ContainerError::new(
      ContainerErrorKind::ExecError,
      format!("exec command {program:?} is not allowed"),
    ));
  }
  Ok(())
}
