use serde::Deserialize;
use vibeman_client::entities::container::{
  ContainerDescriptor, ContainerType, LABEL_ENVIRONMENT,
  LABEL_REPOSITORY, LABEL_TYPE,
};

/// One line of `docker ps --format '{{json .}}'`.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct PsItem {
  #[serde(default, alias = "ID")]
  pub id: String,
  #[serde(default, alias = "Names")]
  pub names: String,
  #[serde(default, alias = "Image")]
  pub image: String,
  #[serde(default, alias = "Status")]
  pub status: String,
  /// Comma separated `key=value` pairs.
  #[serde(default, alias = "Labels")]
  pub labels: String,
  #[serde(default, alias = "Ports")]
  pub ports: String,
  #[serde(default, alias = "CreatedAt")]
  pub created_at: String,
}

/// Parse the line-delimited json of a list invocation. Unparseable
/// lines are skipped, the engine occasionally interleaves warnings.
pub(crate) fn parse_ps_output(
  stdout: &str,
) -> Vec<ContainerDescriptor> {
  stdout
    .lines()
    .filter(|line| !line.trim().is_empty())
    .filter_map(|line| match serde_json::from_str::<PsItem>(line) {
      Ok(item) => Some(item.into_descriptor()),
      Err(e) => {
        debug!("skipping unparseable ps line: {e} | {line}");
        None
      }
    })
    .collect()
}

impl PsItem {
  fn into_descriptor(self) -> ContainerDescriptor {
    let mut repository = String::new();
    let mut environment = String::new();
    let mut container_type = ContainerType::default();
    for pair in self.labels.split(',') {
      let Some((key, value)) = pair.split_once('=') else {
        continue;
      };
      match key {
        LABEL_REPOSITORY => repository = value.to_string(),
        LABEL_ENVIRONMENT => environment = value.to_string(),
        LABEL_TYPE => {
          container_type = value.parse().unwrap_or_default()
        }
        _ => {}
      }
    }
    ContainerDescriptor {
      id: self.id,
      // list output reports a single name without the leading slash
      name: self.names.trim_start_matches('/').to_string(),
      image: self.image,
      status: self.status,
      container_type,
      repository,
      environment,
      env_vars: Vec::new(),
      ports: self
        .ports
        .split(", ")
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect(),
      created_at: self.created_at,
    }
  }
}

/// The subset of `docker inspect` output the control plane reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct InspectItem {
  #[serde(default, alias = "Id")]
  pub id: String,
  #[serde(default, alias = "Name")]
  pub name: String,
  #[serde(default, alias = "Created")]
  pub created: String,
  #[serde(default, alias = "State")]
  pub state: InspectState,
  #[serde(default, alias = "Config")]
  pub config: InspectConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct InspectState {
  #[serde(default, alias = "Status")]
  pub status: String,
  #[serde(default, alias = "Health")]
  pub health: Option<InspectHealth>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct InspectHealth {
  #[serde(default, alias = "Status")]
  pub status: String,
  #[serde(default, alias = "Log")]
  pub log: Vec<InspectHealthLog>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct InspectHealthLog {
  #[serde(default, alias = "ExitCode")]
  pub exit_code: i64,
  #[serde(default, alias = "Output")]
  pub output: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct InspectConfig {
  #[serde(default, alias = "Image")]
  pub image: String,
  #[serde(default, alias = "Env")]
  pub env: Vec<String>,
  #[serde(default, alias = "Labels")]
  pub labels: std::collections::HashMap<String, String>,
}

/// Parse the single json document of an inspect invocation (the
/// engine wraps it in an array).
pub(crate) fn parse_inspect_output(
  stdout: &str,
) -> Option<InspectItem> {
  serde_json::from_str::<Vec<InspectItem>>(stdout)
    .ok()?
    .into_iter()
    .next()
}

impl InspectItem {
  pub fn into_descriptor(self) -> ContainerDescriptor {
    let labels = &self.config.labels;
    ContainerDescriptor {
      id: self.id,
      name: self.name.trim_start_matches('/').to_string(),
      image: self.config.image,
      status: self.state.status,
      container_type: labels
        .get(LABEL_TYPE)
        .and_then(|v| v.parse().ok())
        .unwrap_or_default(),
      repository: labels
        .get(LABEL_REPOSITORY)
        .cloned()
        .unwrap_or_default(),
      environment: labels
        .get(LABEL_ENVIRONMENT)
        .cloned()
        .unwrap_or_default(),
      env_vars: self.config.env,
      ports: Vec::new(),
      created_at: self.created,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const PS_LINE: &str = r#"{"ID":"4fa6e0f0c678","Names":"api-feature-x-ai","Image":"vibeman/ai:latest","Status":"Up 2 minutes","Labels":"vibeman.managed=true,vibeman.repository=api,vibeman.environment=feature-x,vibeman.type=ai","Ports":"0.0.0.0:8080->8080/tcp","CreatedAt":"2025-06-01 10:00:00 +0000 UTC"}"#;

  #[test]
  fn parses_ps_lines() {
    let out = format!("{PS_LINE}\n\nnot json\n{PS_LINE}\n");
    let containers = parse_ps_output(&out);
    assert_eq!(containers.len(), 2);
    let c = &containers[0];
    assert_eq!(c.id, "4fa6e0f0c678");
    assert_eq!(c.name, "api-feature-x-ai");
    assert_eq!(c.repository, "api");
    assert_eq!(c.environment, "feature-x");
    assert_eq!(c.container_type, ContainerType::Ai);
    assert_eq!(c.ports, vec!["0.0.0.0:8080->8080/tcp"]);
    assert!(c.is_running());
  }

  #[test]
  fn parses_inspect_documents() {
    let doc = r#"[{
      "Id": "4fa6e0f0c6786287e131c3852c58a2e01cc697a93bdcb62885538ab146647d37",
      "Name": "/api-feature-x",
      "Created": "2025-06-01T10:00:00.000000000Z",
      "State": {
        "Status": "running",
        "Health": {"Status": "healthy", "Log": [{"ExitCode": 0, "Output": "ok"}]}
      },
      "Config": {
        "Image": "postgres:16",
        "Env": ["VIBEMAN_REPOSITORY=api"],
        "Labels": {
          "vibeman.repository": "api",
          "vibeman.environment": "feature-x",
          "vibeman.type": "worktree",
          "vibeman.managed": "true"
        }
      }
    }]"#;
    let item = parse_inspect_output(doc).unwrap();
    assert_eq!(
      item.state.health.as_ref().unwrap().status,
      "healthy"
    );
    let descriptor = item.into_descriptor();
    assert_eq!(descriptor.name, "api-feature-x");
    assert_eq!(descriptor.container_type, ContainerType::Worktree);
    assert_eq!(descriptor.env_vars, vec!["VIBEMAN_REPOSITORY=api"]);
    assert_eq!(descriptor.status, "running");
  }

  #[test]
  fn inspect_without_healthcheck() {
    let doc = r#"[{"Id": "abc", "Name": "/db", "State": {"Status": "running"}, "Config": {"Image": "redis:7", "Env": [], "Labels": {}}}]"#;
    let item = parse_inspect_output(doc).unwrap();
    assert!(item.state.health.is_none());
  }
}
