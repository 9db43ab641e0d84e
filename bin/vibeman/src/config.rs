use config::VibemanPaths;
use vibeman_client::{VibemanClient, entities::config::GlobalConfig};

use crate::args::Cli;

/// Everything a CLI invocation needs: resolved paths, the global
/// config, and where to find the server.
pub struct CliConfig {
  pub paths: VibemanPaths,
  pub global: GlobalConfig,
  pub host: String,
}

impl CliConfig {
  pub fn load(args: &Cli) -> anyhow::Result<CliConfig> {
    let paths = VibemanPaths::resolve()?;
    let global = config::load_global_config(&paths)?;
    let host = args.host.clone().unwrap_or_else(|| {
      format!("http://localhost:{}", global.server.port)
    });
    Ok(CliConfig {
      paths,
      global,
      host,
    })
  }

  pub fn client(&self) -> VibemanClient {
    VibemanClient::new(&self.host)
  }
}
