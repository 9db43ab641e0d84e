use comfy_table::{Attribute, Cell, Color, Table};
use vibeman_client::entities::service::ServiceStatus;

use crate::{args::ServicesCommand, config::CliConfig};

pub async fn handle(
  config: &CliConfig,
  command: ServicesCommand,
) -> anyhow::Result<()> {
  let client = config.client();
  match command {
    ServicesCommand::Start { name } => {
      let service = client.start_service(&name).await?;
      println!(
        "service {} is {} ({} refs)",
        service.name, service.status, service.ref_count
      );
      Ok(())
    }
    ServicesCommand::Stop { name } => {
      let service = client.stop_service(&name).await?;
      println!(
        "service {} is {} ({} refs)",
        service.name, service.status, service.ref_count
      );
      Ok(())
    }
    ServicesCommand::List => {
      let services = client.list_services().await?;
      if services.is_empty() {
        println!(
          "no services declared; add them to services.toml"
        );
        return Ok(());
      }
      let mut table = Table::new();
      table.set_header([
        "Service",
        "Status",
        "Refs",
        "Repositories",
        "Description",
      ]);
      for service in services {
        let color = match service.status {
          ServiceStatus::Running => Color::Green,
          ServiceStatus::Starting | ServiceStatus::Stopping => {
            Color::DarkYellow
          }
          ServiceStatus::Stopped => Color::Blue,
          ServiceStatus::Error => Color::Red,
        };
        table.add_row([
          Cell::new(&service.name).add_attribute(Attribute::Bold),
          Cell::new(service.status.to_string())
            .fg(color)
            .add_attribute(Attribute::Bold),
          Cell::new(service.ref_count.to_string()),
          Cell::new(
            service
              .repositories
              .iter()
              .cloned()
              .collect::<Vec<_>>()
              .join(", "),
          ),
          Cell::new(&service.config.description),
        ]);
      }
      println!("{table}");
      Ok(())
    }
  }
}
