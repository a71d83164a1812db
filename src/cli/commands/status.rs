use anyhow::Result;
use module_progress::config::ModuleProgressConfig;
use module_progress::{ProgressStatus, UserId};

use super::{print_json, with_progress_service, Command};

pub struct StatusCommand {
    pub config: ModuleProgressConfig,
    pub user: UserId,
    pub json: bool,
}

impl StatusCommand {
    pub fn new(config: ModuleProgressConfig, user: impl Into<String>) -> Self {
        Self {
            config,
            user: UserId::new(user),
            json: false,
        }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }
}

impl Command for StatusCommand {
    async fn execute(&self) -> Result<()> {
        let projection = with_progress_service(&self.config, |service| async move {
            Ok::<_, anyhow::Error>(service.project(&self.user).await?)
        })
        .await?;

        if self.json {
            return print_json(&*projection);
        }

        let header = format!("📊 PROGRESS FOR {}", projection.user_id);
        println!("{header}");
        println!("{}", "=".repeat(header.chars().count()));

        for view in &projection.modules {
            let icon = match view.status {
                ProgressStatus::Done => "✅",
                ProgressStatus::Active => "🟢",
                ProgressStatus::Locked => "🔒",
            };
            println!("{icon} {}. {} - {} ({})", view.sequence_position, view.module_id, view.title, view.status);
        }

        println!();
        println!(
            "🎯 {}/{} modules complete",
            projection.completed_count(),
            projection.modules.len()
        );
        match projection.current() {
            Some(current) => println!("🚀 Up next: {}", current.title),
            None if projection.is_finished() => println!("🎉 All modules complete!"),
            None => {}
        }
        Ok(())
    }
}
