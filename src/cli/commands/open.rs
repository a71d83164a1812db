use anyhow::Result;
use module_progress::config::ModuleProgressConfig;
use module_progress::{ModuleAccess, ModuleId, UserId};

use super::{print_json, with_progress_service, Command};

pub struct OpenCommand {
    pub config: ModuleProgressConfig,
    pub user: UserId,
    pub module: ModuleId,
    pub json: bool,
}

impl OpenCommand {
    pub fn new(config: ModuleProgressConfig, user: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            config,
            user: UserId::new(user),
            module: ModuleId::new(module),
            json: false,
        }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }
}

impl Command for OpenCommand {
    async fn execute(&self) -> Result<()> {
        let access = with_progress_service(&self.config, |service| async move {
            Ok::<_, anyhow::Error>(service.check_access(&self.user, &self.module).await?)
        })
        .await?;

        if self.json {
            return print_json(&access);
        }

        match access {
            ModuleAccess::Open(view) => println!("🟢 {} is open: {}", view.module_id, view.title),
            ModuleAccess::Completed(view) => {
                println!("✅ {} is already complete: {}", view.module_id, view.title)
            }
            ModuleAccess::NotYetAvailable { module_id, blocked_by } => {
                println!("🔒 {} is not yet available", module_id);
                if let Some(blocker) = blocked_by {
                    println!("   → Finish {} first", blocker);
                }
            }
        }
        Ok(())
    }
}
