use anyhow::Result;
use module_progress::config::ModuleProgressConfig;
use module_progress::{CompletionOutcome, ModuleId, UserId};

use super::{print_json, with_progress_service, Command};

pub struct CompleteCommand {
    pub config: ModuleProgressConfig,
    pub user: UserId,
    pub module: ModuleId,
    pub json: bool,
}

impl CompleteCommand {
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

impl Command for CompleteCommand {
    async fn execute(&self) -> Result<()> {
        let retry = &self.config.retry;
        let outcome = with_progress_service(&self.config, |service| async move {
            let outcome = retry
                .run("complete_module", || service.complete_module(&self.user, &self.module))
                .await?;
            Ok::<_, anyhow::Error>(outcome)
        })
        .await?;

        if self.json {
            return print_json(&outcome);
        }

        match outcome {
            CompletionOutcome::Advanced { completed, provisioned } => {
                println!("✅ {} completed {}", self.user, completed);
                match provisioned {
                    Some(next) => println!("🔓 Unlocked {}", next),
                    None => println!("🏁 No further module to unlock"),
                }
            }
            CompletionOutcome::Skipped { reason } => {
                println!("⏭️  Nothing to do for {}: {}", self.module, reason);
            }
        }
        Ok(())
    }
}
