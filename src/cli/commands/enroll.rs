use anyhow::Result;
use module_progress::config::ModuleProgressConfig;
use module_progress::UserId;

use super::{with_progress_service, Command};

pub struct EnrollCommand {
    pub config: ModuleProgressConfig,
    pub user: UserId,
}

impl EnrollCommand {
    pub fn new(config: ModuleProgressConfig, user: impl Into<String>) -> Self {
        Self {
            config,
            user: UserId::new(user),
        }
    }
}

impl Command for EnrollCommand {
    async fn execute(&self) -> Result<()> {
        let enrolled = with_progress_service(&self.config, |service| async move {
            Ok::<_, anyhow::Error>(service.enroll(&self.user).await?)
        })
        .await?;

        if enrolled {
            println!("🎓 Enrolled {}", self.user);
        } else {
            println!("📋 {} is already enrolled", self.user);
        }
        Ok(())
    }
}
