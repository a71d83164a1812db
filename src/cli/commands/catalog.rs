use anyhow::{Context, Result};
use module_progress::config::ModuleProgressConfig;
use module_progress::Catalog;

use super::{print_json, Command};

pub struct CatalogCommand {
    pub config: ModuleProgressConfig,
    pub json: bool,
}

impl CatalogCommand {
    pub fn new(config: ModuleProgressConfig) -> Self {
        Self { config, json: false }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }
}

impl Command for CatalogCommand {
    async fn execute(&self) -> Result<()> {
        let catalog = Catalog::load(&self.config.catalog.path).with_context(|| {
            format!("Failed to load module catalog from {}", self.config.catalog.path)
        })?;

        if self.json {
            return print_json(&catalog.list());
        }

        println!("📚 MODULE CATALOG");
        println!("=================");
        if catalog.is_empty() {
            println!("📋 No modules defined in {}", self.config.catalog.path);
            return Ok(());
        }

        for module in catalog.list() {
            println!("  {:>3}. {} - {}", module.sequence_position, module.id, module.title);
            if !module.description.is_empty() {
                println!("       {}", module.description);
            }
        }
        println!();
        println!("🎯 {} modules in sequence", catalog.len());
        Ok(())
    }
}
