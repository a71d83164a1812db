// Module catalog - the ordered, read-only list of learning modules
//
// The catalog defines the strict total order every progression rule is
// evaluated against. It is built once (from TOML or the database) and never
// mutated at runtime.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Opaque module identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub sequence_position: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl Module {
    pub fn new(id: impl Into<String>, sequence_position: i64, title: impl Into<String>) -> Self {
        Self {
            id: ModuleId::new(id),
            sequence_position,
            title: title.into(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("module {0} not found in catalog")]
    ModuleNotFound(ModuleId),
    #[error("duplicate module id {0}")]
    DuplicateModuleId(ModuleId),
    #[error("sequence position {position} is used by both {first} and {second}")]
    DuplicatePosition {
        position: i64,
        first: ModuleId,
        second: ModuleId,
    },
    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    modules: Vec<Module>,
}

/// Ordered, immutable module list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    modules: Vec<Module>,
}

impl Catalog {
    /// Build a catalog, sorting by `sequence_position` and rejecting duplicate
    /// ids or positions.
    pub fn from_modules(mut modules: Vec<Module>) -> Result<Self, CatalogError> {
        modules.sort_by_key(|m| m.sequence_position);

        let mut seen = HashSet::new();
        for module in &modules {
            if !seen.insert(module.id.clone()) {
                return Err(CatalogError::DuplicateModuleId(module.id.clone()));
            }
        }

        if let Some(pair) = modules
            .windows(2)
            .find(|pair| pair[0].sequence_position == pair[1].sequence_position)
        {
            return Err(CatalogError::DuplicatePosition {
                position: pair[0].sequence_position,
                first: pair[0].id.clone(),
                second: pair[1].id.clone(),
            });
        }

        Ok(Self { modules })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(content)?;
        Self::from_modules(file.modules)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// All modules in catalog order
    pub fn list(&self) -> &[Module] {
        &self.modules
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn first(&self) -> Option<&Module> {
        self.modules.first()
    }

    pub fn is_first(&self, id: &ModuleId) -> bool {
        self.first().is_some_and(|m| &m.id == id)
    }

    pub fn get(&self, id: &ModuleId) -> Result<&Module, CatalogError> {
        self.position_of(id).map(|index| &self.modules[index])
    }

    /// Module with the largest position strictly below `id`'s
    pub fn predecessor(&self, id: &ModuleId) -> Result<Option<&Module>, CatalogError> {
        let index = self.position_of(id)?;
        Ok(index.checked_sub(1).map(|prev| &self.modules[prev]))
    }

    /// Module with the smallest position strictly above `id`'s
    pub fn successor(&self, id: &ModuleId) -> Result<Option<&Module>, CatalogError> {
        let index = self.position_of(id)?;
        Ok(self.modules.get(index + 1))
    }

    fn position_of(&self, id: &ModuleId) -> Result<usize, CatalogError> {
        self.modules
            .iter()
            .position(|m| &m.id == id)
            .ok_or_else(|| CatalogError::ModuleNotFound(id.clone()))
    }
}
