use std::path::Path;

use shared::{DamSystem, DamSystemCode};

const BUILTIN_CATALOG: &str = include_str!("../../../config/dam_systems.yaml");

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid catalog: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("System {0} is listed more than once")]
    Duplicate(DamSystemCode),
}

/// The DAM providers a user can connect, with their form fields.
#[derive(Debug, Clone)]
pub struct DamCatalog {
    systems: Vec<DamSystem>,
}

impl DamCatalog {
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_yaml(BUILTIN_CATALOG)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let config_str = std::fs::read_to_string(path)?;
        let catalog = Self::from_yaml(&config_str)?;
        log::info!(
            "Loaded {} DAM systems from {}",
            catalog.systems.len(),
            path.display()
        );
        Ok(catalog)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, CatalogError> {
        let systems: Vec<DamSystem> = serde_yaml::from_str(config_str)?;
        for (i, system) in systems.iter().enumerate() {
            if systems[..i].iter().any(|s| s.system_code == system.system_code) {
                return Err(CatalogError::Duplicate(system.system_code));
            }
        }
        Ok(Self { systems })
    }

    pub fn systems(&self, only_active: bool) -> Vec<DamSystem> {
        self.systems
            .iter()
            .filter(|s| !only_active || s.is_active)
            .cloned()
            .collect()
    }

    pub fn get(&self, code: DamSystemCode) -> Option<&DamSystem> {
        self.systems.iter().find(|s| s.system_code == code)
    }
}
