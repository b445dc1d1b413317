use crate::model::ConfigError;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Directory holding the section JSON files and the users file.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_users_file")]
    pub users_file: String,
    /// Extra `table_name -> display title` pairs on top of the built-in ones.
    #[serde(default)]
    pub section_titles: HashMap<String, String>,
    /// Price overrides keyed by plan column name (`standard`, `expert`, ...).
    #[serde(default)]
    pub plan_prices: HashMap<String, String>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_users_file() -> String {
    "users.json".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            users_file: default_users_file(),
            section_titles: HashMap::new(),
            plan_prices: HashMap::new(),
        }
    }
}

pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    Ok(config)
}
