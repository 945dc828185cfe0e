// FILE: src/cli/config.rs

use crate::error::{Result, TemplateError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub strict: Option<bool>,
    pub debug: Option<bool>,
    pub variables: Option<HashMap<String, String>>,
    pub data_file: Option<String>,
    pub output_directory: Option<String>,
}

pub fn load(config_path: &str) -> Result<ConfigFile> {
    let config_content = fs::read_to_string(config_path).map_err(|e| TemplateError::FileNotFound {
        path: format!("Config file {}: {}", config_path, e),
    })?;
    log::info!("Loaded configuration from {}", config_path);

    if config_path.ends_with(".json") {
        serde_json::from_str(&config_content).map_err(|e| TemplateError::InvalidFormat {
            message: format!("Invalid JSON config: {}", e),
        })
    } else if config_path.ends_with(".toml") {
        toml::from_str(&config_content).map_err(|e| TemplateError::InvalidFormat {
            message: format!("Invalid TOML config: {}", e),
        })
    } else {
        Err(TemplateError::InvalidFormat {
            message: "Config file must be .json or .toml format".to_string(),
        })
    }
}
