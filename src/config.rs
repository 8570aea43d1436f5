use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::session::FeedbackMessages;

/// Process settings read from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub config_dir: PathBuf,
    pub static_dir: PathBuf,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw.parse().map_err(|_| AppError::InvalidPort(raw))?,
            Err(_) => 3000,
        };

        let config_dir = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config".to_string());
        let static_dir = std::env::var("STATIC_DIR").unwrap_or_else(|_| "client/dist".to_string());

        Ok(Self {
            port,
            config_dir: PathBuf::from(config_dir),
            static_dir: PathBuf::from(static_dir),
        })
    }
}

/// Classroom configuration loaded from game.json.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameConfig {
    pub teacher_password: String,
    pub max_timer_seconds: u32,
    pub feedback: FeedbackMessages,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            teacher_password: "1234".to_string(),
            max_timer_seconds: 600,
            feedback: FeedbackMessages::default(),
        }
    }
}

fn game_config_path(base: &Path) -> PathBuf {
    base.join("game.json")
}

/// Initialize config directory with defaults if missing.
pub fn init(base: &Path) -> Result<()> {
    if !base.exists() {
        fs::create_dir_all(base).map_err(|e| AppError::config_io(base, e))?;
    }

    let game_path = game_config_path(base);
    if !game_path.exists() {
        let json = serde_json::to_string_pretty(&GameConfig::default()).map_err(|source| {
            AppError::ConfigParse {
                path: game_path.clone(),
                source,
            }
        })?;
        fs::write(&game_path, json).map_err(|e| AppError::config_io(&game_path, e))?;
        tracing::info!("Wrote default config to {}", game_path.display());
    }

    Ok(())
}

/// Load the classroom configuration.
pub fn load_game_config(base: &Path) -> Result<GameConfig> {
    let path = game_config_path(base);
    let data = fs::read_to_string(&path).map_err(|e| AppError::config_io(&path, e))?;
    serde_json::from_str(&data).map_err(|source| AppError::ConfigParse { path, source })
}
