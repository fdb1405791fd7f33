//! Configuration management for the flowdeck editor core
//!
//! Server binding, document storage, history bounds and simulator timing.
//! Every value can be overridden through a `FLOWDECK_*` environment variable.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Storage key the editor record is persisted under
pub const DEFAULT_STORAGE_KEY: &str = "workflow-builder/current";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub history: HistoryConfig,
    pub simulator: SimulatorConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    pub port: u16,
}

/// Durable storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file (created if missing)
    pub database_path: String,
    /// Key of the single persisted `{document, viewport}` record
    pub storage_key: String,
    /// Bundled sample to load at startup instead of the stored document
    pub sample: Option<String>,
}

/// Undo/redo history configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum entries kept in each of the undo and redo stacks; 0 = unbounded
    pub capacity: usize,
    /// Quiet period before a burst of edits is persisted
    pub autosave_debounce_ms: u64,
}

impl HistoryConfig {
    pub fn capacity(&self) -> Option<usize> {
        (self.capacity > 0).then_some(self.capacity)
    }

    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            autosave_debounce_ms: 500,
        }
    }
}

/// Execution simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Simulated latency of email, SMS and HTTP actions
    pub action_latency_ms: u64,
    /// Stop `play()` after this many steps; `None` leaves cyclic graphs running until paused
    pub max_play_steps: Option<usize>,
    /// Ceiling for one-shot runs that nobody can pause (`POST /api/simulation/run`)
    pub max_run_steps: usize,
}

impl SimulatorConfig {
    pub fn action_latency(&self) -> Duration {
        Duration::from_millis(self.action_latency_ms)
    }

    /// Settings for a one-shot run: the play limit never exceeds `max_run_steps`
    pub fn for_unattended_run(&self) -> SimulatorConfig {
        let limit = self
            .max_play_steps
            .map_or(self.max_run_steps, |steps| steps.min(self.max_run_steps));
        SimulatorConfig {
            max_play_steps: Some(limit),
            ..self.clone()
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            action_latency_ms: 1000,
            max_play_steps: None,
            max_run_steps: 10_000,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, fallback: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(fallback)
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for container deployment
    fn default() -> Self {
        let history = HistoryConfig::default();
        let simulator = SimulatorConfig::default();

        Self {
            server: ServerConfig {
                host: std::env::var("FLOWDECK_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_or("FLOWDECK_PORT", 3004),
            },
            storage: StorageConfig {
                database_path: std::env::var("FLOWDECK_DATABASE")
                    .unwrap_or_else(|_| "data/flowdeck.db".to_string()),
                storage_key: std::env::var("FLOWDECK_STORAGE_KEY")
                    .unwrap_or_else(|_| DEFAULT_STORAGE_KEY.to_string()),
                sample: std::env::var("FLOWDECK_SAMPLE").ok().filter(|s| !s.is_empty()),
            },
            history: HistoryConfig {
                capacity: env_or("FLOWDECK_HISTORY_CAPACITY", history.capacity),
                autosave_debounce_ms: env_or("FLOWDECK_AUTOSAVE_MS", history.autosave_debounce_ms),
            },
            simulator: SimulatorConfig {
                action_latency_ms: env_or("FLOWDECK_ACTION_LATENCY_MS", simulator.action_latency_ms),
                max_play_steps: std::env::var("FLOWDECK_MAX_PLAY_STEPS")
                    .ok()
                    .and_then(|raw| raw.parse().ok()),
                max_run_steps: env_or("FLOWDECK_MAX_RUN_STEPS", simulator.max_run_steps),
            },
        }
    }
}
