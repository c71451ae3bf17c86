//! Renderer configuration: defaults, TOML file, `SENTINEL_ENTITY_*`
//! environment and command line, applied in that order.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::channel::ListenerConfig;
use crate::error::{Result, SentinelError};
use crate::transition::DEFAULT_TRANSITION;
use crate::types::{clamp_finite, Mode};

pub const ENV_STATE: &str = "SENTINEL_ENTITY_STATE";
pub const ENV_INTENSITY: &str = "SENTINEL_ENTITY_INTENSITY";
pub const ENV_CYCLE: &str = "SENTINEL_ENTITY_CYCLE";

const DEFAULT_SEED: u32 = 0x5E17_1E1A;
const DEFAULT_AUTO_CYCLE: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Seconds a mode change takes to blend in
    pub transition_secs: f32,

    /// Mode shown before the observer reports anything
    pub initial_mode: Mode,

    pub initial_intensity: f32,

    /// Rotate through every mode on a timer instead of listening
    pub auto_cycle: bool,

    /// Seconds per mode while auto-cycling
    pub auto_cycle_secs: f32,

    /// Observer socket
    pub socket_path: PathBuf,

    /// First reconnect delay; doubles up to five seconds
    pub reconnect_ms: u64,

    /// Number of simulated entries
    pub field_entries: usize,

    pub seed: u32,

    /// Goal anchor in normalized screen coordinates
    pub goal: [f32; 2],

    /// Entity size relative to the short screen side
    pub scale: f32,

    /// Internal render resolution relative to the window surface
    pub render_scale: f32,

    /// Cap on the longer internal render side, in pixels
    pub max_render_dim: usize,

    pub fullscreen: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            transition_secs: DEFAULT_TRANSITION.as_secs_f32(),
            initial_mode: Mode::Idle,
            initial_intensity: 1.0,
            auto_cycle: false,
            auto_cycle_secs: DEFAULT_AUTO_CYCLE.as_secs_f32(),
            socket_path: default_socket_path(),
            reconnect_ms: 500,
            field_entries: 8192,
            seed: DEFAULT_SEED,
            goal: [0.5, 0.5],
            scale: 1.0,
            render_scale: 0.5,
            max_render_dim: 512,
            fullscreen: false,
        }
    }
}

fn default_socket_path() -> PathBuf {
    std::env::var_os("XDG_RUNTIME_DIR")
        .map_or_else(|| PathBuf::from("/tmp"), PathBuf::from)
        .join("sentinel.sock")
}

impl RendererConfig {
    pub fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "sentinel", "sentinel-renderer")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Reads `path` if given, else the platform config file if one exists,
    /// else returns defaults. An explicit path that is missing is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::config_path() {
                Some(path) if path.exists() => path,
                _ => {
                    debug!("no config file, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let content = fs::read_to_string(&path).map_err(|source| SentinelError::ConfigRead {
            path: path.clone(),
            source,
        })?;
        Self::from_toml_str(&content)
            .map_err(|message| SentinelError::ConfigParse { path, message })
    }

    pub fn from_toml_str(content: &str) -> std::result::Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Applies the `SENTINEL_ENTITY_*` overrides. `lookup` is normally
    /// `std::env::var`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_STATE) {
            self.initial_mode = raw.parse().unwrap_or_else(|_| {
                warn!(value = %raw, "unknown {ENV_STATE}, falling back to idle");
                Mode::Idle
            });
        }
        if let Some(raw) = lookup(ENV_INTENSITY) {
            match raw.trim().parse::<f32>() {
                Ok(value) => self.initial_intensity = clamp_finite(value, 0.0, 1.0),
                Err(_) => warn!(value = %raw, "ignoring non-numeric {ENV_INTENSITY}"),
            }
        }
        if let Some(raw) = lookup(ENV_CYCLE) {
            self.auto_cycle = matches!(raw.trim(), "1" | "true" | "TRUE" | "True" | "yes" | "on");
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.transition_secs.is_finite() || self.transition_secs < 0.0 {
            return Err(SentinelError::Config(format!(
                "transition_secs must be a non-negative number, got {}",
                self.transition_secs
            )));
        }
        if !self.auto_cycle_secs.is_finite() || self.auto_cycle_secs <= 0.0 {
            return Err(SentinelError::Config(format!(
                "auto_cycle_secs must be positive, got {}",
                self.auto_cycle_secs
            )));
        }
        if self.field_entries == 0 {
            return Err(SentinelError::Config("field_entries must be at least 1".to_string()));
        }
        if !self.render_scale.is_finite() || self.render_scale <= 0.0 {
            return Err(SentinelError::Config(format!(
                "render_scale must be positive, got {}",
                self.render_scale
            )));
        }
        if self.max_render_dim == 0 {
            return Err(SentinelError::Config("max_render_dim must be at least 1".to_string()));
        }
        if self.reconnect_ms == 0 {
            return Err(SentinelError::Config("reconnect_ms must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn transition_duration(&self) -> Duration {
        Duration::try_from_secs_f32(self.transition_secs).unwrap_or(DEFAULT_TRANSITION)
    }

    pub fn auto_cycle_period(&self) -> Duration {
        Duration::try_from_secs_f32(self.auto_cycle_secs)
            .ok()
            .filter(|period| !period.is_zero())
            .unwrap_or(DEFAULT_AUTO_CYCLE)
    }

    pub fn listener_config(&self) -> ListenerConfig {
        ListenerConfig {
            socket_path: self.socket_path.clone(),
            reconnect_delay: Duration::from_millis(self.reconnect_ms),
        }
    }
}

#[derive(Parser, Debug, Default)]
#[command(name = "sentinel-renderer", version, about = "Ambient entity renderer")]
pub struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Initial mode, by name or index
    #[arg(short, long)]
    pub mode: Option<Mode>,

    /// Initial intensity in [0, 1]
    #[arg(short, long)]
    pub intensity: Option<f32>,

    /// Cycle through every mode instead of listening to the observer
    #[arg(long)]
    pub cycle: bool,

    /// Observer socket path
    #[arg(long)]
    pub socket: Option<PathBuf>,

    /// Transition duration in seconds
    #[arg(long)]
    pub transition_secs: Option<f32>,

    /// Number of simulated entries
    #[arg(long)]
    pub entries: Option<usize>,

    #[arg(long)]
    pub fullscreen: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,
}

impl Cli {
    /// Overlays the flags that were given onto `config`.
    pub fn apply(&self, config: &mut RendererConfig) {
        if let Some(mode) = self.mode {
            config.initial_mode = mode;
        }
        if let Some(intensity) = self.intensity {
            config.initial_intensity = clamp_finite(intensity, 0.0, 1.0);
        }
        if self.cycle {
            config.auto_cycle = true;
        }
        if let Some(socket) = &self.socket {
            config.socket_path.clone_from(socket);
        }
        if let Some(secs) = self.transition_secs {
            config.transition_secs = secs;
        }
        if let Some(entries) = self.entries {
            config.field_entries = entries;
        }
        if self.fullscreen {
            config.fullscreen = true;
        }
    }
}
