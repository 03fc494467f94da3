//! Configuration file support for the Dab Timer.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/dabtimer/config.toml`.
//! The duration lookup tables live here too: they are built once at startup
//! and passed explicitly to the calculator and the timer.

use crate::{Error, Result, SessionSettings};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub tables: DurationTables,

    #[serde(default)]
    pub timer: TimerConfig,

    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    /// Session log location; relative paths resolve against the working directory
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            log_path: default_log_path(),
        }
    }
}

/// Coefficient tables behind the duration calculator
///
/// Keys are category display names. A table given in the config file
/// replaces the built-in one wholesale.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DurationTables {
    /// Base heat seconds per material
    #[serde(default = "default_material_times")]
    pub material_times: BTreeMap<String, u32>,

    /// Multiplier applied to both phases per style
    #[serde(default = "default_style_modifiers")]
    pub style_modifiers: BTreeMap<String, f64>,

    /// Base cool seconds per consumable
    #[serde(default = "default_wax_cool_times")]
    pub wax_cool_times: BTreeMap<String, u32>,
}

impl Default for DurationTables {
    fn default() -> Self {
        Self {
            material_times: default_material_times(),
            style_modifiers: default_style_modifiers(),
            wax_cool_times: default_wax_cool_times(),
        }
    }
}

impl DurationTables {
    /// Validate the tables, returning a list of problems (empty when valid)
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.material_times.is_empty() {
            errors.push("material_times is empty".to_string());
        }
        if self.style_modifiers.is_empty() {
            errors.push("style_modifiers is empty".to_string());
        }
        if self.wax_cool_times.is_empty() {
            errors.push("wax_cool_times is empty".to_string());
        }

        for (name, secs) in &self.material_times {
            if *secs == 0 {
                errors.push(format!("material '{}' has zero heat time", name));
            }
        }
        for (name, modifier) in &self.style_modifiers {
            if !modifier.is_finite() || *modifier <= 0.0 {
                errors.push(format!("style '{}' has non-positive modifier {}", name, modifier));
            }
        }
        for (name, secs) in &self.wax_cool_times {
            if *secs == 0 {
                errors.push(format!("wax '{}' has zero cool time", name));
            }
        }

        errors
    }

    pub fn materials(&self) -> impl Iterator<Item = &str> {
        self.material_times.keys().map(String::as_str)
    }

    pub fn styles(&self) -> impl Iterator<Item = &str> {
        self.style_modifiers.keys().map(String::as_str)
    }
}

/// Countdown clock configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Wall-clock length of one tick; 1000 in normal use
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,

    /// Ring the terminal bell on phase changes
    #[serde(default = "default_bell")]
    pub bell: bool,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_millis: default_tick_millis(),
            bell: default_bell(),
        }
    }
}

/// Form values used when the CLI is not given explicit settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_material")]
    pub material: String,

    #[serde(default = "default_style")]
    pub style: String,

    #[serde(default = "default_wax")]
    pub wax: String,

    #[serde(default = "default_intensity")]
    pub intensity: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            material: default_material(),
            style: default_style(),
            wax: default_wax(),
            intensity: default_intensity(),
        }
    }
}

impl DefaultsConfig {
    pub fn to_settings(&self) -> SessionSettings {
        SessionSettings::new(
            self.material.clone(),
            self.style.clone(),
            self.wax.clone(),
            self.intensity,
        )
    }
}

// Default value functions
fn default_log_path() -> PathBuf {
    PathBuf::from("dab_timer_log.csv")
}

fn default_material_times() -> BTreeMap<String, u32> {
    [("Quartz", 30), ("Titanium", 45), ("Ceramic", 40)]
        .into_iter()
        .map(|(name, secs)| (name.to_string(), secs))
        .collect()
}

fn default_style_modifiers() -> BTreeMap<String, f64> {
    [
        ("Flat Top", 1.0),
        ("Slanted", 0.9),
        ("Thermal", 1.2),
        ("Terp Slurper", 1.1),
    ]
    .into_iter()
    .map(|(name, modifier)| (name.to_string(), modifier))
    .collect()
}

fn default_wax_cool_times() -> BTreeMap<String, u32> {
    [
        ("Shatter", 45),
        ("Budder", 50),
        ("Crumble", 47),
        ("Rosin", 43),
        ("Live Resin", 48),
        ("Sugar", 46),
    ]
    .into_iter()
    .map(|(name, secs)| (name.to_string(), secs))
    .collect()
}

fn default_tick_millis() -> u64 {
    1000
}

fn default_bell() -> bool {
    true
}

fn default_material() -> String {
    "Quartz".into()
}

fn default_style() -> String {
    "Flat Top".into()
}

fn default_wax() -> String {
    "Shatter".into()
}

fn default_intensity() -> f64 {
    1.0
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Reject configurations the calculator cannot work with
    pub fn validate(&self) -> Result<()> {
        let errors = self.tables.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(errors.join("; ")))
        }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|| PathBuf::from(".config"))
        });
        base.join("dabtimer").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
