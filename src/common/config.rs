use std::path::{Path, PathBuf};

use anyhow::bail;
use serde::{Deserialize, Serialize};

use super::collections::HashSet;
use crate::layout_engine::ResizeAmount;
use crate::sys::geometry::RectDelta;

pub fn data_dir() -> PathBuf { dirs::home_dir().unwrap_or_default().join(".arbor") }
pub fn recovery_file() -> PathBuf { data_dir().join("recovery.json") }
pub fn config_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".config"))
        .join("arbor")
        .join("config.toml")
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub general: GeneralSettings,
    pub gaps: GapSettings,
    pub workspaces: Vec<WorkspaceConfig>,
    pub binding_modes: Vec<BindingModeConfig>,
    /// Where `save_recovery_cache` writes when no path is given.
    pub recovery_file: Option<PathBuf>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct GeneralSettings {
    #[serde(default = "yes")]
    pub center_new_floating: bool,
    #[serde(default = "yes")]
    pub focus_follows_new_window: bool,
    /// Step used by grow/shrink bindings, e.g. `"5%"` or `"20px"`.
    #[serde(default = "default_resize_step")]
    pub resize_step: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct GapSettings {
    /// Pixels between adjacent tiling siblings.
    #[serde(default)]
    pub inner: i32,
    #[serde(default)]
    pub outer: OuterGaps,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Copy, Default)]
#[serde(deny_unknown_fields)]
pub struct OuterGaps {
    #[serde(default)]
    pub top: i32,
    #[serde(default)]
    pub left: i32,
    #[serde(default)]
    pub bottom: i32,
    #[serde(default)]
    pub right: i32,
}

impl OuterGaps {
    pub fn as_delta(&self) -> RectDelta {
        RectDelta::new(self.left, self.top, self.right, self.bottom)
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceConfig {
    pub name: String,
    /// Index of the monitor (in the order monitors were reported) this
    /// workspace prefers.
    #[serde(default)]
    pub bind_to_monitor: Option<usize>,
    /// Keep the workspace alive even when it is empty and hidden.
    #[serde(default)]
    pub keep_alive: bool,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct BindingModeConfig {
    pub name: String,
}

fn yes() -> bool { true }

fn default_resize_step() -> String { "5%".to_string() }

fn default_workspaces() -> Vec<WorkspaceConfig> {
    (1..=9)
        .map(|i| WorkspaceConfig {
            name: i.to_string(),
            bind_to_monitor: None,
            keep_alive: false,
        })
        .collect()
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            center_new_floating: true,
            focus_follows_new_window: true,
            resize_step: default_resize_step(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            general: GeneralSettings::default(),
            gaps: GapSettings::default(),
            workspaces: default_workspaces(),
            binding_modes: Vec::new(),
            recovery_file: None,
        }
    }
}

impl GeneralSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if let Err(e) = self.resize_step.parse::<ResizeAmount>() {
            issues.push(format!("general.resize_step: {e}"));
        }
        issues
    }
}

impl GapSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.inner < 0 {
            issues.push("gaps.inner must be non-negative".to_string());
        }
        for (name, value) in [
            ("top", self.outer.top),
            ("left", self.outer.left),
            ("bottom", self.outer.bottom),
            ("right", self.outer.right),
        ] {
            if value < 0 {
                issues.push(format!("gaps.outer.{name} must be non-negative"));
            }
        }
        issues
    }
}

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Config> {
        let buf = std::fs::read_to_string(path)?;
        Self::parse(&buf)
    }

    pub fn parse(buf: &str) -> anyhow::Result<Config> {
        let config: Config = match toml::from_str(buf) {
            Ok(c) => c,
            Err(e) => bail!("{e}"),
        };
        if config.workspaces.is_empty() {
            bail!("at least one workspace must be configured");
        }
        Ok(config)
    }

    pub fn workspace(&self, name: &str) -> Option<&WorkspaceConfig> {
        self.workspaces.iter().find(|w| w.name == name)
    }

    pub fn has_binding_mode(&self, name: &str) -> bool {
        self.binding_modes.iter().any(|m| m.name == name)
    }

    pub fn recovery_path(&self) -> PathBuf {
        self.recovery_file.clone().unwrap_or_else(recovery_file)
    }

    /// Validates the entire configuration and returns a list of issues found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        issues.extend(self.general.validate());
        issues.extend(self.gaps.validate());

        let mut seen = HashSet::default();
        for ws in &self.workspaces {
            if ws.name.trim().is_empty() {
                issues.push("workspace names must not be empty".to_string());
            } else if !seen.insert(ws.name.as_str()) {
                issues.push(format!("duplicate workspace name: {}", ws.name));
            }
        }

        let mut seen = HashSet::default();
        for mode in &self.binding_modes {
            if !seen.insert(mode.name.as_str()) {
                issues.push(format!("duplicate binding mode: {}", mode.name));
            }
        }

        issues
    }
}
