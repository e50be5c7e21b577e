//! Compiler options
//!
//! Every option has a default, so a configuration file only needs the keys it changes:
//!
//! ```yaml
//! parse:
//!   default_lane: Main
//! render:
//!   direction: LR
//!   styles: false
//! ```

use std::{fmt, fs, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{err_msg, BplError};

/// Default nesting limit; deeper lines are structural corruption.
pub const DEFAULT_MAX_DEPTH: usize = 64;
/// Lane that receives elements written before any `@Lane` line.
pub const DEFAULT_LANE: &str = "Default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParseOptions {
    pub max_depth: usize,
    pub default_lane: String,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            default_lane: DEFAULT_LANE.to_string(),
        }
    }
}

/// Flowchart direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    TD,
    LR,
    BT,
    RL,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::TD => "TD",
            Direction::LR => "LR",
            Direction::BT => "BT",
            Direction::RL => "RL",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = BplError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TD" | "TB" => Ok(Direction::TD),
            "LR" => Ok(Direction::LR),
            "BT" => Ok(Direction::BT),
            "RL" => Ok(Direction::RL),
            other => Err(err_msg!(
                Config,
                "unknown direction `{}`, expected one of TD, LR, BT, RL",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderOptions {
    pub direction: Direction,
    /// Emit `classDef`/`style` lines and `:::class` suffixes.
    pub styles: bool,
    /// Emit a front-matter title when the process is named.
    pub title: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            direction: Direction::TD,
            styles: true,
            title: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompileOptions {
    pub parse: ParseOptions,
    pub render: RenderOptions,
}

impl CompileOptions {
    /// Parses options from YAML. An empty document yields the defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self, BplError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
            .map_err(|e| err_msg!(Config, "invalid configuration: {}", e).caused_by(e))
    }

    /// Loads options from a YAML file.
    pub fn load(path: &Path) -> Result<Self, BplError> {
        let text = fs::read_to_string(path).map_err(|e| {
            err_msg!(Config, "cannot read {}: {}", path.display(), e).caused_by(e)
        })?;
        Self::from_yaml_str(&text)
    }
}
