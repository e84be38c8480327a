//! Processing settings
//!
//! Defaults match the hosted tool: a 500 KiB budget, 1920 px longest side,
//! quality stepping 90 → 10 in five attempts. A TOML file may override any
//! field; the CLI applies its own flags on top.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Files at or under this many bytes are left alone.
    pub size_budget: u64,
    /// Output size handed to the codec as its own target.
    pub max_output_bytes: u64,
    pub max_dimension: u32,
    pub conversion_quality: u8,
    pub initial_quality: u8,
    /// Quality points removed after each attempt.
    pub quality_step: u8,
    pub max_attempts: usize,
    pub background: Background,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            size_budget: 500 * KIB,
            max_output_bytes: MIB / 2,
            max_dimension: 1920,
            conversion_quality: 90,
            initial_quality: 90,
            quality_step: 20,
            max_attempts: 5,
            background: Background::WHITE,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

/// An opaque RGB colour, written `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Background(pub [u8; 3]);

impl Background {
    pub const WHITE: Background = Background([255, 255, 255]);
    pub const BLACK: Background = Background([0, 0, 0]);
}

impl FromStr for Background {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(Error::InvalidColor(s.to_string()));
        }

        let mut rgb = [0u8; 3];
        for (i, channel) in rgb.iter_mut().enumerate() {
            *channel = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| Error::InvalidColor(s.to_string()))?;
        }
        Ok(Background(rgb))
    }
}

impl TryFrom<String> for Background {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl fmt::Display for Background {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{:02x}{:02x}{:02x}", r, g, b)
    }
}
