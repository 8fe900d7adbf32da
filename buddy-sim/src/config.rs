//! `buddy.toml` support: the same config-file + CLI-override pattern the
//! corpus's own `xtask.toml` reader uses, scaled down to the three knobs an
//! [`Arena`](buddy_core::Arena) is constructed from.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

const CONFIG_FILE: &str = "buddy.toml";

fn default_max_order() -> i32 {
    10
}
fn default_page_size() -> u64 {
    4096
}
fn default_start_addr() -> u64 {
    0
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    #[serde(default)]
    arena: ArenaSection,
}

#[derive(Debug, Deserialize)]
struct ArenaSection {
    #[serde(default = "default_max_order")]
    max_order: i32,
    #[serde(default = "default_page_size")]
    page_size: u64,
    #[serde(default = "default_start_addr")]
    start_addr: u64,
}

impl Default for ArenaSection {
    fn default() -> Self {
        ArenaSection {
            max_order: default_max_order(),
            page_size: default_page_size(),
            start_addr: default_start_addr(),
        }
    }
}

/// Fully resolved arena configuration: built-in defaults, overridden by
/// `buddy.toml` if present, overridden again by whatever CLI flags the
/// caller passed.
#[derive(Debug, Clone, Copy)]
pub struct ArenaConfig {
    pub max_order: i32,
    pub page_size: u64,
    pub start_addr: u64,
}

impl ArenaConfig {
    /// Read `buddy.toml` from the working directory, or fall back to
    /// built-in defaults if it doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Path::new(CONFIG_FILE);
        let section = if path.exists() {
            let content =
                fs::read_to_string(path).context(format!("failed to read {CONFIG_FILE}"))?;
            let file: FileConfig =
                toml::from_str(&content).context(format!("failed to parse {CONFIG_FILE}"))?;
            file.arena
        } else {
            ArenaSection::default()
        };

        Ok(ArenaConfig {
            max_order: section.max_order,
            page_size: section.page_size,
            start_addr: section.start_addr,
        })
    }

    /// Apply CLI overrides on top of this config; `None` leaves the
    /// existing value in place.
    pub fn with_overrides(
        mut self,
        max_order: Option<i32>,
        page_size: Option<u64>,
        start_addr: Option<u64>,
    ) -> Self {
        if let Some(v) = max_order {
            self.max_order = v;
        }
        if let Some(v) = page_size {
            self.page_size = v;
        }
        if let Some(v) = start_addr {
            self.start_addr = v;
        }
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_only_the_given_fields() {
        let base = ArenaConfig { max_order: 10, page_size: 4096, start_addr: 0 };
        let applied = base.with_overrides(Some(4), None, Some(1024));
        assert_eq!(applied.max_order, 4);
        assert_eq!(applied.page_size, 4096);
        assert_eq!(applied.start_addr, 1024);
    }
}
