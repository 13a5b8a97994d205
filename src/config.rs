// Copyright PingCAP Inc. 2025.
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; version 2 of the License.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Root directory served as the listing namespace
    #[serde(default = "default_root")]
    pub root: String,

    #[serde(default)]
    pub listing: ListingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingConfig {
    /// Seconds an idle walk session stays resumable before it is cancelled
    #[serde(default = "default_pool_ttl_secs")]
    pub pool_ttl_secs: u64,

    /// Force case-(in)sensitive name matching; unset means the platform rule
    #[serde(default)]
    pub case_insensitive: Option<bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: default_root(),
            listing: ListingConfig::default(),
        }
    }
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            pool_ttl_secs: default_pool_ttl_secs(),
            case_insensitive: None,
        }
    }
}

impl Config {
    pub fn from_path(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let s = std::fs::read_to_string(path)?;
        let cfg: Config = toml::from_str(&s)?;
        Ok(cfg)
    }
}

fn default_root() -> String {
    "./data".to_string()
}

fn default_pool_ttl_secs() -> u64 {
    1800 // 30 minutes
}
