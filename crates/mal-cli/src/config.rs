use std::path::Path;

use anyhow::Context;
use mal_anchor::AnchorConfig;
use mal_commit::BatcherConfig;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "mal.toml";
pub const PERIOD_OFFSET_ENV: &str = "MAL_PERIOD_OFFSET_DAYS";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MalConfig {
    pub batcher: BatcherConfig,
    pub anchor: AnchorConfig,
    pub audit: AuditConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub sample_sizes: Vec<usize>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            sample_sizes: vec![1, 5, 100, 500, 1000, 5000, 10000],
        }
    }
}

impl MalConfig {
    /// Read `mal.toml` from the state directory, falling back to defaults,
    /// then apply the environment override.
    pub fn load(state_dir: &Path) -> anyhow::Result<Self> {
        let path = state_dir.join(CONFIG_FILE);
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_period_offset(std::env::var(PERIOD_OFFSET_ENV).ok().as_deref());
        Ok(config)
    }

    /// A value made only of digits replaces `period_offset_days`; anything
    /// else is ignored.
    pub fn apply_period_offset(&mut self, value: Option<&str>) {
        let Some(value) = value.map(str::trim) else {
            return;
        };
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            tracing::warn!(value, "ignoring non-numeric {PERIOD_OFFSET_ENV}");
            return;
        }
        if let Ok(days) = value.parse() {
            self.batcher.period_offset_days = Some(days);
        }
    }
}
