use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ===== SERIES TYPES =====

/// One contest entry recovered from the rating chart.
///
/// Every field is optional because hover labels are frequently partial.
/// Fields serialize as explicit `null` so consumers always see the same shape.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub rating: Option<i64>,
    pub date: Option<String>,
    pub contest_name: Option<String>,
    pub rank: Option<i64>,
}

impl Record {
    pub fn is_empty(&self) -> bool {
        self.rating.is_none()
            && self.date.is_none()
            && self.contest_name.is_none()
            && self.rank.is_none()
    }

    /// Number of populated fields, used to prefer the most complete duplicate.
    pub fn score(&self) -> usize {
        [
            self.rating.is_some(),
            self.rank.is_some(),
            self.date.is_some(),
            self.contest_name.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }
}

/// Chronologically ordered records for one platform tab.
pub type Series = Vec<Record>;

/// Series keyed by platform key (`leetcode_rating`, ...).
pub type ContestHistory = BTreeMap<String, Series>;

/// Key used when the chart is swept as displayed, without switching tabs.
pub const CURRENT_HISTORY_KEY: &str = "contest_history";

// ===== PLATFORM TYPES =====

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlatformTab {
    /// Visible tab text on the profile page.
    pub label: String,
    /// Key of the series in the resulting `ContestHistory`.
    pub key: String,
}

impl PlatformTab {
    pub fn new(label: &str, key: &str) -> Self {
        Self {
            label: label.to_string(),
            key: key.to_string(),
        }
    }
}

pub fn default_platforms() -> Vec<PlatformTab> {
    vec![
        PlatformTab::new("LeetCode", "leetcode_rating"),
        PlatformTab::new("CodeChef", "codechef_rating"),
        PlatformTab::new("CodeForces", "codeforces_rating"),
        PlatformTab::new("GeeksForGeeks", "GeeksForGeeks_rating"),
        PlatformTab::new("AtCoder", "AtCoder_rating"),
        PlatformTab::new("CodeStudio", "codestudio_rating"),
    ]
}

/// Look up a platform by label (case-insensitive) or key.
pub fn find_platform<'a>(platforms: &'a [PlatformTab], name: &str) -> Option<&'a PlatformTab> {
    let needle = name.trim().to_lowercase();
    platforms
        .iter()
        .find(|p| p.label.to_lowercase() == needle || p.key.to_lowercase() == needle)
}

// ===== CONFIG TYPES =====

const MAX_X_STEPS: u32 = 10_000;
const MAX_Y_SWEEP_PIXELS: u32 = 10_000;
const MAX_PROBE_DELAY_MS: u64 = 60_000;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SweepConfig {
    #[serde(default)]
    pub bridge: BridgeSection,
    #[serde(default)]
    pub chart: ChartSection,
    #[serde(default)]
    pub sweep: SweepSection,
    #[serde(default = "default_platforms")]
    pub platforms: Vec<PlatformTab>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            bridge: BridgeSection::default(),
            chart: ChartSection::default(),
            sweep: SweepSection::default(),
            platforms: default_platforms(),
        }
    }
}

impl SweepConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Returns a description of the first invalid setting, if any.
    pub fn validate(&self) -> Result<(), String> {
        if self.sweep.x_steps == 0 {
            return Err("sweep.x_steps must be at least 1".into());
        }
        if self.sweep.y_sweep_step == 0 {
            return Err("sweep.y_sweep_step must be at least 1".into());
        }
        if self.sweep.x_steps > MAX_X_STEPS {
            return Err(format!("sweep.x_steps must be at most {}", MAX_X_STEPS));
        }
        if self.sweep.y_sweep_pixels > MAX_Y_SWEEP_PIXELS {
            return Err(format!("sweep.y_sweep_pixels must be at most {}", MAX_Y_SWEEP_PIXELS));
        }
        if self.sweep.probe_delay_ms > MAX_PROBE_DELAY_MS {
            return Err(format!("sweep.probe_delay_ms must be at most {}", MAX_PROBE_DELAY_MS));
        }
        if self.chart.container_selector.trim().is_empty() {
            return Err("chart.container_selector must not be empty".into());
        }
        if self.platforms.iter().any(|p| p.label.trim().is_empty() || p.key.trim().is_empty()) {
            return Err("every platform needs a non-empty label and key".into());
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BridgeSection {
    pub port: u16,
    pub command_timeout_ms: u64,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            port: 9225,
            command_timeout_ms: 30_000,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ChartSection {
    pub container_selector: String,
    pub svg_selector: String,
    pub tab_timeout_ms: u64,
    pub tab_settle_ms: u64,
    pub page_settle_ms: u64,
    pub profile_base_url: String,
}

impl Default for ChartSection {
    fn default() -> Self {
        Self {
            container_selector: "#contest_graph".to_string(),
            svg_selector: "svg.apexcharts-svg".to_string(),
            tab_timeout_ms: 5_000,
            tab_settle_ms: 500,
            page_settle_ms: 1_000,
            profile_base_url: "https://codolio.com/profile".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SweepMode {
    /// Whole probe loop runs inside the page as one evaluation.
    #[default]
    InPage,
    /// Each probe is a separate round trip driven from Rust.
    Stepwise,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum HitPolicy {
    /// Stop the Y fan at the first hit: at most one snapshot per X step.
    #[default]
    FirstPerColumn,
    /// Keep every hit in the Y fan.
    AllInFan,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SweepSection {
    pub x_steps: u32,
    pub y_sweep_pixels: u32,
    pub y_sweep_step: u32,
    pub probe_delay_ms: u64,
    pub mode: SweepMode,
    pub hit_policy: HitPolicy,
}

impl Default for SweepSection {
    fn default() -> Self {
        Self {
            x_steps: 220,
            y_sweep_pixels: 80,
            y_sweep_step: 12,
            probe_delay_ms: 10,
            mode: SweepMode::InPage,
            hit_policy: HitPolicy::FirstPerColumn,
        }
    }
}

// ===== UTILITY FUNCTIONS =====

pub fn profile_url(base: &str, username: &str, platform: Option<&str>) -> String {
    let base = base.trim_end_matches('/');
    match platform {
        Some(platform) => format!("{}/{}/problemSolving/{}", base, username, platform),
        None => format!("{}/{}/problemSolving", base, username),
    }
}
