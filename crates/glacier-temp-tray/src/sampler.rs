//! CPU temperature sampling from the kernel hwmon tree.
//!
//! Chips are scanned once at startup and the winning channel's `temp*_input`
//! path is cached; every tick after that is a single file read.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Default sysfs root scanned for temperature channels.
pub const HWMON_ROOT: &str = "/sys/class/hwmon";

/// A chip/label predicate. `None` fields match anything; comparisons are
/// case-insensitive substring matches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchRule {
    pub chip: Option<String>,
    pub label: Option<String>,
}

impl MatchRule {
    fn matches(&self, chip: &str, label: &str) -> bool {
        fn contains(haystack: &str, needle: &str) -> bool {
            haystack.to_ascii_lowercase().contains(&needle.to_ascii_lowercase())
        }

        self.chip.as_deref().map_or(true, |c| contains(chip, c))
            && self.label.as_deref().map_or(true, |l| contains(label, l))
    }
}

/// Built-in rule order: vendor-specific channels before generic CPU tokens.
pub fn default_rules() -> Vec<MatchRule> {
    let rule = |chip: Option<&str>, label: Option<&str>| MatchRule {
        chip: chip.map(String::from),
        label: label.map(String::from),
    };

    vec![
        rule(Some("k10temp"), Some("Tctl")),
        rule(Some("zenpower"), Some("Tdie")),
        rule(Some("coretemp"), Some("Package id")),
        rule(None, Some("cpu")),
        rule(Some("cpu"), None),
    ]
}

/// One temperature channel found during the scan.
#[derive(Debug, Clone)]
pub struct TempChannel {
    pub chip: String,
    pub label: String,
    pub input: PathBuf,
}

/// A cached channel stopped producing a reading.
#[derive(Error, Debug)]
pub enum SensorReadError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unparseable sensor value {value:?} in {}", path.display())]
    Parse { path: PathBuf, value: String },
}

/// Source of CPU temperature readings.
pub trait Sample {
    /// `Ok(None)` means no usable reading (no matching channel, or a value
    /// at or below zero). Errors leave the caller's last reading intact.
    fn sample(&mut self) -> Result<Option<f32>, SensorReadError>;
}

/// Samples the hwmon channel selected at startup.
pub struct CpuTempSampler {
    channel: Option<TempChannel>,
}

impl CpuTempSampler {
    /// Scans `root` once and caches the first channel the rules select.
    pub fn new(root: &Path, rules: &[MatchRule]) -> Self {
        let channels = scan_channels(root);
        let channel = select_channel(&channels, rules).cloned();

        match &channel {
            Some(c) => info!(
                "CPU temperature from {} {} ({})",
                c.chip,
                c.label,
                c.input.display()
            ),
            None => warn!(
                "no CPU temperature channel matched ({} channels scanned)",
                channels.len()
            ),
        }

        Self { channel }
    }

    /// The cached channel, if the scan found one.
    pub fn channel(&self) -> Option<&TempChannel> {
        self.channel.as_ref()
    }
}

impl Sample for CpuTempSampler {
    fn sample(&mut self) -> Result<Option<f32>, SensorReadError> {
        let Some(channel) = &self.channel else {
            return Ok(None);
        };
        let temp = read_millidegrees(&channel.input)?;
        Ok((temp > 0.0).then_some(temp))
    }
}

/// Lists every `temp*_input` channel under `root`, with chip names and
/// labels where the driver provides them.
pub fn scan_channels(root: &Path) -> Vec<TempChannel> {
    let mut channels = Vec::new();
    let Ok(entries) = fs::read_dir(root) else {
        return channels;
    };

    let mut chips: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    chips.sort();

    for chip_dir in chips {
        let chip = fs::read_to_string(chip_dir.join("name"))
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        let Ok(files) = fs::read_dir(&chip_dir) else {
            continue;
        };
        let mut inputs: Vec<PathBuf> = files
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("temp") && n.ends_with("_input"))
            })
            .collect();
        inputs.sort();

        for input in inputs {
            let stem = input
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix("_input"))
                .unwrap_or_default()
                .to_string();
            let label = fs::read_to_string(chip_dir.join(format!("{stem}_label")))
                .map(|s| s.trim().to_string())
                .unwrap_or_default();

            channels.push(TempChannel {
                chip: chip.clone(),
                label,
                input,
            });
        }
    }

    channels
}

/// Applies the rules in priority order; first rule with a hit wins.
pub fn select_channel<'a>(
    channels: &'a [TempChannel],
    rules: &[MatchRule],
) -> Option<&'a TempChannel> {
    rules
        .iter()
        .find_map(|rule| channels.iter().find(|c| rule.matches(&c.chip, &c.label)))
}

/// Reads a hwmon input file (millidegrees Celsius) as degrees.
pub fn read_millidegrees(path: &Path) -> Result<f32, SensorReadError> {
    let raw = fs::read_to_string(path).map_err(|source| SensorReadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let value = raw.trim();
    let milli: f32 = value.parse().map_err(|_| SensorReadError::Parse {
        path: path.to_path_buf(),
        value: value.to_string(),
    })?;
    Ok(milli / 1000.0)
}
