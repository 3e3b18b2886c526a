//! Per-profile browser fingerprint persistence.
//!
//! A profile keeps one fingerprint for its whole life; the stored file wins
//! over regeneration on every later session. Generation aims for a plausible
//! desktop machine: a common viewport close to the base screen size, a real
//! user agent string, an ordinary timezone.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::utils;


/// File name under the profile directory.
pub const FINGERPRINT_FILE: &str = "fingerprint.json";

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36 Edg/125.0.0.0",
];

const COMMON_VIEWPORTS: &[(u32, u32)] = &[
    (1920, 1080),
    (1920, 1200),
    (2048, 1152),
    (1856, 1044),
    (1792, 1008),
    (2560, 1440),
    (1680, 1050),
    (1600, 900),
];

const TIMEZONES: &[&str] = &[
    "America/New_York",
    "America/Chicago",
    "America/Los_Angeles",
    "Europe/London",
    "Europe/Berlin",
];

const SCALE_FACTORS: &[f64] = &[1.0, 1.25, 1.5, 2.0];

/// Stable per-profile browser identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintData {
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub device_scale_factor: f64,
    pub locale: String,
    pub timezone: String,
}

/// Source of the per-profile fingerprint, consumed once at session bootstrap.
pub trait FingerprintProvider: Send + Sync {
    fn get_or_create(&self, profile_dir: &Path) -> Result<FingerprintData>;
}

/// File-backed provider: load `fingerprint.json` when present and readable,
/// generate-and-persist otherwise. Corrupt or empty files are regenerated,
/// never fatal.
pub struct FileFingerprintProvider {
    base_width: u32,
    base_height: u32,
}

impl Default for FileFingerprintProvider {
    fn default() -> Self {
        Self {
            base_width: 1920,
            base_height: 1080,
        }
    }
}

impl FileFingerprintProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn generate(&self) -> FingerprintData {
        let (width, height) = self.pick_viewport();
        FingerprintData {
            user_agent: USER_AGENTS[fastrand::usize(..USER_AGENTS.len())].to_string(),
            viewport_width: width,
            viewport_height: height,
            device_scale_factor: SCALE_FACTORS[fastrand::usize(..SCALE_FACTORS.len())],
            locale: "en-US".to_string(),
            timezone: TIMEZONES[fastrand::usize(..TIMEZONES.len())].to_string(),
        }
    }

    /// Draws from the viewport catalogue until one lands within 10% of the
    /// base screen size; bounded attempts, base size as the fallback.
    fn pick_viewport(&self) -> (u32, u32) {
        for _ in 0..10 {
            let (width, height) = COMMON_VIEWPORTS[fastrand::usize(..COMMON_VIEWPORTS.len())];
            if within_tolerance(width, self.base_width)
                && within_tolerance(height, self.base_height)
            {
                return (width, height);
            }
        }
        (self.base_width, self.base_height)
    }
}

impl FingerprintProvider for FileFingerprintProvider {
    fn get_or_create(&self, profile_dir: &Path) -> Result<FingerprintData> {
        utils::ensure_dir(profile_dir)?;
        let path = profile_dir.join(FINGERPRINT_FILE);

        if path.exists() {
            match load(&path) {
                Ok(Some(data)) => {
                    debug!("Loaded fingerprint from {}", path.display());
                    return Ok(data);
                }
                Ok(None) => {
                    warn!("Fingerprint file {} is empty, regenerating", path.display());
                }
                Err(e) => {
                    warn!(
                        "Fingerprint file {} unreadable, regenerating: {}",
                        path.display(),
                        e
                    );
                }
            }
        }

        let data = self.generate();
        let json =
            serde_json::to_string_pretty(&data).context("Failed to serialize fingerprint")?;
        utils::atomic_write(&path, &json)?;
        info!(
            "Generated fingerprint for profile {} ({}x{})",
            profile_dir.display(),
            data.viewport_width,
            data.viewport_height
        );
        Ok(data)
    }
}

fn load(path: &Path) -> Result<Option<FingerprintData>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let data = serde_json::from_str(&raw)
        .with_context(|| format!("Malformed fingerprint in {}", path.display()))?;
    Ok(Some(data))
}

fn within_tolerance(candidate: u32, base: u32) -> bool {
    let slack = base / 10;
    (base - slack..=base + slack).contains(&candidate)
}
