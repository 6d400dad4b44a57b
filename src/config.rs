//! Region and connection configuration
//!
//! Settings are read once at startup, either from a JSON document or from
//! environment variables, and are immutable afterwards.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};

/// Region name used when none is configured
pub const DEFAULT_REGION: &str = "default";

/// Default entry lifetime for a region (1 hour)
pub const DEFAULT_EXPIRATION: Duration = Duration::from_secs(3600);

/// Default payload size at which compression kicks in
pub const DEFAULT_COMPRESS_THRESHOLD: usize = 40_960;

/// Pass as `valid_for` to use the region's configured expiration.
pub const USE_REGION_DEFAULT: Duration = Duration::ZERO;

/// Configuration of one logical cache namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegionConfig {
    /// Region name, unique per logical namespace
    #[serde(rename = "region")]
    pub region_name: String,
    /// Default lifetime of entries written without an explicit `valid_for`
    #[serde(with = "timespan")]
    pub expiration: Duration,
    /// Serialized size (bytes) from which the compression stage deflates
    pub compress_threshold: usize,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            region_name: DEFAULT_REGION.to_string(),
            expiration: DEFAULT_EXPIRATION,
            compress_threshold: DEFAULT_COMPRESS_THRESHOLD,
        }
    }
}

impl RegionConfig {
    /// Region with the given name and default expiration and threshold.
    pub fn new(region_name: impl Into<String>) -> Self {
        Self {
            region_name: region_name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.expiration = expiration;
        self
    }

    #[must_use]
    pub fn with_compress_threshold(mut self, threshold: usize) -> Self {
        self.compress_threshold = threshold;
        self
    }

    /// Resolve a caller-supplied lifetime: zero means the region default.
    ///
    /// The result is never zero. A region built with a zero expiration and
    /// never validated falls back to [`DEFAULT_EXPIRATION`].
    #[must_use]
    pub fn resolve_ttl(&self, valid_for: Duration) -> Duration {
        if !valid_for.is_zero() {
            valid_for
        } else if !self.expiration.is_zero() {
            self.expiration
        } else {
            DEFAULT_EXPIRATION
        }
    }

    /// # Errors
    ///
    /// Returns [`CacheError::Config`] for a blank region name or a zero expiration.
    pub fn validate(&self) -> CacheResult<()> {
        if self.region_name.trim().is_empty() {
            return Err(CacheError::Config("region name must not be empty".into()));
        }
        if self.expiration.is_zero() {
            return Err(CacheError::Config(format!(
                "region '{}' has a zero expiration",
                self.region_name
            )));
        }
        Ok(())
    }
}

/// Process-wide cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheSettings {
    /// Memcached connection string
    pub memcached_url: String,
    /// Redis connection string for the shared blob store
    pub redis_url: String,
    /// Configured regions
    pub regions: Vec<RegionConfig>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            memcached_url: "memcache://127.0.0.1:11211".to_string(),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            regions: vec![RegionConfig::default()],
        }
    }
}

impl CacheSettings {
    /// Load settings from environment variables.
    ///
    /// # Environment Variables
    /// - `MEMCACHED_URL` - memcached servers (default: `memcache://127.0.0.1:11211`)
    /// - `REDIS_URL` - shared blob store (default: `redis://127.0.0.1:6379`)
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            memcached_url: std::env::var("MEMCACHED_URL").unwrap_or(defaults.memcached_url),
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            regions: defaults.regions,
        }
    }

    /// Parse settings from a JSON document and validate them.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Config`] on malformed JSON or invalid regions.
    pub fn from_json_str(json: &str) -> CacheResult<Self> {
        let settings: Self = serde_json::from_str(json)
            .map_err(|e| CacheError::Config(format!("malformed cache settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read and parse a JSON settings file.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Config`] if the file cannot be read or is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> CacheResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| CacheError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    /// # Errors
    ///
    /// Returns [`CacheError::Config`] for invalid or duplicated regions.
    pub fn validate(&self) -> CacheResult<()> {
        let mut seen = std::collections::HashSet::new();
        for region in &self.regions {
            region.validate()?;
            if !seen.insert(region.region_name.as_str()) {
                return Err(CacheError::Config(format!(
                    "duplicate region '{}'",
                    region.region_name
                )));
            }
        }
        Ok(())
    }

    /// Look up a configured region by name.
    #[must_use]
    pub fn region(&self, name: &str) -> Option<&RegionConfig> {
        self.regions.iter().find(|r| r.region_name == name)
    }
}

/// Serde adapter for `[d.]hh:mm:ss[.fraction]` durations.
pub mod timespan {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    /// Parse a time span such as `01:00:00`, `1.02:03:04` or `00:00:01.5`.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when the text is not a time span.
    pub fn parse(text: &str) -> Result<Duration, String> {
        let text = text.trim();
        let parts: Vec<&str> = text.split(':').collect();
        let [head, minutes, seconds] = parts.as_slice() else {
            return Err(format!("expected [d.]hh:mm:ss, got '{text}'"));
        };

        let (days, hours) = match head.split_once('.') {
            Some((d, h)) => (parse_component(d, "days")?, parse_component(h, "hours")?),
            None => (0, parse_component(head, "hours")?),
        };
        let minutes = parse_component(minutes, "minutes")?;
        if hours > 23 && days > 0 {
            return Err(format!("hours out of range in '{text}'"));
        }
        if minutes > 59 {
            return Err(format!("minutes out of range in '{text}'"));
        }

        let (whole, fraction) = match seconds.split_once('.') {
            Some((s, f)) => (s, Some(f)),
            None => (*seconds, None),
        };
        let whole = parse_component(whole, "seconds")?;
        if whole > 59 {
            return Err(format!("seconds out of range in '{text}'"));
        }
        let nanos = match fraction {
            Some(f) if !f.is_empty() && f.len() <= 9 && f.bytes().all(|b| b.is_ascii_digit()) => {
                let padded = format!("{f:0<9}");
                padded
                    .parse::<u32>()
                    .map_err(|e| format!("invalid fraction in '{text}': {e}"))?
            }
            Some(_) => return Err(format!("invalid fraction in '{text}'")),
            None => 0,
        };

        let secs = days * 86_400 + hours * 3_600 + minutes * 60 + whole;
        Ok(Duration::new(secs, nanos))
    }

    fn parse_component(value: &str, what: &str) -> Result<u64, String> {
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("invalid {what} component '{value}'"));
        }
        value
            .parse()
            .map_err(|e| format!("invalid {what} component '{value}': {e}"))
    }

    /// Render a duration in the same format `parse` accepts.
    #[must_use]
    pub fn format(duration: Duration) -> String {
        let total = duration.as_secs();
        let days = total / 86_400;
        let hours = (total % 86_400) / 3_600;
        let minutes = (total % 3_600) / 60;
        let seconds = total % 60;
        let mut out = if days > 0 {
            format!("{days}.{hours:02}:{minutes:02}:{seconds:02}")
        } else {
            format!("{hours:02}:{minutes:02}:{seconds:02}")
        };
        let nanos = duration.subsec_nanos();
        if nanos > 0 {
            let fraction = format!("{nanos:09}");
            out.push('.');
            out.push_str(fraction.trim_end_matches('0'));
        }
        out
    }

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse(&text).map_err(serde::de::Error::custom)
    }
}
