//! Scan configuration types.

use std::path::Path;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// Worker count used when the configured count is zero.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Queue capacity used when a configured capacity is zero.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Size limit used when none is configured.
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 100;

/// Largest accepted queue capacity or traversal cap.
///
/// Matches the permit limit of Tokio's semaphore, which backs both the
/// bounded channels and the traversal cap.
pub const MAX_CAPACITY: usize = usize::MAX >> 3;

/// Configuration for a scan.
///
/// A config is immutable for the lifetime of a scan. Zero worker counts and
/// queue capacities mean "use the default" and are replaced by
/// [`ScanConfig::resolved`] before any task starts.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct ScanConfig {
    /// Files strictly larger than this many MiB are blocked.
    #[builder(default = "DEFAULT_MAX_FILE_SIZE_MB")]
    pub max_file_size_mb: u64,

    /// Descend into subdirectories.
    #[builder(default = "true")]
    pub recursive: bool,

    /// Allowed extensions (empty = allow all). Case and a leading dot are ignored.
    #[builder(default)]
    pub allowed_extensions: Vec<String>,

    /// Shell-style glob patterns matched against base names.
    #[builder(default)]
    pub blocked_patterns: Vec<String>,

    /// Number of file-processing workers (0 = default).
    #[builder(default = "DEFAULT_WORKER_COUNT")]
    pub worker_count: usize,

    /// Capacity of the work queue (0 = default).
    #[builder(default = "DEFAULT_QUEUE_CAPACITY")]
    pub queue_capacity: usize,

    /// Capacity of the result queue (0 = default).
    #[builder(default = "DEFAULT_QUEUE_CAPACITY")]
    pub result_queue_capacity: usize,

    /// Write the blocked-files manifest into the scanned root when done.
    #[builder(default = "false")]
    pub export_on_completion: bool,

    /// Cap on concurrently listing directories (None = one task per directory, unbounded).
    #[builder(default, setter(into, strip_option))]
    pub max_traversal_tasks: Option<usize>,
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        check_limits(
            self.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY),
            self.result_queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY),
            self.max_traversal_tasks.flatten(),
        )?;
        if let Some(ref patterns) = self.blocked_patterns {
            if patterns.iter().any(|p| p.trim().is_empty()) {
                return Err("Blocked patterns cannot be empty".to_string());
            }
        }
        Ok(())
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Parse a config from TOML. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ScanError> {
        let config: Self =
            toml::from_str(source).map_err(|e| ScanError::invalid_config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| ScanError::io(path, e))?;
        Self::from_toml_str(&source)
    }

    /// Check invariants that the builder enforces for hand-built or deserialized configs.
    pub fn validate(&self) -> Result<(), ScanError> {
        check_limits(
            self.queue_capacity,
            self.result_queue_capacity,
            self.max_traversal_tasks,
        )
        .map_err(ScanError::invalid_config)?;
        if self.blocked_patterns.iter().any(|p| p.trim().is_empty()) {
            return Err(ScanError::invalid_config("Blocked patterns cannot be empty"));
        }
        Ok(())
    }

    /// Return a copy with zero counts replaced by their defaults.
    pub fn resolved(&self) -> Self {
        let mut config = self.clone();
        if config.worker_count == 0 {
            config.worker_count = DEFAULT_WORKER_COUNT;
        }
        if config.queue_capacity == 0 {
            config.queue_capacity = DEFAULT_QUEUE_CAPACITY;
        }
        if config.result_queue_capacity == 0 {
            config.result_queue_capacity = DEFAULT_QUEUE_CAPACITY;
        }
        config
    }

    /// Size limit in bytes. Files of exactly this size are allowed.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

fn check_limits(
    queue_capacity: usize,
    result_queue_capacity: usize,
    max_traversal_tasks: Option<usize>,
) -> Result<(), String> {
    if queue_capacity > MAX_CAPACITY {
        return Err(format!("queue_capacity must be at most {MAX_CAPACITY}"));
    }
    if result_queue_capacity > MAX_CAPACITY {
        return Err(format!("result_queue_capacity must be at most {MAX_CAPACITY}"));
    }
    match max_traversal_tasks {
        Some(0) => Err("max_traversal_tasks must be at least 1".to_string()),
        Some(n) if n > MAX_CAPACITY => {
            Err(format!("max_traversal_tasks must be at most {MAX_CAPACITY}"))
        }
        _ => Ok(()),
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: DEFAULT_MAX_FILE_SIZE_MB,
            recursive: true,
            allowed_extensions: Vec::new(),
            blocked_patterns: Vec::new(),
            worker_count: DEFAULT_WORKER_COUNT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            result_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            export_on_completion: false,
            max_traversal_tasks: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ScanConfig::builder()
            .max_file_size_mb(5u64)
            .worker_count(8usize)
            .recursive(false)
            .blocked_patterns(vec!["*.tmp".to_string()])
            .build()
            .unwrap();

        assert_eq!(config.max_file_size_mb, 5);
        assert_eq!(config.worker_count, 8);
        assert!(!config.recursive);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.max_traversal_tasks, None);
    }

    #[test]
    fn test_builder_rejects_zero_traversal_cap() {
        let result = ScanConfig::builder().max_traversal_tasks(0usize).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_rejects_capacity_above_limit() {
        assert!(
            ScanConfig::builder()
                .queue_capacity(usize::MAX)
                .build()
                .is_err()
        );
        assert!(
            ScanConfig::builder()
                .max_traversal_tasks(MAX_CAPACITY + 1)
                .build()
                .is_err()
        );
        assert!(
            ScanConfig::builder()
                .result_queue_capacity(MAX_CAPACITY)
                .build()
                .is_ok()
        );
    }

    #[test]
    fn test_validate_rejects_capacity_above_limit() {
        let oversized = [
            ScanConfig {
                queue_capacity: usize::MAX,
                ..Default::default()
            },
            ScanConfig {
                result_queue_capacity: usize::MAX,
                ..Default::default()
            },
            ScanConfig {
                max_traversal_tasks: Some(usize::MAX),
                ..Default::default()
            },
        ];

        for config in oversized {
            assert!(matches!(
                config.validate(),
                Err(ScanError::InvalidConfig { .. })
            ));
        }
    }

    #[test]
    fn test_builder_rejects_empty_pattern() {
        let result = ScanConfig::builder()
            .blocked_patterns(vec!["  ".to_string()])
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_resolved_replaces_zero_counts() {
        let config = ScanConfig {
            worker_count: 0,
            queue_capacity: 0,
            result_queue_capacity: 0,
            ..Default::default()
        };

        let resolved = config.resolved();
        assert_eq!(resolved.worker_count, DEFAULT_WORKER_COUNT);
        assert_eq!(resolved.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(resolved.result_queue_capacity, DEFAULT_QUEUE_CAPACITY);
        // The original is left untouched.
        assert_eq!(config.worker_count, 0);
    }

    #[test]
    fn test_max_file_size_bytes() {
        let config = ScanConfig {
            max_file_size_mb: 1,
            ..Default::default()
        };
        assert_eq!(config.max_file_size_bytes(), 1024 * 1024);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = ScanConfig::from_toml_str(
            r#"
            max_file_size_mb = 2
            recursive = false
            blocked_patterns = ["*.tmp", ".*"]
            "#,
        )
        .unwrap();

        assert_eq!(config.max_file_size_mb, 2);
        assert!(!config.recursive);
        assert_eq!(config.blocked_patterns.len(), 2);
        assert_eq!(config.worker_count, DEFAULT_WORKER_COUNT);
    }

    #[test]
    fn test_from_toml_invalid() {
        assert!(matches!(
            ScanConfig::from_toml_str("max_traversal_tasks = 0"),
            Err(ScanError::InvalidConfig { .. })
        ));
        assert!(matches!(
            ScanConfig::from_toml_str("recursive = \"yes\""),
            Err(ScanError::InvalidConfig { .. })
        ));
    }
}
