//! Blocking-rule classification.
//!
//! Rules are evaluated in a fixed order: size, allow-list, pattern. The
//! first rule a file violates decides both whether it is blocked and the
//! reported reason, so the two can never disagree.

use std::collections::HashSet;

use globset::{GlobBuilder, GlobMatcher};

use filegate_core::{BlockReason, FileRecord, ScanConfig, ScanError};

/// Compiled blocking rules for one scan.
#[derive(Debug, Clone)]
pub struct Classifier {
    max_bytes: u64,
    allowed: HashSet<String>,
    patterns: Vec<(String, GlobMatcher)>,
}

impl Classifier {
    /// Compile the rules of a config. Fails on an invalid glob pattern.
    pub fn new(config: &ScanConfig) -> Result<Self, ScanError> {
        let allowed = config
            .allowed_extensions
            .iter()
            .map(|ext| normalize_extension(ext))
            .collect();

        let patterns = config
            .blocked_patterns
            .iter()
            .map(|pattern| {
                GlobBuilder::new(pattern)
                    .literal_separator(true)
                    .backslash_escape(true)
                    .build()
                    .map(|glob| (pattern.clone(), glob.compile_matcher()))
                    .map_err(|e| {
                        ScanError::invalid_config(format!("invalid pattern {pattern:?}: {e}"))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            max_bytes: config.max_file_size_bytes(),
            allowed,
            patterns,
        })
    }

    /// The first rule `record` violates, if any.
    pub fn first_violation(&self, record: &FileRecord) -> Option<BlockReason> {
        if record.size > self.max_bytes {
            return Some(BlockReason::SizeExceedsLimit);
        }

        if !self.allowed.is_empty()
            && !self.allowed.contains(&normalize_extension(&record.extension))
        {
            return Some(BlockReason::TypeNotAllowed);
        }

        self.patterns
            .iter()
            .find(|(_, matcher)| matcher.is_match(record.name.as_str()))
            .map(|(pattern, _)| BlockReason::MatchesPattern {
                pattern: pattern.clone(),
            })
    }

    /// Whether any rule blocks `record`.
    pub fn is_blocked(&self, record: &FileRecord) -> bool {
        self.first_violation(record).is_some()
    }

    /// Human-readable reason for a blocked record.
    ///
    /// Falls back to [`BlockReason::Unknown`] when no rule explains it.
    pub fn block_reason(&self, record: &FileRecord) -> BlockReason {
        self.first_violation(record).unwrap_or(BlockReason::Unknown)
    }

    /// Classify `record` in place.
    pub fn apply(&self, record: &mut FileRecord) {
        if let Some(reason) = self.first_violation(record) {
            record.block(reason);
        }
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, size: u64) -> FileRecord {
        let mut record = FileRecord::new_file(format!("/scan/{name}"));
        record.size = size;
        record
    }

    fn classifier(config: ScanConfig) -> Classifier {
        Classifier::new(&config).unwrap()
    }

    #[test]
    fn test_size_limit_is_inclusive() {
        let c = classifier(ScanConfig {
            max_file_size_mb: 1,
            ..Default::default()
        });

        assert!(!c.is_blocked(&record("a.bin", 500 * 1024)));
        assert!(!c.is_blocked(&record("a.bin", 1024 * 1024)));
        assert_eq!(
            c.first_violation(&record("a.bin", 1024 * 1024 + 1)),
            Some(BlockReason::SizeExceedsLimit)
        );
    }

    #[test]
    fn test_allow_list_case_insensitive() {
        let c = classifier(ScanConfig {
            allowed_extensions: vec![".txt".into(), "PDF".into()],
            ..Default::default()
        });

        assert!(!c.is_blocked(&record("notes.TXT", 10)));
        assert!(!c.is_blocked(&record("paper.pdf", 10)));
        assert_eq!(
            c.first_violation(&record("photo.jpg", 10)),
            Some(BlockReason::TypeNotAllowed)
        );
        assert!(c.is_blocked(&record("Makefile", 10)));
    }

    #[test]
    fn test_empty_allow_list_allows_everything() {
        let c = classifier(ScanConfig::default());
        assert!(!c.is_blocked(&record("anything.xyz", 10)));
    }

    #[test]
    fn test_first_matching_pattern_is_reported() {
        let c = classifier(ScanConfig {
            blocked_patterns: vec!["*.tmp".into(), "temp*".into(), ".*".into()],
            ..Default::default()
        });

        assert_eq!(
            c.first_violation(&record("temp.tmp", 4)),
            Some(BlockReason::MatchesPattern {
                pattern: "*.tmp".into()
            })
        );
        assert_eq!(
            c.first_violation(&record(".hidden", 4)),
            Some(BlockReason::MatchesPattern {
                pattern: ".*".into()
            })
        );
        assert!(!c.is_blocked(&record("normal.txt", 4)));
        assert!(!c.is_blocked(&record("test.log", 4)));
    }

    #[test]
    fn test_patterns_are_case_sensitive() {
        let c = classifier(ScanConfig {
            blocked_patterns: vec!["*.tmp".into()],
            ..Default::default()
        });
        assert!(!c.is_blocked(&record("TEMP.TMP", 4)));
    }

    #[test]
    fn test_pattern_syntax() {
        let c = classifier(ScanConfig {
            blocked_patterns: vec!["*.{tmp,bak}".into(), "[!a-m]*.log".into()],
            ..Default::default()
        });

        // Braces are alternation, not literal characters.
        assert!(c.is_blocked(&record("draft.tmp", 4)));
        assert!(c.is_blocked(&record("draft.bak", 4)));
        assert!(!c.is_blocked(&record("draft.{tmp,bak}", 4)));

        // `[!...]` negates the class.
        assert!(c.is_blocked(&record("server.log", 4)));
        assert!(!c.is_blocked(&record("app.log", 4)));
    }

    #[test]
    fn test_caret_negates_class() {
        let c = classifier(ScanConfig {
            blocked_patterns: vec!["[^x]*".into()],
            ..Default::default()
        });
        assert!(c.is_blocked(&record("report.txt", 4)));
        assert!(!c.is_blocked(&record("xfile", 4)));
    }

    #[test]
    fn test_rule_precedence() {
        let c = classifier(ScanConfig {
            max_file_size_mb: 1,
            allowed_extensions: vec!["txt".into()],
            blocked_patterns: vec!["*".into()],
            ..Default::default()
        });

        assert_eq!(
            c.block_reason(&record("huge.jpg", 2 * 1024 * 1024)),
            BlockReason::SizeExceedsLimit
        );
        assert_eq!(c.block_reason(&record("small.jpg", 1)), BlockReason::TypeNotAllowed);
        assert!(matches!(
            c.block_reason(&record("small.txt", 1)),
            BlockReason::MatchesPattern { .. }
        ));
    }

    #[test]
    fn test_block_reason_fallback() {
        let c = classifier(ScanConfig::default());
        assert_eq!(c.block_reason(&record("fine.txt", 1)), BlockReason::Unknown);
    }

    #[test]
    fn test_apply_sets_reason() {
        let c = classifier(ScanConfig {
            max_file_size_mb: 0,
            ..Default::default()
        });
        let mut r = record("one-byte.txt", 1);
        c.apply(&mut r);
        assert!(r.is_blocked);
        assert_eq!(r.block_reason, Some(BlockReason::SizeExceedsLimit));

        let mut empty = record("empty.txt", 0);
        c.apply(&mut empty);
        assert!(!empty.is_blocked);
        assert!(empty.block_reason.is_none());
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let err = Classifier::new(&ScanConfig {
            blocked_patterns: vec!["[unclosed".into()],
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ScanError::InvalidConfig { .. }));
    }
}
