//! Hide patterns.

use regex::Regex;
use tracing::warn;

/// Compiled hide patterns, one regular expression per source line.
///
/// A pattern matches anywhere in an entry's bare name. Lines that fail to
/// compile are dropped.
#[derive(Debug, Clone, Default)]
pub struct HideRules {
    patterns: Vec<Regex>,
}

impl HideRules {
    pub fn compile(source: &str) -> Self {
        let patterns = source
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(|line| match Regex::new(line) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(pattern = %line, error = %e, "invalid hide pattern, skipping");
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// True if any pattern matches `name`.
    pub fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(name))
    }
}
