//! File name patterns
//!
//! Items are filtered by their base name, either with a simple glob
//! (`*` and `?` wildcards) or with a caller-supplied regular expression.
//! Patterns are never applied to directory names.

use crate::error::ConfigError;
use regex::Regex;
use std::fmt;

/// Convert a simple file glob (`*`, `?`) into a fully anchored regex
///
/// Every other character is matched literally.
///
/// Example: `log*.txt` becomes `^log.*\.txt$`
pub fn glob_to_regex(glob: &str) -> String {
    let mut regex = String::with_capacity(glob.len() + 8);
    regex.push('^');
    let mut buf = [0u8; 4];
    for c in glob.chars() {
        match c {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            _ => regex.push_str(&regex::escape(c.encode_utf8(&mut buf))),
        }
    }
    regex.push('$');
    regex
}

/// Compiled pattern matched against an item's base name
#[derive(Clone)]
pub struct NamePattern {
    /// Original glob or regex text, for display
    source: String,

    regex: Regex,
}

impl NamePattern {
    /// Pattern that accepts every name (`*`)
    pub fn any() -> Self {
        Self {
            source: "*".to_string(),
            regex: Regex::new("^.*$").expect("Invalid match-all regex"),
        }
    }

    /// Compile a glob such as `*.xml`
    pub fn glob(glob: &str) -> Result<Self, ConfigError> {
        let regex = Regex::new(&glob_to_regex(glob)).map_err(|e| ConfigError::InvalidPattern {
            pattern: glob.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            source: glob.to_string(),
            regex,
        })
    }

    /// Compile a regular expression as-is (no anchoring is added)
    pub fn regex(pattern: &str) -> Result<Self, ConfigError> {
        let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::from(regex))
    }

    /// Check a base name against the pattern
    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    /// Text the pattern was built from
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl From<Regex> for NamePattern {
    fn from(regex: Regex) -> Self {
        Self {
            source: regex.as_str().to_string(),
            regex,
        }
    }
}

impl Default for NamePattern {
    fn default() -> Self {
        Self::any()
    }
}

impl fmt::Debug for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NamePattern").field(&self.source).finish()
    }
}
