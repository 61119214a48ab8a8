//! Destructive statement classification.
//!
//! The classifier is syntax-blind: it runs a case-insensitive whole-word match
//! over the raw text. Keywords inside string literals, comments and quoted
//! identifiers are therefore reported as well. It may over-block, it never
//! under-blocks.

use std::sync::LazyLock;

use compact_str::CompactString;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use smallvec::SmallVec;

use crate::error::{AppResult, input_error};

/// Keywords reported by [`DangerPolicy::default`], in report order
pub const DEFAULT_DANGEROUS_KEYWORDS: [&str; 10] = [
    "DROP", "ALTER", "TRUNCATE", "CREATE", "GRANT", "REVOKE", "DELETE", "UPDATE", "INSERT", "MERGE"
];

/// Whole-word pattern for the default policy
static DEFAULT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    keyword_pattern(DEFAULT_DANGEROUS_KEYWORDS.as_slice()).expect("valid regex")
});

/// Matched keywords, at most a handful per statement
pub type KeywordVec = SmallVec<[CompactString; 4]>;

/// Ordered set of keywords considered dangerous.
///
/// Swappable per dialect or deployment; the order is the order in which
/// matches are reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DangerPolicy {
    keywords: Vec<CompactString>
}

impl Default for DangerPolicy {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_DANGEROUS_KEYWORDS
                .iter()
                .map(|k| CompactString::from(*k))
                .collect()
        }
    }
}

impl DangerPolicy {
    /// Build a policy from a custom keyword list
    ///
    /// # Errors
    ///
    /// Returns an input error when the list is empty or a keyword is not a
    /// plain word
    pub fn new<I, S>(keywords: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>
    {
        let mut normalized: Vec<CompactString> = Vec::new();
        for keyword in keywords {
            let keyword = keyword.as_ref().trim().to_uppercase();
            if keyword.is_empty()
                || !keyword
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                return Err(input_error(format!(
                    "Invalid dangerous keyword '{}'",
                    keyword
                )));
            }
            if !normalized.iter().any(|k| k == keyword.as_str()) {
                normalized.push(keyword.into());
            }
        }
        if normalized.is_empty() {
            return Err(input_error("Dangerous keyword list must not be empty"));
        }
        Ok(Self {
            keywords: normalized
        })
    }

    pub fn keywords(&self) -> &[CompactString] {
        &self.keywords
    }
}

/// Result of classifying one statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DangerReport {
    pub blocked:          bool,
    pub matched_keywords: KeywordVec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason:           Option<String>
}

impl DangerReport {
    fn from_matches(matched_keywords: KeywordVec) -> Self {
        let blocked = !matched_keywords.is_empty();
        let reason = blocked.then(|| {
            format!(
                "Potentially destructive statement keywords detected: {}",
                matched_keywords.join(", ")
            )
        });
        Self {
            blocked,
            matched_keywords,
            reason
        }
    }
}

/// Whole-word keyword classifier built from a [`DangerPolicy`]
#[derive(Debug, Clone)]
pub struct DangerClassifier {
    policy:  DangerPolicy,
    pattern: Regex
}

impl Default for DangerClassifier {
    fn default() -> Self {
        Self {
            policy:  DangerPolicy::default(),
            pattern: DEFAULT_PATTERN.clone()
        }
    }
}

impl DangerClassifier {
    /// Compile the classifier for a policy
    ///
    /// # Errors
    ///
    /// Returns an input error when the keyword pattern cannot be compiled
    pub fn new(policy: DangerPolicy) -> AppResult<Self> {
        let pattern = keyword_pattern(policy.keywords.as_slice())
            .map_err(|e| input_error(format!("Invalid keyword pattern: {}", e)))?;
        Ok(Self {
            policy,
            pattern
        })
    }

    pub fn policy(&self) -> &DangerPolicy {
        &self.policy
    }

    /// Report which policy keywords occur as whole words in `sql`.
    ///
    /// Matches come back in policy order, duplicates collapsed.
    ///
    /// ```
    /// use schema_guard::sql::DangerClassifier;
    ///
    /// let classifier = DangerClassifier::default();
    /// let report = classifier.classify("delete from t; DROP TABLE t; DELETE FROM u");
    /// assert!(report.blocked);
    /// assert_eq!(report.matched_keywords.as_slice(), ["DROP", "DELETE"]);
    ///
    /// assert!(!classifier.classify("UPDATE_LOG").blocked);
    /// ```
    pub fn classify(&self, sql: &str) -> DangerReport {
        let found: Vec<String> = self
            .pattern
            .find_iter(sql)
            .map(|m| m.as_str().to_uppercase())
            .collect();
        let matched = self
            .policy
            .keywords
            .iter()
            .filter(|k| found.iter().any(|f| f == k.as_str()))
            .cloned()
            .collect();
        DangerReport::from_matches(matched)
    }
}

/// Case-insensitive `\b(?:K1|K2|...)\b` over escaped keywords
fn keyword_pattern<S: AsRef<str>>(keywords: &[S]) -> Result<Regex, regex::Error> {
    let alternation = keywords
        .iter()
        .map(|k| regex::escape(k.as_ref()))
        .collect::<Vec<_>>()
        .join("|");
    RegexBuilder::new(&format!(r"\b(?:{})\b", alternation))
        .case_insensitive(true)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_policy_is_uppercased_and_deduplicated() {
        let policy = DangerPolicy::new(["drop", "Drop", "vacuum"]).unwrap();
        assert_eq!(policy.keywords(), ["DROP", "VACUUM"]);
    }

    #[test]
    fn empty_policy_is_rejected() {
        assert!(DangerPolicy::new(Vec::<String>::new()).is_err());
    }

    #[test]
    fn keyword_with_punctuation_is_rejected() {
        assert!(DangerPolicy::new(["DROP|ALTER"]).is_err());
    }

    #[test]
    fn default_matches_explicit_default_policy() {
        let shared = DangerClassifier::default();
        let built = DangerClassifier::new(DangerPolicy::default()).unwrap();
        assert_eq!(shared.policy(), built.policy());
        for sql in ["merge into t using s on 1 = 1", "SELECT updated_at FROM t", "Grant all"] {
            assert_eq!(shared.classify(sql), built.classify(sql));
        }
    }

    #[test]
    fn reason_only_when_blocked() {
        let classifier = DangerClassifier::default();
        assert!(classifier.classify("SELECT 1").reason.is_none());
        let reason = classifier.classify("TRUNCATE t").reason.unwrap();
        assert!(reason.contains("TRUNCATE"));
    }
}
