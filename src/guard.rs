//! Gatekeeping policy over classification and validation.
//!
//! The classifier and validator only describe a statement. [`Guard`] turns
//! their reports into a [`Verdict`]:
//!
//! | Danger | Action | Unknown refs | Verdict |
//! |--------|--------|--------------|---------|
//! | yes | `Block` | - | `Blocked` |
//! | yes | `Warn` / `Wrap` | none | `Warn` |
//! | no | - | some, rejected | `Blocked` |
//! | no | - | some, not rejected | `Warn` |
//! | no | - | none | `Allowed` |
//!
//! With `Wrap` the returned SQL is wrapped in a savepoint that is always rolled
//! back.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppResult, input_error},
    schema::SchemaSnapshot,
    sql::{DangerClassifier, DangerReport, split_statements},
    validate::{SchemaValidator, ValidationReport}
};

/// Savepoint used by [`DangerAction::Wrap`] unless configured otherwise
pub const DEFAULT_SAVEPOINT: &str = "ai_guard";

/// What to do with a statement the classifier flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DangerAction {
    /// Refuse the statement
    #[default]
    Block,
    /// Let it through with a warning
    Warn,
    /// Let it through wrapped in a rolled-back savepoint
    Wrap
}

/// Final decision for one statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Allowed,
    Warn,
    Blocked
}

impl Verdict {
    /// Process exit code: 0 allowed, 1 warnings, 2 blocked
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Allowed => 0,
            Self::Warn => 1,
            Self::Blocked => 2
        }
    }
}

/// Result of [`Guard::check`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardDecision {
    pub verdict:    Verdict,
    /// SQL to hand back to the user; wrapped when the action is `Wrap`
    pub sql:        String,
    pub danger:     DangerReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
    pub warnings:   Vec<String>
}

/// Classifier, validator and the policy applied to their reports
#[derive(Debug, Clone)]
pub struct Guard {
    classifier:     DangerClassifier,
    validator:      SchemaValidator,
    action:         DangerAction,
    reject_unknown: bool,
    savepoint_name: String
}

impl Default for Guard {
    fn default() -> Self {
        Self::new(DangerClassifier::default(), SchemaValidator::default())
    }
}

impl Guard {
    /// Guard with the blocking defaults
    pub fn new(classifier: DangerClassifier, validator: SchemaValidator) -> Self {
        Self {
            classifier,
            validator,
            action: DangerAction::default(),
            reject_unknown: true,
            savepoint_name: DEFAULT_SAVEPOINT.to_string()
        }
    }

    pub fn with_action(mut self, action: DangerAction) -> Self {
        self.action = action;
        self
    }

    pub fn with_reject_unknown(mut self, reject: bool) -> Self {
        self.reject_unknown = reject;
        self
    }

    pub fn with_savepoint_name(mut self, name: impl Into<String>) -> Self {
        self.savepoint_name = name.into();
        self
    }

    pub fn action(&self) -> DangerAction {
        self.action
    }

    pub fn classifier(&self) -> &DangerClassifier {
        &self.classifier
    }

    /// Classify `sql`, then validate it against `schema` unless already blocked.
    ///
    /// # Errors
    ///
    /// Returns an input error for empty SQL
    ///
    /// ```
    /// use schema_guard::guard::{Guard, Verdict};
    ///
    /// let guard = Guard::default();
    /// assert_eq!(guard.check("DROP TABLE users", None).unwrap().verdict, Verdict::Blocked);
    /// assert_eq!(guard.check("SELECT 1", None).unwrap().verdict, Verdict::Allowed);
    /// assert!(guard.check("   ", None).is_err());
    /// ```
    pub fn check(&self, sql: &str, schema: Option<&SchemaSnapshot>) -> AppResult<GuardDecision> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(input_error("SQL text is empty"));
        }
        let danger = self.classifier.classify(sql);
        let mut warnings = Vec::new();
        if danger.blocked {
            if self.action == DangerAction::Block {
                tracing::info!(keywords = ?danger.matched_keywords, "blocked dangerous statement");
                return Ok(GuardDecision {
                    verdict: Verdict::Blocked,
                    sql: sql.to_string(),
                    danger,
                    validation: None,
                    warnings
                });
            }
            if let Some(reason) = &danger.reason {
                warnings.push(reason.clone());
            }
        }
        let validation = schema.map(|s| self.validator.validate(s, sql));
        let mut verdict = if warnings.is_empty() {
            Verdict::Allowed
        } else {
            Verdict::Warn
        };
        if let Some(report) = validation.as_ref().filter(|r| !r.ok) {
            warnings.push(format!(
                "Unknown table/column references: {}",
                report.unknown.join(", ")
            ));
            verdict = if self.reject_unknown {
                Verdict::Blocked
            } else {
                Verdict::Warn
            };
        }
        let sql = if danger.blocked && self.action == DangerAction::Wrap {
            wrap_with_savepoint(sql, &self.savepoint_name)
        } else {
            sql.to_string()
        };
        tracing::debug!(?verdict, warnings = warnings.len(), "guard decision");
        Ok(GuardDecision {
            verdict,
            sql,
            danger,
            validation,
            warnings
        })
    }

    /// Check every statement of a script, in script order
    ///
    /// # Errors
    ///
    /// Returns an input error when the script holds no statement
    pub fn check_batch(
        &self,
        script: &str,
        schema: Option<&SchemaSnapshot>
    ) -> AppResult<Vec<GuardDecision>> {
        let statements = split_statements(script);
        if statements.is_empty() {
            return Err(input_error("SQL text is empty"));
        }
        statements
            .par_iter()
            .map(|stmt| self.check(stmt, schema))
            .collect()
    }
}

/// Wrap `sql` in a savepoint that is rolled back before commit.
///
/// ```
/// use schema_guard::guard::wrap_with_savepoint;
///
/// let wrapped = wrap_with_savepoint("DELETE FROM t;", "ai_guard");
/// assert_eq!(
///     wrapped,
///     "BEGIN;\nSAVEPOINT ai_guard;\nDELETE FROM t;\nROLLBACK TO SAVEPOINT ai_guard;\nCOMMIT;"
/// );
/// ```
pub fn wrap_with_savepoint(sql: &str, savepoint: &str) -> String {
    let sql = sql.trim();
    let terminated = if sql.ends_with(';') {
        sql.to_string()
    } else {
        format!("{};", sql)
    };
    [
        "BEGIN;".to_string(),
        format!("SAVEPOINT {};", savepoint),
        terminated,
        format!("ROLLBACK TO SAVEPOINT {};", savepoint),
        "COMMIT;".to_string()
    ]
    .join("\n")
}

/// Worst verdict of a batch
pub fn overall_verdict(decisions: &[GuardDecision]) -> Verdict {
    decisions
        .iter()
        .map(|d| d.verdict)
        .max_by_key(|v| v.exit_code())
        .unwrap_or(Verdict::Allowed)
}
