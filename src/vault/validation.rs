//! Stateless credential scoring.
//!
//! Every credential starts at 100 and loses points per issue.  Errors make
//! the credential invalid; warnings only cost points.  Type-specific checks
//! are pluggable `TypeRule`s registered per `CredentialType`.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use regex::Regex;

use super::credential::{Credential, CredentialType, ValidationResult};

/// Starting score for every validation run.
pub const PERFECT_SCORE: i32 = 100;

const MISSING_NAME_PENALTY: i32 = 20;
const MISSING_VALUE_PENALTY: i32 = 30;
const EXPIRED_PENALTY: i32 = 50;
const EXPIRING_SOON_PENALTY: i32 = 15;
const UNENCRYPTED_PENALTY: i32 = 20;

/// Window in which an upcoming expiry produces a warning.
pub fn expiry_warning_window() -> Duration {
    Duration::days(7)
}

/// A per-type check that may add warnings or errors to a result.
pub trait TypeRule: Send + Sync {
    fn check(&self, credential: &Credential, result: &mut ValidationResult);
}

/// Warn when the value is shorter than `min_len` characters.
pub struct MinLength {
    pub min_len: usize,
    pub penalty: i32,
    pub message: String,
}

impl TypeRule for MinLength {
    fn check(&self, credential: &Credential, result: &mut ValidationResult) {
        if credential.value.chars().count() < self.min_len {
            warn(result, &self.message, self.penalty);
        }
    }
}

/// Warn when the value starts with none of the accepted prefixes.
pub struct PrefixRule {
    pub prefixes: Vec<String>,
    pub penalty: i32,
    pub message: String,
}

impl TypeRule for PrefixRule {
    fn check(&self, credential: &Credential, result: &mut ValidationResult) {
        if !self
            .prefixes
            .iter()
            .any(|prefix| credential.value.starts_with(prefix.as_str()))
        {
            warn(result, &self.message, self.penalty);
        }
    }
}

/// Warn when the value does not match a regular expression.
pub struct PatternRule {
    pub pattern: Regex,
    pub penalty: i32,
    pub message: String,
}

impl TypeRule for PatternRule {
    fn check(&self, credential: &Credential, result: &mut ValidationResult) {
        if !self.pattern.is_match(&credential.value) {
            warn(result, &self.message, self.penalty);
        }
    }
}

/// The validation engine.
pub struct Validator {
    encryption_required: bool,
    rules: HashMap<CredentialType, Vec<Box<dyn TypeRule>>>,
}

impl Validator {
    /// An engine with the default per-type rules.
    pub fn new(encryption_required: bool) -> Self {
        let mut validator = Self::without_rules(encryption_required);
        validator.register(
            CredentialType::ApiKey,
            MinLength {
                min_len: 20,
                penalty: 10,
                message: "API key appears to be too short".into(),
            },
        );
        validator.register(
            CredentialType::Token,
            PrefixRule {
                prefixes: vec!["sk-".into(), "Bearer ".into()],
                penalty: 5,
                message: "token format may be incorrect".into(),
            },
        );
        validator
    }

    /// An engine with only the generic checks.
    pub fn without_rules(encryption_required: bool) -> Self {
        Self {
            encryption_required,
            rules: HashMap::new(),
        }
    }

    /// Add a rule for `kind`; rules run in registration order.
    pub fn register(&mut self, kind: CredentialType, rule: impl TypeRule + 'static) {
        self.rules.entry(kind).or_default().push(Box::new(rule));
    }

    /// Drop every rule registered for `kind`.
    pub fn clear_rules(&mut self, kind: CredentialType) {
        self.rules.remove(&kind);
    }

    pub fn encryption_required(&self) -> bool {
        self.encryption_required
    }

    /// Score `credential`. Performs no I/O.
    pub fn validate(&self, credential: &Credential) -> ValidationResult {
        let now = Utc::now();
        let mut result = ValidationResult {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            score: PERFECT_SCORE,
            expires_in: None,
            last_tested: now,
        };

        if credential.name.is_empty() {
            fail(&mut result, "credential name is required", MISSING_NAME_PENALTY);
        }
        if credential.value.is_empty() {
            fail(&mut result, "credential value is required", MISSING_VALUE_PENALTY);
        }

        if let Some(rules) = self.rules.get(&credential.kind) {
            for rule in rules {
                rule.check(credential, &mut result);
            }
        }

        if let Some(expires_at) = credential.expires_at {
            if expires_at < now {
                fail(&mut result, "credential has expired", EXPIRED_PENALTY);
            } else {
                let remaining = expires_at - now;
                result.expires_in = Some(remaining);
                if remaining < expiry_warning_window() {
                    warn(
                        &mut result,
                        "credential expires within 7 days",
                        EXPIRING_SOON_PENALTY,
                    );
                }
            }
        }

        if self.encryption_required && !credential.encrypted {
            warn(&mut result, "credential is not encrypted", UNENCRYPTED_PENALTY);
        }

        result
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(true)
    }
}

fn fail(result: &mut ValidationResult, message: &str, penalty: i32) {
    result.errors.push(message.to_string());
    result.is_valid = false;
    result.score -= penalty;
}

fn warn(result: &mut ValidationResult, message: &str, penalty: i32) {
    result.warnings.push(message.to_string());
    result.score -= penalty;
}
