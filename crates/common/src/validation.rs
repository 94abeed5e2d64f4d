//! Rule-based form validation.
//!
//! A [`FormValidator`] holds an ordered list of per-field rules. Checks run in
//! the order required, minimum length, maximum length, pattern; the first
//! failing check is the one reported for that field.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use regex::Regex;
use serde::Serialize;
use validator::{ValidateLength, ValidateRegex};

use crate::error::{AppError, AppResult};

/// Map of field name to its first validation message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    /// Record a message unless the field already has one.
    pub fn insert_first(&mut self, field: &str, message: String) {
        self.0.entry(field.to_string()).or_insert(message);
    }

    /// Message recorded for a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Whether no field failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of failing fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over `(field, message)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

/// Rules for a single field.
#[derive(Debug, Clone, Default)]
pub struct FieldRule {
    required: bool,
    min_length: Option<usize>,
    max_length: Option<usize>,
    pattern: Option<Regex>,
    label: Option<String>,
    message: Option<String>,
}

impl FieldRule {
    /// A rule with no checks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject missing or blank values.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Minimum length in characters.
    #[must_use]
    pub const fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    /// Maximum length in characters.
    #[must_use]
    pub const fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    /// Pattern the value must match, with the message shown when it does not.
    #[must_use]
    pub fn pattern(mut self, pattern: Regex, message: impl Into<String>) -> Self {
        self.pattern = Some(pattern);
        self.message = Some(message.into());
        self
    }

    /// Human-readable field name used in messages.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    fn check(&self, field: &str, value: Option<&str>) -> Option<String> {
        let label = self.label.as_deref().unwrap_or(field);
        let value = value.unwrap_or_default();

        if value.trim().is_empty() {
            return self.required.then(|| format!("{label} is required"));
        }

        // Lengths count characters.
        if let Some(min) = self.min_length {
            if !value.validate_length(Some(min as u64), None, None) {
                return Some(format!("{label} must be at least {min} characters"));
            }
        }
        if let Some(max) = self.max_length {
            if !value.validate_length(None, Some(max as u64), None) {
                return Some(format!("{label} must be no more than {max} characters"));
            }
        }

        match &self.pattern {
            Some(pattern) if !value.validate_regex(pattern) => Some(
                self.message
                    .clone()
                    .unwrap_or_else(|| format!("{label} is invalid")),
            ),
            _ => None,
        }
    }
}

/// Outcome of validating a form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    /// First error per failing field.
    pub errors: FieldErrors,
}

impl ValidationResult {
    /// Whether every field passed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Convert into a result, failing with [`AppError::Validation`].
    pub fn into_result(self) -> AppResult<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(AppError::Validation(self.errors))
        }
    }
}

/// Ordered set of field rules.
#[derive(Debug, Clone, Default)]
pub struct FormValidator {
    rules: Vec<(String, FieldRule)>,
}

impl FormValidator {
    /// An empty validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule for a field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
        self.rules.push((name.into(), rule));
        self
    }

    /// Validate values produced by a field lookup.
    pub fn validate<'a, F>(&self, lookup: F) -> ValidationResult
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let mut errors = FieldErrors::default();
        for (field, rule) in &self.rules {
            if let Some(message) = rule.check(field, lookup(field)) {
                errors.insert_first(field, message);
            }
        }
        ValidationResult { errors }
    }

    /// Validate a map of submitted form values.
    #[must_use]
    pub fn validate_map(&self, data: &HashMap<String, String>) -> ValidationResult {
        self.validate(|field| data.get(field).map(String::as_str))
    }
}
