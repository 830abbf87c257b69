//! Client-side form validation.
//!
//! SYSTEM CONTEXT
//! ==============
//! Login and signup input is checked here before any request is built, so an
//! obviously bad form never costs a network round-trip. Each rule is a plain
//! function returning its rejection message, or `None` when the input passes.
//! `ValidationPolicy` collects the rules into a table so a form can run with
//! different rules without its call sites changing.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

pub const NAME_TOO_SHORT: &str = "Name must be at least 2 characters long.";
pub const EMAIL_INVALID: &str = "Invalid email address.";
pub const PASSWORD_REQUIRED: &str = "Password is required.";
pub const PASSWORD_WEAK: &str = "Password must be 8-16 characters long and include at least \
     1 uppercase letter, 1 lowercase letter, 1 number, and 1 special character.";

const NAME_MIN_CHARS: usize = 2;
const PASSWORD_MIN_CHARS: usize = 8;
const PASSWORD_MAX_CHARS: usize = 16;
const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

static EMAIL_SHAPE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(EMAIL_PATTERN).ok());

/// A single field rule: `Some(reason)` rejects, `None` accepts.
pub type Rule = fn(&str) -> Option<&'static str>;

#[must_use]
pub fn validate_name(name: &str) -> Option<&'static str> {
    if name.trim().chars().count() < NAME_MIN_CHARS {
        return Some(NAME_TOO_SHORT);
    }
    None
}

/// Structural shape check only, not RFC 5322.
#[must_use]
pub fn validate_email(email: &str) -> Option<&'static str> {
    let shaped = EMAIL_SHAPE.as_ref().is_some_and(|regex| regex.is_match(email));
    if email.is_empty() || !shaped {
        return Some(EMAIL_INVALID);
    }
    None
}

/// 8-16 characters with a lowercase letter, an uppercase letter, a digit, and a
/// symbol. Anything outside `[A-Za-z0-9]` counts as a symbol, underscore included.
#[must_use]
pub fn validate_password(password: &str) -> Option<&'static str> {
    if password.is_empty() {
        return Some(PASSWORD_REQUIRED);
    }

    let length = password.chars().count();
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password.chars().any(|c| !c.is_ascii_alphanumeric());

    let length_ok = (PASSWORD_MIN_CHARS..=PASSWORD_MAX_CHARS).contains(&length);
    if !(length_ok && has_lower && has_upper && has_digit && has_symbol) {
        return Some(PASSWORD_WEAK);
    }
    None
}

// =============================================================================
// FORMS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Name,
    Email,
    Password,
}

impl Field {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Password => "password",
        }
    }
}

/// Raw form input. A field left as `None` is not part of the form and is skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormFields<'a> {
    pub name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub password: Option<&'a str>,
}

impl<'a> FormFields<'a> {
    #[must_use]
    pub fn login(email: &'a str, password: &'a str) -> Self {
        Self { name: None, email: Some(email), password: Some(password) }
    }

    #[must_use]
    pub fn signup(name: &'a str, email: &'a str, password: &'a str) -> Self {
        Self { name: Some(name), email: Some(email), password: Some(password) }
    }
}

/// Per-field verdicts for one form submission.
///
/// `general` carries a whole-form message (e.g. a failed network call) set by
/// the caller after submission; it does not change `valid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormValidation {
    pub valid: bool,
    pub errors: BTreeMap<Field, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub general: Option<String>,
}

impl FormValidation {
    /// A form with no field errors.
    #[must_use]
    pub fn accepted() -> Self {
        Self { valid: true, errors: BTreeMap::new(), general: None }
    }

    #[must_use]
    pub fn error(&self, field: Field) -> Option<&str> {
        self.errors.get(&field).map(String::as_str)
    }

    #[must_use]
    pub fn with_general(mut self, message: impl Into<String>) -> Self {
        self.general = Some(message.into());
        self
    }
}

impl fmt::Display for FormValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, reason) in &self.errors {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {reason}", field.as_str())?;
            first = false;
        }
        if let Some(general) = &self.general {
            if !first {
                f.write_str("; ")?;
            }
            f.write_str(general)?;
        }
        Ok(())
    }
}

/// Function table of field rules.
#[derive(Debug, Clone, Copy)]
pub struct ValidationPolicy {
    pub name: Rule,
    pub email: Rule,
    pub password: Rule,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self { name: validate_name, email: validate_email, password: validate_password }
    }
}

impl ValidationPolicy {
    /// Run every rule whose field is present. Never fails; only classifies.
    #[must_use]
    pub fn validate(&self, fields: &FormFields<'_>) -> FormValidation {
        let checks = [
            (Field::Name, fields.name, self.name),
            (Field::Email, fields.email, self.email),
            (Field::Password, fields.password, self.password),
        ];

        let mut errors = BTreeMap::new();
        for (field, value, rule) in checks {
            let Some(value) = value else {
                continue;
            };
            if let Some(reason) = rule(value) {
                errors.insert(field, reason.to_owned());
            }
        }

        FormValidation { valid: errors.is_empty(), errors, general: None }
    }
}

/// Validate with the default rules.
#[must_use]
pub fn validate_form(fields: &FormFields<'_>) -> FormValidation {
    ValidationPolicy::default().validate(fields)
}

#[cfg(test)]
#[path = "validation_test.rs"]
mod tests;
