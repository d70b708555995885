//! Field-by-field request validation.
//!
//! Checks append to a [`Validator`] instead of returning on the first
//! failure, so a client gets every problem with its payload in one response.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) -> &mut Self {
        if !ok {
            self.errors.push(FieldError::new(field, message));
        }
        self
    }

    pub fn required(&mut self, value: &str, field: &str, max_len: usize) -> &mut Self {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.errors
                .push(FieldError::new(field, &format!("{} is required", label(field))));
        } else if trimmed.chars().count() > max_len {
            self.errors.push(FieldError::new(
                field,
                &format!("{} must be at most {} characters", label(field), max_len),
            ));
        }
        self
    }

    pub fn max_len(&mut self, value: &str, field: &str, max_len: usize) -> &mut Self {
        if value.chars().count() > max_len {
            self.errors.push(FieldError::new(
                field,
                &format!("{} must be at most {} characters", label(field), max_len),
            ));
        }
        self
    }

    pub fn result(&mut self) -> Result<(), AppError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(std::mem::take(&mut self.errors)))
        }
    }
}

fn label(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>().replace('_', " "),
        None => String::new(),
    }
}

pub fn is_valid_username(username: &str) -> bool {
    static USERNAME_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = USERNAME_REGEX
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9_]{3,32}$").expect("Failed to compile username regex"));
    regex.is_match(username)
}

pub fn is_valid_email(email: &str) -> bool {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });
    email.len() <= 254 && regex.is_match(email)
}

/// E.164: a plus sign followed by up to fifteen digits.
pub fn is_valid_phone(phone: &str) -> bool {
    static PHONE_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = PHONE_REGEX
        .get_or_init(|| Regex::new(r"^\+[1-9][0-9]{6,14}$").expect("Failed to compile phone regex"));
    regex.is_match(phone)
}

pub fn is_valid_currency(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic())
}

/// Push topic names as accepted by FCM.
pub fn is_valid_topic(topic: &str) -> bool {
    static TOPIC_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = TOPIC_REGEX
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9_.~%-]{1,900}$").expect("Failed to compile topic regex"));
    regex.is_match(topic)
}
