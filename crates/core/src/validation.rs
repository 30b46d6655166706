use serde::{Deserialize, Serialize};

use crate::config::QuotingConfig;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationViolation {
    pub code: String,
    pub message: String,
    pub suggestion: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub violations: Vec<ValidationViolation>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self { valid: true, violations: Vec::new() }
    }
}

impl ValidationResult {
    fn push(&mut self, code: &str, message: String, suggestion: Option<&str>) {
        self.valid = false;
        self.violations.push(ValidationViolation {
            code: code.to_owned(),
            message,
            suggestion: suggestion.map(str::to_owned),
        });
    }

    /// Turns an invalid result into the aggregate domain error carrying
    /// every violated rule.
    pub fn into_domain_result(self) -> Result<(), DomainError> {
        if self.valid {
            Ok(())
        } else {
            Err(DomainError::Validation { violations: self.violations })
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoxLineInput {
    pub length_mm: u32,
    pub width_mm: u32,
    pub height_mm: u32,
    pub quantity: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ContactInput<'a> {
    pub requester_name: &'a str,
    pub requester_email: &'a str,
    pub requester_phone: Option<&'a str>,
}

/// Checks every line against the configured dimension and quantity rules.
/// All violations are collected; nothing short-circuits.
pub fn validate_box_lines(lines: &[BoxLineInput], limits: &QuotingConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    if lines.is_empty() {
        result.push(
            "EMPTY_QUOTE",
            "quote must contain at least one box line".to_owned(),
            Some("Add at least one box specification to continue"),
        );
        return result;
    }

    if lines.len() > limits.max_lines_per_quote as usize {
        result.push(
            "TOO_MANY_LINES",
            format!(
                "quote has {} lines; the maximum is {}",
                lines.len(),
                limits.max_lines_per_quote
            ),
            Some("Split the request into multiple quotes"),
        );
    }

    for (index, line) in lines.iter().enumerate() {
        let position = index + 1;
        for (axis, value) in
            [("length", line.length_mm), ("width", line.width_mm), ("height", line.height_mm)]
        {
            if value < limits.min_dimension_mm {
                result.push(
                    "DIMENSION_BELOW_MINIMUM",
                    format!(
                        "line {position}: {axis} {value}mm is below the {}mm minimum",
                        limits.min_dimension_mm
                    ),
                    None,
                );
            }
            if value > limits.max_dimension_mm {
                result.push(
                    "DIMENSION_ABOVE_MAXIMUM",
                    format!(
                        "line {position}: {axis} {value}mm exceeds the {}mm maximum",
                        limits.max_dimension_mm
                    ),
                    None,
                );
            }
        }

        if line.quantity == 0 {
            result.push(
                "ZERO_QUANTITY",
                format!("line {position}: quantity must be at least 1"),
                Some("Use a positive integer quantity"),
            );
        }
    }

    result
}

/// Contact fields are mandatory only when the visitor asked to be contacted;
/// a silent price view (lead) carries whatever the visitor typed.
pub fn validate_contact(contact: &ContactInput<'_>, requested_contact: bool) -> ValidationResult {
    let mut result = ValidationResult::default();
    if !requested_contact {
        return result;
    }

    if contact.requester_name.trim().is_empty() {
        result.push(
            "MISSING_REQUESTER_NAME",
            "requester name is required when contact is requested".to_owned(),
            None,
        );
    }

    let email = contact.requester_email.trim();
    if email.is_empty() || !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        result.push(
            "INVALID_REQUESTER_EMAIL",
            format!("requester email `{email}` is not a usable address"),
            Some("Provide an email with a local part and a domain"),
        );
    }

    if contact.requester_phone.map(str::trim).unwrap_or_default().is_empty() {
        result.push(
            "MISSING_REQUESTER_PHONE",
            "requester phone is required when contact is requested".to_owned(),
            None,
        );
    }

    result
}

pub fn validate_distance(distance_km: Option<u32>, limits: &QuotingConfig) -> ValidationResult {
    let mut result = ValidationResult::default();
    if let Some(distance) = distance_km {
        if distance > limits.max_distance_km {
            result.push(
                "DISTANCE_OUT_OF_RANGE",
                format!(
                    "distance {distance}km exceeds the serviceable {}km radius",
                    limits.max_distance_km
                ),
                None,
            );
        }
    }
    result
}

/// Merges several partial results into one aggregate outcome.
pub fn merge(results: impl IntoIterator<Item = ValidationResult>) -> ValidationResult {
    let mut merged = ValidationResult::default();
    for result in results {
        if !result.valid {
            merged.valid = false;
            merged.violations.extend(result.violations);
        }
    }
    merged
}
