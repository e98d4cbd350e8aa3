//! Client-side form validation.
//!
//! Forms are checked before anything is sent; a failure is a field → message
//! map the form renders next to its inputs. A passing draft is normalized into
//! the create payload (trimmed, blanks dropped, PAN upper-cased).

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::models::{ClientCreate, EntityType, LoanType, ProjectCreate};

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

static PAN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{5}[0-9]{4}[A-Z]$").unwrap());

/// Field name → message. Empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
#[error("Validation failed: {}", summary(.0))]
pub struct ValidationErrors(pub BTreeMap<&'static str, &'static str>);

fn summary(errors: &BTreeMap<&'static str, &'static str>) -> String {
    errors
        .iter()
        .map(|(field, msg)| format!("{field}: {msg}"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ValidationErrors {
    pub fn get(&self, field: &str) -> Option<&'static str> {
        self.0.get(field).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn add(&mut self, field: &'static str, message: &'static str) {
        self.0.insert(field, message);
    }

    fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

/// Raw client form input.
#[derive(Debug, Clone, Default)]
pub struct ClientDraft {
    pub name: String,
    pub entity_type: Option<EntityType>,
    pub pan: String,
    pub gst: String,
    pub contact_person: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// PAN check is case-insensitive: the value is upper-cased first.
pub fn is_valid_pan(pan: &str) -> bool {
    PAN_PATTERN.is_match(&pan.to_uppercase())
}

pub fn validate_client(draft: &ClientDraft) -> Result<ClientCreate, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let name = draft.name.trim();
    if name.is_empty() {
        errors.add("name", "Name is required");
    }
    if draft.entity_type.is_none() {
        errors.add("entity_type", "Entity type is required");
    }
    let email = non_blank(&draft.email);
    if email.as_deref().is_some_and(|e| !is_valid_email(e)) {
        errors.add("email", "Invalid email format");
    }
    let pan = non_blank(&draft.pan).map(|p| p.to_uppercase());
    if pan.as_deref().is_some_and(|p| !is_valid_pan(p)) {
        errors.add("pan", "Invalid PAN format");
    }

    let Some(entity_type) = draft.entity_type else {
        return Err(errors);
    };
    errors.into_result(ClientCreate {
        name: name.to_string(),
        entity_type,
        pan,
        gst: non_blank(&draft.gst).map(|g| g.to_uppercase()),
        contact_person: non_blank(&draft.contact_person),
        email,
        phone: non_blank(&draft.phone),
        address: non_blank(&draft.address),
    })
}

/// Raw new-project form input.
#[derive(Debug, Clone, Default)]
pub struct ProjectDraft {
    pub client_id: String,
    pub financial_year: String,
    pub bank_name: String,
    pub loan_type: Option<LoanType>,
    pub loan_amount: Option<f64>,
}

pub fn validate_project(draft: &ProjectDraft) -> Result<ProjectCreate, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let client_id = draft.client_id.trim();
    if client_id.is_empty() {
        errors.add("client_id", "Please select a client");
    }
    let financial_year = draft.financial_year.trim();
    if financial_year.is_empty() {
        errors.add("financial_year", "Financial year is required");
    }

    errors.into_result(ProjectCreate {
        client_id: client_id.to_string(),
        financial_year: financial_year.to_string(),
        bank_name: non_blank(&draft.bank_name),
        loan_type: draft.loan_type.map(|t| t.as_str().to_string()),
        loan_amount: draft.loan_amount,
    })
}

/// Selectable financial years: the current Indian FY (April to March) and
/// the two before it, newest first, as `YYYY-YY`.
pub fn financial_years(today: NaiveDate) -> [String; 3] {
    let start = if today.month() >= 4 {
        today.year()
    } else {
        today.year() - 1
    };
    std::array::from_fn(|i| {
        let y = start - i as i32;
        format!("{y}-{:02}", (y + 1).rem_euclid(100))
    })
}
