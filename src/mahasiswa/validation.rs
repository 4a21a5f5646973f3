use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use super::dto::MahasiswaPayload;
use super::repo_types::{NewMahasiswa, UniqueField};

pub const NAMA_MAX: usize = 255;
pub const NIM_MAX: usize = 20;
pub const EMAIL_MAX: usize = 255;
pub const JURUSAN_MAX: usize = 255;

/// Field name -> violations for that field, in rule order.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<&'static str, Vec<String>>);

impl ValidationErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn add_taken(&mut self, field: UniqueField) {
        self.add(field.as_str(), format!("The {field} has already been taken."));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[derive(Clone, Copy)]
enum Rule {
    Text,
    Email,
}

/// Checks every field of the payload and returns the cleaned field set, or
/// all violations found. Uniqueness is not checked here.
pub fn validate(payload: &MahasiswaPayload) -> Result<NewMahasiswa, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let nama = check(&mut errors, "nama", payload.nama.as_ref(), Rule::Text, NAMA_MAX);
    let nim = check(&mut errors, "nim", payload.nim.as_ref(), Rule::Text, NIM_MAX);
    let email = check(&mut errors, "email", payload.email.as_ref(), Rule::Email, EMAIL_MAX);
    let jurusan = check(&mut errors, "jurusan", payload.jurusan.as_ref(), Rule::Text, JURUSAN_MAX);

    match (nama, nim, email, jurusan) {
        (Some(nama), Some(nim), Some(email), Some(jurusan)) if errors.is_empty() => {
            Ok(NewMahasiswa { nama, nim, email, jurusan })
        }
        _ => Err(errors),
    }
}

/// The trimmed `nim` and `email` strings worth checking for collisions, even
/// when the rest of the payload is invalid.
pub fn unique_candidates(payload: &MahasiswaPayload) -> (Option<&str>, Option<&str>) {
    (present(payload.nim.as_ref()), present(payload.email.as_ref()))
}

fn present(value: Option<&Value>) -> Option<&str> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim()),
        _ => None,
    }
}

fn check(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: Option<&Value>,
    rule: Rule,
    max: usize,
) -> Option<String> {
    let s = match value {
        None | Some(Value::Null) => {
            errors.add(field, format!("The {field} field is required."));
            return None;
        }
        Some(Value::String(s)) => s.trim(),
        Some(_) => {
            let msg = match rule {
                Rule::Text => format!("The {field} field must be a string."),
                Rule::Email => format!("The {field} field must be a valid email address."),
            };
            errors.add(field, msg);
            return None;
        }
    };

    if s.is_empty() {
        errors.add(field, format!("The {field} field is required."));
        return None;
    }

    let mut ok = true;
    if matches!(rule, Rule::Email) && !is_valid_email(s) {
        errors.add(field, format!("The {field} field must be a valid email address."));
        ok = false;
    }
    if s.chars().count() > max {
        errors.add(
            field,
            format!("The {field} field must not be greater than {max} characters."),
        );
        ok = false;
    }
    ok.then(|| s.to_string())
}
