use lazy_static::lazy_static;
use regex::Regex;

use crate::accounts::errors::FieldErrors;

pub const MIN_PASSWORD_LEN: usize = 5;
pub const MAX_FIELD_LEN: usize = 255;

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";
pub const INVALID_EMAIL: &str = "Enter a valid email address.";
pub const DUPLICATE_EMAIL: &str = "user with this email already exists.";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn too_long(max: usize) -> String {
    format!("Ensure this field has no more than {} characters.", max)
}

/// Validate an already normalized email. Returns whether it is usable.
pub fn check_email(email: Option<&str>, errors: &mut FieldErrors) -> bool {
    match email {
        None => errors.add("email", REQUIRED),
        Some("") => errors.add("email", BLANK),
        Some(e) if e.chars().count() > MAX_FIELD_LEN => errors.add("email", too_long(MAX_FIELD_LEN)),
        Some(e) if !is_valid_email(e) => errors.add("email", INVALID_EMAIL),
        Some(_) => return true,
    }
    false
}

/// Surrounding whitespace doesn't count towards the minimum length; the
/// password itself is stored as supplied.
pub fn check_password(password: Option<&str>, errors: &mut FieldErrors) -> bool {
    match password.map(str::trim) {
        None => errors.add("password", REQUIRED),
        Some("") => errors.add("password", BLANK),
        Some(p) if p.chars().count() < MIN_PASSWORD_LEN => errors.add(
            "password",
            format!(
                "Ensure this field has at least {} characters.",
                MIN_PASSWORD_LEN
            ),
        ),
        Some(_) => return true,
    }
    false
}

/// Validate an already trimmed name.
pub fn check_name(name: Option<&str>, errors: &mut FieldErrors) -> bool {
    match name {
        None => errors.add("name", REQUIRED),
        Some("") => errors.add("name", BLANK),
        Some(n) if n.chars().count() > MAX_FIELD_LEN => errors.add("name", too_long(MAX_FIELD_LEN)),
        Some(_) => return true,
    }
    false
}
