use chrono::{Datelike, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::{
    CONNECTIVES, CPF_LEN, LABEL_MAX_LEN, LABEL_MIN_LEN, MIN_AGE_YEARS, NAME_MIN_LEN,
    PASSWORD_MIN_LEN,
};
use crate::error::{AppError, Result};

// Letters (accented included) and spaces only
static LETTERS_AND_SPACES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-zÀ-ÿ ]+$").unwrap());
static HAS_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d").unwrap());
static HAS_UPPERCASE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Z]").unwrap());
static HAS_SPECIAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[!@#$%^&*(),.?":{}|<>]"#).unwrap());
static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// Formats a label by title-casing each word, except connective words which
/// stay lowercase unless they lead the phrase. Words are joined with single
/// spaces, so the function is idempotent and safe to apply to values that
/// were already formatted.
pub fn format_with_connectives(text: &str) -> String {
    text.split_whitespace()
        .enumerate()
        .map(|(i, word)| {
            let lower = word.to_lowercase();
            if i != 0 && CONNECTIVES.contains(&lower.as_str()) {
                lower
            } else {
                capitalize(&lower)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Validates a CPF and returns its digits-only form.
pub fn validate_cpf(cpf: &str) -> Result<String> {
    let digits: String = cpf.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.len() != CPF_LEN {
        return Err(AppError::Unprocessable(
            "CPF must contain exactly 11 numeric digits.".to_string(),
        ));
    }

    let nums: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();

    // Values like "11111111111" pass the check-digit math but are not valid
    if nums.iter().all(|&n| n == nums[0]) {
        return Err(AppError::Unprocessable(
            "The CPF provided is not valid.".to_string(),
        ));
    }

    let sum: u32 = (0..9).map(|i| nums[i] * (10 - i as u32)).sum();
    let mut digit1 = (sum * 10) % 11;
    if digit1 == 10 {
        digit1 = 0;
    }

    let sum: u32 = (0..10).map(|i| nums[i] * (11 - i as u32)).sum();
    let mut digit2 = (sum * 10) % 11;
    if digit2 == 10 {
        digit2 = 0;
    }

    if digit1 != nums[9] || digit2 != nums[10] {
        return Err(AppError::Unprocessable(
            "The CPF provided is not valid.".to_string(),
        ));
    }

    Ok(digits)
}

/// Validates a name field and returns it formatted with the connective rule.
pub fn validate_name(field: &str, value: &str) -> Result<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty.")));
    }

    if value.chars().count() < NAME_MIN_LEN {
        return Err(AppError::Validation(format!(
            "{field} must have at least {NAME_MIN_LEN} characters."
        )));
    }

    if !LETTERS_AND_SPACES.is_match(value) {
        return Err(AppError::Unprocessable(format!(
            "{field} must contain only letters and spaces."
        )));
    }

    Ok(format_with_connectives(value))
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(AppError::Validation(format!(
            "Password must have at least {PASSWORD_MIN_LEN} characters."
        )));
    }
    if !HAS_DIGIT.is_match(password) {
        return Err(AppError::Validation(
            "Password must contain at least one number.".to_string(),
        ));
    }
    if !HAS_UPPERCASE.is_match(password) {
        return Err(AppError::Validation(
            "Password must contain at least one uppercase letter.".to_string(),
        ));
    }
    if !HAS_SPECIAL.is_match(password) {
        return Err(AppError::Validation(
            "Password must contain at least one special character.".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<String> {
    let email = email.trim();
    if !EMAIL.is_match(email) {
        return Err(AppError::Unprocessable(
            "The email address is not valid.".to_string(),
        ));
    }
    Ok(email.to_lowercase())
}

/// Participants must be at least 12 years old.
pub fn validate_birth_date(birth_date: NaiveDate) -> Result<()> {
    let today = Utc::now().date_naive();
    let mut age = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    if age < MIN_AGE_YEARS {
        return Err(AppError::Validation(format!(
            "Participants under {MIN_AGE_YEARS} years old cannot register."
        )));
    }
    Ok(())
}

/// Validates a single free-text catalog label. An empty or whitespace-only
/// value returns an empty string so callers can treat it as absent.
pub fn validate_custom_label(field: &str, label: &str) -> Result<String> {
    if label.trim().is_empty() {
        return Ok(String::new());
    }

    if !LETTERS_AND_SPACES.is_match(label.trim()) {
        return Err(AppError::Unprocessable(format!(
            "The '{field}' field must contain only letters and spaces."
        )));
    }

    let formatted = format_with_connectives(label);

    let len = formatted.chars().count();
    if !(LABEL_MIN_LEN..=LABEL_MAX_LEN).contains(&len) {
        return Err(AppError::Validation(format!(
            "The '{field}' field must have between {LABEL_MIN_LEN} and {LABEL_MAX_LEN} characters."
        )));
    }

    Ok(formatted)
}

/// Validates the list of custom specific-need labels. Entries must be
/// non-empty; each is returned formatted with the connective rule.
pub fn validate_custom_needs(labels: &[String]) -> Result<Vec<String>> {
    for label in labels {
        let trimmed = label.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "Custom specific-need names cannot be empty.".to_string(),
            ));
        }
        if !LETTERS_AND_SPACES.is_match(trimmed) {
            return Err(AppError::Unprocessable(
                "Each custom specific need must contain only letters and spaces.".to_string(),
            ));
        }
        let len = trimmed.chars().count();
        if !(LABEL_MIN_LEN..=LABEL_MAX_LEN).contains(&len) {
            return Err(AppError::Validation(format!(
                "Each custom specific need must have between {LABEL_MIN_LEN} and {LABEL_MAX_LEN} characters."
            )));
        }
    }

    Ok(labels
        .iter()
        .map(|label| format_with_connectives(label.trim()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_connectives_lowercase_except_leading() {
        assert_eq!(
            format_with_connectives("master of the arts"),
            "Master of the Arts"
        );
        assert_eq!(format_with_connectives("of age"), "Of Age");
        assert_eq!(format_with_connectives("  teacher "), "Teacher");
        assert_eq!(
            format_with_connectives("head AND shoulders"),
            "Head and Shoulders"
        );
    }

    #[test]
    fn formatting_is_idempotent() {
        for input in [
            "master of the arts",
            "  TEACHER  of MATH ",
            "of the and",
            "single",
            "",
            "two  spaced   words",
        ] {
            let once = format_with_connectives(input);
            assert_eq!(format_with_connectives(&once), once);
        }
    }

    #[test]
    fn cpf_check_digits() {
        // Known-valid CPF (check digits computed from the first nine)
        assert!(validate_cpf("52998224725").is_ok());
        // Formatting characters are stripped
        assert_eq!(validate_cpf("529.982.247-25").unwrap(), "52998224725");
        // Repeated digits fail even though the math would pass
        assert!(validate_cpf("11111111111").is_err());
        // Wrong check digit
        assert!(validate_cpf("52998224724").is_err());
        // Wrong length
        assert!(validate_cpf("1234567890").is_err());
    }

    #[test]
    fn name_rules() {
        assert_eq!(validate_name("first_name", " ana maria ").unwrap(), "Ana Maria");
        assert!(validate_name("first_name", "").is_err());
        assert!(validate_name("first_name", "a").is_err());
        assert!(validate_name("first_name", "an4").is_err());
    }

    #[test]
    fn password_rules() {
        assert!(validate_password("Abcdef1!").is_ok());
        assert!(validate_password("short1!").is_err());
        assert!(validate_password("nodigits!A").is_err());
        assert!(validate_password("noupper1!").is_err());
        assert!(validate_password("NoSpecial1").is_err());
    }

    #[test]
    fn custom_label_rules() {
        assert_eq!(validate_custom_label("occupation_other", "  ").unwrap(), "");
        assert_eq!(
            validate_custom_label("occupation_other", "teacher of math").unwrap(),
            "Teacher of Math"
        );
        assert!(validate_custom_label("occupation_other", "ab").is_err());
        assert!(validate_custom_label("occupation_other", "abc123").is_err());
    }

    #[test]
    fn custom_needs_reject_empty_entries() {
        assert!(validate_custom_needs(&["  ".to_string()]).is_err());
        let formatted =
            validate_custom_needs(&["sign language interpreter".to_string()]).unwrap();
        assert_eq!(formatted, vec!["Sign Language Interpreter".to_string()]);
    }
}
