//! Input validation for request bodies.
//!
//! Validation stops at the first failing rule and reports it as a
//! human-readable message, which the API returns verbatim with a 400.

pub type ValidationResult = Result<(), String>;

pub trait Validate {
    fn validate(&self) -> ValidationResult;
}

/// Trimmed length must be within `min..=max` characters.
pub fn text(field: &str, value: &str, min: usize, max: usize) -> ValidationResult {
    let len = value.trim().chars().count();
    if len < min {
        if min == 1 {
            return Err(format!("{} is required", field));
        }
        return Err(format!("{} must be at least {} characters", field, min));
    }
    if len > max {
        return Err(format!("{} must be at most {} characters", field, max));
    }
    Ok(())
}

pub fn optional_text(field: &str, value: Option<&str>, min: usize, max: usize) -> ValidationResult {
    match value {
        Some(v) => text(field, v, min, max),
        None => Ok(()),
    }
}

pub fn range<T: PartialOrd + std::fmt::Display>(field: &str, value: T, min: T, max: T) -> ValidationResult {
    if value < min || value > max {
        return Err(format!("{} must be between {} and {}", field, min, max));
    }
    Ok(())
}

pub fn email(value: &str) -> ValidationResult {
    let value = value.trim();
    text("Email", value, 3, 254)?;
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') => Ok(()),
        _ => Err("Email is invalid".to_string()),
    }
}

pub fn http_url(field: &str, value: &str) -> ValidationResult {
    let value = value.trim();
    text(field, value, 1, 2048)?;
    if value.starts_with("https://") || value.starts_with("http://") {
        Ok(())
    } else {
        Err(format!("{} must be an http(s) URL", field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_reports_required_and_bounds() {
        assert_eq!(text("Title", "   ", 1, 10).unwrap_err(), "Title is required");
        assert_eq!(
            text("Password", "short", 8, 128).unwrap_err(),
            "Password must be at least 8 characters"
        );
        assert_eq!(
            text("Name", "abcdefghijk", 1, 10).unwrap_err(),
            "Name must be at most 10 characters"
        );
        assert!(text("Name", " ok ", 1, 10).is_ok());
    }

    #[test]
    fn email_requires_local_part_and_domain() {
        assert!(email("ruth@example.org").is_ok());
        assert!(email("ruth@localhost").is_err());
        assert!(email("@example.org").is_err());
        assert!(email("no-at-sign.org").is_err());
    }

    #[test]
    fn urls_must_be_http() {
        assert!(http_url("URL", "https://music.example.com/list").is_ok());
        assert!(http_url("URL", "javascript:alert(1)").is_err());
    }
}
