//! Validation helpers for DTOs.

use std::collections::HashMap;

use validator::ValidationError;

/// Minimum number of characters of a question prompt.
pub const MIN_QUESTION_TEXT_CHARS: usize = 10;

/// Validates that a question prompt has at least [`MIN_QUESTION_TEXT_CHARS`] visible characters.
pub fn validate_question_text(text: &str) -> Result<(), ValidationError> {
    let count = text.trim().chars().count();
    if count < MIN_QUESTION_TEXT_CHARS {
        let mut err = ValidationError::new("question_text_length");
        err.message = Some(
            format!(
                "Question text must have at least {MIN_QUESTION_TEXT_CHARS} characters (got {count})"
            )
            .into(),
        );
        return Err(err);
    }
    Ok(())
}

/// Validates a list of answer options: non-empty and without blank entries.
pub fn validate_options(options: &[String]) -> Result<(), ValidationError> {
    if options.is_empty() {
        let mut err = ValidationError::new("options_empty");
        err.message = Some("At least one option is required".into());
        return Err(err);
    }
    if options.iter().any(|option| option.trim().is_empty()) {
        let mut err = ValidationError::new("options_blank");
        err.message = Some("Options must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Validates that `order` holds exactly the same multiset of items as `options`.
pub fn validate_permutation(options: &[String], order: &[String]) -> Result<(), ValidationError> {
    let mut counts: HashMap<&str, i32> = HashMap::new();
    for item in options {
        *counts.entry(item.as_str()).or_default() += 1;
    }
    for item in order {
        *counts.entry(item.as_str()).or_default() -= 1;
    }

    if options.len() != order.len() || counts.values().any(|count| *count != 0) {
        let mut err = ValidationError::new("correct_order_permutation");
        err.message = Some("Correct order must be a permutation of the options".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_validate_question_text() {
        assert!(validate_question_text("What is 6 x 7?").is_ok());
        assert!(validate_question_text("   short    ").is_err());
        assert!(validate_question_text("").is_err());
        // counted in characters, not bytes
        assert!(validate_question_text("èèèèèèèèè").is_err());
    }

    #[test]
    fn test_validate_options() {
        assert!(validate_options(&items(&["Paris", "Rome"])).is_ok());
        assert!(validate_options(&[]).is_err());
        assert!(validate_options(&items(&["Paris", "  "])).is_err());
    }

    #[test]
    fn test_validate_permutation() {
        let options = items(&["a", "b", "b"]);
        assert!(validate_permutation(&options, &items(&["b", "a", "b"])).is_ok());
        assert!(validate_permutation(&options, &items(&["a", "b"])).is_err());
        assert!(validate_permutation(&options, &items(&["a", "a", "b"])).is_err());
        assert!(validate_permutation(&options, &items(&["a", "b", "c"])).is_err());
    }
}
