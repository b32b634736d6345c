use dream_loop::DreamElements;
use serde_json::Value;

use crate::error::ApiError;

/// Pull exactly three non-empty strings out of `{"elements": [...]}`.
pub fn validate_elements(body: &Value) -> Result<DreamElements, ApiError> {
    let elements = body
        .get("elements")
        .and_then(Value::as_array)
        .filter(|items| items.len() == 3)
        .ok_or_else(|| ApiError::Validation("Please provide exactly 3 dream elements".into()))?;

    let mut texts = Vec::with_capacity(3);
    for item in elements {
        match item.as_str() {
            Some(s) if !s.trim().is_empty() => texts.push(s.to_string()),
            _ => {
                return Err(ApiError::Validation(
                    "All dream elements must be non-empty strings".into(),
                ))
            }
        }
    }

    let texts: [String; 3] = texts
        .try_into()
        .map_err(|_| ApiError::Validation("Please provide exactly 3 dream elements".into()))?;
    Ok(DreamElements::from(texts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(body: Value) -> String {
        validate_elements(&body).unwrap_err().to_string()
    }

    #[test]
    fn test_accepts_three_strings() {
        let elements = validate_elements(&json!({"elements": ["a cat", "galaxy", "waterfall"]})).unwrap();
        assert_eq!(elements.element1, "a cat");
        assert_eq!(elements.element3, "waterfall");
    }

    #[test]
    fn test_wrong_count() {
        assert_eq!(
            message(json!({"elements": ["a", "b"]})),
            "Please provide exactly 3 dream elements"
        );
        assert_eq!(
            message(json!({"elements": ["a", "b", "c", "d"]})),
            "Please provide exactly 3 dream elements"
        );
        assert_eq!(message(json!({})), "Please provide exactly 3 dream elements");
        assert_eq!(
            message(json!({"elements": "a,b,c"})),
            "Please provide exactly 3 dream elements"
        );
    }

    #[test]
    fn test_blank_or_non_string() {
        assert_eq!(
            message(json!({"elements": ["a", "  ", "c"]})),
            "All dream elements must be non-empty strings"
        );
        assert_eq!(
            message(json!({"elements": ["a", 7, "c"]})),
            "All dream elements must be non-empty strings"
        );
        assert_eq!(
            message(json!({"elements": [null, "b", "c"]})),
            "All dream elements must be non-empty strings"
        );
    }
}
