//! Request validation from config rules. Values are normalized first (trimmed strings, empty
//! string to null, form-encoded booleans and integers to JSON), then every rule is checked and
//! every violation reported.

use crate::config::{ValidationRule, ValueKind};
use crate::error::{AppError, ValidationErrors};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// PUT and POST validate the whole rule set; PATCH only the fields present in the body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationMode {
    Full,
    Partial,
}

pub struct RequestValidator;

impl RequestValidator {
    /// Returns the normalized attributes named by `rules`. Fields without a rule are dropped.
    pub fn validate(
        body: &Map<String, Value>,
        rules: &HashMap<String, ValidationRule>,
        mode: ValidationMode,
    ) -> Result<Map<String, Value>, AppError> {
        let mut errors = ValidationErrors::new();
        let mut out = Map::new();

        let mut fields: Vec<&String> = rules.keys().collect();
        fields.sort();
        for col in fields {
            let rule = &rules[col];
            let Some(raw) = body.get(col) else {
                if mode == ValidationMode::Full && rule.required == Some(true) {
                    errors.add(col, format!("{} is required", col));
                }
                continue;
            };
            match normalize(raw, rule.kind) {
                Ok(v) => {
                    if validate_field(col, &v, rule, &mut errors) {
                        out.insert(col.clone(), v);
                    }
                }
                Err(msg) => errors.add(col, format!("{} {}", col, msg)),
            }
        }

        errors.into_result()?;
        Ok(out)
    }
}

/// Strings are trimmed and empty strings become null; then the value is coerced to `kind`.
fn normalize(v: &Value, kind: Option<ValueKind>) -> Result<Value, &'static str> {
    let v = match v {
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                return Ok(Value::Null);
            }
            Value::String(t.to_string())
        }
        other => other.clone(),
    };
    if v.is_null() {
        return Ok(v);
    }
    match kind {
        None => Ok(v),
        Some(ValueKind::String) => match v {
            Value::String(_) => Ok(v),
            _ => Err("must be a string"),
        },
        Some(ValueKind::Boolean) => to_bool(&v).map(Value::Bool).ok_or("must be true or false"),
        Some(ValueKind::Integer) => to_i64(&v)
            .map(|n| Value::Number(n.into()))
            .ok_or("must be an integer"),
    }
}

fn to_bool(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.as_str() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn to_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Checks a normalized value. Returns false if anything was recorded for `col`.
fn validate_field(col: &str, v: &Value, rule: &ValidationRule, errors: &mut ValidationErrors) -> bool {
    let before = errors.messages(col).len();
    if v.is_null() {
        if rule.required == Some(true) {
            errors.add(col, format!("{} is required", col));
        } else if rule.nullable != Some(true) {
            errors.add(col, format!("{} may not be null", col));
        }
        return errors.messages(col).len() == before;
    }
    if let Some(format) = &rule.format {
        validate_format(col, v, format, errors);
    }
    if let Some(max) = rule.max_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() > max as usize {
                errors.add(col, format!("{} must be at most {} characters", col, max));
            }
        }
    }
    if let Some(min) = rule.min_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() < min as usize {
                errors.add(col, format!("{} must be at least {} characters", col, min));
            }
        }
    }
    if let Some(ref pattern) = rule.pattern {
        match Regex::new(pattern) {
            Ok(re) => {
                if let Some(s) = v.as_str() {
                    if !re.is_match(s) {
                        errors.add(col, format!("{} does not match required pattern", col));
                    }
                }
            }
            Err(_) => errors.add(col, format!("invalid pattern for {}", col)),
        }
    }
    if let Some(ref allowed) = rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            let options: Vec<String> = allowed.iter().map(display).collect();
            errors.add(col, format!("{} must be one of: {}", col, options.join(", ")));
        }
    }
    if let Some(min) = rule.minimum {
        if let Some(n) = v.as_f64() {
            if n < min {
                errors.add(col, format!("{} must be at least {}", col, min));
            }
        }
    }
    if let Some(max) = rule.maximum {
        if let Some(n) = v.as_f64() {
            if n > max {
                errors.add(col, format!("{} must be at most {}", col, max));
            }
        }
    }
    errors.messages(col).len() == before
}

fn display(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Loose comparison: `10` matches `"10"`.
fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            n.to_string() == *s
        }
        _ => a == b,
    }
}

fn validate_format(col: &str, v: &Value, format: &str, errors: &mut ValidationErrors) {
    match format.to_lowercase().as_str() {
        "email" => {
            if let Some(s) = v.as_str() {
                if !s.contains('@') || s.len() < 3 {
                    errors.add(col, format!("{} must be a valid email", col));
                }
            }
        }
        "uuid" => {
            if let Some(s) = v.as_str() {
                if uuid::Uuid::parse_str(s).is_err() {
                    errors.add(col, format!("{} must be a valid UUID", col));
                }
            }
        }
        "year" => {
            let ok = match v {
                Value::Number(n) => n.as_i64().map(|y| (1000..=9999).contains(&y)).unwrap_or(false),
                Value::String(s) => s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit()),
                _ => false,
            };
            if !ok {
                errors.add(col, format!("{} must be a four-digit year", col));
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{builtin, resolve, DEFAULT_VIDEO_MAX_KB};
    use serde_json::json;

    fn rules(path: &str) -> HashMap<String, ValidationRule> {
        let model = resolve(&builtin(DEFAULT_VIDEO_MAX_KB), "catalog").unwrap();
        model.entity_by_path(path).unwrap().validation.clone()
    }

    fn body(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => Map::new(),
        }
    }

    fn errors(result: Result<Map<String, Value>, AppError>) -> ValidationErrors {
        match result {
            Err(AppError::Validation(e)) => e,
            other => panic!("expected validation error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn full_mode_reports_every_missing_required_field() {
        let e = errors(RequestValidator::validate(&Map::new(), &rules("videos"), ValidationMode::Full));
        for field in ["title", "description", "year_launched", "rating", "duration"] {
            assert!(e.has(field), "{field} should be reported");
        }
        assert!(!e.has("opened"));
    }

    #[test]
    fn partial_mode_only_checks_present_fields() {
        let out = RequestValidator::validate(
            &body(json!({ "name": "  Comedy  " })),
            &rules("categories"),
            ValidationMode::Partial,
        )
        .unwrap();
        assert_eq!(out, body(json!({ "name": "Comedy" })));
    }

    #[test]
    fn empty_strings_become_null_and_unknown_fields_are_dropped() {
        let out = RequestValidator::validate(
            &body(json!({ "name": "Drama", "description": "", "color": "red" })),
            &rules("categories"),
            ValidationMode::Full,
        )
        .unwrap();
        assert_eq!(out["description"], Value::Null);
        assert!(!out.contains_key("color"));
    }

    #[test]
    fn form_values_are_coerced() {
        let out = RequestValidator::validate(
            &body(json!({
                "title": "T", "description": "D", "year_launched": "2010",
                "opened": "1", "rating": "L", "duration": "90"
            })),
            &rules("videos"),
            ValidationMode::Full,
        )
        .unwrap();
        assert_eq!(out["opened"], json!(true));
        assert_eq!(out["year_launched"], json!(2010));
        assert_eq!(out["duration"], json!(90));
    }

    #[test]
    fn rejects_out_of_range_values() {
        let e = errors(RequestValidator::validate(
            &body(json!({
                "title": "x".repeat(256), "description": "D", "year_launched": 20,
                "opened": "maybe", "rating": "21", "duration": 0
            })),
            &rules("videos"),
            ValidationMode::Full,
        ));
        for field in ["title", "year_launched", "opened", "rating", "duration"] {
            assert!(e.has(field), "{field} should be reported");
        }
        assert!(!e.has("description"));
    }

    #[test]
    fn cast_member_type_must_be_known() {
        let r = rules("cast_members");
        assert!(RequestValidator::validate(&body(json!({ "name": "A", "type": 2 })), &r, ValidationMode::Full).is_ok());
        let e = errors(RequestValidator::validate(&body(json!({ "name": "A", "type": 3 })), &r, ValidationMode::Full));
        assert_eq!(e.messages("type"), ["type must be one of: 1, 2".to_string()]);
    }

    #[test]
    fn null_is_rejected_unless_nullable() {
        let e = errors(RequestValidator::validate(
            &body(json!({ "is_active": null, "description": null })),
            &rules("categories"),
            ValidationMode::Partial,
        ));
        assert!(e.has("is_active"));
        assert!(!e.has("description"));
    }
}
