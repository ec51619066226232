//! Validators for plain front matter values.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use inklayer_core::frontmatter::value_kind;
use regex::Regex;
use serde_json::{Number, Value};

use super::{FieldCx, FieldValidator};

/// Handle a missing value: use the default, accept omission, or report it.
fn missing(optional: bool, default: Option<Value>, cx: &mut FieldCx<'_>) -> Option<Value> {
    if default.is_some() {
        return default;
    }
    if !optional {
        cx.error("required");
    }
    None
}

/// Text value with optional length and format constraints.
#[derive(Debug, Clone, Default)]
pub struct StringField {
    pub optional: bool,
    pub min: Option<usize>,
    pub max: Option<usize>,
    pub pattern: Option<Regex>,
    pub default: Option<String>,
}

impl StringField {
    pub fn required() -> Self {
        Self::default()
    }

    pub fn optional() -> Self {
        Self {
            optional: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn min(mut self, min: usize) -> Self {
        self.min = Some(min);
        self
    }

    #[must_use]
    pub fn max(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }

    #[must_use]
    pub fn pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }
}

impl FieldValidator for StringField {
    fn validate(&self, value: Option<&Value>, cx: &mut FieldCx<'_>) -> Option<Value> {
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return missing(self.optional, self.default.clone().map(Value::String), cx);
        };
        let Some(text) = value.as_str() else {
            cx.error(format!("expected string, found {}", value_kind(value)));
            return None;
        };

        let len = text.chars().count();
        if let Some(min) = self.min
            && len < min
        {
            cx.error(format!("must be at least {min} characters"));
        }
        if let Some(max) = self.max
            && len > max
        {
            cx.error(format!("must be at most {max} characters"));
        }
        if let Some(pattern) = &self.pattern
            && !pattern.is_match(text)
        {
            cx.error(format!("'{text}' does not match pattern {}", pattern.as_str()));
        }
        Some(value.clone())
    }
}

/// Numeric value.
#[derive(Debug, Clone, Default)]
pub struct NumberField {
    pub optional: bool,
    pub integer: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub default: Option<f64>,
}

impl FieldValidator for NumberField {
    fn validate(&self, value: Option<&Value>, cx: &mut FieldCx<'_>) -> Option<Value> {
        let Some(value) = value.filter(|v| !v.is_null()) else {
            let default = self
                .default
                .and_then(Number::from_f64)
                .map(Value::Number);
            return missing(self.optional, default, cx);
        };
        let Some(number) = value.as_f64() else {
            cx.error(format!("expected number, found {}", value_kind(value)));
            return None;
        };

        if self.integer && number.fract() != 0.0 {
            cx.error(format!("expected integer, found {number}"));
        }
        if let Some(min) = self.min
            && number < min
        {
            cx.error(format!("must be at least {min}"));
        }
        if let Some(max) = self.max
            && number > max
        {
            cx.error(format!("must be at most {max}"));
        }
        Some(value.clone())
    }
}

/// Boolean value.
#[derive(Debug, Clone, Default)]
pub struct BooleanField {
    pub optional: bool,
    pub default: Option<bool>,
}

impl FieldValidator for BooleanField {
    fn validate(&self, value: Option<&Value>, cx: &mut FieldCx<'_>) -> Option<Value> {
        match value.filter(|v| !v.is_null()) {
            None => missing(self.optional, self.default.map(Value::Bool), cx),
            Some(Value::Bool(b)) => Some(Value::Bool(*b)),
            Some(other) => {
                cx.error(format!("expected boolean, found {}", value_kind(other)));
                None
            }
        }
    }
}

/// Date value, normalized to an RFC 3339 UTC timestamp.
#[derive(Debug, Clone, Default)]
pub struct DateField {
    pub optional: bool,
}

impl FieldValidator for DateField {
    fn validate(&self, value: Option<&Value>, cx: &mut FieldCx<'_>) -> Option<Value> {
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return missing(self.optional, None, cx);
        };
        let Some(text) = value.as_str() else {
            cx.error(format!("expected date, found {}", value_kind(value)));
            return None;
        };

        match parse_date(text) {
            Some(date) => Some(Value::String(
                date.to_rfc3339_opts(SecondsFormat::Millis, true),
            )),
            None => {
                cx.error(format!("invalid date '{text}'"));
                None
            }
        }
    }
}

/// Parse an RFC 3339 timestamp or a `YYYY-MM-DD` date.
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// List of strings.
#[derive(Debug, Clone, Default)]
pub struct ListField {
    pub optional: bool,
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl FieldValidator for ListField {
    fn validate(&self, value: Option<&Value>, cx: &mut FieldCx<'_>) -> Option<Value> {
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return missing(self.optional, None, cx);
        };
        let Some(items) = value.as_array() else {
            cx.error(format!("expected list, found {}", value_kind(value)));
            return None;
        };

        for (i, item) in items.iter().enumerate() {
            if !item.is_string() {
                cx.error(format!("item {i}: expected string, found {}", value_kind(item)));
            }
        }
        if let Some(min) = self.min
            && items.len() < min
        {
            cx.error(format!("must have at least {min} items"));
        }
        if let Some(max) = self.max
            && items.len() > max
        {
            cx.error(format!("must have at most {max} items"));
        }
        Some(value.clone())
    }
}

/// One of a fixed set of strings.
#[derive(Debug, Clone, Default)]
pub struct EnumField {
    pub values: Vec<String>,
    pub optional: bool,
    pub default: Option<String>,
}

impl FieldValidator for EnumField {
    fn validate(&self, value: Option<&Value>, cx: &mut FieldCx<'_>) -> Option<Value> {
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return missing(self.optional, self.default.clone().map(Value::String), cx);
        };
        match value.as_str() {
            Some(text) if self.values.iter().any(|v| v == text) => Some(value.clone()),
            _ => {
                cx.error(format!(
                    "expected one of [{}], found {value}",
                    self.values.join(", ")
                ));
                None
            }
        }
    }
}

/// Validator standing in for a field whose specification cannot be built.
#[derive(Debug, Clone)]
pub struct InvalidField(pub String);

impl FieldValidator for InvalidField {
    fn validate(&self, _value: Option<&Value>, cx: &mut FieldCx<'_>) -> Option<Value> {
        cx.error(self.0.clone());
        None
    }
}
