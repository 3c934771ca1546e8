//! Field visitor for extracting event and span field values.

use std::collections::BTreeMap;
use std::fmt;
use tracing::field::{Field, Visit};

/// A visitor that collects the `message` field and every other field.
///
/// Values are converted to strings; `Debug` formatting is used for values
/// that are not primitives.
#[derive(Debug, Default)]
pub(crate) struct FieldVisitor {
    message: Option<String>,
    fields: BTreeMap<String, String>,
}

impl FieldVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = Some(value);
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }

    /// The message followed by the remaining fields as `key=value` pairs.
    pub fn into_text(self) -> String {
        let mut text = self.message.unwrap_or_default();
        for (key, value) in self.fields {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(&key);
            text.push('=');
            text.push_str(&value);
        }
        text
    }

    /// Whether an `error` field was recorded.
    pub fn has_error(&self) -> bool {
        self.fields.contains_key("error")
    }
}

impl Visit for FieldVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, value.to_string());
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, format!("{:?}", value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_visitor() {
        let visitor = FieldVisitor::new();
        assert!(!visitor.has_error());
        assert_eq!(visitor.into_text(), "");
    }
}
