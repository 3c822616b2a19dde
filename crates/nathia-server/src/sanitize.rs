//! Inbound text cleanup

use nathia_classifiers::validate_text;
use nathia_core::ValidationError;
use regex::Regex;

pub struct Sanitizer {
    tags: Regex,
}

impl Sanitizer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            tags: Regex::new(r"<[^<>]*>")?,
        })
    }

    /// Strip HTML tags and control characters (newlines and tabs survive), then trim
    pub fn clean(&self, raw: &str) -> String {
        let without_tags = self.tags.replace_all(raw, "");
        without_tags
            .chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
            .collect::<String>()
            .trim()
            .to_string()
    }

    /// Clean and enforce the non-empty and length rules
    pub fn message(&self, raw: &str, max_chars: usize) -> Result<String, ValidationError> {
        let cleaned = self.clean(raw);
        validate_text(&cleaned, max_chars)?;
        Ok(cleaned)
    }
}
