use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    pub static ref EMAIL_RX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    )
    .unwrap();
}

/// Collects field-level validation failures.
///
/// Only the first failure recorded for a field is kept, so checks should be
/// ordered from most to least fundamental.
#[derive(Debug, Default, Clone)]
pub struct Validator {
    errors: BTreeMap<String, String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, key: &str, message: &str) {
        self.errors
            .entry(key.to_string())
            .or_insert_with(|| message.to_string());
    }

    pub fn check(&mut self, ok: bool, key: &str, message: &str) {
        if !ok {
            self.add_error(key, message);
        }
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    pub fn into_errors(self) -> BTreeMap<String, String> {
        self.errors
    }
}

/// Exact membership test.
pub fn permitted_value<T: PartialEq + ?Sized>(value: &T, permitted: &[&T]) -> bool {
    permitted.iter().any(|p| *p == value)
}

pub fn not_in<T: PartialEq + ?Sized>(value: &T, denied: &[&T]) -> bool {
    !permitted_value(value, denied)
}

pub fn matches(value: &str, rx: &Regex) -> bool {
    rx.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_first_error_per_field() {
        let mut v = Validator::new();
        v.check(false, "email", "must be provided");
        v.check(false, "email", "must be a valid email address");
        v.check(true, "name", "must be provided");

        assert!(!v.valid());
        assert_eq!(v.errors().len(), 1);
        assert_eq!(v.errors()["email"], "must be provided");
    }

    #[test]
    fn permitted_value_is_exact_match() {
        let safelist = ["id", "-id"];
        assert!(permitted_value("-id", &safelist));
        assert!(!permitted_value("i", &safelist));
        assert!(!permitted_value("id ", &safelist));
        assert!(not_in("name", &safelist));
    }

    #[test]
    fn email_pattern() {
        assert!(matches("alice@example.com", &EMAIL_RX));
        assert!(matches("a.b+tag@sub.example.org", &EMAIL_RX));
        assert!(!matches("alice", &EMAIL_RX));
        assert!(!matches("alice@", &EMAIL_RX));
        assert!(!matches("alice@-example.com", &EMAIL_RX));
    }
}
