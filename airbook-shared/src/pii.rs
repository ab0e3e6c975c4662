use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wraps a contact address so that `{}` and `{:?}` in log macros never print it in full.
///
/// Only the first character of the local part and the domain survive:
/// `alice@example.com` renders as `a****@example.com`. Serialization still
/// emits the real value; the wrapper exists for `tracing` fields, not for wire payloads.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct Masked<T>(pub T);

impl<T: AsRef<str>> Masked<T> {
    fn redacted(&self) -> String {
        let raw = self.0.as_ref();
        match raw.split_once('@') {
            Some((local, domain)) => {
                let head: String = local.chars().take(1).collect();
                format!("{}****@{}", head, domain)
            }
            None => "********".to_string(),
        }
    }
}

impl<T: AsRef<str>> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.redacted())
    }
}

impl<T: AsRef<str>> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.redacted())
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_is_partially_masked() {
        let masked = Masked("alice@example.com");
        assert_eq!(format!("{}", masked), "a****@example.com");
        assert_eq!(format!("{:?}", masked), "a****@example.com");
    }

    #[test]
    fn test_non_email_is_fully_masked() {
        assert_eq!(Masked("not-an-address").to_string(), "********");
    }

    #[test]
    fn test_serialization_keeps_value() {
        let json = serde_json::to_string(&Masked("a@x.com".to_string())).unwrap();
        assert_eq!(json, "\"a@x.com\"");
    }
}
