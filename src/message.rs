
//! The user data message consumed from the queue.

use serde::Deserialize;

use crate::error::HandlerError;

/// Lowest age accepted by validation.
pub const MIN_AGE: i64 = 1;
/// Highest age accepted by validation.
pub const MAX_AGE: i64 = 150;

/// User data as delivered on the queue: `{"Name": string, "Age": number}`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserDataMessage {
    /// The user's name. Must be non-empty after trimming whitespace.
    #[serde(rename = "Name")]
    pub name: String,
    /// The user's age. Must be within `MIN_AGE..=MAX_AGE`.
    #[serde(rename = "Age")]
    pub age: i64,
}

impl UserDataMessage {
    /// Checks the domain rules. Name is validated before age.
    ///
    /// A message that fails validation is never persisted; the error goes back
    /// to the broker for redelivery.
    pub fn validate(&self) -> Result<(), HandlerError> {
        if self.name.trim().is_empty() {
            log::error!("Name is empty or whitespace-only");
            return Err(HandlerError::InvalidField("name"));
        }

        if self.age < MIN_AGE || self.age > MAX_AGE {
            log::error!("Age is out of valid range: {}", self.age);
            return Err(HandlerError::InvalidField("age"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(name: &str, age: i64) -> UserDataMessage {
        UserDataMessage {
            name: name.to_string(),
            age,
        }
    }

    #[test]
    fn test_deserializes_pascal_case_wire_fields() {
        let msg: UserDataMessage = serde_json::from_str(r#"{"Name":"Alice","Age":30}"#).unwrap();
        assert_eq!(msg.name, "Alice");
        assert_eq!(msg.age, 30);
    }

    #[test]
    fn test_validate_accepts_age_boundaries() {
        assert!(message("Alice", 1).validate().is_ok());
        assert!(message("Alice", 150).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_age_out_of_range() {
        assert!(matches!(
            message("Bob", 0).validate(),
            Err(HandlerError::InvalidField("age"))
        ));
        assert!(matches!(
            message("Bob", 151).validate(),
            Err(HandlerError::InvalidField("age"))
        ));
        assert!(matches!(
            message("Bob", -5).validate(),
            Err(HandlerError::InvalidField("age"))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_or_whitespace_name() {
        assert!(matches!(
            message("", 30).validate(),
            Err(HandlerError::InvalidField("name"))
        ));
        assert!(matches!(
            message("   \t ", 30).validate(),
            Err(HandlerError::InvalidField("name"))
        ));
    }

    #[test]
    fn test_validate_checks_name_before_age() {
        // Both fields invalid; the name failure is reported.
        assert!(matches!(
            message("", 999).validate(),
            Err(HandlerError::InvalidField("name"))
        ));
    }
}
