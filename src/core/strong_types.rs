// Strong Types - newtypes for the values that flow through the activity ledger
// Keeps activity discriminants from being confused with counters or row ids

use serde::{Deserialize, Serialize};
use std::fmt;

/// Strongly-typed activity type code - the ledger discriminant for one (object type, action) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityTypeCode(pub i64);

impl ActivityTypeCode {
    pub fn new(code: i64) -> Self {
        Self(code)
    }

    /// Get the raw code value
    pub fn value(self) -> i64 {
        self.0
    }

    /// Zero is never registered; a zero code means a lookup was skipped somewhere
    pub fn is_valid(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for ActivityTypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ActivityTypeCode {
    fn from(code: i64) -> Self {
        Self(code)
    }
}

impl From<ActivityTypeCode> for i64 {
    fn from(code: ActivityTypeCode) -> Self {
        code.0
    }
}

/// Registry key for an activity: `<object type>.<action name>`, e.g. `question.follow`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityKey(String);

impl ActivityKey {
    /// Build a key from its two parts
    pub fn new(object_type: &str, action: &str) -> Self {
        Self(format!("{}.{}", object_type, action))
    }

    /// Parse an already joined key, rejecting anything without both parts
    pub fn parse(key: &str) -> Result<Self, &'static str> {
        match key.split_once('.') {
            Some((object_type, action)) if !object_type.is_empty() && !action.is_empty() => {
                Ok(Self(key.to_string()))
            }
            _ => Err("Activity key must look like <object type>.<action>"),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn object_type(&self) -> &str {
        self.0.split_once('.').map_or(self.0.as_str(), |(object_type, _)| object_type)
    }

    pub fn action(&self) -> &str {
        self.0.split_once('.').map_or("", |(_, action)| action)
    }
}

impl fmt::Display for ActivityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Action name used by every follow relation regardless of object type
pub const FOLLOW_ACTION: &str = "follow";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_type_code_operations() {
        let code = ActivityTypeCode::new(7);
        assert_eq!(code.value(), 7);
        assert!(code.is_valid());
        assert!(!ActivityTypeCode::new(0).is_valid());
    }

    #[test]
    fn test_activity_key_parts() {
        let key = ActivityKey::new("question", FOLLOW_ACTION);
        assert_eq!(key.as_str(), "question.follow");
        assert_eq!(key.object_type(), "question");
        assert_eq!(key.action(), "follow");
    }

    #[test]
    fn test_activity_key_parse_validation() {
        assert!(ActivityKey::parse("tag.follow").is_ok());
        assert!(ActivityKey::parse("tag").is_err());
        assert!(ActivityKey::parse(".follow").is_err());
        assert!(ActivityKey::parse("tag.").is_err());
    }
}
