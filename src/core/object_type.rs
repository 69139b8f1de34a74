//! Object type resolution.
//!
//! Object IDs carry their type inline: a leading `1`, a three digit type
//! number, then the sequence (`1` + `001` + `0000000000042` is question 42).
//! Only a subset of object types accept follow relations; those map onto a
//! [`FollowableKind`] which knows where the denormalized follow counter lives.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{AppError, AppResult};

static OBJECT_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^1([0-9]{3})([0-9]+)$").expect("object id pattern is a valid regex")
});

/// Closed set of object types an ID can encode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Question,
    Answer,
    Tag,
    User,
    Collection,
    Comment,
    Report,
}

impl ObjectType {
    pub const ALL: [ObjectType; 7] = [
        ObjectType::Question,
        ObjectType::Answer,
        ObjectType::Tag,
        ObjectType::User,
        ObjectType::Collection,
        ObjectType::Comment,
        ObjectType::Report,
    ];

    /// Number embedded in object IDs of this type
    pub fn type_number(self) -> u16 {
        match self {
            ObjectType::Question => 1,
            ObjectType::Answer => 2,
            ObjectType::Tag => 3,
            ObjectType::User => 4,
            ObjectType::Collection => 6,
            ObjectType::Comment => 7,
            ObjectType::Report => 8,
        }
    }

    pub fn from_type_number(number: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.type_number() == number)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ObjectType::Question => "question",
            ObjectType::Answer => "answer",
            ObjectType::Tag => "tag",
            ObjectType::User => "user",
            ObjectType::Collection => "collection",
            ObjectType::Comment => "comment",
            ObjectType::Report => "report",
        }
    }

    /// Classify an object ID. Malformed or unknown IDs are a hard failure,
    /// there is no fallback type.
    pub fn from_object_id(object_id: &str) -> AppResult<Self> {
        let captures = OBJECT_ID_PATTERN.captures(object_id).ok_or_else(|| {
            AppError::Classification(format!("malformed object id {:?}", object_id))
        })?;

        let number: u16 = captures[1].parse().map_err(|_| {
            AppError::Classification(format!("malformed object id {:?}", object_id))
        })?;

        Self::from_type_number(number).ok_or_else(|| {
            AppError::Classification(format!(
                "object id {:?} encodes unknown object type {:03}",
                object_id, number
            ))
        })
    }

    /// Dispatch to the followable kind, or refuse with a domain error
    pub fn followable(self) -> AppResult<FollowableKind> {
        match self {
            ObjectType::Question => Ok(FollowableKind::Question),
            ObjectType::User => Ok(FollowableKind::User),
            ObjectType::Tag => Ok(FollowableKind::Tag),
            other => Err(AppError::NotFollowable(format!(
                "this object can't be followed: {} objects have no follow count",
                other
            ))),
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| AppError::Classification(format!("unknown object type {:?}", s)))
    }
}

/// Object types that carry a follow counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowableKind {
    Question,
    User,
    Tag,
}

impl FollowableKind {
    pub const ALL: [FollowableKind; 3] = [FollowableKind::Question, FollowableKind::User, FollowableKind::Tag];

    /// Table holding rows of this kind
    pub fn table_name(self) -> &'static str {
        match self {
            FollowableKind::Question => "question",
            FollowableKind::User => "user",
            FollowableKind::Tag => "tag",
        }
    }

    /// Column caching the number of active followers
    pub fn follow_count_column(self) -> &'static str {
        "follow_count"
    }

    pub fn object_type(self) -> ObjectType {
        match self {
            FollowableKind::Question => ObjectType::Question,
            FollowableKind::User => ObjectType::User,
            FollowableKind::Tag => ObjectType::Tag,
        }
    }

    /// Classify an object ID and require it to be followable
    pub fn from_object_id(object_id: &str) -> AppResult<Self> {
        ObjectType::from_object_id(object_id)?.followable()
    }
}

impl fmt::Display for FollowableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Object type name for an object ID, as the activity registry keys it
pub fn object_type_str_by_object_id(object_id: &str) -> AppResult<&'static str> {
    ObjectType::from_object_id(object_id).map(ObjectType::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_types() {
        assert_eq!(ObjectType::from_object_id("10010000000000042").unwrap(), ObjectType::Question);
        assert_eq!(ObjectType::from_object_id("10020000000000001").unwrap(), ObjectType::Answer);
        assert_eq!(ObjectType::from_object_id("10030000000000001").unwrap(), ObjectType::Tag);
        assert_eq!(ObjectType::from_object_id("10040000000000001").unwrap(), ObjectType::User);
        assert_eq!(ObjectType::from_object_id("10070000000000001").unwrap(), ObjectType::Comment);
        assert_eq!(object_type_str_by_object_id("10010000000000042").unwrap(), "question");
    }

    #[test]
    fn test_malformed_ids_fail_classification() {
        for id in ["", "1", "1001", "20010000000000001", "q:42", "1001abc", " 10010000000000001"] {
            let err = ObjectType::from_object_id(id).unwrap_err();
            assert!(matches!(err, AppError::Classification(_)), "{id:?} gave {err:?}");
        }
    }

    #[test]
    fn test_non_ascii_digits_fail_classification() {
        // Arabic-Indic and fullwidth digits are decimal digits to Unicode, not to object IDs
        for id in ["1001\u{0664}\u{0662}", "1\u{0660}\u{0660}\u{0661}42", "1001\u{FF14}\u{FF12}"] {
            let err = ObjectType::from_object_id(id).unwrap_err();
            assert!(matches!(err, AppError::Classification(_)), "{id:?} gave {err:?}");
        }
    }

    #[test]
    fn test_unknown_type_number_fails_classification() {
        // 005 is unassigned
        let err = ObjectType::from_object_id("10050000000000001").unwrap_err();
        assert!(matches!(err, AppError::Classification(_)));
    }

    #[test]
    fn test_followable_dispatch() {
        assert_eq!(ObjectType::Question.followable().unwrap(), FollowableKind::Question);
        assert_eq!(ObjectType::User.followable().unwrap(), FollowableKind::User);
        assert_eq!(ObjectType::Tag.followable().unwrap(), FollowableKind::Tag);

        for t in [ObjectType::Answer, ObjectType::Comment, ObjectType::Collection, ObjectType::Report] {
            assert!(matches!(t.followable(), Err(AppError::NotFollowable(_))));
        }
    }

    #[test]
    fn test_followable_kind_tables() {
        assert_eq!(FollowableKind::User.table_name(), "user");
        assert_eq!(FollowableKind::Tag.follow_count_column(), "follow_count");
        for kind in FollowableKind::ALL {
            assert_eq!(kind.object_type().followable().unwrap(), kind);
        }
    }

    #[test]
    fn test_from_str_round_trips_names() {
        for t in ObjectType::ALL {
            assert_eq!(t.as_str().parse::<ObjectType>().unwrap(), t);
        }
        assert!("topic".parse::<ObjectType>().is_err());
    }
}
