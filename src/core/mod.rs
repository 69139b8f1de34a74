// Core types - object ID classification and strong types

pub mod object_type;
pub mod strong_types;

pub use object_type::{FollowableKind, ObjectType};
pub use strong_types::{ActivityKey, ActivityTypeCode};
