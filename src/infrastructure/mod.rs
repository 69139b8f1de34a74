// Storage and lookup infrastructure
pub mod activity_ledger;        // Soft-cancelled activity rows
pub mod activity_type_registry; // (object type, action) -> activity type code
pub mod database;               // Database interface and Postgres implementation
pub mod id_generator;           // Object ID generation
pub mod sqlite_database;        // SQLite implementation

pub use activity_ledger::{ActivityLedger, ActivityRecord, CancelState, FollowTransition};
pub use activity_type_registry::{ActivityTypeInfo, ActivityTypeRegistry, ActivityTypeResolver};
pub use database::{DatabaseInterface, PostgresDatabase};
pub use id_generator::UniqueIdGenerator;
pub use sqlite_database::SqliteDatabase;
