use crate::{
    core::object_type::{FollowableKind, ObjectType},
    error::AppResult,
    infrastructure::{database::DatabaseInterface, id_generator::UniqueIdGenerator},
    repo::FollowActionRepo,
};
use std::sync::Arc;
use tracing::info;

/// IDs created by [`DataSeeder::seed_sample_data`]
#[derive(Debug, Clone, Default)]
pub struct SeededData {
    pub users: Vec<String>,
    pub questions: Vec<String>,
    pub tags: Vec<String>,
}

/// Creates followable objects and follow relations through the regular write path.
pub struct DataSeeder {
    database: Arc<dyn DatabaseInterface>,
    id_generator: Arc<UniqueIdGenerator>,
    follow_actions: FollowActionRepo,
}

impl DataSeeder {
    pub fn new(
        database: Arc<dyn DatabaseInterface>,
        id_generator: Arc<UniqueIdGenerator>,
        follow_actions: FollowActionRepo,
    ) -> Self {
        Self {
            database,
            id_generator,
            follow_actions,
        }
    }

    /// Insert one followable object with a fresh ID
    pub async fn create(&self, kind: FollowableKind) -> AppResult<String> {
        let id = self.id_generator.gen_unique_id_str(kind.object_type())?;
        self.database.create_followable(kind, &id).await?;
        Ok(id)
    }

    /// A fresh ID for an object type that has no followable table, e.g. a comment
    pub fn unfollowable_id(&self, object_type: ObjectType) -> AppResult<String> {
        self.id_generator.gen_unique_id_str(object_type)
    }

    /// A small graph: every user follows the first question and tag, users
    /// follow each other in a ring, and the last user unfollows the question.
    pub async fn seed_sample_data(&self, users: usize) -> AppResult<SeededData> {
        let mut seeded = SeededData::default();
        for _ in 0..users {
            seeded.users.push(self.create(FollowableKind::User).await?);
        }
        for _ in 0..2 {
            seeded.questions.push(self.create(FollowableKind::Question).await?);
            seeded.tags.push(self.create(FollowableKind::Tag).await?);
        }

        let question = &seeded.questions[0];
        let tag = &seeded.tags[0];
        for (i, user) in seeded.users.iter().enumerate() {
            self.follow_actions.follow(user, question).await?;
            self.follow_actions.follow(user, tag).await?;
            if users > 1 {
                let next = &seeded.users[(i + 1) % users];
                self.follow_actions.follow(user, next).await?;
            }
        }
        if let Some(last) = seeded.users.last() {
            self.follow_actions.unfollow(last, question).await?;
        }

        info!(
            "Seeded {} users, {} questions, {} tags",
            seeded.users.len(),
            seeded.questions.len(),
            seeded.tags.len()
        );
        Ok(seeded)
    }
}
