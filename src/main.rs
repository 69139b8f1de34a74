// Follow store bootstrap - creates the schema and optionally seeds sample data

use tracing::info;
use tracing_subscriber::EnvFilter;

use activity_follow::{app_state::AppState, config::Config, data_seeder::DataSeeder};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let state = AppState::new(config.clone()).await?;
    state.database.health_check().await?;
    info!("Follow store ready ({:?})", config.database.backend());

    if config.seed.sample_data {
        let seeder = DataSeeder::new(
            state.database.clone(),
            state.id_generator.clone(),
            state.follow_action_repo.clone(),
        );
        let seeded = seeder.seed_sample_data(5).await?;

        for question in &seeded.questions {
            let amount = state.follow_repo.get_follow_amount(question).await?;
            let followers = state.follow_repo.get_follow_user_ids(question).await?;
            info!("question {}: follow_count {}, active followers {:?}", question, amount, followers);
        }
        for user in &seeded.users {
            let tags = state.follow_repo.get_follow_ids(user, "tag").await?;
            info!("user {} follows tags {:?}", user, tags);
        }
    }

    Ok(())
}
