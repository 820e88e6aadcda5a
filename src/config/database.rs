use super::parse_env_or;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::time::Duration;

pub async fn get_database(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let max_connections: u32 = parse_env_or("DB_MAX_CONNECTIONS", 10);
    let min_connections: u32 = parse_env_or("DB_MIN_CONNECTIONS", 2);

    let mut opt = ConnectOptions::new(database_url.to_owned());
    opt.max_connections(max_connections)
        .min_connections(min_connections)
        .connect_timeout(Duration::from_secs(5))
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(300))
        .sqlx_logging(true);

    Database::connect(opt).await
}
