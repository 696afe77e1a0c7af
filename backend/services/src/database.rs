use sea_orm::{Database, DatabaseConnection};
use anyhow::Result;

pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    let db = Database::connect(database_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to resource store: {}", e))?;

    Ok(db)
}

// Note: the schema is managed by the migration crate:
// cargo run --bin migration up
