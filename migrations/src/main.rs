use sea_orm_migration::prelude::*;
use std::env;

use migration::Migrator;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let db_url = env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set");

    let command = env::args().nth(1).unwrap_or_else(|| "up".to_string());

    let db = sea_orm::Database::connect(&db_url).await
        .expect("Failed to connect to resource store");

    let outcome = match command.as_str() {
        "up" => Migrator::up(&db, None).await.map(|_| "Resource store schema is up to date"),
        "down" => Migrator::down(&db, Some(1)).await.map(|_| "Rolled back the latest migration"),
        "fresh" => Migrator::fresh(&db).await.map(|_| "Recreated the resource store schema"),
        "status" => Migrator::status(&db).await.map(|_| "Migration status printed above"),
        other => {
            eprintln!("Unknown command: {}. Use: up, down, fresh, or status", other);
            std::process::exit(1);
        }
    };

    match outcome {
        Ok(message) => println!("✓ {}", message),
        Err(e) => {
            eprintln!("Migration command '{}' failed: {}", command, e);
            std::process::exit(1);
        }
    }
}
