pub mod indexes;
pub mod models;

use batchscribe_config::DatabaseSettings;
use mongodb::{Client, Database};
use tracing::info;

/// Connects to MongoDB and makes sure the mirror collections are indexed.
pub async fn connect(settings: &DatabaseSettings) -> Result<Database, mongodb::error::Error> {
    let client = Client::with_uri_str(&settings.url).await?;
    let db = client.database(&settings.name);
    indexes::ensure_indexes(&db).await?;
    info!(database = %settings.name, "MongoDB connected");
    Ok(db)
}
