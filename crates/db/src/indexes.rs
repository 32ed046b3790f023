use mongodb::{Database, IndexModel, options::IndexOptions};
use tracing::info;

use crate::models::TranscriptionJob;

pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    // Transcription jobs
    create_indexes(
        db,
        TranscriptionJob::COLLECTION,
        vec![
            index_unique(bson::doc! { "job_name": 1 }),
            index(bson::doc! { "phase": 1, "updated_at": -1 }),
            index(bson::doc! { "file_urls": 1 }),
        ],
    )
    .await?;

    info!("All indexes ensured");
    Ok(())
}

fn index(keys: bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn index_unique(keys: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

async fn create_indexes(
    db: &Database,
    collection: &str,
    indexes: Vec<IndexModel>,
) -> Result<(), mongodb::error::Error> {
    let coll = db.collection::<bson::Document>(collection);
    match coll.create_indexes(indexes.clone()).await {
        Ok(_) => {
            info!(collection, "Indexes created");
            Ok(())
        }
        Err(e) => {
            // IndexKeySpecsConflict (code 86): an existing index has the same name
            // but different options (e.g. non-sparse vs sparse). Drop the conflicting
            // index and retry.
            if let mongodb::error::ErrorKind::Command(ref cmd_err) = *e.kind {
                if cmd_err.code == 86 {
                    tracing::warn!(
                        collection,
                        "Index conflict detected, dropping conflicting indexes and retrying"
                    );
                    // Drop all non-_id indexes and recreate
                    coll.drop_indexes().await?;
                    coll.create_indexes(indexes).await?;
                    info!(collection, "Indexes recreated after conflict resolution");
                    return Ok(());
                }
            }
            Err(e)
        }
    }
}
