use async_trait::async_trait;
use bson::{doc, Document};
use futures::StreamExt;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, FindOneOptions, FindOptions, IndexOptions, UpdateOptions};
use mongodb::{Client, Collection, Database, IndexModel};

use super::{DocumentCollection, InsertOutcome, UpdateOutcome};
use crate::config::Config;
use crate::models::*;

/// Connect and ping; an unreachable store fails here before any crawl starts.
pub async fn connect(cfg: &Config) -> Result<Database> {
    let client_options = ClientOptions::parse(&cfg.mongodb_uri).await?;
    let client = Client::with_options(client_options)?;
    let db = client.database(&cfg.database_name);
    db.run_command(doc! { "ping": 1 }, None).await?;
    tracing::info!(database = %cfg.database_name, "Connected to MongoDB");
    Ok(db)
}

#[derive(Clone)]
pub struct MongoCollection {
    collection: Collection<Document>,
}

impl MongoCollection {
    pub fn new(db: &Database, name: &str) -> Self {
        Self { collection: db.collection::<Document>(name) }
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    if let ErrorKind::Write(WriteFailure::WriteError(ref write_error)) = *err.kind {
        return write_error.code == 11000;
    }
    let msg = err.to_string();
    msg.contains("E11000") || msg.to_lowercase().contains("duplicate key")
}

#[async_trait]
impl DocumentCollection for MongoCollection {
    fn name(&self) -> &str {
        self.collection.name()
    }

    async fn find_one(&self, filter: Document, sort: Option<Document>) -> Result<Option<Document>> {
        let options = FindOneOptions::builder().sort(sort).build();
        Ok(self.collection.find_one(filter, options).await?)
    }

    async fn find(&self, filter: Document, limit: Option<i64>) -> Result<Vec<Document>> {
        let options = FindOptions::builder().limit(limit).build();
        let mut cursor = self.collection.find(filter, options).await?;
        let mut documents = Vec::new();
        while let Some(doc) = cursor.next().await {
            documents.push(doc?);
        }
        Ok(documents)
    }

    async fn insert_one(&self, document: Document) -> Result<InsertOutcome> {
        match self.collection.insert_one(document, None).await {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) if is_duplicate_key(&e) => Ok(InsertOutcome::DuplicateKey),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_one(&self, filter: Document, update: Document, upsert: bool) -> Result<UpdateOutcome> {
        let options = UpdateOptions::builder().upsert(upsert).build();
        let result = self.collection.update_one(filter, update, options).await?;
        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
            upserted: result.upserted_id.is_some(),
        })
    }

    async fn create_unique_index(&self, field: &str) -> Result<()> {
        let mut keys = Document::new();
        keys.insert(field, 1);
        let index = IndexModel::builder()
            .keys(keys)
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection.create_index(index, None).await?;
        Ok(())
    }

    async fn count_documents(&self, filter: Document) -> Result<u64> {
        Ok(self.collection.count_documents(filter, None).await?)
    }

    async fn drop_collection(&self) -> Result<()> {
        self.collection.drop(None).await?;
        Ok(())
    }
}
