use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use mongodb::options::{ClientOptions, ServerApi, ServerApiVersion};
use mongodb::{Client, Collection};
use slog::{debug, Logger};

use crate::backend::{Backend, Changes, Selector};
use crate::error::{Error, Result};
use crate::record::{Record, FIELD_COUNT};

/// A MongoDB collection.
///
/// Records are stored as documents with string fields `column1` to `column6`.
pub struct DocumentStore {
    log: Logger,
    client: Option<Client>,
    collection: Collection<Document>,
}

impl DocumentStore {
    /// Connect to the server at `uri` and check it is reachable.
    ///
    /// The client pins the Stable API (v1, strict, with deprecation errors).
    pub async fn connect(
        log: Logger,
        uri: &str,
        database: &str,
        collection: &str,
    ) -> Result<Self> {
        let mut options = ClientOptions::parse(uri).await.map_err(Error::connection)?;
        options.server_api = Some(
            ServerApi::builder()
                .version(ServerApiVersion::V1)
                .strict(true)
                .deprecation_errors(true)
                .build(),
        );
        let client = Client::with_options(options).map_err(Error::connection)?;

        // Connections are lazy; ping so an unreachable server fails here.
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(Error::connection)?;
        debug!(log, "Pinged server"; "database" => database, "collection" => collection);

        let collection = client.database(database).collection(collection);
        Ok(DocumentStore {
            log,
            client: Some(client),
            collection,
        })
    }
}

#[async_trait]
impl Backend for DocumentStore {
    fn name(&self) -> &'static str {
        "mongodb"
    }

    async fn clear(&mut self) -> Result<()> {
        self.collection.delete_many(doc! {}).await?;
        Ok(())
    }

    async fn bulk_insert(&mut self, records: Vec<Record>) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        let documents: Vec<Document> = records.iter().map(to_document).collect();
        let size = documents.len();
        let result = self.collection.insert_many(documents).await?;
        debug!(self.log, "Wrote batch"; "size" => size);
        Ok(result.inserted_ids.len() as u64)
    }

    async fn bulk_update(&mut self, selector: &Selector, changes: &Changes) -> Result<u64> {
        if changes.is_empty() {
            return Ok(0);
        }
        let result = self
            .collection
            .update_many(filter(selector), doc! { "$set": set_document(changes) })
            .await?;
        debug!(self.log, "Updated documents"; "matched" => result.matched_count);
        Ok(result.modified_count)
    }

    async fn retrieve_all(&mut self) -> Result<Vec<Record>> {
        let mut cursor = self.collection.find(doc! {}).await?;
        let mut records = Vec::new();
        while cursor.advance().await? {
            let document: Document = cursor.deserialize_current()?;
            records.push(from_document(&document));
        }
        Ok(records)
    }

    async fn delete_all(&mut self) -> Result<u64> {
        let result = self.collection.delete_many(doc! {}).await?;
        Ok(result.deleted_count)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(client) = self.client.take() {
            client.shutdown().await;
        }
        Ok(())
    }
}

fn column(index: usize) -> String {
    format!("column{}", index + 1)
}

fn to_document(record: &Record) -> Document {
    let mut document = Document::new();
    for (index, value) in record.fields().iter().enumerate() {
        document.insert(column(index), value.as_str());
    }
    document
}

fn from_document(document: &Document) -> Record {
    Record::from_values((0..FIELD_COUNT).map(|index| document.get_str(column(index)).unwrap_or("")))
}

fn filter(selector: &Selector) -> Document {
    match selector {
        Selector::All => doc! {},
        Selector::Keys(keys) => doc! { "column1": { "$in": keys.clone() } },
    }
}

fn set_document(changes: &Changes) -> Document {
    let mut document = Document::new();
    for (index, value) in changes.iter() {
        document.insert(column(index), value);
    }
    document
}
