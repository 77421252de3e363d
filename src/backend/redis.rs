use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{Client, Value};
use slog::{debug, Logger};
use std::collections::HashMap;

use crate::backend::{batches, Backend, Changes, Selector};
use crate::error::{Error, Result};
use crate::record::{Record, FIELD_COUNT};

/// A Redis logical database.
///
/// Each record is a hash at the record's key with fields `value1` to `value6`. Writes are sent as
/// pipelines of at most `batch_size` commands, one batch at a time. Pipelined commands are not
/// atomic across keys.
pub struct KeyValueStore {
    log: Logger,
    connection: MultiplexedConnection,
    batch_size: usize,
    pattern: String,
}

impl KeyValueStore {
    /// Connect to the server at `url`.
    ///
    /// `pattern` is the key pattern listed by updates, retrieves and deletes.
    pub async fn connect(
        log: Logger,
        url: &str,
        batch_size: usize,
        pattern: &str,
    ) -> Result<Self> {
        let client = Client::open(url).map_err(Error::connection)?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(Error::connection)?;
        debug!(log, "Opened multiplexed connection"; "url" => url);
        Ok(KeyValueStore {
            log,
            connection,
            batch_size,
            pattern: pattern.to_owned(),
        })
    }

    async fn keys(&mut self, selector: &Selector) -> Result<Vec<String>> {
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(&self.pattern)
            .query_async(&mut self.connection)
            .await?;
        Ok(keys.into_iter().filter(|key| selector.matches(key)).collect())
    }
}

#[async_trait]
impl Backend for KeyValueStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn clear(&mut self) -> Result<()> {
        let _: () = redis::cmd("FLUSHDB").query_async(&mut self.connection).await?;
        Ok(())
    }

    async fn bulk_insert(&mut self, records: Vec<Record>) -> Result<u64> {
        let mut inserted = 0;
        for batch in batches(&records, self.batch_size) {
            let mut pipe = redis::pipe();
            for record in batch {
                pipe.hset_multiple(record.key(), &hash_fields(record)).ignore();
            }
            let _: () = pipe.query_async(&mut self.connection).await?;
            debug!(self.log, "Wrote batch"; "size" => batch.len());
            inserted += batch.len() as u64;
        }
        Ok(inserted)
    }

    async fn bulk_update(&mut self, selector: &Selector, changes: &Changes) -> Result<u64> {
        let fields = changed_fields(changes);
        if fields.is_empty() {
            return Ok(0);
        }

        let keys = self.keys(selector).await?;
        let mut modified = 0;
        for batch in batches(&keys, self.batch_size) {
            let mut pipe = redis::pipe();
            for key in batch {
                pipe.hset_multiple(key, &fields);
            }
            let replies: Vec<Value> = pipe.query_async(&mut self.connection).await?;
            debug!(self.log, "Wrote batch"; "size" => batch.len());
            modified += count_ok(&replies);
        }
        Ok(modified)
    }

    async fn retrieve_all(&mut self) -> Result<Vec<Record>> {
        let keys = self.keys(&Selector::All).await?;
        let mut records = Vec::with_capacity(keys.len());
        for batch in batches(&keys, self.batch_size) {
            let mut pipe = redis::pipe();
            for key in batch {
                pipe.hgetall(key);
            }
            let hashes: Vec<HashMap<String, String>> = pipe.query_async(&mut self.connection).await?;
            records.extend(batch.iter().zip(hashes).map(|(key, hash)| from_hash(key, hash)));
        }
        Ok(records)
    }

    async fn delete_all(&mut self) -> Result<u64> {
        let keys = self.keys(&Selector::All).await?;
        let mut deleted = 0;
        // DEL with no keys is a syntax error, so empty stores never reach it.
        for batch in batches(&keys, self.batch_size) {
            let count: u64 = redis::cmd("DEL")
                .arg(batch.to_vec())
                .query_async(&mut self.connection)
                .await?;
            debug!(self.log, "Deleted batch"; "size" => batch.len());
            deleted += count;
        }
        Ok(deleted)
    }
}

fn field_name(index: usize) -> String {
    format!("value{}", index + 1)
}

fn hash_fields(record: &Record) -> Vec<(String, &str)> {
    record
        .fields()
        .iter()
        .enumerate()
        .map(|(index, value)| (field_name(index), value.as_str()))
        .collect()
}

fn changed_fields(changes: &Changes) -> Vec<(String, &str)> {
    changes
        .iter()
        .map(|(index, value)| (field_name(index), value))
        .collect()
}

/// Rebuild a record from a stored hash, falling back to the key for an empty first field.
fn from_hash(key: &str, mut hash: HashMap<String, String>) -> Record {
    let mut record = Record::from_values(
        (0..FIELD_COUNT).map(|index| hash.remove(&field_name(index)).unwrap_or_default()),
    );
    if let Some(first) = record.field_mut(0) {
        if first.is_empty() {
            *first = key.to_owned();
        }
    }
    record
}

fn count_ok(replies: &[Value]) -> u64 {
    replies
        .iter()
        .filter(|reply| matches!(reply, Value::Okay))
        .count() as u64
}
