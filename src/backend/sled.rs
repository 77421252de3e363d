use async_trait::async_trait;
use rmp_serde::{from_slice, to_vec};
use slog::{debug, Logger};
use sled::{Batch, Db};
use std::path::Path;

use crate::backend::{batches, Backend, Changes, Selector};
use crate::error::Result;
use crate::record::Record;

/// An embedded sled tree.
///
/// Records are stored MessagePack-encoded under their key and written in batches of `batch_size`.
/// Records sharing a key overwrite each other, as they would in any key-value store.
pub struct EmbeddedStore {
    log: Logger,
    db: Db,
    batch_size: usize,
}

impl EmbeddedStore {
    /// Open (or create) a store in the directory at `path`.
    pub fn open<P: AsRef<Path>>(log: Logger, path: P, batch_size: usize) -> Result<Self> {
        let db = sled::open(&path)?;
        debug!(log, "Opened database"; "path" => path.as_ref().display().to_string());
        Ok(EmbeddedStore { log, db, batch_size })
    }

    /// A store that is removed when dropped.
    pub fn temporary(log: Logger, batch_size: usize) -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(EmbeddedStore { log, db, batch_size })
    }

    fn write<'a, I>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a [u8], &'a Record)>,
    {
        let mut batch = Batch::default();
        let mut size = 0;
        for (key, record) in entries {
            batch.insert(key, to_vec(record)?);
            size += 1;
        }
        self.db.apply_batch(batch)?;
        debug!(self.log, "Wrote batch"; "size" => size);
        Ok(())
    }
}

#[async_trait]
impl Backend for EmbeddedStore {
    fn name(&self) -> &'static str {
        "sled"
    }

    async fn clear(&mut self) -> Result<()> {
        self.db.clear()?;
        self.db.flush_async().await?;
        Ok(())
    }

    async fn bulk_insert(&mut self, records: Vec<Record>) -> Result<u64> {
        for batch in batches(&records, self.batch_size) {
            self.write(batch.iter().map(|record| (record.key().as_bytes(), record)))?;
        }
        self.db.flush_async().await?;
        Ok(records.len() as u64)
    }

    async fn bulk_update(&mut self, selector: &Selector, changes: &Changes) -> Result<u64> {
        if changes.is_empty() {
            return Ok(0);
        }

        let mut updated = Vec::new();
        for entry in self.db.iter() {
            let (key, value) = entry?;
            if !selector.matches(&String::from_utf8_lossy(&key)) {
                continue;
            }
            let mut record: Record = from_slice(&value)?;
            changes.apply(&mut record);
            updated.push((key, record));
        }

        // Entries stay under their original key even when the key field itself is overwritten.
        for batch in batches(&updated, self.batch_size) {
            self.write(batch.iter().map(|(key, record)| (&key[..], record)))?;
        }
        self.db.flush_async().await?;
        Ok(updated.len() as u64)
    }

    async fn retrieve_all(&mut self) -> Result<Vec<Record>> {
        self.db
            .iter()
            .values()
            .map(|value| -> Result<Record> { Ok(from_slice(&value?)?) })
            .collect()
    }

    async fn delete_all(&mut self) -> Result<u64> {
        let deleted = self.db.len() as u64;
        self.db.clear()?;
        self.db.flush_async().await?;
        Ok(deleted)
    }

    async fn close(&mut self) -> Result<()> {
        self.db.flush_async().await?;
        Ok(())
    }
}
