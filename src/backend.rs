mod mongo;
mod redis;
mod sled;

use async_trait::async_trait;
use std::slice::Chunks;

use crate::error::Result;
use crate::record::{Record, FIELD_COUNT};

pub use self::mongo::DocumentStore;
pub use self::redis::KeyValueStore;
pub use self::sled::EmbeddedStore;

/// The number of records written per round trip by batching backends.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Split `items` into write batches of at most `size` (at least one item each).
pub(crate) fn batches<T>(items: &[T], size: usize) -> Chunks<'_, T> {
    items.chunks(size.max(1))
}

/// Defines the store interface driven by [`driver::Driver`].
///
/// Every operation reports how many entities it touched. Consistency across a bulk call is whatever
/// the underlying store gives: a document store's bulk write is a single call, whereas pipelined
/// key-value commands are not atomic across keys.
///
/// [`driver::Driver`]: ../driver/struct.Driver.html
#[async_trait]
pub trait Backend: Send {
    /// A short name for logs.
    fn name(&self) -> &'static str;

    /// Remove all data in the target namespace.
    async fn clear(&mut self) -> Result<()>;

    /// Write all `records` as new entities, returning how many were written.
    async fn bulk_insert(&mut self, records: Vec<Record>) -> Result<u64>;

    /// Overwrite fields on every entity matched by `selector`, returning how many were modified.
    async fn bulk_update(&mut self, selector: &Selector, changes: &Changes) -> Result<u64>;

    /// Read every stored entity into memory.
    async fn retrieve_all(&mut self) -> Result<Vec<Record>>;

    /// Remove every stored entity, returning how many were removed.
    async fn delete_all(&mut self) -> Result<u64>;

    /// Release the connection.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Selects the entities a bulk update applies to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    /// Every stored entity.
    All,

    /// Entities whose key (first field) is one of the given keys.
    Keys(Vec<String>),
}

impl Selector {
    /// Whether `key` is selected.
    pub fn matches(&self, key: &str) -> bool {
        match self {
            Selector::All => true,
            Selector::Keys(keys) => keys.iter().any(|k| k == key),
        }
    }
}

/// A uniform overwrite: an optional new value for each field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Changes {
    values: [Option<String>; FIELD_COUNT],
}

impl Changes {
    /// Overwrite the field at `index` with `value`.
    ///
    /// Indices past the last field are ignored.
    pub fn set<S: Into<String>>(mut self, index: usize, value: S) -> Self {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = Some(value.into());
        }
        self
    }

    /// The overwrite used by the benchmark's update phase: `updatedValue1` to `updatedValue6`.
    pub fn benchmark() -> Self {
        (0..FIELD_COUNT).fold(Changes::default(), |changes, index| {
            changes.set(index, format!("updatedValue{}", index + 1))
        })
    }

    /// The fields being overwritten, as `(index, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(index, value)| value.as_ref().map(|v| (index, v.as_str())))
    }

    /// Whether no field is overwritten.
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Apply the overwrite to `record`.
    pub fn apply(&self, record: &mut Record) {
        for (index, value) in self.iter() {
            if let Some(field) = record.field_mut(index) {
                *field = value.to_owned();
            }
        }
    }
}
