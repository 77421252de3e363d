use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use crate::error::Result;

/// The number of fields in every [`Record`].
pub const FIELD_COUNT: usize = 6;

/// A single benchmark row: six string fields, in input order.
///
/// The first field doubles as the record's key for stores that address entities by key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Record {
    fields: [String; FIELD_COUNT],
}

impl Record {
    /// Build a record from a sequence of values.
    ///
    /// Missing trailing values are left empty and values beyond the sixth are ignored.
    ///
    /// ```
    /// use dbbench::Record;
    /// let record = Record::from_values(vec!["a", "b"]);
    /// assert_eq!(record.fields(), &["a", "b", "", "", "", ""]);
    /// ```
    pub fn from_values<I, S>(values: I) -> Record
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut record = Record::default();
        for (slot, value) in record.fields.iter_mut().zip(values) {
            *slot = value.into();
        }
        record
    }

    /// Parse a single row, splitting on `delimiter`.
    pub fn parse(line: &str, delimiter: char) -> Record {
        Record::from_values(line.split(delimiter))
    }

    /// The lookup key of the record (its first field).
    pub fn key(&self) -> &str {
        &self.fields[0]
    }

    /// All fields of the record.
    pub fn fields(&self) -> &[String; FIELD_COUNT] {
        &self.fields
    }

    /// Mutable access to a single field.
    pub fn field_mut(&mut self, index: usize) -> Option<&mut String> {
        self.fields.get_mut(index)
    }
}

/// The delimiters used to split an input file into rows and fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Delimiters {
    /// Separates fields within a row.
    pub field: char,

    /// Separates rows.
    pub row: u8,
}

impl Default for Delimiters {
    fn default() -> Self {
        Delimiters {
            field: '\t',
            row: b'\n',
        }
    }
}

/// A delimited file of records.
///
/// The file is re-opened on every call to [`records`], so a source can be read any number of times.
///
/// [`records`]: struct.RecordSource.html#method.records
#[derive(Clone, Debug)]
pub struct RecordSource {
    path: PathBuf,
    delimiters: Delimiters,
}

impl RecordSource {
    /// A tab-separated source at `path`.
    pub fn new<P: Into<PathBuf>>(path: P) -> RecordSource {
        RecordSource::with_delimiters(path, Delimiters::default())
    }

    /// A source at `path` split by the given delimiters.
    pub fn with_delimiters<P: Into<PathBuf>>(path: P, delimiters: Delimiters) -> RecordSource {
        RecordSource {
            path: path.into(),
            delimiters,
        }
    }

    /// Open the file and lazily iterate its records.
    pub fn records(&self) -> Result<Records<BufReader<File>>> {
        let file = File::open(&self.path)?;
        Ok(Records::new(BufReader::new(file), self.delimiters))
    }

    /// Read every record into memory.
    pub fn load(&self) -> Result<Vec<Record>> {
        self.records()?.collect()
    }
}

/// An iterator over the records of a reader.
pub struct Records<R> {
    rows: io::Split<R>,
    delimiters: Delimiters,
}

impl<R: BufRead> Records<R> {
    /// Iterate the records in `reader`.
    pub fn new(reader: R, delimiters: Delimiters) -> Self {
        Records {
            rows: reader.split(delimiters.row),
            delimiters,
        }
    }
}

impl<R: BufRead> Iterator for Records<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let mut row = match self.rows.next()? {
                Ok(row) => row,
                Err(err) => return Some(Err(err.into())),
            };
            if self.delimiters.row == b'\n' && row.last() == Some(&b'\r') {
                row.pop();
            }
            if row.is_empty() {
                continue;
            }
            let line = String::from_utf8_lossy(&row);
            return Some(Ok(Record::parse(&line, self.delimiters.field)));
        }
    }
}
