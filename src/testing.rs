use slog::{o, Drain, Key, Logger, Never, OwnedKVList, Serializer, KV};
use std::fmt::{self, Write};
use std::sync::{Arc, Mutex};

/// Log lines captured by [`capture`], each the message followed by ` key=value` pairs.
#[derive(Clone, Default)]
pub(crate) struct Captured(Arc<Mutex<Vec<String>>>);

impl Captured {
    pub(crate) fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// The lines starting with `message`.
    pub(crate) fn matching(&self, message: &str) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|line| line.starts_with(message))
            .collect()
    }
}

struct Line<'a>(&'a mut String);

impl Serializer for Line<'_> {
    fn emit_arguments(&mut self, key: Key, val: &fmt::Arguments) -> slog::Result {
        write!(self.0, " {}={}", key, val)?;
        Ok(())
    }
}

impl Drain for Captured {
    type Ok = ();
    type Err = Never;

    fn log(&self, record: &slog::Record, _: &OwnedKVList) -> Result<(), Never> {
        let mut line = record.msg().to_string();
        let _ = record.kv().serialize(record, &mut Line(&mut line));
        self.0.lock().unwrap().push(line);
        Ok(())
    }
}

/// A logger that keeps every record, at every level.
pub(crate) fn capture() -> (Logger, Captured) {
    let captured = Captured::default();
    (Logger::root(captured.clone(), o!()), captured)
}
