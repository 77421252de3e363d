use std::io::{self, Write};
use std::time::Duration;

use crate::driver::Phase;

/// The timing and outcome of a single benchmark phase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BenchmarkResult {
    /// The phase that ran.
    pub phase: Phase,

    /// Wall-clock time spent in the backend call.
    pub elapsed: Duration,

    /// How many rows the phase touched, when the backend reports it.
    pub count: Option<u64>,
}

/// Format a result as its report lines.
///
/// ```
/// use std::time::Duration;
/// use dbbench::{format_result, BenchmarkResult, Phase};
///
/// let lines = format_result(&BenchmarkResult {
///     phase: Phase::Insert,
///     elapsed: Duration::from_millis(12),
///     count: Some(3),
/// });
/// assert_eq!(lines, vec!["Insert time taken: 12ms", "Inserted 3 rows data"]);
/// ```
pub fn format_result(result: &BenchmarkResult) -> Vec<String> {
    let mut lines = vec![format!(
        "{} time taken: {}ms",
        result.phase,
        result.elapsed.as_millis()
    )];
    if let (Some(verb), Some(count)) = (result.phase.verb(), result.count) {
        lines.push(format!("{} {} rows data", verb, count));
    }
    lines
}

/// Writes benchmark results to an output stream.
pub struct Reporter<W> {
    out: W,
}

impl<W: Write> Reporter<W> {
    /// Report to `out`.
    pub fn new(out: W) -> Self {
        Reporter { out }
    }

    /// Write the lines for `result`.
    pub fn report(&mut self, result: &BenchmarkResult) -> io::Result<()> {
        for line in format_result(result) {
            writeln!(self.out, "{}", line)?;
        }
        self.out.flush()
    }

    /// Recover the output stream.
    pub fn into_inner(self) -> W {
        self.out
    }
}
