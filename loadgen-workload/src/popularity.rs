//! The function popularity table.
//!
//! A popularity table maps opaque function identifiers, usually hashes from the Azure Functions
//! invocation trace, to their relative invocation probability. On disk it is a JSON object:
//!
//! ```json
//! {
//!     "0d8ffd6a...": { "probability": 0.0021 },
//!     "1e02b3c1...": { "probability": 0.0003 }
//! }
//! ```
//!
//! The table is loaded once at startup and never mutated afterwards.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkloadError};

/// Statistics recorded for one function in the popularity table.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionStats {
    /// Relative invocation probability, in `(0, 1]`.
    pub probability: f64,
}

/// An immutable mapping from function identifiers to invocation probabilities.
///
/// Entries are kept in sorted key order, which makes iteration independent of how the source
/// file was written.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PopularityTable {
    functions: BTreeMap<String, FunctionStats>,
}

impl PopularityTable {
    /// Creates a table from `(identifier, probability)` pairs, validating every probability.
    pub fn new<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let functions = entries
            .into_iter()
            .map(|(function, probability)| (function.into(), FunctionStats { probability }))
            .collect();
        Self::validated(functions)
    }

    /// Loads a table from the JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parses a table from a JSON reader.
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let functions: BTreeMap<String, FunctionStats> = serde_json::from_reader(reader)?;
        Self::validated(functions)
    }

    /// Computes a table from a stream of invocations, one function identifier per invocation.
    ///
    /// Each function's probability is its share of all invocations.
    pub fn from_invocations<I, S>(invocations: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut counts = BTreeMap::<String, u64>::new();
        for function in invocations {
            *counts.entry(function.into()).or_default() += 1;
        }
        Self::from_counts(counts)
    }

    /// Computes a table from per-function invocation counts.
    ///
    /// Functions with a count of zero are skipped.
    pub fn from_counts<I, S>(counts: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        let counts: Vec<(String, u64)> = counts
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(function, count)| (function.into(), count))
            .collect();

        let total: u64 = counts.iter().map(|(_, count)| count).sum();
        if total == 0 {
            return Err(WorkloadError::EmptyTrace);
        }

        let functions = counts
            .into_iter()
            .map(|(function, count)| {
                let probability = count as f64 / total as f64;
                (function, FunctionStats { probability })
            })
            .collect();

        Ok(Self { functions })
    }

    /// Writes the table as pretty-printed JSON.
    pub fn write_json(&self, writer: impl Write) -> Result<()> {
        serde_json::to_writer_pretty(writer, &self.functions)?;
        Ok(())
    }

    /// Returns the probability recorded for `function`.
    pub fn probability(&self, function: &str) -> Option<f64> {
        self.functions.get(function).map(|stats| stats.probability)
    }

    /// Returns the number of functions in the table.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Returns `true` if the table has no functions.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Iterates all function identifiers in sorted order.
    pub fn functions(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Iterates all entries in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FunctionStats)> {
        self.functions
            .iter()
            .map(|(function, stats)| (function.as_str(), stats))
    }

    fn validated(functions: BTreeMap<String, FunctionStats>) -> Result<Self> {
        for (function, stats) in &functions {
            let value = stats.probability;
            if !value.is_finite() || value <= 0.0 || value > 1.0 {
                return Err(WorkloadError::InvalidProbability {
                    function: function.clone(),
                    value,
                });
            }
        }

        tracing::debug!(functions = functions.len(), "loaded popularity table");
        Ok(Self { functions })
    }
}

impl TryFrom<&[u8]> for PopularityTable {
    type Error = WorkloadError;

    fn try_from(value: &[u8]) -> Result<Self> {
        Self::from_reader(io::Cursor::new(value))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn parses_trace_json() {
        let json = br#"{
            "b": { "probability": 0.25 },
            "a": { "probability": 0.75, "invocations": 3 }
        }"#;
        let table = PopularityTable::try_from(&json[..]).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.functions().collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(table.probability("a"), Some(0.75));
        assert_eq!(table.probability("c"), None);
    }

    #[test]
    fn loads_from_file() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(br#"{"f1": {"probability": 1.0}}"#)
            .unwrap();

        let table = PopularityTable::load(tempfile.path()).unwrap();
        assert_eq!(table.probability("f1"), Some(1.0));
    }

    #[test]
    fn missing_file() {
        let err = PopularityTable::load("/nonexistent/probabilities.json").unwrap_err();
        assert!(matches!(err, WorkloadError::Io(_)));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = PopularityTable::try_from(&br#"{"f1": 0.5}"#[..]).unwrap_err();
        assert!(matches!(err, WorkloadError::Table(_)));
    }

    #[test]
    fn rejects_invalid_probabilities() {
        for value in [0.0, -0.1, 1.5, f64::NAN] {
            let err = PopularityTable::new([("f1", value)]).unwrap_err();
            assert!(
                matches!(err, WorkloadError::InvalidProbability { ref function, .. } if function == "f1"),
                "accepted {value}"
            );
        }
    }

    #[test]
    fn counts_invocations() {
        let table = PopularityTable::from_invocations(["x", "y", "x", "x"]).unwrap();
        assert_eq!(table.probability("x"), Some(0.75));
        assert_eq!(table.probability("y"), Some(0.25));
    }

    #[test]
    fn counts_skip_unused_functions() {
        let table = PopularityTable::from_counts([("x", 3), ("y", 0), ("z", 1)]).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.probability("z"), Some(0.25));
    }

    #[test]
    fn empty_trace() {
        let err = PopularityTable::from_invocations(Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, WorkloadError::EmptyTrace));
    }

    #[test]
    fn json_roundtrip() {
        let table = PopularityTable::from_invocations(["x", "y", "y", "z"]).unwrap();

        let mut buf = Vec::new();
        table.write_json(&mut buf).unwrap();
        let parsed = PopularityTable::try_from(buf.as_slice()).unwrap();

        assert_eq!(parsed, table);
    }
}
