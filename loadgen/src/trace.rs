//! Conversion of Azure Functions invocation traces into popularity tables.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use loadgen_workload::PopularityTable;
use serde::Deserialize;

/// One row of the invocation trace. Only the function hash is of interest.
#[derive(Debug, Deserialize)]
struct Invocation {
    func: String,
}

/// Reads the trace CSV at `path` and computes each function's share of all invocations.
///
/// The file must start with a header row that names a `func` column. Rows may have any number of
/// other columns.
pub async fn probabilities_from_trace(path: &Path) -> Result<PopularityTable> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("failed to open trace {}", path.display()))?;

    let mut reader = csv_async::AsyncReaderBuilder::new()
        .flexible(true)
        .create_deserializer(file);
    let mut rows = reader.deserialize::<Invocation>();

    let mut counts = HashMap::<String, u64>::new();
    let mut line = 1;
    while let Some(row) = rows.next().await {
        line += 1;
        let row = row.with_context(|| format!("malformed trace row at line {line}"))?;
        *counts.entry(row.func).or_default() += 1;
    }

    tracing::info!(
        rows = line - 1,
        functions = counts.len(),
        "read invocation trace"
    );
    Ok(PopularityTable::from_counts(counts)?)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use loadgen_workload::WorkloadError;

    use super::*;

    #[tokio::test]
    async fn counts_function_column() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                b"app,func,end_timestamp,duration\n\
                  a1,f1,1.0,0.1\n\
                  a1,f2,2.0,0.2\n\
                  a2,f1,3.0,0.1\n\
                  a2,f1,4.0,0.3\n",
            )
            .unwrap();

        let table = probabilities_from_trace(tempfile.path()).await.unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.probability("f1"), Some(0.75));
        assert_eq!(table.probability("f2"), Some(0.25));
    }

    #[tokio::test]
    async fn header_only() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile.write_all(b"app,func,end_timestamp\n").unwrap();

        let err = probabilities_from_trace(tempfile.path())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WorkloadError>(),
            Some(WorkloadError::EmptyTrace)
        ));
    }

    #[tokio::test]
    async fn missing_column() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile.write_all(b"app,hash\na1,f1\n").unwrap();

        assert!(probabilities_from_trace(tempfile.path()).await.is_err());
    }

    #[tokio::test]
    async fn missing_file() {
        assert!(
            probabilities_from_trace(Path::new("/nonexistent/trace.csv"))
                .await
                .is_err()
        );
    }
}
