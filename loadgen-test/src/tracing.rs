//! Log output for load generator tests.
//!
//! [`init`] routes the load generator's events to the test runner's output, and [`capture`]
//! collects them in memory so a test can assert on what a run reported:
//!
//! ```
//! let (logs, _guard) = loadgen_test::tracing::capture();
//! tracing::info!(target: "loadgen::runner", phase = "low", "starting phase");
//! assert!(logs.contains("starting phase"));
//! ```

use std::io;
use std::sync::{Arc, Mutex};

use ::tracing::subscriber::DefaultGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::util::SubscriberInitExt;

/// Log targets of the workspace crates, all recorded at full verbosity.
const TARGETS: &str = "loadgen=trace,loadgen_workload=trace";

fn filter() -> EnvFilter {
    // Dependencies such as hyper and reqwest stay quiet unless they fail.
    EnvFilter::new(format!("error,{TARGETS}"))
}

/// Installs a global logger writing to the test runner's captured stdout.
///
/// Safe to call from every test; only the first call installs the logger.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_target(true)
        .with_test_writer()
        .compact()
        .try_init()
        .ok();
}

/// In-memory log lines recorded by [`capture`].
#[derive(Clone, Debug, Default)]
pub struct CapturedLogs {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    /// Returns everything logged so far.
    pub fn contents(&self) -> String {
        let buffer = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buffer).into_owned()
    }

    /// Returns all lines that contain `needle`.
    pub fn lines_containing(&self, needle: &str) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|line| line.contains(needle))
            .map(str::to_owned)
            .collect()
    }

    /// Whether any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        !self.lines_containing(needle).is_empty()
    }
}

/// Writer handed out per event by [`CapturedLogs`].
#[derive(Debug)]
pub struct CapturedWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for CapturedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CapturedWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

/// Records the load generator's logs on the current thread until the guard is dropped.
///
/// The subscriber is thread-local, so tasks must run on the test's thread, as they do in a
/// `current_thread` Tokio runtime.
pub fn capture() -> (CapturedLogs, DefaultGuard) {
    let logs = CapturedLogs::default();
    let guard = tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(logs.clone())
        .with_ansi(false)
        .without_time()
        .finish()
        .set_default();

    (logs, guard)
}
