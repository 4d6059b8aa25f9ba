//! The benchmark catalog and its request payloads.
//!
//! The scheduler under test hosts a small, fixed set of benchmark functions. Each of them is
//! deployed in several independent copies, named `{kind}-{copy}`, so that load can be fanned out
//! over many function names without collisions.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkloadError};

/// A benchmark function hosted by the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum BenchmarkKind {
    /// Renders an HTML table with the chameleon template engine.
    Chameleon,
    /// Writes a file with `dd`.
    Dd,
    /// Runs floating point math in a loop.
    FloatOperation,
    /// Compresses a generated file with gzip.
    GzipCompression,
    /// Downloads a JSON document and round-trips it through the JSON codec.
    JsonDumpsLoads,
    /// Solves a dense linear system.
    Linpack,
    /// Multiplies two square matrices.
    Matmul,
    /// Encrypts and decrypts a message with pure-python AES.
    Pyaes,
}

impl BenchmarkKind {
    /// All benchmark kinds, in catalog order.
    pub const ALL: [BenchmarkKind; 8] = [
        BenchmarkKind::Chameleon,
        BenchmarkKind::Dd,
        BenchmarkKind::FloatOperation,
        BenchmarkKind::GzipCompression,
        BenchmarkKind::JsonDumpsLoads,
        BenchmarkKind::Linpack,
        BenchmarkKind::Matmul,
        BenchmarkKind::Pyaes,
    ];

    /// Returns the name under which the scheduler deploys this benchmark.
    pub fn as_str(self) -> &'static str {
        match self {
            BenchmarkKind::Chameleon => "chameleon",
            BenchmarkKind::Dd => "dd",
            BenchmarkKind::FloatOperation => "float_operation",
            BenchmarkKind::GzipCompression => "gzip_compression",
            BenchmarkKind::JsonDumpsLoads => "json_dumps_loads",
            BenchmarkKind::Linpack => "linpack",
            BenchmarkKind::Matmul => "matmul",
            BenchmarkKind::Pyaes => "pyaes",
        }
    }

    /// Returns the request parameters for this benchmark.
    pub fn payload(self) -> Payload {
        match self {
            BenchmarkKind::Chameleon => Payload::Chameleon {
                num_of_rows: 250,
                num_of_cols: 250,
                metadata: "",
            },
            BenchmarkKind::Dd => Payload::Dd {
                bs: "1024",
                count: "100000",
            },
            BenchmarkKind::FloatOperation => Payload::FloatOperation {
                n: 100_000,
                metadata: "",
            },
            BenchmarkKind::GzipCompression => Payload::GzipCompression { file_size: 5 },
            BenchmarkKind::JsonDumpsLoads => Payload::JsonDumpsLoads {
                link: "https://api.nobelprize.org/2.1/nobelPrizes",
            },
            BenchmarkKind::Linpack => Payload::Linpack {
                n: 100,
                metadata: "",
            },
            BenchmarkKind::Matmul => Payload::Matmul {
                n: 100,
                metadata: "",
            },
            BenchmarkKind::Pyaes => Payload::Pyaes {
                length_of_message: 100,
                num_of_iterations: 100,
                metadata: "",
            },
        }
    }
}

impl fmt::Display for BenchmarkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BenchmarkKind {
    type Err = WorkloadError;

    fn from_str(s: &str) -> Result<Self> {
        BenchmarkKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| WorkloadError::UnknownBenchmarkKind(s.to_owned()))
    }
}

impl TryFrom<String> for BenchmarkKind {
    type Error = WorkloadError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<BenchmarkKind> for &'static str {
    fn from(kind: BenchmarkKind) -> Self {
        kind.as_str()
    }
}

/// The JSON request body of a benchmark invocation.
///
/// Fields serialize in declaration order.
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Chameleon {
        num_of_rows: u32,
        num_of_cols: u32,
        metadata: &'static str,
    },
    Dd {
        bs: &'static str,
        count: &'static str,
    },
    FloatOperation { n: u32, metadata: &'static str },
    GzipCompression { file_size: u32 },
    JsonDumpsLoads { link: &'static str },
    Linpack { n: u32, metadata: &'static str },
    Matmul { n: u32, metadata: &'static str },
    Pyaes {
        length_of_message: u32,
        num_of_iterations: u32,
        metadata: &'static str,
    },
}

/// Builds the serialized request body for `kind`.
///
/// This is a pure function: the same kind always yields byte-identical output.
pub fn build_payload(kind: BenchmarkKind) -> Bytes {
    // Payloads only contain integers and static strings, which cannot fail to serialize.
    let body = serde_json::to_vec(&kind.payload()).expect("benchmark payloads always serialize");
    Bytes::from(body)
}

/// One deployed copy of a benchmark.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BenchmarkInstance {
    /// The benchmark to invoke.
    pub kind: BenchmarkKind,
    /// Which copy of the benchmark to invoke, in `[0, copies)`.
    pub copy: usize,
}

impl BenchmarkInstance {
    /// Returns the function name the scheduler knows this instance by.
    pub fn function_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for BenchmarkInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind, self.copy)
    }
}

/// An ordered, duplicate-free selection of benchmark kinds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Catalog {
    kinds: Vec<BenchmarkKind>,
}

impl Catalog {
    /// Creates a catalog from an ordered list of kinds.
    pub fn new(kinds: Vec<BenchmarkKind>) -> Result<Self> {
        if kinds.is_empty() {
            return Err(WorkloadError::InvalidCatalog("catalog is empty".into()));
        }

        for (i, kind) in kinds.iter().enumerate() {
            if kinds[..i].contains(kind) {
                return Err(WorkloadError::InvalidCatalog(format!(
                    "benchmark `{kind}` is listed more than once"
                )));
            }
        }

        Ok(Self { kinds })
    }

    /// Returns the number of benchmark kinds.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Always `false`, a catalog holds at least one kind.
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Returns the kinds in catalog order.
    pub fn kinds(&self) -> &[BenchmarkKind] {
        &self.kinds
    }

    /// Maps a subset position onto the benchmark instance it drives.
    ///
    /// Positions are laid out copy by copy: `position = copy * len + kind_position`.
    pub fn resolve(&self, position: usize, copies: usize) -> Result<BenchmarkInstance> {
        let len = self.kinds.len();
        if position >= len * copies {
            return Err(WorkloadError::UnknownFunction(format!("#{position}")));
        }

        Ok(BenchmarkInstance {
            kind: self.kinds[position % len],
            copy: position / len,
        })
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            kinds: BenchmarkKind::ALL.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn payload_bodies() {
        let expected = [
            (
                BenchmarkKind::Chameleon,
                r#"{"num_of_rows":250,"num_of_cols":250,"metadata":""}"#,
            ),
            (BenchmarkKind::Dd, r#"{"bs":"1024","count":"100000"}"#),
            (
                BenchmarkKind::FloatOperation,
                r#"{"n":100000,"metadata":""}"#,
            ),
            (BenchmarkKind::GzipCompression, r#"{"file_size":5}"#),
            (
                BenchmarkKind::JsonDumpsLoads,
                r#"{"link":"https://api.nobelprize.org/2.1/nobelPrizes"}"#,
            ),
            (BenchmarkKind::Linpack, r#"{"n":100,"metadata":""}"#),
            (BenchmarkKind::Matmul, r#"{"n":100,"metadata":""}"#),
            (
                BenchmarkKind::Pyaes,
                r#"{"length_of_message":100,"num_of_iterations":100,"metadata":""}"#,
            ),
        ];

        for (kind, body) in expected {
            assert_eq!(build_payload(kind), body.as_bytes(), "{kind}");
        }
    }

    #[test]
    fn payloads_are_pure() {
        for kind in BenchmarkKind::ALL {
            assert_eq!(build_payload(kind), build_payload(kind));
        }
    }

    #[test]
    fn kind_names() {
        for kind in BenchmarkKind::ALL {
            assert_eq!(kind.as_str().parse::<BenchmarkKind>().unwrap(), kind);
        }

        let err = "fibonacci".parse::<BenchmarkKind>().unwrap_err();
        assert!(matches!(err, WorkloadError::UnknownBenchmarkKind(name) if name == "fibonacci"));
    }

    #[test]
    fn kinds_deserialize_by_name() {
        let kinds: Vec<BenchmarkKind> = serde_json::from_str(r#"["dd", "pyaes"]"#).unwrap();
        assert_eq!(kinds, [BenchmarkKind::Dd, BenchmarkKind::Pyaes]);

        assert!(serde_json::from_str::<BenchmarkKind>(r#""fibonacci""#).is_err());
        assert_eq!(
            serde_json::to_string(&BenchmarkKind::GzipCompression).unwrap(),
            r#""gzip_compression""#
        );
    }

    #[test]
    fn instance_function_name() {
        let instance = BenchmarkInstance {
            kind: BenchmarkKind::JsonDumpsLoads,
            copy: 3,
        };
        assert_eq!(instance.function_name(), "json_dumps_loads-3");
    }

    #[test]
    fn resolve_layout() {
        let catalog = Catalog::default();

        let first = catalog.resolve(0, 2).unwrap();
        assert_eq!((first.kind, first.copy), (BenchmarkKind::Chameleon, 0));

        let ninth = catalog.resolve(9, 2).unwrap();
        assert_eq!((ninth.kind, ninth.copy), (BenchmarkKind::Dd, 1));

        let last = catalog.resolve(15, 2).unwrap();
        assert_eq!((last.kind, last.copy), (BenchmarkKind::Pyaes, 1));

        assert!(catalog.resolve(16, 2).is_err());
    }

    #[test]
    fn resolve_is_bijective() {
        let catalog = Catalog::new(vec![
            BenchmarkKind::Matmul,
            BenchmarkKind::Dd,
            BenchmarkKind::Linpack,
        ])
        .unwrap();
        let copies = 5;

        let instances: HashSet<_> = (0..catalog.len() * copies)
            .map(|position| catalog.resolve(position, copies).unwrap())
            .collect();

        assert_eq!(instances.len(), catalog.len() * copies);
        for copy in 0..copies {
            for &kind in catalog.kinds() {
                assert!(instances.contains(&BenchmarkInstance { kind, copy }));
            }
        }
    }

    #[test]
    fn catalog_validation() {
        assert!(matches!(
            Catalog::new(Vec::new()),
            Err(WorkloadError::InvalidCatalog(_))
        ));
        assert!(matches!(
            Catalog::new(vec![BenchmarkKind::Dd, BenchmarkKind::Dd]),
            Err(WorkloadError::InvalidCatalog(_))
        ));
        assert_eq!(Catalog::default().len(), 8);
    }
}
