//! Contains a remote implementation using HTTP to invoke functions on the scheduler.

use std::time::Duration;

use bytes::Bytes;
use loadgen_workload::BenchmarkInstance;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderValue};

/// A remote implementation using HTTP to interact with the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerRemote {
    /// The base URL of the scheduler, without trailing slash.
    base: String,
    /// The HTTP client shared by all virtual users.
    client: reqwest::Client,
}

impl SchedulerRemote {
    /// Creates a new `SchedulerRemote` for the given base URL.
    ///
    /// Every invocation is aborted after `timeout`.
    pub fn new(base: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("loadgen/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            base: base.trim_end_matches('/').to_owned(),
            client,
        })
    }

    /// Returns the base URL of the scheduler.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Returns the URL that invokes `instance`.
    pub fn run_url(&self, instance: &BenchmarkInstance) -> String {
        format!("{}/run/{instance}", self.base)
    }

    /// Invokes `instance` with the given JSON body and returns the response status.
    ///
    /// The response body is discarded.
    pub async fn invoke(
        &self,
        instance: &BenchmarkInstance,
        payload: Bytes,
    ) -> reqwest::Result<StatusCode> {
        let response = self
            .client
            .post(self.run_url(instance))
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(payload)
            .send()
            .await?;

        Ok(response.status())
    }
}

#[cfg(test)]
mod tests {
    use loadgen_test::server::TestScheduler;
    use loadgen_workload::{BenchmarkKind, build_payload};

    use super::*;

    #[test]
    fn run_url_layout() {
        let remote =
            SchedulerRemote::new("http://scheduler:9020/", Duration::from_secs(1)).unwrap();
        let instance = BenchmarkInstance {
            kind: BenchmarkKind::FloatOperation,
            copy: 3,
        };

        assert_eq!(
            remote.run_url(&instance),
            "http://scheduler:9020/run/float_operation-3"
        );
    }

    #[tokio::test]
    async fn invokes_function() {
        let scheduler = TestScheduler::new().await;
        let remote = SchedulerRemote::new(&scheduler.url("/"), Duration::from_secs(5)).unwrap();
        let instance = BenchmarkInstance {
            kind: BenchmarkKind::Dd,
            copy: 0,
        };

        let status = remote
            .invoke(&instance, build_payload(BenchmarkKind::Dd))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::OK);

        let invocations = scheduler.invocations();
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].function, "dd-0");
        assert_eq!(
            invocations[0].content_type.as_deref(),
            Some("application/json")
        );
        assert_eq!(invocations[0].body, build_payload(BenchmarkKind::Dd));
    }

    #[tokio::test]
    async fn connection_refused() {
        // Bind and drop a scheduler to get a port nobody listens on.
        let url = TestScheduler::new().await.url("/");
        tokio::task::yield_now().await;
        let remote = SchedulerRemote::new(&url, Duration::from_secs(1)).unwrap();
        let instance = BenchmarkInstance {
            kind: BenchmarkKind::Linpack,
            copy: 0,
        };

        let result = remote
            .invoke(&instance, build_payload(BenchmarkKind::Linpack))
            .await;
        assert!(result.is_err());
    }
}
