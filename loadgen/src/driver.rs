//! The per-user iteration loop.
//!
//! A [`VirtualUser`] repeatedly picks a function from the shared [`WorkloadPlan`], invokes the
//! benchmark instance it maps to and pauses for a random think time. It never stops on its own;
//! the [runner](crate::runner) decides when a phase is over.

use std::time::Duration;

use loadgen_workload::{BenchmarkInstance, Sfc32, WorkloadPlan};
use reqwest::StatusCode;

use crate::checks::Checks;
use crate::http::SchedulerRemote;

/// Shortest pause between two invocations of the same user.
pub const MIN_THINK_TIME: Duration = Duration::from_millis(100);

/// Width of the think time interval in nanoseconds, so pauses lie in `[0.1, 1.0)` seconds.
const THINK_TIME_SPAN_NANOS: u64 = 900_000_000;

/// What a virtual user is currently doing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UserState {
    /// Created, but has not started an iteration yet.
    Idle,
    /// Drawing the next function from the plan.
    Sampling,
    /// Waiting for the scheduler to answer.
    Dispatching,
    /// Pausing before the next iteration.
    Sleeping,
}

/// The response to an invocation.
#[derive(Debug)]
pub enum Outcome {
    /// The scheduler answered with this status.
    Status(StatusCode),
    /// The request timed out or failed at the transport level.
    Failed(reqwest::Error),
}

impl Outcome {
    /// Whether the invocation counts as a passed check.
    pub fn passed(&self) -> bool {
        matches!(self, Self::Status(StatusCode::OK))
    }
}

/// Record of one completed iteration.
#[derive(Debug)]
pub struct Iteration {
    /// The benchmark instance that was invoked.
    pub instance: BenchmarkInstance,
    /// How the scheduler responded.
    pub outcome: Outcome,
    /// The pause taken after the response.
    pub think_time: Duration,
}

/// One simulated client with its own random stream.
#[derive(Debug)]
pub struct VirtualUser {
    id: u32,
    rng: Sfc32,
    state: UserState,
}

impl VirtualUser {
    /// Creates user `id` with the stream derived from the global `seed`.
    pub fn new(id: u32, seed: u64) -> Self {
        Self {
            id,
            rng: Sfc32::for_user(seed, id),
            state: UserState::Idle,
        }
    }

    /// The user's identity.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The user's current state.
    pub fn state(&self) -> UserState {
        self.state
    }

    /// Runs one iteration: choose, invoke, check and think.
    ///
    /// Failed invocations are recorded in `checks` and never abort the loop. The future may be
    /// dropped at any await point, in which case the in-flight request is abandoned.
    pub async fn iterate(
        &mut self,
        plan: &WorkloadPlan,
        remote: &SchedulerRemote,
        checks: &Checks,
    ) -> Iteration {
        self.state = UserState::Sampling;
        let function = plan.choose(&mut self.rng);
        let instance = match plan.resolve(function) {
            Ok(instance) => instance,
            Err(err) => panic!("sampled function is missing from the plan: {err}"),
        };
        let payload = plan.payload(instance.kind);

        self.state = UserState::Dispatching;
        let outcome = match remote.invoke(&instance, payload).await {
            Ok(status) => Outcome::Status(status),
            Err(err) => Outcome::Failed(err),
        };

        let passed = outcome.passed();
        checks.record(passed);
        match &outcome {
            Outcome::Status(status) if passed => {
                tracing::debug!(user = self.id, %instance, %status, "invocation succeeded");
            }
            Outcome::Status(status) => {
                tracing::debug!(user = self.id, %instance, %status, "invocation rejected");
            }
            Outcome::Failed(err) => {
                tracing::warn!(user = self.id, %instance, error = %err, "invocation failed");
            }
        }

        self.state = UserState::Sleeping;
        let think_time = think_time(&mut self.rng);
        tokio::time::sleep(think_time).await;

        Iteration {
            instance,
            outcome,
            think_time,
        }
    }
}

/// Draws the pause between two invocations, in `[0.1, 1.0)` seconds.
pub fn think_time(rng: &mut Sfc32) -> Duration {
    think_time_for(rng.next_u32())
}

/// Scales a raw draw onto the think time interval.
///
/// Integer arithmetic keeps the largest draw strictly below one second, where rounding a float
/// to whole nanoseconds would not.
fn think_time_for(draw: u32) -> Duration {
    let offset = (u64::from(draw) * THINK_TIME_SPAN_NANOS) >> 32;
    MIN_THINK_TIME + Duration::from_nanos(offset)
}
