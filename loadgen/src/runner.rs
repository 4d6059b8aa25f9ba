//! Runs the phases of a schedule against the scheduler and prints the results.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use futures_util::future::join_all;
use loadgen_workload::{Phase, Schedule, WorkloadPlan};
use yansi::Paint;

use crate::checks::Checks;
use crate::driver::VirtualUser;
use crate::http::SchedulerRemote;

/// Check counts of one phase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhaseReport {
    /// Name of the phase.
    pub name: String,
    /// Number of concurrent virtual users.
    pub users: u32,
    /// Configured duration of the phase.
    pub duration: Duration,
    /// Number of invocations answered with `200 OK`.
    pub passed: u64,
    /// Number of invocations that were rejected, timed out or failed.
    pub failed: u64,
}

impl PhaseReport {
    /// Total number of completed invocations.
    pub fn total(&self) -> u64 {
        self.passed + self.failed
    }
}

/// Results of a complete run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Report {
    /// One entry per phase, in execution order.
    pub phases: Vec<PhaseReport>,
}

impl Report {
    /// Number of passed checks over all phases.
    pub fn passed(&self) -> u64 {
        self.phases.iter().map(|phase| phase.passed).sum()
    }

    /// Number of failed checks over all phases.
    pub fn failed(&self) -> u64 {
        self.phases.iter().map(|phase| phase.failed).sum()
    }
}

/// Runs all phases of `schedule` in order.
///
/// Users are numbered from `1` and keep their random stream across phases, so user `7` continues
/// where it left off when a later phase needs it again. Each phase starts at its offset from the
/// start of the run, and in-flight iterations are dropped when it ends.
pub async fn run(
    remote: SchedulerRemote,
    plan: WorkloadPlan,
    schedule: &Schedule,
    seed: u64,
) -> Result<Report> {
    let remote = Arc::new(remote);
    let plan = Arc::new(plan);

    let mut pool = BTreeMap::new();
    let mut report = Report::default();
    let start = tokio::time::Instant::now();

    tracing::info!(
        scheduler = remote.base(),
        phases = schedule.phases().len(),
        duration = ?schedule.total_duration(),
        "starting load test"
    );

    for phase in schedule.phases() {
        let (begin, deadline) = start
            .checked_add(phase.start)
            .zip(start.checked_add(phase.end()))
            .with_context(|| {
                format!("phase `{}` is scheduled too far in the future", phase.name)
            })?;

        tokio::time::sleep_until(begin).await;
        let phase_report = run_phase(&remote, &plan, phase, deadline, seed, &mut pool).await?;

        tracing::info!(
            phase = %phase_report.name,
            passed = phase_report.passed,
            failed = phase_report.failed,
            "finished phase"
        );
        report.phases.push(phase_report);
    }

    Ok(report)
}

async fn run_phase(
    remote: &Arc<SchedulerRemote>,
    plan: &Arc<WorkloadPlan>,
    phase: &Phase,
    deadline: tokio::time::Instant,
    seed: u64,
    pool: &mut BTreeMap<u32, VirtualUser>,
) -> Result<PhaseReport> {
    tracing::info!(
        phase = %phase.name,
        users = phase.users,
        duration = ?phase.duration,
        "starting phase"
    );

    let checks = Arc::new(Checks::default());

    let tasks: Vec<_> = (1..=phase.users)
        .map(|id| {
            let user = pool
                .remove(&id)
                .unwrap_or_else(|| VirtualUser::new(id, seed));
            let remote = Arc::clone(remote);
            let plan = Arc::clone(plan);
            let checks = Arc::clone(&checks);
            tokio::spawn(run_user(user, remote, plan, checks, deadline))
        })
        .collect();

    for task in join_all(tasks).await {
        let user = task.context("virtual user panicked")?;
        pool.insert(user.id(), user);
    }

    Ok(PhaseReport {
        name: phase.name.clone(),
        users: phase.users,
        duration: phase.duration,
        passed: checks.passed(),
        failed: checks.failed(),
    })
}

async fn run_user(
    mut user: VirtualUser,
    remote: Arc<SchedulerRemote>,
    plan: Arc<WorkloadPlan>,
    checks: Arc<Checks>,
    deadline: tokio::time::Instant,
) -> VirtualUser {
    // See <https://docs.rs/tokio/latest/tokio/time/struct.Sleep.html#examples>
    let sleep = tokio::time::sleep_until(deadline);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = user.iterate(&plan, &remote, &checks) => {}
            _ = &mut sleep => break,
        }
    }

    user
}

/// Prints the per-phase check counts and totals to stdout.
pub fn print_report(report: &Report, elapsed: Duration) {
    for phase in &report.phases {
        println!();
        println!(
            "{} {} (users: {}, duration: {:?})",
            "## Phase".bold(),
            phase.name.bold().blue(),
            phase.users.bold(),
            phase.duration
        );
        print_checks(phase.passed, phase.failed, phase.duration);
    }

    println!();
    println!("{}", "## TOTALS".bold());
    print_checks(report.passed(), report.failed(), elapsed);
    println!();
}

fn print_checks(passed: u64, failed: u64, duration: Duration) {
    let total = passed + failed;
    print!("{} ({} ops", "CHECKS:".bold().green(), total.bold());
    if failed > 0 {
        print!(", {}", format!("{failed} FAILURES").bold().red());
    }
    println!(")");

    let ops_ps = total as f64 / duration.as_secs_f64().max(f64::EPSILON);
    let ratio = if total > 0 {
        passed as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    println!("  {:.2} invocations/s, {:.2}% passed", ops_ps.bold(), ratio);
}

/// Runs the schedule and prints the report, measuring wall clock time.
pub async fn perform_loadtest(
    remote: SchedulerRemote,
    plan: WorkloadPlan,
    schedule: &Schedule,
    seed: u64,
) -> Result<Report> {
    let start = Instant::now();
    let report = run(remote, plan, schedule, seed).await?;
    print_report(&report, start.elapsed());
    Ok(report)
}
