//! Staged concurrency schedule.
//!
//! A [`Schedule`] is a sequence of [`Phase`]s. Each phase holds a constant number of virtual users
//! for a fixed wall-clock duration. Phases never overlap and have no graceful drain window: when a
//! phase ends, its in-flight iterations are abandoned.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkloadError};

/// One load level of a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    /// Name of the phase for identification in logs and the final report.
    pub name: String,
    /// Number of concurrent virtual users.
    pub users: u32,
    /// How long the phase holds its users.
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    /// Offset from the start of the run at which the phase begins.
    #[serde(with = "humantime_serde")]
    pub start: Duration,
}

impl Phase {
    /// Creates a phase.
    pub fn new(name: impl Into<String>, users: u32, start: Duration, duration: Duration) -> Self {
        Self {
            name: name.into(),
            users,
            duration,
            start,
        }
    }

    /// Offset from the start of the run at which the phase ends.
    ///
    /// Panics if the end is not representable. Phases of a validated [`Schedule`] never are.
    pub fn end(&self) -> Duration {
        self.start + self.duration
    }

    /// Offset at which the phase ends, or `None` if it overflows.
    pub fn checked_end(&self) -> Option<Duration> {
        self.start.checked_add(self.duration)
    }
}

/// An ordered list of non-overlapping phases.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schedule {
    phases: Vec<Phase>,
}

impl Schedule {
    /// Creates and validates a schedule.
    ///
    /// Phases must each have users and a duration, and each phase must start at or after the end
    /// of the previous one.
    pub fn new(phases: Vec<Phase>) -> Result<Self> {
        if phases.is_empty() {
            return Err(WorkloadError::InvalidSchedule("no phases".into()));
        }

        let mut previous_end = Duration::ZERO;
        for phase in &phases {
            if phase.users == 0 {
                return Err(WorkloadError::InvalidSchedule(format!(
                    "phase `{}` has no users",
                    phase.name
                )));
            }
            if phase.duration.is_zero() {
                return Err(WorkloadError::InvalidSchedule(format!(
                    "phase `{}` has no duration",
                    phase.name
                )));
            }
            if phase.start < previous_end {
                return Err(WorkloadError::InvalidSchedule(format!(
                    "phase `{}` starts at {:?}, before the previous phase ends at {:?}",
                    phase.name, phase.start, previous_end
                )));
            }
            previous_end = phase.checked_end().ok_or_else(|| {
                WorkloadError::InvalidSchedule(format!(
                    "phase `{}` ends beyond the representable time range",
                    phase.name
                ))
            })?;
        }

        Ok(Self { phases })
    }

    /// Returns the phases in execution order.
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// Offset from the start of the run at which the last phase ends.
    pub fn total_duration(&self) -> Duration {
        self.phases.last().map_or(Duration::ZERO, Phase::end)
    }

    /// The largest number of users any phase needs.
    pub fn max_users(&self) -> u32 {
        self.phases.iter().map(|p| p.users).max().unwrap_or_default()
    }
}

impl Default for Schedule {
    /// Low, medium and high load of 20, 50 and 100 users, for 100 seconds each.
    fn default() -> Self {
        let phase = Duration::from_secs(100);
        Self {
            phases: vec![
                Phase::new("low_load", 20, Duration::ZERO, phase),
                Phase::new("medium_load", 50, phase, phase),
                Phase::new("high_load", 100, phase * 2, phase),
            ],
        }
    }
}

impl TryFrom<Vec<Phase>> for Schedule {
    type Error = WorkloadError;

    fn try_from(phases: Vec<Phase>) -> Result<Self> {
        Self::new(phases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(secs: u64) -> Duration {
        Duration::from_secs(secs)
    }

    #[test]
    fn default_ramp() {
        let schedule = Schedule::default();
        let levels: Vec<_> = schedule
            .phases()
            .iter()
            .map(|p| (p.name.as_str(), p.users, p.start, p.duration))
            .collect();

        assert_eq!(
            levels,
            [
                ("low_load", 20, secs(0), secs(100)),
                ("medium_load", 50, secs(100), secs(100)),
                ("high_load", 100, secs(200), secs(100)),
            ]
        );
        assert_eq!(schedule.total_duration(), secs(300));
        assert_eq!(schedule.max_users(), 100);

        // the default passes its own validation
        assert_eq!(Schedule::new(schedule.phases().to_vec()).unwrap(), schedule);
    }

    #[test]
    fn allows_gaps() {
        let schedule = Schedule::new(vec![
            Phase::new("a", 1, secs(0), secs(10)),
            Phase::new("b", 2, secs(15), secs(10)),
        ])
        .unwrap();
        assert_eq!(schedule.total_duration(), secs(25));
    }

    #[test]
    fn rejects_overlap() {
        let err = Schedule::new(vec![
            Phase::new("a", 1, secs(0), secs(10)),
            Phase::new("b", 2, secs(5), secs(10)),
        ])
        .unwrap_err();
        assert!(matches!(err, WorkloadError::InvalidSchedule(_)));
    }

    #[test]
    fn rejects_degenerate_phases() {
        assert!(Schedule::new(Vec::new()).is_err());
        assert!(Schedule::new(vec![Phase::new("a", 0, secs(0), secs(10))]).is_err());
        assert!(Schedule::new(vec![Phase::new("a", 1, secs(0), secs(0))]).is_err());
    }

    #[test]
    fn rejects_unrepresentable_end() {
        let err = Schedule::new(vec![Phase::new("a", 1, Duration::MAX, secs(1))]).unwrap_err();
        assert!(matches!(err, WorkloadError::InvalidSchedule(ref msg) if msg.contains("`a`")));

        let err = Schedule::new(vec![
            Phase::new("a", 1, secs(0), secs(10)),
            Phase::new("b", 1, secs(10), Duration::MAX),
        ])
        .unwrap_err();
        assert!(matches!(err, WorkloadError::InvalidSchedule(_)));
    }

    #[test]
    fn phases_deserialize_with_humantime() {
        let phases: Vec<Phase> = serde_json::from_str(
            r#"[{"name": "warmup", "users": 5, "start": "0s", "duration": "1m 30s"}]"#,
        )
        .unwrap();
        assert_eq!(phases, [Phase::new("warmup", 5, secs(0), secs(90))]);
    }
}
