//! Traffic profiles: how many users over time, and what the run must achieve.
use std::{fmt::Display, str::FromStr, time::Duration};

use crate::{
    error::{ConfigError, ThresholdError},
    threshold::MetricThresholds,
};

/// One ramp step: go (linearly) to `target` users in `duration`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    /// how long the step lasts
    pub duration: Duration,
    /// users at the end of the step
    pub target: usize,
}

const fn stage(secs: u64, target: usize) -> Stage {
    Stage {
        duration: Duration::from_secs(secs),
        target,
    }
}

/// The four traffic shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Profile {
    /// minimal users, checks that everything works
    #[default]
    Smoke,
    /// the usual traffic
    Load,
    /// ramps until the breaking point
    Stress,
    /// a sudden burst, then recovery
    Spike,
}

impl Profile {
    /// every profile
    pub const ALL: [Profile; 4] = [Profile::Smoke, Profile::Load, Profile::Stress, Profile::Spike];

    /// lowercase name, as accepted by TEST_TYPE
    pub fn name(self) -> &'static str {
        match self {
            Profile::Smoke => "smoke",
            Profile::Load => "load",
            Profile::Stress => "stress",
            Profile::Spike => "spike",
        }
    }

    /// ramp of the profile
    pub fn stages(self) -> &'static [Stage] {
        const SMOKE: [Stage; 3] = [stage(10, 1), stage(20, 1), stage(10, 0)];
        const LOAD: [Stage; 3] = [stage(60, 10), stage(180, 10), stage(60, 0)];
        const STRESS: [Stage; 7] = [
            stage(60, 20),
            stage(60, 40),
            stage(60, 60),
            stage(60, 80),
            stage(60, 100),
            stage(120, 100),
            stage(60, 0),
        ];
        const SPIKE: [Stage; 6] = [
            stage(10, 5),
            stage(10, 100),
            stage(30, 100),
            stage(10, 5),
            stage(30, 5),
            stage(10, 0),
        ];
        match self {
            Profile::Smoke => &SMOKE,
            Profile::Load => &LOAD,
            Profile::Stress => &STRESS,
            Profile::Spike => &SPIKE,
        }
    }

    /// raw thresholds, (metric, expressions)
    fn raw_thresholds(self) -> [(&'static str, &'static [&'static str]); 2] {
        let error_rate: &'static [&'static str] = match self {
            Profile::Smoke => &["rate<0.01"],
            Profile::Load => &["rate<0.05"],
            Profile::Stress => &["rate<0.1"],
            Profile::Spike => &["rate<0.15"],
        };
        let durations: &'static [&'static str] = match self {
            Profile::Smoke => &["p(95)<2000"],
            Profile::Load => &["p(95)<1500", "p(99)<3000"],
            Profile::Stress => &["p(95)<5000"],
            Profile::Spike => &["p(95)<10000"],
        };
        [
            ("order_create_errors", error_rate),
            ("order_create_duration", durations),
        ]
    }

    /// parsed thresholds of the profile
    pub fn thresholds(self) -> Result<Vec<MetricThresholds>, ThresholdError> {
        self.raw_thresholds()
            .iter()
            .map(|(metric, exprs)| MetricThresholds::parse(metric, exprs))
            .collect()
    }

    /// whole duration of the ramp
    pub fn total_duration(self) -> Duration {
        self.stages().iter().map(|s| s.duration).sum()
    }

    /// highest number of concurrent users
    pub fn peak_users(self) -> usize {
        self.stages().iter().map(|s| s.target).max().unwrap_or(0)
    }

    /// the ramp written as a goose test plan (`users,duration;...`)
    pub fn test_plan(self) -> String {
        self.stages()
            .iter()
            .map(|s| format!("{},{}s", s.target, s.duration.as_secs()))
            .collect::<Vec<_>>()
            .join(";")
    }
}

impl Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Profile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Profile::ALL
            .into_iter()
            .find(|p| p.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownProfile(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_names() {
        assert_eq!("smoke".parse(), Ok(Profile::Smoke));
        assert_eq!(" STRESS ".parse(), Ok(Profile::Stress));
        assert_eq!(
            "soak".parse::<Profile>(),
            Err(ConfigError::UnknownProfile("soak".into()))
        );
        for p in Profile::ALL {
            assert_eq!(p.to_string().parse(), Ok(p));
        }
    }

    #[test]
    fn smoke_plan() {
        assert_eq!(Profile::Smoke.test_plan(), "1,10s;1,20s;0,10s");
        assert_eq!(Profile::Smoke.total_duration(), Duration::from_secs(40));
        assert_eq!(Profile::Smoke.peak_users(), 1);
    }

    #[test]
    fn every_profile_ramps_down_to_zero() {
        for p in Profile::ALL {
            assert_eq!(p.stages().last().map(|s| s.target), Some(0), "{p}");
        }
        assert_eq!(Profile::Stress.peak_users(), 100);
        assert_eq!(Profile::Spike.peak_users(), 100);
        assert_eq!(Profile::Load.total_duration(), Duration::from_secs(300));
        assert_eq!(Profile::Stress.total_duration(), Duration::from_secs(480));
    }

    #[test]
    fn every_profile_has_valid_thresholds() {
        for p in Profile::ALL {
            let t = p.thresholds().unwrap();
            assert_eq!(t[0].metric, "order_create_errors");
            assert_eq!(t[1].metric, "order_create_duration");
        }
        assert_eq!(Profile::Load.thresholds().unwrap()[1].thresholds.len(), 2);
    }
}
