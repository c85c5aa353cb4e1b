//! Pass/fail criteria evaluated on the metric registry once the run is over.
//!
//! Expressions look like `rate<0.01`, `p(95)<2000` or `avg <= 300`.
use std::{fmt::Display, str::FromStr};

use colored::Colorize;

use crate::{
    error::ThresholdError,
    metrics::{MetricRef, Metrics},
};

/// Which value of the series is compared
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    /// fraction of true samples (Rate)
    Rate,
    /// mean (Trend)
    Avg,
    /// minimum (Trend)
    Min,
    /// maximum (Trend)
    Max,
    /// median (Trend)
    Med,
    /// number of samples (both)
    Count,
    /// percentile, in [0, 100] (Trend)
    Percentile(f64),
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// <
    Lt,
    /// <=
    Le,
    /// >
    Gt,
    /// >=
    Ge,
    /// ==
    Eq,
    /// !=
    Ne,
}

impl Comparison {
    // two-char operators first, so `<=` is not read as `<`
    const TOKENS: [(&'static str, Comparison); 6] = [
        ("<=", Comparison::Le),
        (">=", Comparison::Ge),
        ("==", Comparison::Eq),
        ("!=", Comparison::Ne),
        ("<", Comparison::Lt),
        (">", Comparison::Gt),
    ];

    fn holds(self, left: f64, right: f64) -> bool {
        match self {
            Comparison::Lt => left < right,
            Comparison::Le => left <= right,
            Comparison::Gt => left > right,
            Comparison::Ge => left >= right,
            Comparison::Eq => left == right,
            Comparison::Ne => left != right,
        }
    }
}

/// A parsed threshold expression
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    /// source text
    pub source: String,
    /// aggregation on the left side
    pub aggregation: Aggregation,
    /// operator
    pub comparison: Comparison,
    /// right side
    pub value: f64,
}

impl FromStr for Threshold {
    type Err = ThresholdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let source = s.trim();
        let (pos, token, comparison) = Comparison::TOKENS
            .iter()
            .filter_map(|(token, cmp)| source.find(token).map(|pos| (pos, *token, *cmp)))
            .min_by_key(|(pos, token, _)| (*pos, std::cmp::Reverse(token.len())))
            .ok_or_else(|| ThresholdError::MissingOperator(source.to_string()))?;

        let left = source[..pos].trim();
        let right = source[pos + token.len()..].trim();

        let aggregation = match left {
            "rate" => Aggregation::Rate,
            "avg" => Aggregation::Avg,
            "min" => Aggregation::Min,
            "max" => Aggregation::Max,
            "med" => Aggregation::Med,
            "count" => Aggregation::Count,
            p if p.starts_with("p(") && p.ends_with(')') => {
                let pct: f64 = p[2..p.len() - 1]
                    .trim()
                    .parse()
                    .map_err(|_| ThresholdError::InvalidValue(p.to_string()))?;
                if !(0.0..=100.0).contains(&pct) {
                    return Err(ThresholdError::PercentileRange(source.to_string()));
                }
                Aggregation::Percentile(pct)
            }
            other => return Err(ThresholdError::UnknownAggregation(other.to_string())),
        };
        let value = right
            .parse()
            .map_err(|_| ThresholdError::InvalidValue(right.to_string()))?;

        Ok(Threshold {
            source: source.to_string(),
            aggregation,
            comparison,
            value,
        })
    }
}

impl Threshold {
    /// value of the aggregation on the given series, None if it does not apply to it
    fn observe(&self, metric: MetricRef<'_>) -> Option<f64> {
        match (metric, self.aggregation) {
            (MetricRef::Rate(r), Aggregation::Rate) => Some(r.rate()),
            (MetricRef::Rate(r), Aggregation::Count) => Some(r.counts().1 as f64),
            (MetricRef::Rate(_), _) => None,
            (MetricRef::Trend(_), Aggregation::Rate) => None,
            (MetricRef::Trend(t), agg) => {
                let s = t.summary();
                Some(match agg {
                    Aggregation::Avg => s.avg(),
                    Aggregation::Min => s.min(),
                    Aggregation::Max => s.max(),
                    Aggregation::Med => s.med(),
                    Aggregation::Count => s.count() as f64,
                    Aggregation::Percentile(p) => s.percentile(p),
                    Aggregation::Rate => unreachable!("handled above"),
                })
            }
        }
    }
}

/// All the thresholds attached to one metric
#[derive(Debug, Clone, PartialEq)]
pub struct MetricThresholds {
    /// metric name, as in the registry
    pub metric: String,
    /// expressions that must all hold
    pub thresholds: Vec<Threshold>,
}

impl MetricThresholds {
    /// parse every expression for `metric`
    pub fn parse(metric: &str, exprs: &[&str]) -> Result<Self, ThresholdError> {
        Ok(MetricThresholds {
            metric: metric.to_string(),
            thresholds: exprs
                .iter()
                .map(|e| e.parse())
                .collect::<Result<Vec<_>, _>>()?,
        })
    }
}

/// How a threshold went
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// criterion satisfied, with the observed value
    Passed(f64),
    /// criterion violated, with the observed value
    Failed(f64),
    /// no samples were recorded, nothing to judge
    NoData,
    /// the metric does not exist, or the aggregation does not apply to it
    Invalid,
}

/// result of one threshold
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdOutcome {
    /// metric name
    pub metric: String,
    /// expression
    pub expression: String,
    /// how it went
    pub verdict: Verdict,
}

impl ThresholdOutcome {
    /// anything but Failed and Invalid passes
    pub fn passed(&self) -> bool {
        matches!(self.verdict, Verdict::Passed(_) | Verdict::NoData)
    }
}

impl Display for ThresholdOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let head = format!("{} {}", self.metric, self.expression);
        match self.verdict {
            Verdict::Passed(v) => write!(f, "{} {} (observed {:.4})", "✓".green(), head, v),
            Verdict::Failed(v) => write!(f, "{} {} (observed {:.4})", "✗".red(), head, v),
            Verdict::NoData => write!(f, "{} {} {}", "-".yellow(), head, "(no samples)".yellow()),
            Verdict::Invalid => write!(f, "{} {} {}", "✗".red(), head, "(invalid)".red()),
        }
    }
}

/// evaluate every threshold against the registry
pub fn evaluate(metrics: &Metrics, groups: &[MetricThresholds]) -> Vec<ThresholdOutcome> {
    let mut outcomes = Vec::new();
    for group in groups {
        let metric = metrics.lookup(&group.metric);
        for threshold in &group.thresholds {
            let verdict = match metric {
                None => Verdict::Invalid,
                Some(m) => match threshold.observe(m) {
                    None => Verdict::Invalid,
                    Some(_) if m.samples() == 0 => Verdict::NoData,
                    Some(v) if threshold.comparison.holds(v, threshold.value) => {
                        Verdict::Passed(v)
                    }
                    Some(v) => Verdict::Failed(v),
                },
            };
            outcomes.push(ThresholdOutcome {
                metric: group.metric.clone(),
                expression: threshold.source.clone(),
                verdict,
            });
        }
    }
    outcomes
}
