//! Custom metric series, shared by every user of the run.
//!
//! goose already keeps per-request statistics; these are the business series
//! (price integrity, store status...) plus the durations the thresholds look at.
use std::{
    fmt::Display,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};

/// A series of durations (or any other value) in milliseconds
#[derive(Debug)]
pub struct Trend {
    name: &'static str,
    samples: Mutex<Vec<f64>>,
}

/// Aggregated view of a Trend
#[derive(Debug, Clone, PartialEq)]
pub struct TrendSummary {
    /// sorted samples
    sorted: Vec<f64>,
}

impl Trend {
    /// empty trend
    pub fn new(name: &'static str) -> Self {
        Trend {
            name,
            samples: Mutex::new(Vec::new()),
        }
    }
    /// metric name
    pub fn name(&self) -> &'static str {
        self.name
    }
    /// record one value
    pub fn add(&self, value: f64) {
        // a poisoned lock only means another user panicked while pushing
        let mut samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        samples.push(value);
    }
    /// snapshot of all the values recorded so far
    pub fn summary(&self) -> TrendSummary {
        let mut sorted = self
            .samples
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        sorted.sort_by(f64::total_cmp);
        TrendSummary { sorted }
    }
}

impl TrendSummary {
    /// how many values
    pub fn count(&self) -> usize {
        self.sorted.len()
    }
    /// minimum, 0 when empty
    pub fn min(&self) -> f64 {
        self.sorted.first().copied().unwrap_or(0.0)
    }
    /// maximum, 0 when empty
    pub fn max(&self) -> f64 {
        self.sorted.last().copied().unwrap_or(0.0)
    }
    /// mean, 0 when empty
    pub fn avg(&self) -> f64 {
        if self.sorted.is_empty() {
            return 0.0;
        }
        self.sorted.iter().sum::<f64>() / self.sorted.len() as f64
    }
    /// median
    pub fn med(&self) -> f64 {
        self.percentile(50.0)
    }
    /// percentile in [0, 100], linearly interpolated between the closest ranks
    pub fn percentile(&self, pct: f64) -> f64 {
        match self.sorted.len() {
            0 => 0.0,
            1 => self.sorted[0],
            n => {
                let rank = (pct / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
                let lower = rank.floor() as usize;
                if lower >= n - 1 {
                    return self.sorted[n - 1];
                }
                let frac = rank - lower as f64;
                self.sorted[lower] + (self.sorted[lower + 1] - self.sorted[lower]) * frac
            }
        }
    }
}

/// Fraction of true samples over all samples
#[derive(Debug)]
pub struct Rate {
    name: &'static str,
    trues: AtomicU64,
    total: AtomicU64,
}

impl Rate {
    /// empty rate
    pub fn new(name: &'static str) -> Self {
        Rate {
            name,
            trues: AtomicU64::new(0),
            total: AtomicU64::new(0),
        }
    }
    /// metric name
    pub fn name(&self) -> &'static str {
        self.name
    }
    /// record one sample
    pub fn add(&self, value: bool) {
        if value {
            self.trues.fetch_add(1, Ordering::Relaxed);
        }
        self.total.fetch_add(1, Ordering::Relaxed);
    }
    /// (true samples, all samples)
    pub fn counts(&self) -> (u64, u64) {
        (
            self.trues.load(Ordering::Relaxed),
            self.total.load(Ordering::Relaxed),
        )
    }
    /// fraction of true samples, 0 when empty
    pub fn rate(&self) -> f64 {
        let (trues, total) = self.counts();
        if total == 0 {
            0.0
        } else {
            trues as f64 / total as f64
        }
    }
}

/// Borrowed view of one of the registry series
#[derive(Debug, Clone, Copy)]
pub enum MetricRef<'a> {
    /// a Trend series
    Trend(&'a Trend),
    /// a Rate series
    Rate(&'a Rate),
}

impl MetricRef<'_> {
    /// how many samples were recorded
    pub fn samples(&self) -> u64 {
        match self {
            MetricRef::Trend(t) => t.summary().count() as u64,
            MetricRef::Rate(r) => r.counts().1,
        }
    }
}

impl Display for MetricRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricRef::Trend(t) => {
                let s = t.summary();
                write!(
                    f,
                    "{:<24} avg={:.2} min={:.2} med={:.2} max={:.2} p(90)={:.2} p(95)={:.2} count={}",
                    t.name(),
                    s.avg(),
                    s.min(),
                    s.med(),
                    s.max(),
                    s.percentile(90.0),
                    s.percentile(95.0),
                    s.count()
                )
            }
            MetricRef::Rate(r) => {
                let (trues, total) = r.counts();
                write!(
                    f,
                    "{:<24} {:.2}% {} / {}",
                    r.name(),
                    r.rate() * 100.0,
                    trues,
                    total
                )
            }
        }
    }
}

/// Every series recorded by the flows
#[derive(Debug)]
pub struct Metrics {
    /// time to create an order
    pub order_create_duration: Trend,
    /// order creations that did not answer 200/201
    pub order_create_errors: Rate,
    /// time to list stores
    pub store_list_duration: Trend,
    /// time to list the menus of a store
    pub menu_list_duration: Trend,
    /// server total different from the expected one
    pub price_integrity_errors: Rate,
    /// store listing without any approved store
    pub store_status_errors: Rate,
    /// time to list own orders
    pub order_list_duration: Trend,
    /// own orders listing failed or was too slow
    pub order_list_errors: Rate,
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics {
            order_create_duration: Trend::new("order_create_duration"),
            order_create_errors: Rate::new("order_create_errors"),
            store_list_duration: Trend::new("store_list_duration"),
            menu_list_duration: Trend::new("menu_list_duration"),
            price_integrity_errors: Rate::new("price_integrity_errors"),
            store_status_errors: Rate::new("store_status_errors"),
            order_list_duration: Trend::new("order_list_duration"),
            order_list_errors: Rate::new("order_list_errors"),
        }
    }
}

impl Metrics {
    /// all the series, in reporting order
    pub fn all(&self) -> Vec<MetricRef<'_>> {
        vec![
            MetricRef::Trend(&self.order_create_duration),
            MetricRef::Rate(&self.order_create_errors),
            MetricRef::Rate(&self.price_integrity_errors),
            MetricRef::Trend(&self.store_list_duration),
            MetricRef::Rate(&self.store_status_errors),
            MetricRef::Trend(&self.menu_list_duration),
            MetricRef::Trend(&self.order_list_duration),
            MetricRef::Rate(&self.order_list_errors),
        ]
    }
    /// search a series by name
    pub fn lookup(&self, name: &str) -> Option<MetricRef<'_>> {
        self.all().into_iter().find(|m| match m {
            MetricRef::Trend(t) => t.name() == name,
            MetricRef::Rate(r) => r.name() == name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn percentiles_interpolate() {
        let t = Trend::new("t");
        for v in [40.0, 10.0, 30.0, 20.0] {
            t.add(v);
        }
        let s = t.summary();
        assert_eq!(s.count(), 4);
        assert_eq!(s.min(), 10.0);
        assert_eq!(s.max(), 40.0);
        assert_eq!(s.avg(), 25.0);
        assert_eq!(s.med(), 25.0);
        assert_eq!(s.percentile(0.0), 10.0);
        assert_eq!(s.percentile(100.0), 40.0);
        // rank 0.9 * 3 = 2.7 -> 30 + 0.7 * 10
        assert!((s.percentile(90.0) - 37.0).abs() < 1e-9);
    }

    #[test]
    fn percentile_of_tiny_series() {
        let t = Trend::new("t");
        assert_eq!(t.summary().percentile(95.0), 0.0);
        t.add(12.0);
        assert_eq!(t.summary().percentile(95.0), 12.0);
    }

    #[test]
    fn rate_counts_true_samples() {
        let r = Rate::new("r");
        assert_eq!(r.rate(), 0.0);
        r.add(true);
        r.add(false);
        r.add(false);
        r.add(false);
        assert_eq!(r.counts(), (1, 4));
        assert_eq!(r.rate(), 0.25);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn shared_between_tasks() {
        let metrics = Arc::new(Metrics::default());
        let mut handles = Vec::new();
        for i in 0..8 {
            let m = metrics.clone();
            handles.push(tokio::spawn(async move {
                for j in 0..100 {
                    m.order_create_duration.add((i * 100 + j) as f64);
                    m.order_create_errors.add(j % 10 == 0);
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(metrics.order_create_duration.summary().count(), 800);
        assert_eq!(metrics.order_create_errors.counts(), (80, 800));
    }

    #[test]
    fn summary_lines() {
        let t = Trend::new("order_create_duration");
        t.add(100.0);
        t.add(300.0);
        let line = MetricRef::Trend(&t).to_string();
        assert!(line.starts_with("order_create_duration"));
        assert!(line.contains("avg=200.00"));
        assert!(line.contains("count=2"));

        let r = Rate::new("order_create_errors");
        r.add(true);
        r.add(false);
        assert!(MetricRef::Rate(&r).to_string().ends_with("50.00% 1 / 2"));
    }

    #[test]
    fn lookup_by_name() {
        let m = Metrics::default();
        assert!(matches!(
            m.lookup("order_create_errors"),
            Some(MetricRef::Rate(_))
        ));
        assert!(matches!(
            m.lookup("menu_list_duration"),
            Some(MetricRef::Trend(_))
        ));
        assert!(m.lookup("http_req_duration").is_none());
        assert_eq!(m.all().len(), 8);
    }
}
