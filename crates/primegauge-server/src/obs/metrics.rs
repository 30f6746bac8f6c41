//! In-process meter registry.
//!
//! Counters, timers and gauges are keyed by `MeterId` (name + sorted tags,
//! common tags merged in) and stored in `DashMap`s so request handlers can
//! look them up concurrently. Timer buckets are fixed in microseconds to avoid
//! floating point math on the hot path.

use dashmap::DashMap;
use std::fmt::{self, Write};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

/// Dotted meter names become Prometheus-safe names.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == ':' { c } else { '_' })
        .collect()
}

/// Meter identity: name plus tags sorted by key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeterId {
    name: String,
    tags: Vec<(String, String)>,
}

impl MeterId {
    pub fn new(name: &str, tags: &[(&str, &str)]) -> Self {
        let mut tags: Vec<(String, String)> = tags
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        tags.sort();
        tags.dedup_by(|a, b| a.0 == b.0);
        Self { name: name.to_string(), tags }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &[(String, String)] {
        &self.tags
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    fn label_str(&self) -> String {
        self.tags
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", sanitize_name(k), escape_label(v)))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for MeterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.tags.is_empty() {
            return Ok(());
        }
        let tags = self
            .tags
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{{{tags}}}")
    }
}

#[derive(Debug, Default)]
pub struct Counter {
    count: AtomicU64,
}

impl Counter {
    /// Increment by 1.
    pub fn increment(&self) {
        self.increment_by(1);
    }

    pub fn increment_by(&self, v: u64) {
        self.count.fetch_add(v, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

// 100us, 500us, 1ms, 5ms, 10ms, 50ms, 100ms, 500ms, 1s, 5s, 10s
const BUCKETS_MICROS: [u64; 11] = [
    100, 500, 1_000, 5_000, 10_000, 50_000, 100_000, 500_000, 1_000_000, 5_000_000, 10_000_000,
];

#[derive(Debug)]
pub struct Timer {
    count: AtomicU64,
    total_micros: AtomicU64,
    max_micros: AtomicU64,
    buckets: [AtomicU64; BUCKETS_MICROS.len()],
}

impl Default for Timer {
    fn default() -> Self {
        Self {
            count: AtomicU64::new(0),
            total_micros: AtomicU64::new(0),
            max_micros: AtomicU64::new(0),
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }
}

impl Timer {
    /// Record one sample and bump every cumulative bucket that covers it.
    pub fn record_duration(&self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);

        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_micros.fetch_add(micros, Ordering::Relaxed);
        self.max_micros.fetch_max(micros, Ordering::Relaxed);

        for (i, &b) in BUCKETS_MICROS.iter().enumerate() {
            if micros <= b {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Time a closure and pass its result through.
    pub fn record<T>(&self, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.record_duration(start.elapsed());
        out
    }

    /// Time a future until it resolves.
    pub async fn record_future<F: Future>(&self, fut: F) -> F::Output {
        let start = Instant::now();
        let out = fut.await;
        self.record_duration(start.elapsed());
        out
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn total_time(&self) -> Duration {
        Duration::from_micros(self.total_micros.load(Ordering::Relaxed))
    }

    pub fn max(&self) -> Duration {
        Duration::from_micros(self.max_micros.load(Ordering::Relaxed))
    }

    pub fn mean(&self) -> Duration {
        match self.count() {
            0 => Duration::ZERO,
            n => self.total_time() / u32::try_from(n).unwrap_or(u32::MAX),
        }
    }
}

/// Start/stop pair measured against whichever timer it is stopped into.
/// Dropping a sample without stopping it records nothing.
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    start: Instant,
}

impl Sample {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    pub fn stop(self, timer: &Timer) -> Duration {
        let elapsed = self.start.elapsed();
        timer.record_duration(elapsed);
        elapsed
    }
}

enum GaugeSource {
    Fixed(f64),
    Fn(Box<dyn Fn() -> f64 + Send + Sync>),
}

pub struct Gauge {
    source: GaugeSource,
}

impl Gauge {
    pub fn value(&self) -> f64 {
        match &self.source {
            GaugeSource::Fixed(v) => *v,
            GaugeSource::Fn(f) => f(),
        }
    }
}

impl fmt::Debug for Gauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gauge").field("value", &self.value()).finish()
    }
}

/// Borrowed view of one registered meter.
#[derive(Debug, Clone)]
pub enum Meter {
    Counter(MeterId, Arc<Counter>),
    Timer(MeterId, Arc<Timer>),
    Gauge(MeterId, Arc<Gauge>),
}

impl Meter {
    pub fn id(&self) -> &MeterId {
        match self {
            Meter::Counter(id, _) | Meter::Timer(id, _) | Meter::Gauge(id, _) => id,
        }
    }

    /// Exposition family name; one `# TYPE` line per family.
    fn family(&self) -> String {
        let base = sanitize_name(self.id().name());
        match self {
            Meter::Counter(..) => format!("{base}_total"),
            Meter::Timer(..) => format!("{base}_micros"),
            Meter::Gauge(..) => base,
        }
    }
}

impl fmt::Display for Meter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Meter::Counter(id, c) => write!(f, "counter {id} count={}", c.count()),
            Meter::Timer(id, t) => write!(
                f,
                "timer {id} count={} total_ms={:.3} max_ms={:.3}",
                t.count(),
                t.total_time().as_secs_f64() * 1000.0,
                t.max().as_secs_f64() * 1000.0
            ),
            Meter::Gauge(id, g) => write!(f, "gauge {id} value={}", g.value()),
        }
    }
}

/// Process-lifetime owner of every meter.
#[derive(Default)]
pub struct MeterRegistry {
    common_tags: Vec<(String, String)>,
    counters: DashMap<MeterId, Arc<Counter>>,
    timers: DashMap<MeterId, Arc<Timer>>,
    gauges: DashMap<MeterId, Arc<Gauge>>,
}

impl MeterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose meter ids all carry `tags` (meter-specific tags win on
    /// key collisions).
    pub fn with_common_tags(tags: &[(&str, &str)]) -> Self {
        Self {
            common_tags: tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            ..Self::default()
        }
    }

    fn id(&self, name: &str, tags: &[(&str, &str)]) -> MeterId {
        let mut all: Vec<(&str, &str)> = tags.to_vec();
        for (k, v) in &self.common_tags {
            if !tags.iter().any(|(tk, _)| *tk == k.as_str()) {
                all.push((k.as_str(), v.as_str()));
            }
        }
        MeterId::new(name, &all)
    }

    /// Get or create a counter.
    pub fn counter(&self, name: &str, tags: &[(&str, &str)]) -> Arc<Counter> {
        self.counters
            .entry(self.id(name, tags))
            .or_default()
            .value()
            .clone()
    }

    /// Get or create a timer.
    pub fn timer(&self, name: &str, tags: &[(&str, &str)]) -> Arc<Timer> {
        self.timers
            .entry(self.id(name, tags))
            .or_default()
            .value()
            .clone()
    }

    /// Register a fixed-value gauge. The first registration of an id wins;
    /// later calls return it unchanged and drop `value`.
    pub fn gauge(&self, name: &str, tags: &[(&str, &str)], value: f64) -> Arc<Gauge> {
        self.gauges
            .entry(self.id(name, tags))
            .or_insert_with(|| Arc::new(Gauge { source: GaugeSource::Fixed(value) }))
            .value()
            .clone()
    }

    /// Register a gauge read from `f` at observation time. First wins, as
    /// with [`MeterRegistry::gauge`].
    pub fn gauge_fn<F>(&self, name: &str, tags: &[(&str, &str)], f: F) -> Arc<Gauge>
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        self.gauges
            .entry(self.id(name, tags))
            .or_insert_with(|| Arc::new(Gauge { source: GaugeSource::Fn(Box::new(f)) }))
            .value()
            .clone()
    }

    pub fn find_counter(&self, name: &str, tags: &[(&str, &str)]) -> Option<Arc<Counter>> {
        self.counters.get(&self.id(name, tags)).map(|r| r.value().clone())
    }

    pub fn find_timer(&self, name: &str, tags: &[(&str, &str)]) -> Option<Arc<Timer>> {
        self.timers.get(&self.id(name, tags)).map(|r| r.value().clone())
    }

    pub fn find_gauge(&self, name: &str, tags: &[(&str, &str)]) -> Option<Arc<Gauge>> {
        self.gauges.get(&self.id(name, tags)).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.counters.len() + self.timers.len() + self.gauges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all meters, sorted by id.
    pub fn meters(&self) -> Vec<Meter> {
        let mut out: Vec<Meter> = Vec::with_capacity(self.len());
        out.extend(
            self.counters
                .iter()
                .map(|r| Meter::Counter(r.key().clone(), r.value().clone())),
        );
        out.extend(
            self.timers
                .iter()
                .map(|r| Meter::Timer(r.key().clone(), r.value().clone())),
        );
        out.extend(
            self.gauges
                .iter()
                .map(|r| Meter::Gauge(r.key().clone(), r.value().clone())),
        );
        out.sort_by(|a, b| a.id().cmp(b.id()));
        out
    }

    /// Render in Prometheus text exposition format (timer unit: microseconds).
    pub fn render(&self, out: &mut String) {
        render_meters(self.meters(), out);
    }
}

/// Render several registries as one exposition. Families spread over more
/// than one registry get a single `# TYPE` line; identical series keep the
/// first registry's value.
pub fn render_all(registries: &[Arc<MeterRegistry>], out: &mut String) {
    let meters = registries.iter().flat_map(|r| r.meters()).collect();
    render_meters(meters, out);
}

fn render_meters(meters: Vec<Meter>, out: &mut String) {
    let mut meters: Vec<(String, Meter)> =
        meters.into_iter().map(|m| (m.family(), m)).collect();
    // stable: equal ids keep registry order
    meters.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id().cmp(b.1.id())));
    meters.dedup_by(|a, b| a.0 == b.0 && a.1.id() == b.1.id());

    let mut last_family = String::new();
    for (family, meter) in &meters {
        if *family != last_family {
            let kind = match meter {
                Meter::Counter(..) => "counter",
                Meter::Timer(..) => "histogram",
                Meter::Gauge(..) => "gauge",
            };
            let _ = writeln!(out, "# TYPE {family} {kind}");
            last_family = family.clone();
        }
        let label_str = meter.id().label_str();
        match meter {
            Meter::Counter(_, c) => {
                let _ = writeln!(out, "{}{{{}}} {}", family, label_str, c.count());
            }
            Meter::Gauge(_, g) => {
                let _ = writeln!(out, "{}{{{}}} {}", family, label_str, g.value());
            }
            Meter::Timer(_, t) => {
                let prefix = if label_str.is_empty() {
                    String::new()
                } else {
                    format!("{label_str},")
                };
                for (i, &le) in BUCKETS_MICROS.iter().enumerate() {
                    let count = t.buckets[i].load(Ordering::Relaxed);
                    let _ = writeln!(out, "{family}_bucket{{{prefix}le=\"{le}\"}} {count}");
                }
                let count = t.count();
                let _ = writeln!(out, "{family}_bucket{{{prefix}le=\"+Inf\"}} {count}");
                let _ = writeln!(
                    out,
                    "{family}_sum{{{label_str}}} {}",
                    t.total_micros.load(Ordering::Relaxed)
                );
                let _ = writeln!(out, "{family}_count{{{label_str}}} {count}");
                let _ = writeln!(
                    out,
                    "{family}_max{{{label_str}}} {}",
                    t.max_micros.load(Ordering::Relaxed)
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_order_does_not_change_identity() {
        let reg = MeterRegistry::new();
        reg.counter("hits", &[("b", "2"), ("a", "1")]).increment();
        reg.counter("hits", &[("a", "1"), ("b", "2")]).increment();
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.find_counter("hits", &[("a", "1"), ("b", "2")]).unwrap().count(), 2);
    }

    #[test]
    fn different_tag_values_are_different_meters() {
        let reg = MeterRegistry::new();
        reg.counter("example.prime.number", &[("type", "prime")]).increment();
        reg.counter("example.prime.number", &[("typxe", "not-prime")]).increment();
        assert_eq!(reg.len(), 2);
        assert!(reg.find_counter("example.prime.number", &[("type", "not-prime")]).is_none());
    }

    #[test]
    fn common_tags_are_merged_and_overridable() {
        let reg = MeterRegistry::with_common_tags(&[("application", "fake-id")]);
        reg.counter("c", &[]).increment();
        reg.counter("c", &[("application", "other")]).increment();

        let ids: Vec<String> = reg.meters().iter().map(|m| m.id().to_string()).collect();
        assert_eq!(ids, vec!["c{application=fake-id}", "c{application=other}"]);
    }

    #[test]
    fn first_gauge_registration_wins() {
        let reg = MeterRegistry::new();
        reg.gauge("quarkus_example", &[], 25.0);
        let g = reg.gauge("quarkus_example", &[], 99.0);
        assert_eq!(g.value(), 25.0);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn gauge_fn_reads_on_observation() {
        use std::sync::atomic::AtomicI64;
        let reg = MeterRegistry::new();
        let v = Arc::new(AtomicI64::new(1));
        let src = Arc::clone(&v);
        let g = reg.gauge_fn("live", &[], move || src.load(Ordering::Relaxed) as f64);
        assert_eq!(g.value(), 1.0);
        v.store(7, Ordering::Relaxed);
        assert_eq!(g.value(), 7.0);
    }

    #[test]
    fn timer_tracks_count_total_and_max() {
        let t = Timer::default();
        t.record_duration(Duration::from_millis(2));
        t.record_duration(Duration::from_millis(6));
        assert_eq!(t.count(), 2);
        assert_eq!(t.total_time(), Duration::from_millis(8));
        assert_eq!(t.max(), Duration::from_millis(6));
        assert_eq!(t.mean(), Duration::from_millis(4));
        assert_eq!(t.buckets[2].load(Ordering::Relaxed), 0); // <= 1ms
        assert_eq!(t.buckets[3].load(Ordering::Relaxed), 1); // <= 5ms
        assert_eq!(t.buckets[4].load(Ordering::Relaxed), 2); // <= 10ms
    }

    #[test]
    fn record_passes_value_through() {
        let t = Timer::default();
        assert_eq!(t.record(|| 41 + 1), 42);
        assert_eq!(t.count(), 1);
    }

    #[test]
    fn dropped_sample_records_nothing() {
        let t = Timer::default();
        let sample = Sample::start();
        drop(sample);
        assert_eq!(t.count(), 0);

        Sample::start().stop(&t);
        assert_eq!(t.count(), 1);
    }

    fn repeated_lines(text: &str) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        text.lines()
            .filter(|l| !seen.insert(l.to_string()))
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn render_all_writes_each_family_once() {
        let shared = Arc::new(MeterRegistry::with_common_tags(&[("application", "fake-id")]));
        let dedicated = Arc::new(MeterRegistry::with_common_tags(&[
            ("application", "fake-id"),
            ("resource", "/example"),
        ]));
        for reg in [&shared, &dedicated] {
            reg.counter("example.prime.number", &[("type", "prime")]).increment();
            reg.gauge("quarkus_example", &[], 25.0);
            reg.timer("prime.timer", &[]).record_duration(Duration::from_millis(1));
        }

        let mut out = String::new();
        render_all(&[Arc::clone(&shared), Arc::clone(&dedicated)], &mut out);

        assert!(repeated_lines(&out).is_empty(), "{out}");
        assert_eq!(out.matches("# TYPE example_prime_number_total counter").count(), 1);
        assert!(out.contains(concat!(
            "example_prime_number_total",
            "{application=\"fake-id\",resource=\"/example\",type=\"prime\"} 1"
        )));
        assert!(out.contains(
            "example_prime_number_total{application=\"fake-id\",type=\"prime\"} 1"
        ));
    }

    #[test]
    fn render_all_keeps_one_copy_of_identical_series() {
        let a = Arc::new(MeterRegistry::new());
        let b = Arc::new(MeterRegistry::new());
        a.gauge("system.cpu.count", &[], 4.0);
        b.gauge("system.cpu.count", &[], 8.0);

        let mut out = String::new();
        render_all(&[a, b], &mut out);
        assert_eq!(out, "# TYPE system_cpu_count gauge\nsystem_cpu_count{} 4\n");
    }

    #[test]
    fn meter_display_for_dump() {
        let reg = MeterRegistry::with_common_tags(&[("application", "fake-id")]);
        reg.counter("example.prime.number", &[("type", "prime")]).increment();
        reg.gauge("quarkus_example", &[], 25.0);
        reg.timer("prime.timer", &[]).record_duration(Duration::from_millis(2));

        let lines: Vec<String> = reg.meters().iter().map(|m| m.to_string()).collect();
        assert_eq!(
            lines,
            vec![
                "counter example.prime.number{application=fake-id,type=prime} count=1",
                "timer prime.timer{application=fake-id} count=1 total_ms=2.000 max_ms=2.000",
                "gauge quarkus_example{application=fake-id} value=25",
            ]
        );
    }

    #[test]
    fn render_prometheus_text() {
        let reg = MeterRegistry::with_common_tags(&[("application", "fake-id")]);
        reg.counter("example.prime.number", &[("type", "prime")]).increment_by(3);
        reg.gauge("quarkus_example", &[], 25.0);
        reg.timer("app.timer", &[("type", "ping")])
            .record_duration(Duration::from_micros(250));

        let mut out = String::new();
        reg.render(&mut out);

        assert!(out.contains("# TYPE example_prime_number_total counter"));
        assert!(out.contains(
            "example_prime_number_total{application=\"fake-id\",type=\"prime\"} 3"
        ));
        assert!(out.contains("quarkus_example{application=\"fake-id\"} 25"));
        assert!(out.contains("# TYPE app_timer_micros histogram"));
        assert!(out.contains(
            "app_timer_micros_bucket{application=\"fake-id\",type=\"ping\",le=\"100\"} 0"
        ));
        assert!(out.contains(
            "app_timer_micros_bucket{application=\"fake-id\",type=\"ping\",le=\"500\"} 1"
        ));
        assert!(out.contains("app_timer_micros_count{application=\"fake-id\",type=\"ping\"} 1"));
        assert!(out.contains("app_timer_micros_max{application=\"fake-id\",type=\"ping\"} 250"));
    }
}
