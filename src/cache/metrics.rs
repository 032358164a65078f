//! Renderers for cache metrics snapshots.

use std::fmt::Write;

/// A point-in-time snapshot of one cache's counters.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheMetrics {
    pub name: String,
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub evictions: u64,
    pub shard_sizes: Vec<usize>,
    pub shard_capacity: usize,
}

impl CacheMetrics {
    pub fn size(&self) -> usize {
        self.shard_sizes.iter().sum()
    }

    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    pub fn hit_rate(&self) -> f64 {
        if self.lookups() == 0 {
            0.0
        } else {
            self.hits as f64 / self.lookups() as f64
        }
    }
}

/// A human readable multi-line summary.
pub fn human_report(metrics: &CacheMetrics, hot_keys: &[(String, u64)]) -> String {
    let mut out = String::new();
    writeln!(out, "Cache Statistics: {}", metrics.name).unwrap();
    writeln!(
        out,
        "  entries: {} ({} shards of {})",
        metrics.size(),
        metrics.shard_sizes.len(),
        metrics.shard_capacity
    )
    .unwrap();
    writeln!(
        out,
        "  hits: {}  misses: {}  hit-rate: {:.1}%",
        metrics.hits,
        metrics.misses,
        metrics.hit_rate() * 100.0
    )
    .unwrap();
    writeln!(
        out,
        "  sets: {}  evictions: {}",
        metrics.sets, metrics.evictions
    )
    .unwrap();
    if !hot_keys.is_empty() {
        writeln!(out, "Hot Keys:").unwrap();
        for (key, hits) in hot_keys {
            writeln!(out, "  {:>8}  {}", hits, key).unwrap();
        }
    }
    out
}

/// Prometheus style flat lines.
pub fn prometheus_report(metrics: &CacheMetrics) -> String {
    let mut out = String::new();
    let name = &metrics.name;
    writeln!(out, "cache_hits{{cache=\"{}\"}} {}", name, metrics.hits).unwrap();
    writeln!(out, "cache_misses{{cache=\"{}\"}} {}", name, metrics.misses).unwrap();
    writeln!(out, "cache_sets{{cache=\"{}\"}} {}", name, metrics.sets).unwrap();
    writeln!(
        out,
        "cache_evictions{{cache=\"{}\"}} {}",
        name, metrics.evictions
    )
    .unwrap();
    writeln!(out, "cache_size{{cache=\"{}\"}} {}", name, metrics.size()).unwrap();
    writeln!(
        out,
        "cache_hit_rate{{cache=\"{}\"}} {:.4}",
        name,
        metrics.hit_rate()
    )
    .unwrap();
    out
}

/// A compact one line summary.
pub fn one_line(metrics: &CacheMetrics) -> String {
    format!(
        "{}: {} entries, {}/{} hit/miss ({:.1}%), {} evicted",
        metrics.name,
        metrics.size(),
        metrics.hits,
        metrics.misses,
        metrics.hit_rate() * 100.0,
        metrics.evictions
    )
}

/// A differential report between two snapshots, suppressing counters which moved
/// by one percent or less.
pub fn delta_report(before: &CacheMetrics, after: &CacheMetrics) -> String {
    let mut out = String::new();
    writeln!(out, "Cache Delta: {}", after.name).unwrap();
    let rows = [
        ("hits", before.hits, after.hits),
        ("misses", before.misses, after.misses),
        ("sets", before.sets, after.sets),
        ("evictions", before.evictions, after.evictions),
        ("size", before.size() as u64, after.size() as u64),
    ];
    let mut wrote = false;
    for (label, was, now) in rows {
        if !significant(was, now) {
            continue;
        }
        writeln!(out, "  {}: {} -> {} ({:+})", label, was, now, now as i64 - was as i64).unwrap();
        wrote = true;
    }
    if !wrote {
        writeln!(out, "  no significant changes").unwrap();
    }
    out
}

/// Whether a counter moved by more than one percent of its previous value.
fn significant(was: u64, now: u64) -> bool {
    if was == now {
        return false;
    }
    let delta = now.abs_diff(was) as f64;
    was == 0 || delta / was as f64 > 0.01
}
