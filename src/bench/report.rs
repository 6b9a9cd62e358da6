//! Benchmark results and their Markdown / JSON / CSV renderings

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub cpus: usize,
}

impl SystemInfo {
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            cpus: rayon::current_num_threads(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexingMetrics {
    pub docs: u64,
    pub duration_ms: f64,
    pub docs_per_sec: f64,
    /// Process high-water mark after indexing
    pub peak_rss_bytes: u64,
}

/// Latency distribution in microseconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub samples: usize,
    pub min_us: f64,
    pub avg_us: f64,
    pub p50_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
    pub max_us: f64,
}

impl LatencyStats {
    /// Nearest-rank percentiles over the sorted samples
    pub fn from_samples(mut samples: Vec<Duration>) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        samples.sort_unstable();

        let us = |d: Duration| d.as_secs_f64() * 1e6;
        let n = samples.len();
        let rank = |p: f64| {
            let idx = (p / 100.0 * n as f64).ceil() as usize;
            us(samples[idx.clamp(1, n) - 1])
        };
        let total: f64 = samples.iter().map(|&d| us(d)).sum();

        Some(Self {
            samples: n,
            min_us: us(samples[0]),
            avg_us: total / n as f64,
            p50_us: rank(50.0),
            p95_us: rank(95.0),
            p99_us: rank(99.0),
            max_us: us(samples[n - 1]),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Throughput {
    pub concurrency: usize,
    pub queries: u64,
    pub errors: u64,
    pub duration_ms: f64,
    pub qps: f64,
}

/// Everything measured for one driver
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriverResult {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub cold_start_ms: Option<f64>,
    #[serde(default)]
    pub indexing: Option<IndexingMetrics>,
    #[serde(default)]
    pub index_size_bytes: u64,
    #[serde(default)]
    pub latency: Option<LatencyStats>,
    #[serde(default)]
    pub throughput: Vec<Throughput>,
}

impl DriverResult {
    pub fn failed(name: &str, error: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            error: Some(error.to_string()),
            ..Self::default()
        }
    }

    pub fn max_qps(&self) -> Option<f64> {
        self.throughput
            .iter()
            .map(|t| t.qps)
            .max_by(|a, b| a.total_cmp(b))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Unix seconds
    pub started_at: u64,
    pub finished_at: u64,
    pub system: SystemInfo,
    pub corpus: String,
    pub corpus_docs: u64,
    pub results: Vec<DriverResult>,
}

/// Output encodings, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Markdown,
    Json,
    Csv,
}

impl ReportFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("md") | Some("markdown") => Ok(ReportFormat::Markdown),
            Some("json") => Ok(ReportFormat::Json),
            Some("csv") => Ok(ReportFormat::Csv),
            _ => bail!(
                "unsupported report extension for {} (expected .md, .json or .csv)",
                path.display()
            ),
        }
    }
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl Report {
    pub fn new(corpus: &str, corpus_docs: usize) -> Self {
        let now = unix_now();
        Self {
            started_at: now,
            finished_at: now,
            system: SystemInfo::current(),
            corpus: corpus.to_string(),
            corpus_docs: corpus_docs as u64,
            results: Vec::new(),
        }
    }

    /// Drivers that did not complete
    pub fn failures(&self) -> Vec<&DriverResult> {
        self.results.iter().filter(|r| r.error.is_some()).collect()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read report {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse report {}", path.display()))
    }

    /// Merge reports in order; a later result replaces an earlier one of
    /// the same driver.
    pub fn combine(reports: Vec<Report>) -> Option<Report> {
        let mut iter = reports.into_iter();
        let mut combined = iter.next()?;
        for report in iter {
            combined.started_at = combined.started_at.min(report.started_at);
            combined.finished_at = combined.finished_at.max(report.finished_at);
            for result in report.results {
                match combined.results.iter_mut().find(|r| r.name == result.name) {
                    Some(existing) => *existing = result,
                    None => combined.results.push(result),
                }
            }
        }
        Some(combined)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let content = match ReportFormat::from_path(path)? {
            ReportFormat::Markdown => self.to_markdown(),
            ReportFormat::Json => self.to_json()?,
            ReportFormat::Csv => self.to_csv(),
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::from(
            "driver,error,cold_start_ms,index_ms,docs_per_sec,peak_rss_bytes,index_size_bytes,\
             p50_us,p95_us,p99_us,max_qps\n",
        );
        for r in &self.results {
            let opt = |v: Option<f64>| v.map(|v| format!("{:.3}", v)).unwrap_or_default();
            let _ = writeln!(
                out,
                "{},{},{},{},{},{},{},{},{},{},{}",
                csv_field(&r.name),
                csv_field(r.error.as_deref().unwrap_or("")),
                opt(r.cold_start_ms),
                opt(r.indexing.as_ref().map(|i| i.duration_ms)),
                opt(r.indexing.as_ref().map(|i| i.docs_per_sec)),
                r.indexing.as_ref().map_or(0, |i| i.peak_rss_bytes),
                r.index_size_bytes,
                opt(r.latency.as_ref().map(|l| l.p50_us)),
                opt(r.latency.as_ref().map(|l| l.p95_us)),
                opt(r.latency.as_ref().map(|l| l.p99_us)),
                opt(r.max_qps()),
            );
        }
        out
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Full-Text Search Driver Benchmark\n");
        let _ = writeln!(out, "**Corpus:** {} ({} documents)  ", self.corpus, self.corpus_docs);
        let _ = writeln!(
            out,
            "**System:** {} {}, {} threads  ",
            self.system.os, self.system.arch, self.system.cpus
        );
        let _ = writeln!(
            out,
            "**Duration:** {}s\n",
            self.finished_at.saturating_sub(self.started_at)
        );

        let _ = writeln!(out, "## Summary\n");
        let _ = writeln!(
            out,
            "| Driver | Cold start | Index time | Docs/sec | Peak RSS | Index size | p50 | p95 | p99 | Max QPS |"
        );
        let _ = writeln!(out, "|---|---|---|---|---|---|---|---|---|---|");
        for r in &self.results {
            if let Some(error) = &r.error {
                let _ = writeln!(out, "| {} | ERROR: {} | | | | | | | | |", r.name, error);
                continue;
            }
            let dash = || "-".to_string();
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} | {} | {} | {} | {} | {} |",
                r.name,
                r.cold_start_ms.map_or_else(dash, |ms| format!("{:.1}ms", ms)),
                r.indexing.as_ref().map_or_else(dash, |i| format!("{:.0}ms", i.duration_ms)),
                r.indexing.as_ref().map_or_else(dash, |i| format!("{:.0}", i.docs_per_sec)),
                r.indexing.as_ref().map_or_else(dash, |i| format_bytes(i.peak_rss_bytes)),
                format_bytes(r.index_size_bytes),
                r.latency.as_ref().map_or_else(dash, |l| format_us(l.p50_us)),
                r.latency.as_ref().map_or_else(dash, |l| format_us(l.p95_us)),
                r.latency.as_ref().map_or_else(dash, |l| format_us(l.p99_us)),
                r.max_qps().map_or_else(dash, |q| format!("{:.0}", q)),
            );
        }

        let _ = writeln!(out, "\n## Latency Distribution\n");
        let _ = writeln!(out, "| Driver | Samples | Min | Avg | p50 | p95 | p99 | Max |");
        let _ = writeln!(out, "|---|---|---|---|---|---|---|---|");
        for r in &self.results {
            if let Some(l) = &r.latency {
                let _ = writeln!(
                    out,
                    "| {} | {} | {} | {} | {} | {} | {} | {} |",
                    r.name,
                    l.samples,
                    format_us(l.min_us),
                    format_us(l.avg_us),
                    format_us(l.p50_us),
                    format_us(l.p95_us),
                    format_us(l.p99_us),
                    format_us(l.max_us),
                );
            }
        }

        let mut levels: Vec<usize> = self
            .results
            .iter()
            .flat_map(|r| r.throughput.iter().map(|t| t.concurrency))
            .collect();
        levels.sort_unstable();
        levels.dedup();

        if !levels.is_empty() {
            let _ = writeln!(out, "\n## Throughput (QPS by concurrency)\n");
            let header: Vec<String> = levels.iter().map(|l| l.to_string()).collect();
            let _ = writeln!(out, "| Driver | {} |", header.join(" | "));
            let _ = writeln!(out, "|---|{}", "---|".repeat(levels.len()));
            for r in self.results.iter().filter(|r| !r.throughput.is_empty()) {
                let cells: Vec<String> = levels
                    .iter()
                    .map(|level| {
                        r.throughput
                            .iter()
                            .find(|t| t.concurrency == *level)
                            .map_or_else(|| "-".to_string(), |t| format!("{:.0}", t.qps))
                    })
                    .collect();
                let _ = writeln!(out, "| {} | {} |", r.name, cells.join(" | "));
            }
        }

        out
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn format_us(us: f64) -> String {
    if us >= 1_000.0 {
        format!("{:.2}ms", us / 1_000.0)
    } else {
        format!("{:.0}µs", us)
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
