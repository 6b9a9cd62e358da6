//! Benchmark phases run against each registered driver

use crate::bench::corpus::Corpus;
use crate::bench::report::{
    unix_now, DriverResult, IndexingMetrics, LatencyStats, Report, Throughput,
};
use crate::driver::{Driver, DriverOptions, DriverRegistry};
use crate::utils::progress::{document_bar, phase_spinner};
use anyhow::{bail, Context, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub drivers: Vec<String>,
    /// Latency samples taken per query
    pub iterations: usize,
    pub concurrency: Vec<usize>,
    /// Wall-clock length of each throughput run
    pub duration: Duration,
    pub batch_size: usize,
    pub limit: usize,
    pub silent: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            drivers: Vec::new(),
            iterations: 100,
            concurrency: vec![1, 4, 8],
            duration: Duration::from_secs(5),
            batch_size: 1_000,
            limit: 10,
            silent: false,
        }
    }
}

pub struct BenchRunner<'a> {
    registry: &'a DriverRegistry,
    options: DriverOptions,
    config: BenchConfig,
}

impl<'a> BenchRunner<'a> {
    pub fn new(registry: &'a DriverRegistry, options: DriverOptions, config: BenchConfig) -> Self {
        Self {
            registry,
            options,
            config,
        }
    }

    /// Every requested driver must exist before anything runs
    pub fn validate(&self) -> Result<()> {
        if self.config.drivers.is_empty() {
            bail!("no drivers selected");
        }
        for name in &self.config.drivers {
            if !self.registry.contains(name) {
                bail!(
                    "unknown driver '{}' (available: {})",
                    name,
                    self.registry.names().join(", ")
                );
            }
        }
        Ok(())
    }

    /// Run every phase for every driver. A driver that fails is recorded in
    /// the report with its error; see [`Report::failures`].
    pub fn run(&self, corpus: &Corpus, queries: &[String]) -> Result<Report> {
        self.validate()?;
        if queries.is_empty() {
            bail!("no queries to run");
        }

        let mut report = Report::new(&corpus.name, corpus.len());
        for name in &self.config.drivers {
            info!(driver = %name, docs = corpus.len(), "benchmarking driver");
            let result = match self.run_driver(name, corpus, queries) {
                Ok(result) => result,
                Err(e) => {
                    warn!(driver = %name, error = %format!("{e:#}"), "driver benchmark failed");
                    DriverResult::failed(name, format!("{e:#}"))
                }
            };
            report.results.push(result);
        }
        report.finished_at = unix_now();
        Ok(report)
    }

    fn run_driver(&self, name: &str, corpus: &Corpus, queries: &[String]) -> Result<DriverResult> {
        let open_started = Instant::now();
        let driver = self
            .registry
            .open(name, &self.options)
            .with_context(|| format!("failed to open driver {}", name))?;
        let open_time = open_started.elapsed();

        let indexing = self
            .index(driver.as_ref(), corpus)
            .with_context(|| format!("indexing with {} failed", name))?;

        let first_started = Instant::now();
        driver.search(&queries[0], self.config.limit)?;
        let cold_start = open_time + first_started.elapsed();

        let index_size_bytes = driver.stats()?.memory_bytes;
        let latency = self.latency(driver.as_ref(), queries)?;

        let mut throughput = Vec::with_capacity(self.config.concurrency.len());
        for &level in &self.config.concurrency {
            throughput.push(self.throughput(driver.as_ref(), queries, level));
        }

        driver.close()?;

        Ok(DriverResult {
            name: name.to_string(),
            error: None,
            cold_start_ms: Some(cold_start.as_secs_f64() * 1e3),
            indexing: Some(indexing),
            index_size_bytes,
            latency,
            throughput,
        })
    }

    fn index(&self, driver: &dyn Driver, corpus: &Corpus) -> Result<IndexingMetrics> {
        let bar = document_bar(corpus.len() as u64, self.config.silent);
        let started = Instant::now();

        for batch in corpus.docs.chunks(self.config.batch_size.max(1)) {
            driver.add_documents(batch)?;
            bar.inc(batch.len() as u64);
        }
        bar.set_message("building");
        driver.build()?;
        bar.finish_and_clear();

        let elapsed = started.elapsed();
        let secs = elapsed.as_secs_f64();
        Ok(IndexingMetrics {
            docs: corpus.len() as u64,
            duration_ms: secs * 1e3,
            docs_per_sec: if secs > 0.0 { corpus.len() as f64 / secs } else { 0.0 },
            peak_rss_bytes: peak_rss_bytes(),
        })
    }

    fn latency(&self, driver: &dyn Driver, queries: &[String]) -> Result<Option<LatencyStats>> {
        let spinner = phase_spinner("sampling latency", self.config.silent);
        let mut samples = Vec::with_capacity(queries.len() * self.config.iterations);
        for _ in 0..self.config.iterations {
            for query in queries {
                let started = Instant::now();
                driver.search(query, self.config.limit)?;
                samples.push(started.elapsed());
            }
        }
        spinner.finish_and_clear();
        Ok(LatencyStats::from_samples(samples))
    }

    /// `threads` workers issue queries round-robin until the deadline
    fn throughput(&self, driver: &dyn Driver, queries: &[String], threads: usize) -> Throughput {
        let threads = threads.max(1);
        let spinner = phase_spinner(
            &format!("throughput with {} threads", threads),
            self.config.silent,
        );
        let stop = AtomicBool::new(false);
        let completed = AtomicU64::new(0);
        let errors = AtomicU64::new(0);
        let limit = self.config.limit;

        let started = Instant::now();
        thread::scope(|scope| {
            for worker in 0..threads {
                let (stop, completed, errors) = (&stop, &completed, &errors);
                scope.spawn(move || {
                    let mut i = worker;
                    while !stop.load(Ordering::Relaxed) {
                        match driver.search(&queries[i % queries.len()], limit) {
                            Ok(_) => completed.fetch_add(1, Ordering::Relaxed),
                            Err(_) => errors.fetch_add(1, Ordering::Relaxed),
                        };
                        i += threads;
                    }
                });
            }
            thread::sleep(self.config.duration);
            stop.store(true, Ordering::Relaxed);
        });
        let elapsed = started.elapsed().as_secs_f64();
        spinner.finish_and_clear();

        let queries = completed.load(Ordering::Relaxed);
        Throughput {
            concurrency: threads,
            queries,
            errors: errors.load(Ordering::Relaxed),
            duration_ms: elapsed * 1e3,
            qps: if elapsed > 0.0 { queries as f64 / elapsed } else { 0.0 },
        }
    }
}

/// High-water resident set size of this process, in bytes
pub fn peak_rss_bytes() -> u64 {
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    if unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) } != 0 {
        return 0;
    }
    let max_rss = usage.ru_maxrss.max(0) as u64;
    // Linux reports kilobytes, macOS bytes
    if cfg!(target_os = "macos") {
        max_rss
    } else {
        max_rss * 1024
    }
}
