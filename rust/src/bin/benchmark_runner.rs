use bufmgr::bufferpool::{BufferManager, PoolStats};
use bufmgr::error::Result;
use bufmgr::page::PageId;
use bufmgr::pagefile::{FileRef, MemFile, PageFile};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Instant;

/// Standalone benchmark runner for clock-sweep hit rate analysis
fn main() {
    println!("Clock-Sweep Buffer Pool Benchmark");
    println!("=================================\n");

    let benchmark = ClockBenchmark::new();
    match benchmark.run_benchmark_suite() {
        Ok(results) => println!("{}", ClockBenchmark::generate_report(&results)),
        Err(e) => {
            eprintln!("benchmark failed: {e}");
            std::process::exit(1);
        }
    }
}

/// Benchmark configuration for one workload
#[derive(Clone)]
pub struct BenchmarkConfig {
    pub name: &'static str,
    pub pool_size: usize,
    pub total_pages: usize,
    pub access_pattern: AccessPattern,
    pub write_ratio: f64,
}

#[derive(Clone)]
pub enum AccessPattern {
    Sequential,
    Random(Vec<PageId>),
    Working(Vec<PageId>), // Simulates working set locality
    LoopOneOver,          // Loops over pool_size + 1 pages, defeats recency-based policies
}

/// Performance metrics collected during benchmarking
#[derive(Debug, Clone)]
pub struct PerformanceMetrics {
    pub config_name: String,
    pub pool_size: usize,
    pub total_pages: usize,
    pub total_operations: usize,
    pub stats: PoolStats,
    pub elapsed_nanos: u128,
}

impl PerformanceMetrics {
    pub fn operations_per_second(&self) -> f64 {
        if self.elapsed_nanos == 0 {
            0.0
        } else {
            (self.total_operations as f64) / (self.elapsed_nanos as f64 / 1_000_000_000.0)
        }
    }

    pub fn evictions_per_1k_ops(&self) -> f64 {
        if self.total_operations == 0 {
            0.0
        } else {
            (self.stats.evictions as f64 / self.total_operations as f64) * 1000.0
        }
    }
}

pub struct ClockBenchmark {
    configs: Vec<BenchmarkConfig>,
}

impl Default for ClockBenchmark {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockBenchmark {
    pub fn new() -> Self {
        Self {
            configs: Self::create_benchmark_configs(),
        }
    }

    fn random_pattern(seed: u64, total_pages: usize, len: usize) -> Vec<PageId> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len)
            .map(|_| rng.gen_range(1..=total_pages as PageId))
            .collect()
    }

    fn create_benchmark_configs() -> Vec<BenchmarkConfig> {
        vec![
            BenchmarkConfig {
                name: "small_pool_sequential",
                pool_size: 3,
                total_pages: 50,
                access_pattern: AccessPattern::Sequential,
                write_ratio: 0.0,
            },
            BenchmarkConfig {
                name: "small_pool_random",
                pool_size: 3,
                total_pages: 50,
                access_pattern: AccessPattern::Random(Self::random_pattern(42, 50, 200)),
                write_ratio: 0.0,
            },
            BenchmarkConfig {
                name: "working_set_locality",
                pool_size: 5,
                total_pages: 25,
                access_pattern: AccessPattern::Working(Self::generate_working_set_pattern(
                    25, 5, 200,
                )),
                write_ratio: 0.0,
            },
            BenchmarkConfig {
                name: "mixed_workload",
                pool_size: 8,
                total_pages: 100,
                access_pattern: AccessPattern::Random(Self::random_pattern(123, 100, 300)),
                write_ratio: 0.3,
            },
            BenchmarkConfig {
                name: "medium_pool_write_heavy",
                pool_size: 16,
                total_pages: 200,
                access_pattern: AccessPattern::Random(Self::random_pattern(456, 200, 500)),
                write_ratio: 0.4,
            },
            BenchmarkConfig {
                name: "large_file_scan",
                pool_size: 32,
                total_pages: 1000,
                access_pattern: AccessPattern::Sequential,
                write_ratio: 0.0,
            },
            BenchmarkConfig {
                name: "loop_one_over_pool",
                pool_size: 4,
                total_pages: 10,
                access_pattern: AccessPattern::LoopOneOver,
                write_ratio: 0.0,
            },
            BenchmarkConfig {
                name: "large_pool_efficiency",
                pool_size: 64,
                total_pages: 100,
                access_pattern: AccessPattern::Random(Self::random_pattern(321, 100, 200)),
                write_ratio: 0.1,
            },
        ]
    }

    /// Generate access pattern that simulates working set locality
    fn generate_working_set_pattern(
        total_pages: usize,
        working_set_size: usize,
        num_accesses: usize,
    ) -> Vec<PageId> {
        let mut rng = StdRng::seed_from_u64(42);
        (0..num_accesses)
            .map(|_| {
                // 80% chance to access working set, 20% chance to access other pages
                if rng.gen_bool(0.8) {
                    rng.gen_range(1..=working_set_size as PageId)
                } else {
                    rng.gen_range(working_set_size as PageId + 1..=total_pages as PageId)
                }
            })
            .collect()
    }

    fn generate_access_sequence(config: &BenchmarkConfig) -> Vec<PageId> {
        match &config.access_pattern {
            AccessPattern::Sequential => (1..=config.total_pages as PageId)
                .cycle()
                .take(config.total_pages * 2)
                .collect(),
            AccessPattern::Random(pattern) | AccessPattern::Working(pattern) => pattern.clone(),
            AccessPattern::LoopOneOver => (0..100)
                .flat_map(|_| 1..=(config.pool_size as PageId + 1))
                .collect(),
        }
    }

    /// Run one workload against a fresh pool and file
    pub fn run_single_benchmark(config: &BenchmarkConfig) -> Result<PerformanceMetrics> {
        let mut mem_file = MemFile::new(config.name);
        for _ in 0..config.total_pages {
            mem_file.allocate_page()?;
        }
        let file = FileRef::new(mem_file);
        let mut bufmgr = BufferManager::new(config.pool_size)?;

        let access_sequence = Self::generate_access_sequence(config);
        let mut rng = StdRng::seed_from_u64(7);

        let start_time = Instant::now();
        for &page_number in &access_sequence {
            let page = bufmgr.fetch_page(&file, page_number)?;
            let write = rng.gen_bool(config.write_ratio);
            if write {
                page.with_page_mut(|p| p.insert_record(&page_number.to_le_bytes()))?;
            }
            bufmgr.unpin_page(&file, page_number, write)?;
        }
        let elapsed = start_time.elapsed();

        Ok(PerformanceMetrics {
            config_name: config.name.to_string(),
            pool_size: config.pool_size,
            total_pages: config.total_pages,
            total_operations: access_sequence.len(),
            stats: bufmgr.stats(),
            elapsed_nanos: elapsed.as_nanos(),
        })
    }

    /// Run comprehensive benchmark suite
    pub fn run_benchmark_suite(&self) -> Result<Vec<PerformanceMetrics>> {
        let mut results = Vec::new();

        println!("Running benchmark suite...\n");

        for (config_idx, config) in self.configs.iter().enumerate() {
            print!(
                "Running config {}/{}: {} ... ",
                config_idx + 1,
                self.configs.len(),
                config.name
            );
            let metrics = Self::run_single_benchmark(config)?;
            println!(
                "Hit rate: {:.1}%, Ops/sec: {:.0}",
                metrics.stats.hit_rate() * 100.0,
                metrics.operations_per_second()
            );
            results.push(metrics);
        }
        println!();

        Ok(results)
    }

    /// Generate performance report
    pub fn generate_report(results: &[PerformanceMetrics]) -> String {
        let mut report = String::new();
        report.push_str("# Clock-Sweep Performance Analysis\n\n");
        report.push_str("| Config | Pool | Pages | Ops | Hit Rate | Evictions/1k ops | Write-backs | Ops/sec |\n");
        report.push_str("|--------|------|-------|-----|----------|------------------|-------------|---------|\n");

        for result in results {
            report.push_str(&format!(
                "| {} | {} | {} | {} | {:.1}% | {:.1} | {} | {:.0} |\n",
                result.config_name,
                result.pool_size,
                result.total_pages,
                result.total_operations,
                result.stats.hit_rate() * 100.0,
                result.evictions_per_1k_ops(),
                result.stats.write_backs,
                result.operations_per_second()
            ));
        }

        report
    }
}
