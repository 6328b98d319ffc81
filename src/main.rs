use clap::{Parser, Subcommand, ValueEnum};
use std::{
    process::ExitCode,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    thread,
    time::Duration,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use two_lock_queue::{
    baselines::Counted,
    trading::{run_demo, DemoSettings},
    ConcurrentQueue, ConfigError, Error, Handle, TwoLockQueue,
};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Bench(config) => bench(config),
        Command::Demo(config) => demo(config),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "run failed");
            ExitCode::FAILURE
        }
    }
}

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Measure producer/consumer throughput of a queue.
    Bench(BenchConfig),
    /// Run the sample exchanges and strategies.
    Demo(DemoConfig),
}

#[derive(Clone, Copy, ValueEnum)]
enum QueueKind {
    TwoLock,
    Seg,
    Concurrent,
    Lockfree,
}

#[derive(clap::Args)]
struct BenchConfig {
    /// queue implementation to measure.
    #[arg(long, value_enum, default_value_t = QueueKind::TwoLock)]
    queue: QueueKind,
    /// number of elements to add to the queue before starting the main
    /// threaded test.
    #[arg(long, default_value_t = 0)]
    prefill: usize,
    /// number of threads pushing elements onto the queue.
    #[arg(long)]
    producer_threads: usize,
    /// number of threads popping elements off the queue.
    #[arg(long)]
    consumer_threads: usize,
    /// duration in seconds to run the test
    #[arg(long)]
    duration: usize,
    /// pin every benchmark thread to its own core, round robin.
    #[arg(long)]
    pin_threads: bool,
}

#[derive(clap::Args)]
struct DemoConfig {
    /// trades produced by every exchange, instead of the scenario defaults.
    #[arg(long)]
    trades_per_exchange: Option<usize>,
    /// relative width of the price and volume ranges.
    #[arg(long, default_value_t = 0.10)]
    volatility: f64,
    /// points per instrument before signals are computed.
    #[arg(long, default_value_t = two_lock_queue::trading::DEFAULT_WINDOW)]
    window: usize,
    /// seed for reproducible trades.
    #[arg(long)]
    seed: Option<u64>,
    /// pause between two trades of one exchange, in microseconds.
    #[arg(long)]
    interval_us: Option<u64>,
}

fn demo(config: DemoConfig) -> Result<(), Error> {
    let settings = DemoSettings {
        trades_per_exchange: config.trades_per_exchange,
        volatility: config.volatility,
        window: config.window,
        seed: config.seed,
        interval: config.interval_us.map(Duration::from_micros),
    };
    for report in run_demo(&settings)? {
        info!(strategy = %report.id, processed = report.processed, "strategy report");
        for (ric, signal) in &report.signals {
            info!(
                strategy = %report.id,
                %ric,
                price_signal = ?signal.price,
                volume_signal = ?signal.volume,
                "last signal"
            );
        }
    }
    Ok(())
}

fn bench(config: BenchConfig) -> Result<(), Error> {
    if config.duration == 0 {
        return Err(ConfigError::Zero { field: "duration" }.into());
    }
    match config.queue {
        QueueKind::TwoLock => benchmark_producer_consumer::<TwoLockQueue<i32>>(&config),
        QueueKind::Seg => benchmark_producer_consumer::<crossbeam_queue::SegQueue<i32>>(&config),
        QueueKind::Concurrent => {
            benchmark_producer_consumer::<concurrent_queue::ConcurrentQueue<i32>>(&config)
        }
        QueueKind::Lockfree => benchmark_producer_consumer::<lockfree::queue::Queue<i32>>(&config),
    }
}

fn benchmark_producer_consumer<C>(config: &BenchConfig) -> Result<(), Error>
where
    C: ConcurrentQueue<i32> + Sync,
{
    let cores = if config.pin_threads {
        let cores = core_affinity::get_core_ids().unwrap_or_default();
        if cores.is_empty() {
            return Err(ConfigError::NoCores.into());
        }
        cores
    } else {
        Vec::new()
    };

    let queue = Counted::<C>::new(C::new());
    let mut handle = queue.register();
    for i in 0..config.prefill {
        handle.enqueue(i as i32);
    }
    drop(handle);

    let done: AtomicBool = AtomicBool::new(false);
    let attempts = AtomicUsize::new(0);
    let pin = |index: usize| {
        if let Some(core) = cores.get(index % cores.len().max(1)) {
            core_affinity::set_for_current(*core);
        }
    };

    thread::scope(|s| {
        for t in 0..config.producer_threads {
            let (queue, done, pin) = (&queue, &done, &pin);
            s.spawn(move || {
                pin(t);
                let mut handle = queue.register();
                while !done.load(Ordering::Relaxed) {
                    handle.enqueue(405);
                }
            });
        }
        for t in 0..config.consumer_threads {
            let (queue, done, attempts, pin) = (&queue, &done, &attempts, &pin);
            s.spawn(move || {
                pin(config.producer_threads + t);
                let mut local_attempts = 0;
                let mut handle = queue.register();
                while !done.load(Ordering::Relaxed) {
                    handle.dequeue();
                    local_attempts += 1;
                }
                attempts.fetch_add(local_attempts, Ordering::Relaxed);
            });
        }

        thread::sleep(Duration::from_secs(config.duration as u64));
        done.store(true, Ordering::Relaxed);
    });

    let enqueues = queue.enq_count();
    let dequeues = queue.deq_count();
    info!(
        throughput = (enqueues + dequeues) as f64 / config.duration as f64,
        enqueues,
        dequeues,
        dequeue_attempts = attempts.into_inner(),
        "benchmark finished"
    );
    Ok(())
}
