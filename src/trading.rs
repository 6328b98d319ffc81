//! Sample producers and consumers wired through a [`HandleQueue`].
//!
//! An [`Exchange`] synthesizes random trades for one instrument and hands
//! them over as boxed handles. A [`Strategy`] drains the queue, keeps a price
//! and volume series per instrument and computes a momentum signal for each
//! once enough points are available.

use std::{collections::HashMap, sync::Arc, thread, time::Duration};

use rand::{distributions::Uniform, rngs::StdRng, Rng, SeedableRng};
use tracing::{debug, info, trace};

use crate::{
    concurrent_queue::HandleQueue,
    error::{ConfigError, Error, WorkerError},
    momentum::{momentum, MomentumParams},
    worker::{StopToken, Worker},
};

/// Number of points a series needs before signals are computed.
pub const DEFAULT_WINDOW: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub ric: String,
    pub price: f64,
    pub volume: u64,
}

pub type TradeQueue = HandleQueue<Trade>;

pub struct Exchange {
    ric: String,
    prices: Uniform<f64>,
    volumes: Uniform<u64>,
    max: usize,
    interval: Option<Duration>,
    seed: Option<u64>,
}

impl Exchange {
    /// Prices are drawn from `[price_low, price_low * (1 + volatility)]` and
    /// volumes likewise from `volume_low`.
    pub fn new(
        ric: impl Into<String>,
        price_low: f64,
        volume_low: u64,
        volatility: f64,
        max: usize,
    ) -> Result<Self, ConfigError> {
        let price_high = price_low * (1.0 + volatility);
        if !(price_low > 0.0 && price_high.is_finite() && price_high >= price_low) {
            return Err(ConfigError::InvalidRange {
                low: price_low,
                high: price_high,
            });
        }
        if volume_low == 0 {
            return Err(ConfigError::Zero {
                field: "volume_low",
            });
        }
        let volume_high = (volume_low as f64 * (1.0 + volatility)) as u64;
        Ok(Self {
            ric: ric.into(),
            prices: Uniform::new_inclusive(price_low, price_high),
            volumes: Uniform::new_inclusive(volume_low, volume_high.max(volume_low)),
            max,
            interval: None,
            seed: None,
        })
    }

    /// Pauses between two trades, bounding the production rate.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn ric(&self) -> &str {
        &self.ric
    }

    /// Enqueues up to `max` trades, returning early once a stop is requested.
    pub fn produce(&self, queue: &TradeQueue, stop: &StopToken) -> usize {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut produced = 0;
        while produced < self.max && !stop.stop_requested() {
            let trade = Box::new(Trade {
                ric: self.ric.clone(),
                price: rng.sample(&self.prices),
                volume: rng.sample(&self.volumes),
            });
            // The box moves into the queue; this thread keeps no access to it.
            queue.enqueue(trade);
            produced += 1;
            if let Some(interval) = self.interval {
                thread::sleep(interval);
            }
        }
        info!(ric = %self.ric, produced, "exchange finished");
        produced
    }

    pub fn spawn(self, queue: Arc<TradeQueue>) -> Result<Worker<usize>, WorkerError> {
        let name = format!("exchange-{}", self.ric);
        Worker::spawn(name, move |stop| self.produce(&queue, &stop))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signal {
    pub price: Option<f64>,
    pub volume: Option<f64>,
}

#[derive(Debug, Default)]
struct TradeSeries {
    prices: Vec<f64>,
    volumes: Vec<f64>,
}

#[derive(Debug)]
pub struct StrategyReport {
    pub id: String,
    pub processed: usize,
    /// Most recent signal per instrument.
    pub signals: HashMap<String, Signal>,
}

pub struct Strategy {
    id: String,
    max: usize,
    window: usize,
    params: MomentumParams,
    series: HashMap<String, TradeSeries>,
}

impl Strategy {
    pub fn new(id: impl Into<String>, max: usize) -> Self {
        Self {
            id: id.into(),
            max,
            window: DEFAULT_WINDOW,
            params: MomentumParams::default(),
            series: HashMap::new(),
        }
    }

    pub fn with_window(mut self, window: usize) -> Result<Self, ConfigError> {
        if window == 0 {
            return Err(ConfigError::Zero { field: "window" });
        }
        self.window = window;
        Ok(self)
    }

    pub fn with_params(mut self, params: MomentumParams) -> Self {
        self.params = params;
        self
    }

    /// Drains trades until `max` have been processed or a stop is requested.
    pub fn consume(mut self, queue: &TradeQueue, stop: &StopToken) -> StrategyReport {
        let mut processed = 0;
        let mut signals = HashMap::new();
        while processed < self.max && !stop.stop_requested() {
            let Some(trade) = queue.dequeue() else {
                thread::yield_now();
                continue;
            };
            processed += 1;
            let ric = trade.ric.clone();
            if let Some(signal) = self.observe(*trade) {
                trace!(strategy = %self.id, %ric, ?signal, "momentum signal");
                signals.insert(ric, signal);
            }
        }
        info!(strategy = %self.id, processed, "strategy finished");
        StrategyReport {
            id: self.id,
            processed,
            signals,
        }
    }

    fn observe(&mut self, trade: Trade) -> Option<Signal> {
        let series = self.series.entry(trade.ric).or_default();
        series.prices.push(trade.price);
        series.volumes.push(trade.volume as f64);
        if series.prices.len() < self.window {
            return None;
        }
        Some(Signal {
            price: momentum(&series.prices, &self.params),
            volume: momentum(&series.volumes, &self.params),
        })
    }

    pub fn spawn(self, queue: Arc<TradeQueue>) -> Result<Worker<StrategyReport>, WorkerError> {
        let name = format!("strategy-{}", self.id);
        Worker::spawn(name, move |stop| self.consume(&queue, &stop))
    }
}

/// Options for [`run_demo`].
#[derive(Debug, Clone)]
pub struct DemoSettings {
    /// Overrides the per-exchange trade counts of the default scenario.
    pub trades_per_exchange: Option<usize>,
    pub volatility: f64,
    pub window: usize,
    pub seed: Option<u64>,
    /// Pause between two trades of the same exchange.
    pub interval: Option<Duration>,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            trades_per_exchange: None,
            volatility: 0.10,
            window: DEFAULT_WINDOW,
            seed: None,
            interval: None,
        }
    }
}

struct Listing {
    ric: &'static str,
    price_low: f64,
    volume_low: u64,
    trades: usize,
}

/// Two independent queues, each fed by two exchanges and drained by one
/// strategy.
static SCENARIO: [(&str, [Listing; 2]); 2] = [
    (
        "S1",
        [
            Listing {
                ric: "MSFT.O",
                price_low: 490.0,
                volume_low: 10_000,
                trades: 200,
            },
            Listing {
                ric: "AAPL.OQ",
                price_low: 230.0,
                volume_low: 15_000,
                trades: 100,
            },
        ],
    ),
    (
        "S2",
        [
            Listing {
                ric: "NVDA.O",
                price_low: 174.8,
                volume_low: 20_000,
                trades: 100,
            },
            Listing {
                ric: "META.O",
                price_low: 724.5,
                volume_low: 21_000,
                trades: 100,
            },
        ],
    ),
];

/// Runs the sample scenario to completion and returns one report per
/// strategy.
pub fn run_demo(settings: &DemoSettings) -> Result<Vec<StrategyReport>, Error> {
    let mut exchanges = Vec::new();
    let mut strategies = Vec::new();

    for (n, (id, listings)) in SCENARIO.iter().enumerate() {
        let queue = Arc::new(TradeQueue::new());
        let mut total = 0;
        for (m, listing) in listings.iter().enumerate() {
            let trades = settings.trades_per_exchange.unwrap_or(listing.trades);
            total += trades;
            let mut exchange = Exchange::new(
                listing.ric,
                listing.price_low,
                listing.volume_low,
                settings.volatility,
                trades,
            )?;
            if let Some(interval) = settings.interval {
                exchange = exchange.with_interval(interval);
            }
            if let Some(seed) = settings.seed {
                exchange = exchange.with_seed(seed.wrapping_add((n * listings.len() + m) as u64));
            }
            exchanges.push(exchange.spawn(queue.clone())?);
        }
        let strategy = Strategy::new(*id, total).with_window(settings.window)?;
        debug!(strategy = %id, expected = total, "starting strategy");
        strategies.push(strategy.spawn(queue)?);
    }

    for exchange in &mut exchanges {
        exchange.join()?;
    }
    let mut reports = Vec::with_capacity(strategies.len());
    for strategy in &mut strategies {
        reports.push(strategy.join()?);
    }
    Ok(reports)
}
