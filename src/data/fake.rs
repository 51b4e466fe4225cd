/*!
Generate fake quote data, for testing purposes
*/
use super::Series;
use crate::{Error, Result};
use chrono::{Duration, NaiveDate};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// A trait implemented by price generators
pub trait PriceGen {
    /// Generate the next price
    fn next_price(&mut self) -> f64;
    /// Generate `n` consecutive prices as a univariate series
    fn series(&mut self, n: usize) -> Series
    where
        Self: Sized,
    {
        Series::univariate((0..n).map(|_| self.next_price()).collect())
    }
}

/// Generate fake prices using a geometric random walk
#[derive(Debug, Clone)]
pub struct PriceRandomWalk<R = StdRng> {
    /// The RNG used by this random walk
    pub rng: R,
    /// The current price
    pub price: f64,
    /// Log-returns are drawn from this distribution
    pub returns: Normal<f64>,
}

impl PriceRandomWalk {
    /// A seeded random walk starting at `price` with per-step log-return volatility `sigma`
    pub fn seeded(seed: u64, price: f64, sigma: f64) -> Result<PriceRandomWalk> {
        let returns = Normal::new(0.0, sigma).map_err(|err| {
            Error::InvalidConfig(format!("volatility {}: {:?}", sigma, err))
        })?;
        Ok(PriceRandomWalk {
            rng: StdRng::seed_from_u64(seed),
            price,
            returns,
        })
    }
}

impl<R: Rng> PriceGen for PriceRandomWalk<R> {
    fn next_price(&mut self) -> f64 {
        let price = self.price;
        self.price *= self.returns.sample(&mut self.rng).exp();
        price
    }
}

/// A noiseless sinusoidal price around a fixed level
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PriceSine {
    /// The price the sine oscillates around
    pub level: f64,
    /// The amplitude of the oscillation
    pub amplitude: f64,
    /// Steps per full cycle
    pub period: f64,
    /// The current step
    pub t: u64,
}

impl PriceGen for PriceSine {
    fn next_price(&mut self) -> f64 {
        let phase = 2.0 * std::f64::consts::PI * self.t as f64 / self.period;
        self.t += 1;
        self.level + self.amplitude * phase.sin()
    }
}

/// `n` consecutive daily dates starting at `start`
pub fn daily_dates(start: NaiveDate, n: usize) -> Vec<NaiveDate> {
    (0..n).map(|i| start + Duration::days(i as i64)).collect()
}
