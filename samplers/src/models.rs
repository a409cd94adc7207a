//! Built-in outcome models
//!
//! These are simulations: outcomes are drawn from fixed probabilities and no
//! trial ever leaves the process.

use std::collections::HashSet;

use async_trait::async_trait;
use campaign_core::{OutcomeKind, OutcomeModel, TrialError, TrialInput};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Always returns the same outcome
#[derive(Debug, Clone, Copy)]
pub struct FixedOutcomeModel {
    outcome: OutcomeKind,
}

impl FixedOutcomeModel {
    /// Create a model that always yields `outcome`
    pub fn new(outcome: OutcomeKind) -> Self {
        Self { outcome }
    }
}

#[async_trait]
impl OutcomeModel for FixedOutcomeModel {
    fn name(&self) -> &str {
        match self.outcome {
            OutcomeKind::Success => "always_success",
            OutcomeKind::Miss => "always_miss",
            OutcomeKind::Rejected => "always_rejected",
            OutcomeKind::Error => "always_error",
        }
    }

    fn nominal_success_rate(&self) -> f64 {
        if self.outcome == OutcomeKind::Success {
            1.0
        } else {
            0.0
        }
    }

    async fn classify(&self, _input: &TrialInput) -> Result<OutcomeKind, TrialError> {
        Ok(self.outcome)
    }
}

/// Independent draws with fixed success, reject and error rates
///
/// Rates are clamped to `0.0..=1.0` and consumed in that order from a single
/// uniform draw; whatever probability remains is a `Miss`.
pub struct BernoulliModel {
    success_rate: f64,
    reject_rate: f64,
    error_rate: f64,
    rng: Mutex<StdRng>,
}

impl BernoulliModel {
    /// Create a model with the given per-trial success rate
    pub fn new(success_rate: f64) -> Self {
        Self {
            success_rate: clamp_rate(success_rate),
            reject_rate: 0.0,
            error_rate: 0.0,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Set the per-trial rejection rate
    pub fn with_reject_rate(mut self, rate: f64) -> Self {
        self.reject_rate = clamp_rate(rate);
        self
    }

    /// Set the per-trial error rate
    pub fn with_error_rate(mut self, rate: f64) -> Self {
        self.error_rate = clamp_rate(rate);
        self
    }

    /// Use a deterministic random source
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    fn draw(&self) -> f64 {
        self.rng.lock().gen::<f64>()
    }

    fn sample(&self) -> OutcomeKind {
        let roll = self.draw();
        let mut threshold = self.success_rate;
        if roll < threshold {
            return OutcomeKind::Success;
        }
        threshold += self.reject_rate;
        if roll < threshold {
            return OutcomeKind::Rejected;
        }
        threshold += self.error_rate;
        if roll < threshold {
            return OutcomeKind::Error;
        }
        OutcomeKind::Miss
    }
}

#[async_trait]
impl OutcomeModel for BernoulliModel {
    fn name(&self) -> &str {
        "bernoulli"
    }

    fn nominal_success_rate(&self) -> f64 {
        self.success_rate
    }

    async fn classify(&self, _input: &TrialInput) -> Result<OutcomeKind, TrialError> {
        Ok(self.sample())
    }
}

impl std::fmt::Debug for BernoulliModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BernoulliModel")
            .field("success_rate", &self.success_rate)
            .field("reject_rate", &self.reject_rate)
            .field("error_rate", &self.error_rate)
            .finish()
    }
}

/// Boosted success chance for inputs found in a lookup table
///
/// Inputs in the table succeed with `boosted_rate`, otherwise `Miss`. All other
/// inputs are classified by the base model.
#[derive(Debug)]
pub struct LookupBoostModel {
    table: HashSet<String>,
    boosted_rate: f64,
    base: BernoulliModel,
}

impl LookupBoostModel {
    /// Create a model over `table` with the given boosted rate and base model
    pub fn new<I, S>(table: I, boosted_rate: f64, base: BernoulliModel) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table: table.into_iter().map(Into::into).collect(),
            boosted_rate: clamp_rate(boosted_rate),
            base,
        }
    }

    /// Whether `input` is in the lookup table
    pub fn is_boosted(&self, input: &TrialInput) -> bool {
        self.table.contains(input.as_str())
    }
}

#[async_trait]
impl OutcomeModel for LookupBoostModel {
    fn name(&self) -> &str {
        "lookup_boost"
    }

    fn nominal_success_rate(&self) -> f64 {
        self.base.nominal_success_rate()
    }

    async fn classify(&self, input: &TrialInput) -> Result<OutcomeKind, TrialError> {
        if self.is_boosted(input) {
            let outcome = if self.base.draw() < self.boosted_rate {
                OutcomeKind::Success
            } else {
                OutcomeKind::Miss
            };
            return Ok(outcome);
        }
        Ok(self.base.sample())
    }
}

fn clamp_rate(rate: f64) -> f64 {
    if rate.is_nan() {
        0.0
    } else {
        rate.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(s: &str) -> TrialInput {
        TrialInput::new(s)
    }

    #[tokio::test]
    async fn test_fixed_model() {
        let model = FixedOutcomeModel::new(OutcomeKind::Rejected);
        assert_eq!(model.name(), "always_rejected");
        assert_eq!(model.nominal_success_rate(), 0.0);
        assert_eq!(
            model.classify(&input("x")).await.unwrap(),
            OutcomeKind::Rejected
        );

        assert_eq!(
            FixedOutcomeModel::new(OutcomeKind::Success).nominal_success_rate(),
            1.0
        );
    }

    #[tokio::test]
    async fn test_bernoulli_extremes() {
        let always = BernoulliModel::new(1.0).with_seed(1);
        let never = BernoulliModel::new(0.0).with_seed(1);
        for _ in 0..50 {
            assert_eq!(
                always.classify(&input("x")).await.unwrap(),
                OutcomeKind::Success
            );
            assert_eq!(never.classify(&input("x")).await.unwrap(), OutcomeKind::Miss);
        }
    }

    #[tokio::test]
    async fn test_bernoulli_rates_roughly_hold() {
        let model = BernoulliModel::new(0.2)
            .with_reject_rate(0.3)
            .with_error_rate(0.1)
            .with_seed(42);

        let mut counts = campaign_core::OutcomeCounts::default();
        for _ in 0..10_000 {
            counts.record(model.classify(&input("x")).await.unwrap());
        }

        let rate = |n: u64| n as f64 / counts.attempts as f64;
        assert!((rate(counts.successes) - 0.2).abs() < 0.03);
        assert!((rate(counts.rejects) - 0.3).abs() < 0.03);
        assert!((rate(counts.errors) - 0.1).abs() < 0.03);
        assert!((rate(counts.misses) - 0.4).abs() < 0.03);
    }

    #[test]
    fn test_rates_clamped() {
        let model = BernoulliModel::new(1.5)
            .with_reject_rate(-1.0)
            .with_error_rate(f64::NAN);
        assert_eq!(model.nominal_success_rate(), 1.0);
        assert_eq!(model.reject_rate, 0.0);
        assert_eq!(model.error_rate, 0.0);
    }

    #[tokio::test]
    async fn test_lookup_boost() {
        let base = BernoulliModel::new(0.0).with_seed(7);
        let model = LookupBoostModel::new(["123456", "password"], 1.0, base);

        assert!(model.is_boosted(&input("password")));
        assert_eq!(
            model.classify(&input("password")).await.unwrap(),
            OutcomeKind::Success
        );
        assert_eq!(
            model.classify(&input("correcthorse")).await.unwrap(),
            OutcomeKind::Miss
        );
        assert_eq!(model.nominal_success_rate(), 0.0);
    }
}
