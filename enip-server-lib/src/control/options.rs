//! The `options.delay` knob (§4.I): a lock-free f64 read before every reply,
//! optionally re-sampled once a second from a range by a background task.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use rand::Rng;
use tracing::debug;

use crate::config::DelaySpec;

/// Current artificial-delay value in seconds. `ArcSwap` gives any-writer,
/// any-reader semantics with no synchronization beyond word-tearing
/// avoidance (§4.I, §9 "best-effort read of latest value").
#[derive(Debug)]
pub struct Delay {
    value: ArcSwap<f64>,
}

impl Delay {
    pub fn new(initial: f64) -> Self {
        Self { value: ArcSwap::new(Arc::new(initial)) }
    }

    pub fn get(&self) -> f64 {
        **self.value.load()
    }

    pub fn set(&self, value: f64) {
        self.value.store(Arc::new(value));
    }
}

/// Run the background mutator for a `DelaySpec::Range`, waking once a second
/// to resample. Returns immediately for `DelaySpec::Fixed` (no task needed).
pub async fn run_mutator(delay: Arc<Delay>, spec: DelaySpec) {
    let (lo, hi) = match spec {
        DelaySpec::Fixed(v) => {
            delay.set(v);
            return;
        }
        DelaySpec::Range(lo, hi) => (lo, hi),
    };

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        ticker.tick().await;
        let sampled = if hi > lo { rand::rng().random_range(lo..hi) } else { lo };
        debug!(delay = sampled, "resampled artificial delay");
        delay.set(sampled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_delay_reads_back_exactly() {
        let delay = Delay::new(0.25);
        assert_eq!(delay.get(), 0.25);
        delay.set(1.5);
        assert_eq!(delay.get(), 1.5);
    }

    #[tokio::test]
    async fn mutator_sets_fixed_value_once() {
        let delay = Arc::new(Delay::new(0.0));
        run_mutator(delay.clone(), DelaySpec::Fixed(0.75)).await;
        assert_eq!(delay.get(), 0.75);
    }
}
