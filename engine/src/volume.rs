use std::{collections::HashMap, sync::Mutex};

use rust_decimal::Decimal;
use tracing::debug;

/// Plug-point for turning raw observed volume into whatever aggregate a
/// caller wants (rolling sums, bucketed history, ...). Not wired to any
/// real storage backend — schema and persistence are out of scope here;
/// this only defines the seam a connector writes through.
pub trait VolumeAccumulator: Send + Sync {
    /// Records `volume` for `symbol`, scaled by `decimals` if known. A
    /// symbol with no known decimals is skipped rather than guessed at,
    /// since silently assuming a scale could misrepresent the volume by
    /// orders of magnitude.
    fn record(&self, symbol: &str, volume: Decimal, decimals: Option<u32>);
}

/// Default in-memory implementation: keeps a running sum per symbol.
#[derive(Default)]
pub struct InMemoryVolumeAccumulator {
    totals: Mutex<HashMap<String, Decimal>>,
}

impl InMemoryVolumeAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn total(&self, symbol: &str) -> Option<Decimal> {
        self.totals.lock().unwrap().get(symbol).copied()
    }
}

impl VolumeAccumulator for InMemoryVolumeAccumulator {
    fn record(&self, symbol: &str, volume: Decimal, decimals: Option<u32>) {
        let Some(decimals) = decimals else {
            debug!(symbol, "skipping volume update, decimals unknown");
            return;
        };

        let scaled = volume * crate::decimal::decimals_factor(decimals);
        let mut totals = self.totals.lock().unwrap();
        *totals.entry(symbol.to_owned()).or_insert(Decimal::ZERO) += scaled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_decimals_are_skipped() {
        let acc = InMemoryVolumeAccumulator::new();
        acc.record("BTCUSDT", Decimal::new(10, 0), None);
        assert_eq!(acc.total("BTCUSDT"), None);
    }

    #[test]
    fn known_decimals_accumulate_across_calls() {
        let acc = InMemoryVolumeAccumulator::new();
        acc.record("BTCUSDT", Decimal::new(1, 0), Some(0));
        acc.record("BTCUSDT", Decimal::new(2, 0), Some(0));
        assert_eq!(acc.total("BTCUSDT"), Some(Decimal::new(3, 0)));
    }
}
