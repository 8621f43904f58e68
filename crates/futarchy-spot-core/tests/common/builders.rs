//! Builder for markets in a known state

use futarchy_spot_core::{SpotMarket, Timestamp, DEFAULT_FEE_BPS};

/// Builder for creating seeded markets
pub struct MarketBuilder {
    fee_bps: u16,
    asset: u64,
    stable: u64,
    seeded_at: Timestamp,
}

impl Default for MarketBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketBuilder {
    pub fn new() -> Self {
        Self {
            fee_bps: DEFAULT_FEE_BPS,
            asset: 1_000_000,
            stable: 1_000_000,
            seeded_at: 0,
        }
    }

    pub fn fee_bps(mut self, fee_bps: u16) -> Self {
        self.fee_bps = fee_bps;
        self
    }

    pub fn reserves(mut self, asset: u64, stable: u64) -> Self {
        self.asset = asset;
        self.stable = stable;
        self
    }

    pub fn seeded_at(mut self, now: Timestamp) -> Self {
        self.seeded_at = now;
        self
    }

    /// Market with the first deposit applied
    pub fn build(self) -> SpotMarket {
        let mut market = SpotMarket::new(self.fee_bps).expect("valid fee");
        market
            .add_liquidity(self.asset, self.stable, 0, self.seeded_at)
            .expect("initial deposit");
        market
    }
}
