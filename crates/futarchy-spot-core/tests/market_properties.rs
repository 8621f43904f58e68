//! Property-based tests for market and oracle invariants

mod common;

use common::*;
use futarchy_spot_core::{
    RollingWindowOracle, SpotMarket, SwapDirection, PRICE_SCALE, THREE_DAYS_MS,
};
use proptest::prelude::*;

prop_compose! {
    fn reserves_strategy()(
        asset in 1_000_000u64..1_000_000_000u64,
        stable in 1_000_000u64..1_000_000_000u64,
    ) -> (u64, u64) {
        (asset, stable)
    }
}

prop_compose! {
    fn swap_strategy()(
        amount in 1u64..50_000_000u64,
        asset_to_stable in any::<bool>(),
        step in 0u64..HOUR_MS,
    ) -> (u64, SwapDirection, u64) {
        let direction = if asset_to_stable {
            SwapDirection::AssetToStable
        } else {
            SwapDirection::StableToAsset
        };
        (amount, direction, step)
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_swaps_never_decrease_k(
        (asset, stable) in reserves_strategy(),
        fee_bps in 1u16..1_000u16,
        swaps in prop::collection::vec(swap_strategy(), 1..20),
    ) {
        let mut market = MarketBuilder::new()
            .fee_bps(fee_bps)
            .reserves(asset, stable)
            .build();
        let mut now = 0;

        for (amount, direction, step) in swaps {
            now += step;
            let before = market.clone();
            match market.swap(amount, 0, direction, now) {
                Ok(out) => {
                    prop_assert!(out > 0);
                    prop_assert!(market.k() >= before.k());
                }
                Err(_) => prop_assert_eq!(&market, &before),
            }
        }
    }

    #[test]
    fn prop_add_then_remove_returns_deposit(
        (asset, stable) in reserves_strategy(),
        share_bps in 100u64..10_000u64,
    ) {
        let mut market = MarketBuilder::new().reserves(asset, stable).build();

        let asset_in = asset / 10_000 * share_bps;
        let stable_in = (asset_in as u128 * stable as u128 / asset as u128) as u64;
        prop_assume!(asset_in > 0 && stable_in > 0);

        let minted = match market.add_liquidity(asset_in, stable_in, 0, 1) {
            Ok(minted) => minted,
            Err(_) => return Ok(()),
        };
        let (asset_out, stable_out) = market.remove_liquidity(minted, 0, 0, 2).unwrap();

        prop_assert!(asset_out <= asset_in);
        prop_assert!(stable_out <= stable_in);
        prop_assert!(asset_in - asset_out <= asset_in / 1_000 + 2);
        prop_assert!(stable_in - stable_out <= stable_in / 1_000 + 2);
    }

    #[test]
    fn prop_advance_is_idempotent(
        prices in prop::collection::vec(1u128..1_000u128 * PRICE_SCALE, 1..30),
        steps in prop::collection::vec(0u64..DAY_MS, 1..30),
    ) {
        let mut oracle = RollingWindowOracle::new();
        oracle.initialize(0, PRICE_SCALE).unwrap();
        let mut now = 0;

        for (price, step) in prices.iter().zip(steps.iter()) {
            now += step;
            oracle.advance(now, *price).unwrap();
            let once = oracle.clone();
            oracle.advance(now, *price).unwrap();
            prop_assert_eq!(&oracle, &once);
        }
    }

    #[test]
    fn prop_constant_price_twap_is_exact(
        price in 1u128..1_000_000u128 * PRICE_SCALE,
        steps in prop::collection::vec(1u64..DAY_MS, 4..40),
    ) {
        let mut oracle = RollingWindowOracle::new();
        oracle.initialize(0, price).unwrap();
        let mut now = 0;
        for step in steps {
            now += step;
            oracle.advance(now, price).unwrap();
        }
        let now = now.max(THREE_DAYS_MS);

        prop_assert_eq!(oracle.get_twap(now).unwrap(), price);
    }

    #[test]
    fn prop_spot_market_twap_tracks_held_price(
        (asset, stable) in reserves_strategy(),
        hold_hours in 73u64..240u64,
    ) {
        let market = MarketBuilder::new().reserves(asset, stable).build();
        let spot = market.spot_price().unwrap();
        let now = hold_hours * HOUR_MS;

        prop_assert_eq!(market.get_twap(now).unwrap(), spot);
        prop_assert_eq!(market.get_twap_with_conditionals(now).unwrap(), spot);
    }
}

#[test]
fn test_failed_first_deposit_leaves_market_empty() {
    init_test_tracing();

    let mut market = SpotMarket::new(30).unwrap();
    assert!(market.add_liquidity(1, 1, 0, 0).is_err());
    assert_eq!(market.lp_supply(), 0);
    assert_eq!(market.reserves(), (0, 0));
    assert!(market.observations().is_empty());
}
