//! Lifecycle tests: trading, locking for a proposal, filling the gap and
//! trading again

mod common;

use common::*;
use futarchy_spot_core::{
    MarketConfig, RegimeState, SpotError, SpotMarket, SwapDirection, PRICE_SCALE, THREE_DAYS_MS,
};

#[test]
fn test_gap_continuity_short_lock() {
    init_test_tracing();

    let pre_lock = PRICE_SCALE;
    let winning = 2 * PRICE_SCALE;
    let mut market = MarketBuilder::new().build();

    market.mark_liquidity_to_proposal(DAY_MS).unwrap();
    market
        .fill_twap_gap_from_proposal(winning, winning, 2 * DAY_MS)
        .unwrap();

    // [0, 1d] at the spot price, [1d, 2d] at the winning TWAP
    assert_eq!(
        market.get_twap_with_conditionals(2 * DAY_MS).unwrap(),
        (pre_lock + winning) / 2
    );
}

#[test]
fn test_gap_continuity_across_slide() {
    init_test_tracing();

    let pre_lock = PRICE_SCALE;
    let winning = 4 * PRICE_SCALE;
    let mut market = MarketBuilder::new().build();

    let (asset, stable) = market.withdraw_all_for_proposal(2 * DAY_MS).unwrap();
    assert_eq!((asset, stable), (1_000_000, 1_000_000));
    market
        .return_liquidity_from_proposal(1_000_000, 4_000_000, winning, winning, 4 * DAY_MS)
        .unwrap();

    // Window is [1d, 4d]: one day of spot history, two of conditional
    let breakdown = market.twap_breakdown(4 * DAY_MS).unwrap();
    assert_eq!(breakdown.window_start, DAY_MS);
    assert_eq!(breakdown.conditional_duration, 2 * DAY_MS);
    assert_eq!(breakdown.spot_duration, DAY_MS);
    assert_eq!(breakdown.twap, (pre_lock + 2 * winning) / 3);
    assert_eq!(market.get_twap(4 * DAY_MS).unwrap(), breakdown.twap);
}

#[test]
fn test_bridged_segment_survives_accumulator_reset() {
    init_test_tracing();

    let price = PRICE_SCALE;
    let winning = 1_000 * PRICE_SCALE;
    let mut market = MarketBuilder::new().build();

    market.withdraw_all_for_proposal(THREE_DAYS_MS).unwrap();
    market
        .return_liquidity_from_proposal(1_000_000, 1_000_000, winning, price, THREE_DAYS_MS + HOUR_MS)
        .unwrap();

    // Sliding two days at the winning TWAP removes more than the window holds
    let now = 5 * DAY_MS + HOUR_MS;
    market
        .swap(10_000, 0, SwapDirection::AssetToStable, now)
        .unwrap();
    assert_eq!(market.oracle().last_reset_timestamp, Some(now));

    // Window [2d+1h, 5d+1h]: one bridged hour at 1000.0, 71 hours at 1.0
    let breakdown = market.twap_breakdown(now).unwrap();
    assert_eq!(breakdown.window_start, 2 * DAY_MS + HOUR_MS);
    assert_eq!(breakdown.conditional_duration, HOUR_MS);
    assert_eq!(breakdown.spot_duration, 71 * HOUR_MS);
    assert!(breakdown.accumulator_consistent);
    assert_eq!(breakdown.twap, 14_875_000_000_000);
    assert_eq!(market.get_twap_with_conditionals(now).unwrap(), 14_875_000_000_000);
}

#[test]
fn test_long_lock_replaces_window() {
    init_test_tracing();

    let winning = 9 * PRICE_SCALE;
    let mut market = MarketBuilder::new().build();
    market.withdraw_all_for_proposal(DAY_MS).unwrap();
    market
        .return_liquidity_from_proposal(1_000_000, 9_000_000, winning, winning, 6 * DAY_MS)
        .unwrap();

    let breakdown = market.twap_breakdown(6 * DAY_MS).unwrap();
    assert_eq!(breakdown.window_start, 6 * DAY_MS - THREE_DAYS_MS);
    assert_eq!(breakdown.conditional_duration, THREE_DAYS_MS);
    assert_eq!(breakdown.spot_duration, 0);
    assert_eq!(breakdown.twap, winning);
    assert_eq!(market.get_twap(6 * DAY_MS).unwrap(), winning);
}

#[test]
fn test_trading_resumes_after_unlock() {
    init_test_tracing();

    let mut market = MarketBuilder::new().build();
    market.withdraw_all_for_proposal(DAY_MS).unwrap();
    assert!(matches!(market.regime().state(), RegimeState::Locked { since } if since == DAY_MS));

    market
        .return_liquidity_from_proposal(1_000_000, 1_000_000, PRICE_SCALE, PRICE_SCALE, 2 * DAY_MS)
        .unwrap();
    assert_eq!(market.regime().state(), RegimeState::Active);

    let out = market
        .swap(10_000, 1, SwapDirection::AssetToStable, 2 * DAY_MS + HOUR_MS)
        .unwrap();
    assert!(out > 0);
    assert_eq!(market.oracle().last_timestamp, 2 * DAY_MS + HOUR_MS);

    // Price held at 1.0 throughout, so the window average is still 1.0
    assert_eq!(
        market.get_twap_with_conditionals(2 * DAY_MS + HOUR_MS).unwrap(),
        PRICE_SCALE
    );
}

#[test]
fn test_repeated_proposals_keep_segments_ordered_and_pruned() {
    init_test_tracing();

    let mut market = MarketBuilder::new().build();
    let mut now = 0;
    for round in 1..=4u64 {
        now += DAY_MS;
        market.withdraw_all_for_proposal(now).unwrap();
        now += DAY_MS;
        let price = round as u128 * PRICE_SCALE;
        market
            .return_liquidity_from_proposal(1_000_000, round * 1_000_000, price, price, now)
            .unwrap();
    }

    let segments: Vec<_> = market.regime().segments().cloned().collect();
    assert!(segments
        .windows(2)
        .all(|pair| pair[0].end_timestamp <= pair[1].start_timestamp));
    assert!(segments
        .iter()
        .all(|s| s.end_timestamp >= now - THREE_DAYS_MS));
    // Only the segments ending at 6d and 8d reach into the window [5d, 8d]
    assert_eq!(segments.len(), 2);
    assert_eq!(segments.last().unwrap().avg_price, 4 * PRICE_SCALE);
}

#[test]
fn test_conditional_amm_seed_price() {
    init_test_tracing();

    let mut market = MarketBuilder::new().reserves(1_000_000, 2_000_000).build();
    assert_eq!(
        market.get_twap_for_conditional_amm(DAY_MS).unwrap(),
        2 * PRICE_SCALE
    );
    assert!(!market.is_twap_ready(DAY_MS));

    market
        .swap(100_000, 0, SwapDirection::AssetToStable, 2 * DAY_MS)
        .unwrap();
    let seed = market.get_twap_for_conditional_amm(4 * DAY_MS).unwrap();
    assert!(market.is_twap_ready(4 * DAY_MS));
    assert!(seed < 2 * PRICE_SCALE);
    assert!(seed > market.spot_price().unwrap());
}

#[test]
fn test_oracle_unavailable_before_first_deposit() {
    init_test_tracing();

    let market = SpotMarket::new(30).unwrap();
    assert_eq!(market.get_twap(DAY_MS), Err(SpotError::OracleNotInitialized));
    assert_eq!(
        market.get_twap_for_conditional_amm(DAY_MS),
        Err(SpotError::OracleNotInitialized)
    );
    assert_eq!(
        market.get_twap_with_conditionals(DAY_MS),
        Err(SpotError::OracleNotInitialized)
    );
}

#[test]
fn test_market_from_config() {
    init_test_tracing();

    let config = MarketConfig::from_toml_str("fee_bps = 0\nobservation_capacity = 2\n").unwrap();
    let mut market = SpotMarket::from_config(&config).unwrap();
    market.add_liquidity(10_000, 10_000, 0, 0).unwrap();
    for i in 1..=3u64 {
        market
            .swap(100, 0, SwapDirection::StableToAsset, i * HOUR_MS)
            .unwrap();
    }

    assert_eq!(market.fee_bps(), 0);
    assert_eq!(market.observations().capacity(), 2);
    assert_eq!(market.observations().len(), 2);
    let oldest = market.observations().observations().next().unwrap();
    assert_eq!(oldest.timestamp, 2 * HOUR_MS);

    let short_twap = market
        .observations()
        .get_twap(HOUR_MS, 3 * HOUR_MS + HOUR_MS / 2)
        .unwrap();
    assert!(short_twap > PRICE_SCALE);
}

#[test]
fn test_locked_market_survives_persistence() {
    init_test_tracing();

    let mut market = MarketBuilder::new().build();
    market
        .swap(25_000, 0, SwapDirection::StableToAsset, HOUR_MS)
        .unwrap();
    market.withdraw_all_for_proposal(DAY_MS).unwrap();

    let encoded = serde_json::to_string(&market).unwrap();
    let mut restored: SpotMarket = serde_json::from_str(&encoded).unwrap();
    assert_eq!(restored, market);

    restored
        .fill_twap_gap_from_proposal(PRICE_SCALE, PRICE_SCALE, 2 * DAY_MS)
        .unwrap();
    market
        .fill_twap_gap_from_proposal(PRICE_SCALE, PRICE_SCALE, 2 * DAY_MS)
        .unwrap();
    assert_eq!(restored, market);
}
