mod support;

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context as _, Result};

use ln_swap_liquidity::lightning::ShortChannelId;
use ln_swap_liquidity::liquidity::{
    FeeLimit, FeePortion, Parameters, SwapRule, ThresholdRule,
};
use ln_swap_liquidity::swap::SwapType;

use support::{node_id, test_time};

fn valid_rule() -> SwapRule {
    SwapRule::new(ThresholdRule::new(50, 0), SwapType::Out)
}

#[test]
fn default_parameters_validate() {
    let params = Parameters::default();
    assert!(params.validate(test_time()).is_ok());
}

#[test]
fn in_flight_cap_required_when_enabled() {
    let mut params = Parameters::default();
    params.max_auto_in_flight = 0;
    // Harmless while autoloop is off.
    assert!(params.validate(test_time()).is_ok());

    params.autoloop = true;
    let err = params.validate(test_time()).unwrap_err();
    assert_eq!(err.field, "max_auto_in_flight");
}

#[test]
fn budget_window_may_not_start_in_the_future() {
    let mut params = Parameters::default();
    params.auto_fee_start_date = test_time() + Duration::from_secs(1);
    let err = params.validate(test_time()).unwrap_err();
    assert_eq!(err.field, "auto_fee_start_date");

    params.auto_fee_start_date = test_time();
    assert!(params.validate(test_time()).is_ok());
}

#[test]
fn channel_rules_are_validated() {
    let mut params = Parameters::default();
    params.channel_rules = BTreeMap::from([(ShortChannelId(0), valid_rule())]);
    let err = params.validate(test_time()).unwrap_err();
    assert_eq!(err.field, "channel_rules");

    params.channel_rules = BTreeMap::from([(
        ShortChannelId(1),
        SwapRule::new(ThresholdRule::new(0, 0), SwapType::Out),
    )]);
    let err = params.validate(test_time()).unwrap_err();
    assert_eq!(err.field, "channel_rules");

    params.channel_rules = BTreeMap::from([(ShortChannelId(1), valid_rule())]);
    assert!(params.validate(test_time()).is_ok());
}

#[test]
fn peer_rules_are_validated() {
    let mut params = Parameters::default();
    params.peer_rules = BTreeMap::from([(
        node_id(1),
        SwapRule::new(ThresholdRule::new(60, 60), SwapType::In),
    )]);
    let err = params.validate(test_time()).unwrap_err();
    assert_eq!(err.field, "peer_rules");
}

#[test]
fn fee_limit_and_timeouts_are_validated() {
    let mut params = Parameters::default();
    params.fee_limit = FeeLimit::Portion(FeePortion::new(0));
    assert_eq!(params.validate(test_time()).unwrap_err().field, "fee_limit");

    let mut params = Parameters::default();
    params.sweep_conf_target = 0;
    assert_eq!(
        params.validate(test_time()).unwrap_err().field,
        "sweep_conf_target"
    );

    let mut params = Parameters::default();
    params.htlc_conf_target = 0;
    assert_eq!(
        params.validate(test_time()).unwrap_err().field,
        "htlc_conf_target"
    );

    let mut params = Parameters::default();
    params.client_timeout = Duration::ZERO;
    assert_eq!(
        params.validate(test_time()).unwrap_err().field,
        "client_timeout"
    );
}

#[test]
fn parameters_round_trip_through_serde() -> Result<()> {
    let mut params = Parameters::default();
    params.autoloop = true;
    params.auto_fee_budget = 40_066;
    params.auto_fee_start_date = test_time();
    params.channel_rules = BTreeMap::from([(ShortChannelId(1), valid_rule())]);
    params.peer_rules = BTreeMap::from([(
        node_id(2),
        SwapRule::new(ThresholdRule::new(0, 60), SwapType::In),
    )]);

    let encoded = serde_json::to_string(&params).context("encode parameters")?;
    let decoded: Parameters = serde_json::from_str(&encoded).context("decode parameters")?;
    assert_eq!(decoded, params);

    Ok(())
}
