//! Pre/post-trade risk metric calculators and cross-account dispersion summary.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::types::{Account, DispersionMetrics, OrderSide, Security, TargetMetric, TradeMetrics};

/// Weighted average of an account's existing value and the security's value,
/// weighted by post-trade / pre-trade market-value share of NAV. Used for the
/// DURATION target and, by analogy, for the spread-duration snapshot field.
fn weighted_average_post(nav: f64, mv: f64, mv_prime: f64, old_value: f64, security_value: f64) -> f64 {
    if nav == 0.0 {
        return old_value;
    }
    let old_weight = (nav - mv) / nav;
    let new_weight = mv_prime / nav;
    old_weight * old_value + new_weight * security_value
}

/// Active spread duration's additive post-trade formula: subtract the
/// pre-trade spread-duration contribution, add back the post-trade one.
fn active_spread_duration_post(nav: f64, mv: f64, mv_prime: f64, asd: f64, security_spread_duration: f64) -> f64 {
    if nav == 0.0 {
        return asd;
    }
    asd - (mv / nav) * security_spread_duration + (mv_prime / nav) * security_spread_duration
}

fn market_values(account: &Account, security: &Security, side: OrderSide, allocated_qty: f64, price: f64) -> (f64, f64, f64) {
    let position = account.current_position.to_f64().unwrap_or(0.0);
    let delta = match side {
        OrderSide::Buy => allocated_qty,
        OrderSide::Sell => -allocated_qty,
    };
    let mv = position * price;
    let mv_prime = (position + delta) * price;
    (account.nav.to_f64().unwrap_or(0.0), mv, mv_prime)
}

/// Computes the post-trade value of exactly the metric named by `target`.
/// This is the objective function the minimum-dispersion optimizer minimizes
/// the population standard deviation of.
pub fn post_trade_metric(
    target: TargetMetric,
    account: &Account,
    security: &Security,
    side: OrderSide,
    allocated_qty: Decimal,
    price: Decimal,
) -> f64 {
    let allocated_qty = allocated_qty.to_f64().unwrap_or(0.0);
    let price = price.to_f64().unwrap_or(0.0);
    let (nav, mv, mv_prime) = market_values(account, security, side, allocated_qty, price);

    match target {
        TargetMetric::ActiveSpreadDuration => {
            active_spread_duration_post(nav, mv, mv_prime, account.active_spread_duration, security.spread_duration)
        }
        TargetMetric::Duration => {
            if nav == 0.0 {
                account.portfolio_duration
            } else {
                weighted_average_post(nav, mv, mv_prime, account.portfolio_duration, security.duration)
            }
        }
        TargetMetric::Oas => {
            if nav == 0.0 {
                account.oas
            } else {
                security.oas
            }
        }
    }
}

/// The account's current (pre-trade) metric snapshot.
pub fn pre_trade_snapshot(account: &Account) -> TradeMetrics {
    TradeMetrics {
        active_spread_duration: account.active_spread_duration,
        portfolio_duration: account.portfolio_duration,
        spread_duration: account.spread_duration,
        oas: account.oas,
    }
}

/// The account's full post-trade metric snapshot after receiving `allocated_qty`
/// at `price`, applying the per-target-metric post-trade model to all four
/// fields uniformly, so every `AccountAllocation` carries a complete snapshot
/// regardless of the policy used.
pub fn post_trade_snapshot(
    account: &Account,
    security: &Security,
    side: OrderSide,
    allocated_qty: Decimal,
    price: Decimal,
) -> TradeMetrics {
    let allocated_qty_f = allocated_qty.to_f64().unwrap_or(0.0);
    let price_f = price.to_f64().unwrap_or(0.0);
    let (nav, mv, mv_prime) = market_values(account, security, side, allocated_qty_f, price_f);

    let spread_duration = if nav == 0.0 {
        account.spread_duration
    } else {
        weighted_average_post(nav, mv, mv_prime, account.spread_duration, security.spread_duration)
    };

    TradeMetrics {
        active_spread_duration: post_trade_metric(TargetMetric::ActiveSpreadDuration, account, security, side, allocated_qty, price),
        portfolio_duration: post_trade_metric(TargetMetric::Duration, account, security, side, allocated_qty, price),
        spread_duration,
        oas: post_trade_metric(TargetMetric::Oas, account, security, side, allocated_qty, price),
    }
}

/// Population standard deviation (divides by n, not n-1).
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Builds the `DispersionMetrics` record from pre-trade values over all
/// accounts and post-trade values over allocated accounts.
pub fn dispersion_metrics(
    pre_trade_values_all: &[f64],
    post_trade_values_allocated: &[f64],
    optimization_success: bool,
    iterations: usize,
    tolerance: f64,
) -> DispersionMetrics {
    let pre_trade_std_dev = population_std_dev(pre_trade_values_all);
    let post_trade_std_dev = population_std_dev(post_trade_values_allocated);
    let improvement = if pre_trade_std_dev > 0.0 {
        (pre_trade_std_dev - post_trade_std_dev) / pre_trade_std_dev
    } else {
        0.0
    };

    if post_trade_values_allocated.is_empty() {
        return DispersionMetrics {
            pre_trade_std_dev,
            post_trade_std_dev,
            improvement,
            max_deviation: 0.0,
            min_deviation: 0.0,
            target_value: 0.0,
            within_tolerance: false,
            optimization_success,
            iterations,
        };
    }

    let target_value = post_trade_values_allocated.iter().sum::<f64>() / post_trade_values_allocated.len() as f64;
    let deviations: Vec<f64> = post_trade_values_allocated.iter().map(|v| (v - target_value).abs()).collect();
    let max_deviation = deviations.iter().cloned().fold(f64::MIN, f64::max);
    let min_deviation = deviations.iter().cloned().fold(f64::MAX, f64::min);
    let within_tolerance = if target_value > 0.0 {
        post_trade_values_allocated.iter().all(|v| ((v - target_value).abs() / target_value) <= tolerance)
    } else {
        false
    };

    DispersionMetrics {
        pre_trade_std_dev,
        post_trade_std_dev,
        improvement,
        max_deviation,
        min_deviation,
        target_value,
        within_tolerance,
        optimization_success,
        iterations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn account() -> Account {
        Account {
            account_id: "A1".into(),
            account_name: "Account One".into(),
            nav: dec!(1_000_000),
            available_cash: dec!(100_000),
            current_position: dec!(10_000),
            active_spread_duration: 5.0,
            portfolio_duration: 6.0,
            spread_duration: 5.5,
            oas: 40.0,
            custom_metric: None,
        }
    }

    fn security() -> Security {
        Security {
            cusip: "912828XX".into(),
            price: dec!(100.0),
            duration: 7.0,
            spread_duration: 6.0,
            oas: 55.0,
            min_denomination: dec!(1000),
        }
    }

    #[test]
    fn test_population_std_dev_of_identical_values_is_zero() {
        assert_eq!(population_std_dev(&[5.0, 5.0, 5.0]), 0.0);
    }

    #[test]
    fn test_population_std_dev_matches_known_value() {
        // population std dev of {2, 4, 4, 4, 5, 5, 7, 9} is 2.0
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((population_std_dev(&values) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_oas_target_collapses_to_security_oas() {
        let account = account();
        let security = security();
        let metric = post_trade_metric(TargetMetric::Oas, &account, &security, OrderSide::Buy, dec!(1000), dec!(100.0));
        assert_eq!(metric, security.oas);
    }

    #[test]
    fn test_post_trade_metric_zero_nav_is_unchanged() {
        let mut account = account();
        account.nav = Decimal::ZERO;
        let security = security();
        let metric = post_trade_metric(
            TargetMetric::ActiveSpreadDuration,
            &account,
            &security,
            OrderSide::Buy,
            dec!(1000),
            dec!(100.0),
        );
        assert_eq!(metric, account.active_spread_duration);
    }

    #[test]
    fn test_dispersion_metrics_within_tolerance_for_identical_values() {
        let metrics = dispersion_metrics(&[5.0, 5.0, 5.0], &[5.0, 5.0, 5.0], true, 1, 0.05);
        assert!(metrics.within_tolerance);
        assert_eq!(metrics.max_deviation, 0.0);
        assert_eq!(metrics.post_trade_std_dev, 0.0);
    }

    #[test]
    fn test_dispersion_metrics_empty_allocated_set() {
        let metrics = dispersion_metrics(&[5.0, 4.0], &[], false, 0, 0.05);
        assert!(!metrics.within_tolerance);
        assert_eq!(metrics.target_value, 0.0);
    }
}
