//! Minimum-dispersion allocation policy: allocates to minimize the
//! cross-account dispersion of a target risk metric after the trade settles.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::domain::allocation::feasibility;
use crate::domain::allocation::metrics;
use crate::domain::allocation::optimizer::{self, Bounds};
use crate::domain::allocation::rounding;
use crate::domain::allocation::types::{
    Account, AccountAllocation, Constraints, DispersionMetrics, Order, OrderSide, Security, TargetMetric, Warning, WarningKind,
};

use super::build_allocation;

fn pre_trade_value(target_metric: TargetMetric, account: &Account) -> f64 {
    match target_metric {
        TargetMetric::ActiveSpreadDuration => account.active_spread_duration,
        TargetMetric::Duration => account.portfolio_duration,
        TargetMetric::Oas => account.oas,
    }
}

fn pro_rata_by_nav(order_quantity: Decimal, accounts: &[Account]) -> Vec<f64> {
    let total_nav: Decimal = accounts.iter().map(|a| a.nav).sum();
    if total_nav <= Decimal::ZERO {
        let even = order_quantity.to_f64().unwrap_or(0.0) / accounts.len() as f64;
        return vec![even; accounts.len()];
    }
    accounts
        .iter()
        .map(|a| (order_quantity * a.nav / total_nav).to_f64().unwrap_or(0.0))
        .collect()
}

fn account_bound(account: &Account, side: OrderSide, price: Decimal, order_quantity: Decimal) -> Bounds {
    let own_bound = match side {
        OrderSide::Buy => {
            if price > Decimal::ZERO {
                account.available_cash / price
            } else {
                Decimal::ZERO
            }
        }
        OrderSide::Sell => account.current_position,
    };
    let upper = own_bound.min(order_quantity).max(Decimal::ZERO);
    Bounds { lower: 0.0, upper: upper.to_f64().unwrap_or(0.0) }
}

#[allow(clippy::too_many_arguments)]
pub fn allocate_min_dispersion(
    order: &Order,
    security: &Security,
    accounts: &[Account],
    target_metric: TargetMetric,
    tolerance: f64,
    max_iterations: usize,
    constraints: &Constraints,
    price: Decimal,
) -> (Vec<AccountAllocation>, Vec<Warning>, Option<DispersionMetrics>) {
    let initial = pro_rata_by_nav(order.quantity, accounts);
    let bounds: Vec<Bounds> = accounts.iter().map(|a| account_bound(a, order.side, price, order.quantity)).collect();
    let target_sum = order.quantity.to_f64().unwrap_or(0.0);

    let outcome = optimizer::minimize_dispersion(initial.clone(), bounds, target_sum, max_iterations, |x| {
        let values: Vec<f64> = accounts
            .iter()
            .zip(x)
            .map(|(account, &xi)| {
                let qty = Decimal::try_from(xi.max(0.0)).unwrap_or(Decimal::ZERO);
                metrics::post_trade_metric(target_metric, account, security, order.side, qty, price)
            })
            .collect();
        metrics::population_std_dev(&values)
    });

    let (solution, optimization_success, mut warnings) = if outcome.converged && outcome.final_objective.is_finite() {
        (outcome.solution, true, Vec::new())
    } else {
        let mut warnings = Vec::new();
        if !outcome.final_objective.is_finite() {
            warnings.push(Warning::new(
                WarningKind::Compliance,
                None,
                "optimizer objective was non-finite; falling back to pro-rata by NAV".to_string(),
            ));
        }
        (initial, false, warnings)
    };

    let lot = security.min_denomination;
    let raw: Vec<Decimal> = solution.iter().map(|&v| Decimal::try_from(v.max(0.0)).unwrap_or(Decimal::ZERO)).collect();

    let rounded = rounding::round_preserving_total(&raw, lot, order.quantity, |i, candidate| {
        let account = &accounts[i];
        feasibility::admits_additional_lot(order.side, price, account.available_cash, account.current_position, account.nav, constraints, candidate)
    });

    let mut final_qty = rounded;
    for (i, account) in accounts.iter().enumerate() {
        let qty = final_qty[i];
        if qty <= Decimal::ZERO {
            continue;
        }
        let violates = match order.side {
            OrderSide::Buy => qty * price > account.available_cash,
            OrderSide::Sell => qty > account.current_position,
        };
        if violates {
            final_qty[i] = Decimal::ZERO;
            warnings.push(Warning::new(
                WarningKind::Rounding,
                Some(account.account_id.clone()),
                format!("account {} allocation dropped after a rounding edge effect", account.account_id),
            ));
        }
    }

    let pre_trade_values: Vec<f64> = accounts.iter().map(|a| pre_trade_value(target_metric, a)).collect();
    let post_trade_values: Vec<f64> = accounts
        .iter()
        .zip(&final_qty)
        .filter(|(_, &qty)| qty > Decimal::ZERO)
        .map(|(account, &qty)| metrics::post_trade_metric(target_metric, account, security, order.side, qty, price))
        .collect();

    let dispersion = metrics::dispersion_metrics(&pre_trade_values, &post_trade_values, optimization_success, outcome.iterations, tolerance);

    let allocations: Vec<AccountAllocation> = accounts
        .iter()
        .zip(&final_qty)
        .map(|(account, &q)| build_allocation(account, security, order.side, price, q))
        .collect();

    (allocations, warnings, Some(dispersion))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn security() -> Security {
        Security {
            cusip: "912828XX".into(),
            price: dec!(0.985),
            duration: 5.0,
            spread_duration: 5.0,
            oas: 50.0,
            min_denomination: dec!(1000),
        }
    }

    fn account(id: &str, asd: f64) -> Account {
        Account {
            account_id: id.into(),
            account_name: format!("Account {id}"),
            nav: dec!(100_000_000),
            available_cash: dec!(50_000_000),
            current_position: Decimal::ZERO,
            active_spread_duration: asd,
            portfolio_duration: 6.0,
            spread_duration: 5.5,
            oas: 40.0,
            custom_metric: None,
        }
    }

    fn constraints() -> Constraints {
        Constraints {
            respect_cash: true,
            min_allocation: dec!(1000),
            round_to_denomination: true,
            compliance_check: false,
            max_concentration: None,
        }
    }

    #[test]
    fn test_s5_min_dispersion_reduces_standard_deviation() {
        let security = security();
        let accounts = vec![account("A", 5.2), account("B", 4.8), account("C", 5.5), account("D", 5.0)];
        let order = Order {
            security_id: security.cusip.clone(),
            side: OrderSide::Buy,
            quantity: dec!(8_000_000),
            settlement_date: None,
            price: None,
        };
        let constraints = constraints();
        let price = order.effective_price(&security);
        let (allocations, _, dispersion) =
            allocate_min_dispersion(&order, &security, &accounts, TargetMetric::ActiveSpreadDuration, 0.05, 1000, &constraints, price);
        let dispersion = dispersion.unwrap();
        assert!(dispersion.post_trade_std_dev <= dispersion.pre_trade_std_dev + 1e-9);
        let total: Decimal = allocations.iter().map(|a| a.allocated_quantity).sum();
        assert!(total <= order.quantity);
    }

    #[test]
    fn test_i8_identical_accounts_yield_equal_allocations() {
        let security = security();
        let accounts = vec![account("A", 5.0), account("B", 5.0), account("C", 5.0)];
        let order = Order {
            security_id: security.cusip.clone(),
            side: OrderSide::Buy,
            quantity: dec!(3_000_000),
            settlement_date: None,
            price: None,
        };
        let constraints = constraints();
        let price = order.effective_price(&security);
        let (allocations, _, _) =
            allocate_min_dispersion(&order, &security, &accounts, TargetMetric::ActiveSpreadDuration, 0.05, 1000, &constraints, price);
        let quantities: Vec<Decimal> = allocations.iter().map(|a| a.allocated_quantity).collect();
        let max = *quantities.iter().max().unwrap();
        let min = *quantities.iter().min().unwrap();
        assert!(max - min <= security.min_denomination);
    }
}
