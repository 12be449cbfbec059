//! Pro-rata allocation policy: weights accounts by a size metric and rounds
//! to the security's denomination while preserving the order total.

use rust_decimal::Decimal;

use crate::domain::allocation::feasibility::{self, ProjectionInput};
use crate::domain::allocation::types::{Account, BaseMetric, Constraints, Order, Security, Warning, WarningKind};

use super::build_allocation;
use crate::domain::allocation::types::AccountAllocation;

fn size_metric(account: &Account, base_metric: BaseMetric) -> Decimal {
    match base_metric {
        // MARKET_VALUE degrades to NAV: no separate market-value feed is modeled.
        BaseMetric::Nav | BaseMetric::MarketValue => account.nav,
        BaseMetric::Custom => account.custom_metric.unwrap_or(account.nav),
    }
}

pub fn allocate_pro_rata(
    order: &Order,
    security: &Security,
    accounts: &[Account],
    base_metric: BaseMetric,
    constraints: &Constraints,
    price: Decimal,
) -> (Vec<AccountAllocation>, Vec<Warning>) {
    let sizes: Vec<Decimal> = accounts.iter().map(|a| size_metric(a, base_metric)).collect();
    let total_size: Decimal = sizes.iter().copied().sum();

    let mut warnings = Vec::new();

    let targets: Vec<Decimal> = if total_size <= Decimal::ZERO {
        vec![Decimal::ZERO; accounts.len()]
    } else {
        sizes.iter().map(|&s| order.quantity * s / total_size).collect()
    };

    let mut allocated: Vec<Decimal> = Vec::with_capacity(accounts.len());
    for (account, &target) in accounts.iter().zip(&targets) {
        let input = ProjectionInput {
            account_id: &account.account_id,
            desired: target,
            side: order.side,
            price,
            cash: account.available_cash,
            position: account.current_position,
            nav: account.nav,
            security,
            constraints,
        };
        let (q, w) = feasibility::project_allocation(&input);
        allocated.push(q);
        warnings.extend(w);
    }

    let total_allocated: Decimal = allocated.iter().copied().sum();
    if total_allocated < order.quantity {
        let lot = security.min_denomination;
        let mut visitation: Vec<usize> = (0..accounts.len()).collect();
        visitation.sort_by(|&a, &b| {
            accounts[b]
                .nav
                .cmp(&accounts[a].nav)
                .then_with(|| accounts[a].account_id.cmp(&accounts[b].account_id))
        });

        let mut remainder = order.quantity - total_allocated;
        loop {
            if remainder < lot {
                break;
            }
            let mut progressed = false;
            for &i in &visitation {
                if remainder < lot {
                    break;
                }
                let candidate = allocated[i] + lot;
                let account = &accounts[i];
                if feasibility::admits_additional_lot(
                    order.side,
                    price,
                    account.available_cash,
                    account.current_position,
                    account.nav,
                    constraints,
                    candidate,
                ) {
                    allocated[i] = candidate;
                    remainder -= lot;
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }
    }

    if order.side == crate::domain::allocation::types::OrderSide::Buy {
        for (i, account) in accounts.iter().enumerate() {
            let already_warned = warnings
                .iter()
                .any(|w| w.kind == WarningKind::InsufficientCash && w.account_id.as_deref() == Some(account.account_id.as_str()));
            if allocated[i] == Decimal::ZERO && !already_warned && account.available_cash < constraints.min_allocation * price {
                warnings.push(Warning::new(
                    WarningKind::InsufficientCash,
                    Some(account.account_id.clone()),
                    format!("account {} cash is below the cost of one minimum allocation", account.account_id),
                ));
            }
        }
    }

    let allocations: Vec<AccountAllocation> = accounts
        .iter()
        .zip(&allocated)
        .map(|(account, &q)| build_allocation(account, security, order.side, price, q))
        .collect();

    (allocations, warnings)
}
