//! Policy dispatch: the single public entry point `allocate()`.

mod custom_weights;
mod min_dispersion;
mod pro_rata;

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use super::types::{Account, AccountAllocation, AllocationResult, Constraints, DispersionMetrics, Order, OrderSide, Policy, Security, Summary};
use super::{metrics, validation};

fn build_allocation(account: &Account, security: &Security, side: OrderSide, price: Decimal, allocated_qty: Decimal) -> AccountAllocation {
    let notional = allocated_qty * price;
    let post_trade_cash = match side {
        OrderSide::Buy => account.available_cash - notional,
        OrderSide::Sell => account.available_cash + notional,
    };
    AccountAllocation {
        account_id: account.account_id.clone(),
        account_name: account.account_name.clone(),
        allocated_quantity: allocated_qty,
        allocated_notional: notional,
        pre_trade_cash: account.available_cash,
        post_trade_cash,
        pre_trade_metrics: metrics::pre_trade_snapshot(account),
        post_trade_metrics: metrics::post_trade_snapshot(account, security, side, allocated_qty, price),
        cash_used: account.available_cash - post_trade_cash,
    }
}

fn build_summary(order_quantity: Decimal, allocations: &[AccountAllocation], dispersion: Option<DispersionMetrics>) -> Summary {
    let total_allocated: Decimal = allocations.iter().map(|a| a.allocated_quantity).sum();
    let unallocated = order_quantity - total_allocated;
    let allocation_rate = if order_quantity > Decimal::ZERO {
        (total_allocated / order_quantity).to_f64().unwrap_or(0.0)
    } else {
        0.0
    };
    let accounts_allocated = allocations.iter().filter(|a| a.allocated_quantity > Decimal::ZERO).count();
    let accounts_skipped = allocations.len() - accounts_allocated;
    Summary {
        total_allocated,
        unallocated,
        allocation_rate,
        accounts_allocated,
        accounts_skipped,
        dispersion,
    }
}

/// Allocates `order` across `accounts` under `policy`, subject to `constraints`.
/// Pure function: no I/O, no shared state, safe to call concurrently on
/// disjoint inputs.
pub fn allocate(order: &Order, security: &Security, accounts: &[Account], policy: &Policy, constraints: &Constraints) -> AllocationResult {
    info!(
        side = %order.side,
        quantity = %order.quantity,
        account_count = accounts.len(),
        "dispatching allocation"
    );

    if let Some(error) = validation::validate_inputs(order, security, accounts, constraints) {
        warn!(code = ?error.code, message = %error.message, "allocation rejected at entry validation");
        return AllocationResult::from_errors(order.clone(), vec![error]);
    }

    let price = order.effective_price(security);

    let (allocations, warnings, dispersion) = match policy {
        Policy::ProRata { base_metric } => {
            let (allocations, warnings) = pro_rata::allocate_pro_rata(order, security, accounts, *base_metric, constraints, price);
            (allocations, warnings, None)
        }
        Policy::CustomWeights { weights } => {
            match custom_weights::allocate_custom_weights(order, security, accounts, weights, constraints, price) {
                Ok((allocations, warnings)) => (allocations, warnings, None),
                Err(error) => {
                    warn!(code = ?error.code, message = %error.message, "custom-weights validation failed");
                    return AllocationResult::from_errors(order.clone(), vec![error]);
                }
            }
        }
        Policy::MinDispersion { target_metric, tolerance, max_iterations } => {
            min_dispersion::allocate_min_dispersion(order, security, accounts, *target_metric, *tolerance, *max_iterations, constraints, price)
        }
    };

    for w in &warnings {
        warn!(kind = ?w.kind, account_id = ?w.account_id, message = %w.message, "allocation warning");
    }

    let summary = build_summary(order.quantity, &allocations, dispersion);

    info!(
        total_allocated = %summary.total_allocated,
        allocation_rate = summary.allocation_rate,
        accounts_allocated = summary.accounts_allocated,
        "allocation complete"
    );

    AllocationResult {
        id: Uuid::new_v4(),
        timestamp: Utc::now(),
        order: order.clone(),
        allocations,
        summary,
        warnings,
        errors: Vec::new(),
    }
}
