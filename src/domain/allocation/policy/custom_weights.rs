//! Custom-weights allocation policy: allocates by caller-supplied per-account
//! weights instead of a size metric, with strict weight validation up front.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;

use crate::domain::allocation::feasibility::{self, ProjectionInput};
use crate::domain::allocation::rounding;
use crate::domain::allocation::types::{
    Account, AccountAllocation, AllocationError, Constraints, ErrorCode, Order, Security, Warning, WarningKind,
};

use super::build_allocation;

fn validate_weights(weights: &HashMap<String, f64>) -> Result<(), AllocationError> {
    if weights.is_empty() {
        return Err(AllocationError::new(ErrorCode::NoWeights, "no weights supplied"));
    }
    let sum: f64 = weights.values().sum();
    if (sum - 1.0).abs() > 1e-3 {
        return Err(AllocationError::new(
            ErrorCode::InvalidWeightSum,
            format!("weights must sum to 1.0 within 1e-3, got {sum}"),
        ));
    }
    for &w in weights.values() {
        if w < 0.0 {
            return Err(AllocationError::new(ErrorCode::NegativeWeight, format!("weight {w} is negative")));
        }
        if w > 1.0 {
            return Err(AllocationError::new(ErrorCode::WeightExceedsOne, format!("weight {w} exceeds 1.0")));
        }
    }
    Ok(())
}

pub fn allocate_custom_weights(
    order: &Order,
    security: &Security,
    accounts: &[Account],
    weights: &HashMap<String, f64>,
    constraints: &Constraints,
    price: Decimal,
) -> Result<(Vec<AccountAllocation>, Vec<Warning>), AllocationError> {
    validate_weights(weights)?;

    let mut warnings = Vec::new();
    let known_ids: HashSet<&str> = accounts.iter().map(|a| a.account_id.as_str()).collect();
    let mut known_weights: HashMap<&str, f64> = HashMap::new();
    for (id, &w) in weights {
        if known_ids.contains(id.as_str()) {
            known_weights.insert(id.as_str(), w);
        } else {
            warnings.push(Warning::new(
                WarningKind::Compliance,
                Some(id.clone()),
                format!("weight references unknown account {id}"),
            ));
        }
    }

    let mut allocated: Vec<Decimal> = vec![Decimal::ZERO; accounts.len()];
    for (i, account) in accounts.iter().enumerate() {
        let Some(&w) = known_weights.get(account.account_id.as_str()) else {
            continue;
        };
        if w <= 0.0 {
            continue;
        }
        let w_dec = Decimal::try_from(w).unwrap_or(Decimal::ZERO);
        let target = order.quantity * w_dec;
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
        allocated[i] = q;
        warnings.extend(w);
    }

    let total_allocated: Decimal = allocated.iter().copied().sum();
    if total_allocated < order.quantity {
        let lot = security.min_denomination;
        let mut candidates: Vec<usize> = (0..accounts.len()).filter(|&i| allocated[i] > Decimal::ZERO).collect();
        candidates.sort_by(|&a, &b| {
            allocated[b]
                .cmp(&allocated[a])
                .then_with(|| accounts[a].account_id.cmp(&accounts[b].account_id))
        });

        if !candidates.is_empty() {
            let total_current: Decimal = candidates.iter().map(|&i| allocated[i]).sum();
            let shortfall_total = order.quantity - total_allocated;
            let mut shortfall = shortfall_total;

            for &i in &candidates {
                if shortfall < lot {
                    break;
                }
                let account = &accounts[i];
                let proportional_share = shortfall_total * allocated[i] / total_current;
                let target_add = rounding::floor_to_lot(proportional_share, lot);

                let mut added = Decimal::ZERO;
                while added < target_add && shortfall >= lot {
                    let candidate = allocated[i] + added + lot;
                    if feasibility::admits_additional_lot(
                        order.side,
                        price,
                        account.available_cash,
                        account.current_position,
                        account.nav,
                        constraints,
                        candidate,
                    ) {
                        added += lot;
                        shortfall -= lot;
                    } else {
                        break;
                    }
                }
                allocated[i] += added;
            }
        }
    }

    let allocations: Vec<AccountAllocation> = accounts
        .iter()
        .zip(&allocated)
        .map(|(account, &q)| build_allocation(account, security, order.side, price, q))
        .collect();

    Ok((allocations, warnings))
}
