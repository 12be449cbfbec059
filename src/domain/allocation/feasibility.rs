//! Per-account feasibility projection: clips a desired quantity by
//! denomination, minimum lot, cash, position, and concentration, in that order.

use rust_decimal::Decimal;

use super::types::{Constraints, OrderSide, Security, Warning, WarningKind};

/// One account's state relevant to feasibility projection.
pub struct ProjectionInput<'a> {
    pub account_id: &'a str,
    pub desired: Decimal,
    pub side: OrderSide,
    pub price: Decimal,
    pub cash: Decimal,
    pub position: Decimal,
    pub nav: Decimal,
    pub security: &'a Security,
    pub constraints: &'a Constraints,
}

/// Projects a single account's desired quantity to the largest quantity that
/// respects denomination, minimum lot, cash/position, and concentration
/// limits, returning any warnings raised along the way.
pub fn project_allocation(input: &ProjectionInput) -> (Decimal, Vec<Warning>) {
    let mut warnings = Vec::new();
    let lot = input.security.min_denomination;
    let mut q = input.desired;

    // Step 1: round to denomination.
    if input.constraints.round_to_denomination {
        q = super::rounding::floor_to_lot(q, lot);
    }

    // Step 2: minimum-lot floor.
    if q < input.constraints.min_allocation {
        let target_was_nonzero = input.desired > Decimal::ZERO;
        q = Decimal::ZERO;
        if target_was_nonzero {
            warnings.push(Warning::new(
                WarningKind::MinLotSize,
                Some(input.account_id.to_string()),
                format!(
                    "desired allocation below minimum lot of {} for account {}",
                    input.constraints.min_allocation, input.account_id
                ),
            ));
        }
    }

    // Step 3: BUY cash clip.
    if input.side == OrderSide::Buy && input.constraints.respect_cash && q > Decimal::ZERO {
        let needed = q * input.price;
        if needed > input.cash {
            let affordable = if input.price > Decimal::ZERO {
                super::rounding::floor_to_lot(input.cash / input.price, lot)
            } else {
                Decimal::ZERO
            };
            if affordable < input.constraints.min_allocation {
                q = Decimal::ZERO;
                warnings.push(Warning::new(
                    WarningKind::InsufficientCash,
                    Some(input.account_id.to_string()),
                    format!("account {} has insufficient cash for the desired allocation", input.account_id),
                ));
            } else {
                q = affordable;
            }
        }
    }

    // Step 4: SELL position clip.
    if input.side == OrderSide::Sell && q > Decimal::ZERO {
        let original = q;
        if q > input.position {
            q = super::rounding::floor_to_lot(input.position, lot);
            if q < original {
                warnings.push(Warning::new(
                    WarningKind::Compliance,
                    Some(input.account_id.to_string()),
                    format!("account {} position is insufficient to cover the desired sale", input.account_id),
                ));
            }
        }
    }

    // Step 5: concentration cap.
    if let Some(max_concentration) = input.constraints.max_concentration {
        if q > Decimal::ZERO && input.price > Decimal::ZERO {
            let cap_notional = Decimal::try_from(max_concentration).unwrap_or(Decimal::ZERO) * input.nav;
            let cap = super::rounding::floor_to_lot(cap_notional / input.price, lot);
            if q > cap {
                q = cap;
            }
        }
    }

    (q, warnings)
}

/// Whether bumping an account's allocation to exactly `candidate` still
/// respects cash/position/concentration, used by the remainder-distribution
/// scans in the pro-rata, custom-weights, and minimum-dispersion policies.
/// Denomination and min-lot are enforced by the caller, who only ever
/// proposes multiples of the lot size already above the floor.
pub fn admits_additional_lot(
    side: OrderSide,
    price: Decimal,
    cash: Decimal,
    position: Decimal,
    nav: Decimal,
    constraints: &Constraints,
    candidate: Decimal,
) -> bool {
    match side {
        OrderSide::Buy => {
            if constraints.respect_cash && candidate * price > cash {
                return false;
            }
        }
        OrderSide::Sell => {
            if candidate > position {
                return false;
            }
        }
    }
    if let Some(max_concentration) = constraints.max_concentration {
        let cap = Decimal::try_from(max_concentration).unwrap_or(Decimal::ZERO) * nav;
        if candidate * price > cap {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::allocation::types::Security;
    use rust_decimal_macros::dec;

    fn security() -> Security {
        Security {
            cusip: "912828XX".into(),
            price: dec!(100.0),
            duration: 5.0,
            spread_duration: 5.0,
            oas: 50.0,
            min_denomination: dec!(1000),
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
    fn test_buy_clips_to_affordable_cash() {
        let security = security();
        let constraints = constraints();
        let input = ProjectionInput {
            account_id: "A1",
            desired: dec!(5000),
            side: OrderSide::Buy,
            price: security.price,
            cash: dec!(250_000),
            position: Decimal::ZERO,
            nav: dec!(1_000_000),
            security: &security,
            constraints: &constraints,
        };
        let (q, warnings) = project_allocation(&input);
        assert_eq!(q, dec!(2000));
        assert!(warnings.iter().any(|w| w.kind == WarningKind::InsufficientCash));
    }

    #[test]
    fn test_buy_insufficient_cash_below_min_lot_zeroes_out() {
        let security = security();
        let constraints = constraints();
        let input = ProjectionInput {
            account_id: "A1",
            desired: dec!(5000),
            side: OrderSide::Buy,
            price: security.price,
            cash: dec!(500),
            position: Decimal::ZERO,
            nav: dec!(1_000_000),
            security: &security,
            constraints: &constraints,
        };
        let (q, warnings) = project_allocation(&input);
        assert_eq!(q, Decimal::ZERO);
        assert!(warnings.iter().any(|w| w.kind == WarningKind::InsufficientCash));
    }

    #[test]
    fn test_sell_clips_to_position() {
        let security = security();
        let constraints = constraints();
        let input = ProjectionInput {
            account_id: "A1",
            desired: dec!(5000),
            side: OrderSide::Sell,
            price: security.price,
            cash: Decimal::ZERO,
            position: dec!(3200),
            nav: dec!(1_000_000),
            security: &security,
            constraints: &constraints,
        };
        let (q, warnings) = project_allocation(&input);
        assert_eq!(q, dec!(3000));
        assert!(warnings.iter().any(|w| w.kind == WarningKind::Compliance));
    }

    #[test]
    fn test_concentration_cap_applied() {
        let security = security();
        let mut constraints = constraints();
        constraints.max_concentration = Some(0.01);
        let input = ProjectionInput {
            account_id: "A1",
            desired: dec!(50_000),
            side: OrderSide::Buy,
            price: security.price,
            cash: dec!(10_000_000),
            position: Decimal::ZERO,
            nav: dec!(1_000_000),
            security: &security,
            constraints: &constraints,
        };
        let (q, _) = project_allocation(&input);
        // cap = floor((0.01 * 1_000_000) / 100 / 1000) * 1000 = 0
        assert_eq!(q, Decimal::ZERO);
    }

    #[test]
    fn test_below_min_allocation_with_zero_desired_emits_no_warning() {
        let security = security();
        let constraints = constraints();
        let input = ProjectionInput {
            account_id: "A1",
            desired: Decimal::ZERO,
            side: OrderSide::Buy,
            price: security.price,
            cash: dec!(1_000_000),
            position: Decimal::ZERO,
            nav: dec!(1_000_000),
            security: &security,
            constraints: &constraints,
        };
        let (q, warnings) = project_allocation(&input);
        assert_eq!(q, Decimal::ZERO);
        assert!(warnings.is_empty());
    }
}
