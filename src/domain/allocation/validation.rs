//! Entry-level validation: accounts non-empty, quantity > 0, price > 0,
//! min_allocation >= security min_denomination, checked in that order and
//! short-circuiting on the first failure.

use rust_decimal::Decimal;

use super::types::{Account, AllocationError, Constraints, ErrorCode, Order, Security};

pub fn validate_inputs(
    order: &Order,
    security: &Security,
    accounts: &[Account],
    constraints: &Constraints,
) -> Option<AllocationError> {
    if accounts.is_empty() {
        return Some(AllocationError::new(ErrorCode::NoAccounts, "no accounts supplied"));
    }
    if order.quantity <= Decimal::ZERO {
        return Some(AllocationError::new(
            ErrorCode::InvalidQuantity,
            format!("order quantity must be positive, got {}", order.quantity),
        ));
    }
    let price = order.effective_price(security);
    if price <= Decimal::ZERO {
        return Some(AllocationError::new(
            ErrorCode::InvalidPrice,
            format!("effective price must be positive, got {price}"),
        ));
    }
    if constraints.min_allocation < security.min_denomination {
        return Some(AllocationError::new(
            ErrorCode::InvalidMinAllocation,
            format!(
                "min_allocation {} must be >= security min_denomination {}",
                constraints.min_allocation, security.min_denomination
            ),
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::allocation::types::OrderSide;
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

    fn order() -> Order {
        Order {
            security_id: "912828XX".into(),
            side: OrderSide::Buy,
            quantity: dec!(10000),
            settlement_date: None,
            price: None,
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

    fn account() -> Account {
        Account {
            account_id: "A1".into(),
            account_name: "Account One".into(),
            nav: dec!(1_000_000),
            available_cash: dec!(500_000),
            current_position: Decimal::ZERO,
            active_spread_duration: 5.0,
            portfolio_duration: 6.0,
            spread_duration: 5.5,
            oas: 40.0,
            custom_metric: None,
        }
    }

    #[test]
    fn test_no_accounts_is_fatal() {
        let err = validate_inputs(&order(), &security(), &[], &constraints()).unwrap();
        assert_eq!(err.code, ErrorCode::NoAccounts);
    }

    #[test]
    fn test_non_positive_quantity_is_fatal() {
        let mut order = order();
        order.quantity = Decimal::ZERO;
        let err = validate_inputs(&order, &security(), &[account()], &constraints()).unwrap();
        assert_eq!(err.code, ErrorCode::InvalidQuantity);
    }

    #[test]
    fn test_non_positive_price_is_fatal() {
        let mut security = security();
        security.price = Decimal::ZERO;
        let err = validate_inputs(&order(), &security, &[account()], &constraints()).unwrap();
        assert_eq!(err.code, ErrorCode::InvalidPrice);
    }

    #[test]
    fn test_min_allocation_below_denomination_is_fatal() {
        let mut constraints = constraints();
        constraints.min_allocation = dec!(1);
        let err = validate_inputs(&order(), &security(), &[account()], &constraints).unwrap();
        assert_eq!(err.code, ErrorCode::InvalidMinAllocation);
    }

    #[test]
    fn test_valid_inputs_pass() {
        assert!(validate_inputs(&order(), &security(), &[account()], &constraints()).is_none());
    }
}
