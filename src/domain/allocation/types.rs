use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction of a block order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// A portfolio account eligible to receive a share of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Account {
    pub account_id: String,
    pub account_name: String,
    pub nav: Decimal,
    pub available_cash: Decimal,
    pub current_position: Decimal,
    pub active_spread_duration: f64,
    pub portfolio_duration: f64,
    pub spread_duration: f64,
    pub oas: f64,
    /// Used only by `Policy::ProRata { base_metric: BaseMetric::Custom }`; falls
    /// back to NAV when absent.
    #[serde(default)]
    pub custom_metric: Option<Decimal>,
}

/// The security being traded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Security {
    pub cusip: String,
    pub price: Decimal,
    pub duration: f64,
    pub spread_duration: f64,
    pub oas: f64,
    pub min_denomination: Decimal,
}

/// A single block order to allocate across accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Order {
    pub security_id: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    #[serde(default)]
    pub settlement_date: Option<NaiveDate>,
    /// Overrides `security.price` when present.
    #[serde(default)]
    pub price: Option<Decimal>,
}

impl Order {
    pub fn effective_price(&self, security: &Security) -> Decimal {
        self.price.unwrap_or(security.price)
    }
}

/// Allocation-wide constraints applied by the feasibility projector (C3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Constraints {
    #[serde(default = "default_true")]
    pub respect_cash: bool,
    pub min_allocation: Decimal,
    #[serde(default = "default_true")]
    pub round_to_denomination: bool,
    #[serde(default)]
    pub compliance_check: bool,
    /// Fraction of NAV, in (0, 1].
    #[serde(default)]
    pub max_concentration: Option<f64>,
}

fn default_true() -> bool {
    true
}

/// Size metric used by the pro-rata policy (C4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaseMetric {
    #[serde(rename = "NAV")]
    Nav,
    /// Currently degrades to NAV: no separate market-value feed is modeled.
    #[serde(rename = "MARKET_VALUE")]
    MarketValue,
    #[serde(rename = "CUSTOM")]
    Custom,
}

/// Risk metric whose cross-account dispersion the minimum-dispersion policy minimizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetMetric {
    #[serde(rename = "ACTIVE_SPREAD_DURATION")]
    ActiveSpreadDuration,
    #[serde(rename = "DURATION")]
    Duration,
    /// Collapses to `security.oas` for every account: no per-account OAS projection is modeled.
    #[serde(rename = "OAS")]
    Oas,
}

impl Default for TargetMetric {
    fn default() -> Self {
        TargetMetric::ActiveSpreadDuration
    }
}

pub fn default_tolerance() -> f64 {
    0.05
}

pub fn default_max_iterations() -> usize {
    1000
}

/// Policy-tagged allocation method and its parameters, serialized as a tagged
/// union keyed on `policy` with the variant's fields under `parameters`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", content = "parameters")]
pub enum Policy {
    #[serde(rename = "PRO_RATA")]
    ProRata { base_metric: BaseMetric },
    #[serde(rename = "CUSTOM_WEIGHTS")]
    CustomWeights { weights: HashMap<String, f64> },
    #[serde(rename = "MIN_DISPERSION")]
    MinDispersion {
        #[serde(default)]
        target_metric: TargetMetric,
        #[serde(default = "default_tolerance")]
        tolerance: f64,
        #[serde(default = "default_max_iterations")]
        max_iterations: usize,
    },
}

/// A snapshot of an account's four risk metrics, taken pre- or post-trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TradeMetrics {
    pub active_spread_duration: f64,
    pub portfolio_duration: f64,
    pub spread_duration: f64,
    pub oas: f64,
}

/// The result of allocating the order to a single account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountAllocation {
    pub account_id: String,
    pub account_name: String,
    pub allocated_quantity: Decimal,
    pub allocated_notional: Decimal,
    pub pre_trade_cash: Decimal,
    pub post_trade_cash: Decimal,
    pub pre_trade_metrics: TradeMetrics,
    pub post_trade_metrics: TradeMetrics,
    pub cash_used: Decimal,
}

/// Cross-account dispersion summary, present only for `Policy::MinDispersion`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispersionMetrics {
    pub pre_trade_std_dev: f64,
    pub post_trade_std_dev: f64,
    pub improvement: f64,
    pub max_deviation: f64,
    pub min_deviation: f64,
    pub target_value: f64,
    pub within_tolerance: bool,
    pub optimization_success: bool,
    pub iterations: usize,
}

/// Aggregate outcome of one `allocate()` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Summary {
    pub total_allocated: Decimal,
    pub unallocated: Decimal,
    pub allocation_rate: f64,
    pub accounts_allocated: usize,
    pub accounts_skipped: usize,
    #[serde(default)]
    pub dispersion: Option<DispersionMetrics>,
}

/// Kind of non-fatal condition raised while allocating to a specific account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    #[serde(rename = "INSUFFICIENT_CASH")]
    InsufficientCash,
    #[serde(rename = "MIN_LOT_SIZE")]
    MinLotSize,
    #[serde(rename = "COMPLIANCE")]
    Compliance,
    #[serde(rename = "ROUNDING")]
    Rounding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Warning {
    #[serde(rename = "type")]
    pub kind: WarningKind,
    #[serde(default)]
    pub account_id: Option<String>,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, account_id: impl Into<Option<String>>, message: impl Into<String>) -> Self {
        Self {
            kind,
            account_id: account_id.into(),
            message: message.into(),
        }
    }
}

/// Known fatal validation error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "NO_ACCOUNTS")]
    NoAccounts,
    #[serde(rename = "INVALID_QUANTITY")]
    InvalidQuantity,
    #[serde(rename = "INVALID_PRICE")]
    InvalidPrice,
    #[serde(rename = "INVALID_MIN_ALLOCATION")]
    InvalidMinAllocation,
    #[serde(rename = "NO_WEIGHTS")]
    NoWeights,
    #[serde(rename = "INVALID_WEIGHT_SUM")]
    InvalidWeightSum,
    #[serde(rename = "NEGATIVE_WEIGHT")]
    NegativeWeight,
    #[serde(rename = "WEIGHT_EXCEEDS_ONE")]
    WeightExceedsOne,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AllocationError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

impl AllocationError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }
}

impl std::fmt::Display for AllocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

/// The full outcome of one `allocate()` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AllocationResult {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub order: Order,
    pub allocations: Vec<AccountAllocation>,
    pub summary: Summary,
    pub warnings: Vec<Warning>,
    pub errors: Vec<AllocationError>,
}

impl AllocationResult {
    /// Builds the error-terminal result for a validation failure: no allocations,
    /// unallocated equals the full order quantity.
    pub fn from_errors(order: Order, errors: Vec<AllocationError>) -> Self {
        let unallocated = order.quantity;
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            order,
            allocations: Vec::new(),
            summary: Summary {
                total_allocated: Decimal::ZERO,
                unallocated,
                allocation_rate: 0.0,
                accounts_allocated: 0,
                accounts_skipped: 0,
                dispersion: None,
            },
            warnings: Vec::new(),
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_order_effective_price_prefers_override() {
        let security = Security {
            cusip: "912828XX".into(),
            price: dec!(100.0),
            duration: 5.0,
            spread_duration: 5.0,
            oas: 50.0,
            min_denomination: dec!(1000),
        };
        let order = Order {
            security_id: "912828XX".into(),
            side: OrderSide::Buy,
            quantity: dec!(10000),
            settlement_date: None,
            price: Some(dec!(99.5)),
        };
        assert_eq!(order.effective_price(&security), dec!(99.5));
    }

    #[test]
    fn test_order_effective_price_falls_back_to_security() {
        let security = Security {
            cusip: "912828XX".into(),
            price: dec!(100.0),
            duration: 5.0,
            spread_duration: 5.0,
            oas: 50.0,
            min_denomination: dec!(1000),
        };
        let order = Order {
            security_id: "912828XX".into(),
            side: OrderSide::Buy,
            quantity: dec!(10000),
            settlement_date: None,
            price: None,
        };
        assert_eq!(order.effective_price(&security), dec!(100.0));
    }

    #[test]
    fn test_from_errors_reports_full_unallocated() {
        let order = Order {
            security_id: "912828XX".into(),
            side: OrderSide::Buy,
            quantity: dec!(10000),
            settlement_date: None,
            price: None,
        };
        let result = AllocationResult::from_errors(
            order.clone(),
            vec![AllocationError::new(ErrorCode::NoAccounts, "no accounts supplied")],
        );
        assert!(result.allocations.is_empty());
        assert_eq!(result.summary.unallocated, order.quantity);
        assert_eq!(result.summary.total_allocated, Decimal::ZERO);
    }
}
