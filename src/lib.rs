pub mod config;
pub mod domain;

pub use domain::allocation::policy::allocate;
pub use domain::allocation::types::{
    Account, AccountAllocation, AllocationError, AllocationResult, BaseMetric, Constraints,
    DispersionMetrics, Order, OrderSide, Policy, Security, Summary, TargetMetric, TradeMetrics,
    Warning, WarningKind,
};
