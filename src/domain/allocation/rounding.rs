//! Floor-to-denomination rounding with remainder redistribution that
//! preserves the sum constraint.

use rust_decimal::Decimal;

/// Floors `value` down to the nearest multiple of `lot`. Negative values clip to zero.
pub fn floor_to_lot(value: Decimal, lot: Decimal) -> Decimal {
    if value <= Decimal::ZERO || lot <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let steps = (value / lot).floor();
    steps * lot
}

/// Distributes `target - sum(floored)` one lot at a time across candidates,
/// visiting them in a fixed order of descending fractional part, then
/// descending raw value, then ascending original index.
/// `feasible(i, candidate_quantity)` decides whether adding one more lot to
/// account `i` is still admissible (cash/position/concentration).
pub fn distribute_remainder<F>(
    floored: &[Decimal],
    raw: &[Decimal],
    lot: Decimal,
    target: Decimal,
    mut feasible: F,
) -> Vec<Decimal>
where
    F: FnMut(usize, Decimal) -> bool,
{
    let mut result = floored.to_vec();
    if lot <= Decimal::ZERO {
        return result;
    }

    let mut order: Vec<usize> = (0..floored.len()).collect();
    order.sort_by(|&a, &b| {
        let frac_a = raw[a] - floored[a];
        let frac_b = raw[b] - floored[b];
        frac_b
            .cmp(&frac_a)
            .then_with(|| raw[b].cmp(&raw[a]))
            .then_with(|| a.cmp(&b))
    });

    let mut remainder = target - result.iter().copied().sum::<Decimal>();

    loop {
        if remainder < lot {
            break;
        }
        let mut progressed = false;
        for &i in &order {
            if remainder < lot {
                break;
            }
            let candidate = result[i] + lot;
            if feasible(i, candidate) {
                result[i] = candidate;
                remainder -= lot;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    result
}

/// Floors every element of `raw` to `lot`, the first step of C2.
pub fn floor_allocations(raw: &[Decimal], lot: Decimal) -> Vec<Decimal> {
    raw.iter().map(|&v| floor_to_lot(v, lot)).collect()
}

/// Full rounding kernel: floor then redistribute the remainder up to
/// `target`, subject to `feasible`. Returns the rounded vector; callers run a
/// final feasibility pass (C3) afterward where the spec requires it.
pub fn round_preserving_total<F>(raw: &[Decimal], lot: Decimal, target: Decimal, feasible: F) -> Vec<Decimal>
where
    F: FnMut(usize, Decimal) -> bool,
{
    let floored = floor_allocations(raw, lot);
    distribute_remainder(&floored, raw, lot, target, feasible)
}
