//! Integer-only chip arithmetic. The table never sees fractions of a chip;
//! leftovers from splits are handed out one chip at a time in an order the
//! caller controls (seat order left of the dealer, for pots).

use crate::Chips;

/// Divide `amount` as evenly as possible into `ways` non-negative integer
/// parts and return them largest-first.
///
/// Consider amount=5 and ways=3. 5 cannot be divided into 3 even integer
/// pieces, so this returns vec![2, 2, 1]. The caller pairs the result with
/// winners already ordered by seat from the dealer's left, which is how the
/// odd chips end up where the rules say they go.
///
/// # Panics
///
/// Panics on a negative amount or zero ways; there is never a negative
/// payout nor a payout to nobody.
pub fn split_evenly(amount: Chips, ways: usize) -> Vec<Chips> {
    assert!(ways > 0);
    assert!(amount >= 0);
    let ways_c = ways as Chips;
    let base = amount / ways_c;
    let extra = (amount % ways_c) as usize;
    (0..ways)
        .map(|i| if i < extra { base + 1 } else { base })
        .collect()
}

/// Split `total` proportionally to `weights`, flooring each share and handing
/// the remainder out one chip at a time starting at index 0. The shares sum
/// to `total` exactly.
///
/// Used for rake attribution: each pot contributor is charged
/// `contribution * rake / collected`, and the rounding loss goes to the first
/// contributors in dealer order.
pub fn proportional_split(total: Chips, weights: &[Chips]) -> Vec<Chips> {
    assert!(total >= 0);
    let weight_sum: Chips = weights.iter().sum();
    if weight_sum <= 0 || weights.is_empty() {
        let mut shares = vec![0; weights.len()];
        if let Some(first) = shares.first_mut() {
            *first = total;
        }
        return shares;
    }
    let mut shares: Vec<Chips> = weights
        .iter()
        .map(|w| ((*w as i64 * total as i64) / weight_sum as i64) as Chips)
        .collect();
    let mut left = total - shares.iter().sum::<Chips>();
    let mut i = 0;
    while left > 0 {
        let len = shares.len();
        shares[i % len] += 1;
        left -= 1;
        i += 1;
    }
    shares
}
