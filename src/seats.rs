//! Seat layout and rotation arithmetic. Seat numbers for a given table size
//! are a fixed permutation so that every implementation, test, and replay
//! agrees on where players land.

use crate::SeatIdx;

/// The seat sequence a table of `max_players` exposes, in assignment order.
/// New players without a seat preference take the first free entry.
pub fn seat_permutation(max_players: usize) -> Option<&'static [SeatIdx]> {
    let seats: &[SeatIdx] = match max_players {
        2 => &[2, 7],
        3 => &[2, 7, 5],
        4 => &[1, 6, 3, 8],
        5 => &[0, 2, 4, 6, 8],
        6 => &[0, 2, 4, 5, 7, 8],
        7 => &[0, 2, 3, 5, 6, 8, 9],
        8 => &[1, 2, 3, 4, 5, 6, 7, 8],
        9 => &[0, 1, 2, 3, 4, 5, 6, 7, 8],
        10 => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
        _ => return None,
    };
    Some(seats)
}

/// Starting at `origin` in the cyclic `list`, return the index of the k-th
/// element after it satisfying `pred` (k-th before it for negative k).
///
/// If fewer than |k| elements satisfy the predicate, the walk wraps and the
/// first satisfying element in the forward direction is returned; None only
/// when nothing satisfies the predicate at all.
pub fn index_add<T, F>(list: &[T], origin: usize, k: isize, pred: F) -> Option<usize>
where
    F: Fn(&T) -> bool,
{
    if list.is_empty() {
        return None;
    }
    let len = list.len() as isize;
    let step = if k < 0 { -1 } else { 1 };
    let mut remaining = k.abs();
    let mut i = origin as isize;
    let mut steps = 0;
    while remaining > 0 && steps < k.abs() * len {
        i = (i + step).rem_euclid(len);
        steps += 1;
        if pred(&list[i as usize]) {
            remaining -= 1;
            if remaining == 0 {
                return Some(i as usize);
            }
        }
    }
    // wrap: first satisfying element walking forward from origin
    let mut i = origin;
    for _ in 0..list.len() {
        i = (i + 1) % list.len();
        if pred(&list[i]) {
            return Some(i);
        }
    }
    None
}

/// The fairest seat to drop a new player into.
///
/// While a hand is running the best free seat is the first one past the
/// dealer: its occupant will wait the longest before owing the big blind.
/// Otherwise seats are taken in permutation order.
pub fn best_seat(
    permutation: &[SeatIdx],
    occupied: &[SeatIdx],
    dealer_seat: Option<SeatIdx>,
) -> Option<SeatIdx> {
    let free = |s: &SeatIdx| !occupied.contains(s);
    match dealer_seat {
        Some(dealer) => {
            let origin = permutation.iter().position(|s| *s == dealer)?;
            let i = index_add(permutation, origin, 1, free)?;
            if occupied.contains(&permutation[i]) {
                None
            } else {
                Some(permutation[i])
            }
        }
        None => permutation.iter().copied().find(|s| free(s)),
    }
}
