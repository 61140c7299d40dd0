//! The blind scheduler: who owes what when a hand starts, with the
//! missed-blind carry for players who sat out past their obligation.

use crate::player::{BlindState, MissedBlind, PlayerFilter, Players, SitState, WaitKind};
use crate::seats::index_add;
use crate::{Chips, Serial};

/// The chips a blind state is worth: (live, dead). The live part plays as a
/// bet; the dead part goes straight to the pot.
pub fn blind_amounts(state: BlindState, small: Chips, big: Chips) -> (Chips, Chips) {
    match state {
        BlindState::None | BlindState::Payed => (0, 0),
        BlindState::Small => (small, 0),
        BlindState::Big => (big, 0),
        BlindState::Late => (big, 0),
        BlindState::BigAndDead => (big, small),
    }
}

fn waits_for_big(players: &Players, serial: Serial) -> bool {
    players
        .get(serial)
        .map_or(false, |p| p.sit_state == SitState::WaitForBlind(WaitKind::Big))
}

fn missed_any(players: &Players, serial: Serial) -> bool {
    matches!(
        players.get(serial).and_then(|p| p.missed_blind),
        Some(MissedBlind::Small) | Some(MissedBlind::Big)
    )
}

/// Assign this hand's blind obligations over `player_list` (rotation in seat
/// order, `dealer` an index into it). Returns false when no legal
/// small/big pairing exists.
///
/// Players the walk skips are the ones carrying obligations forward: a
/// seated player sitting out on their blind seat gets `missed_blind` set so
/// the scheduler can charge them when they return (late big, or big plus
/// dead small).
pub(crate) fn assign(players: &mut Players, player_list: &[Serial], dealer: usize) -> bool {
    if player_list.len() < 2 {
        return false;
    }

    let (sb, bb) = if player_list.len() == 2 {
        // heads-up the dealer takes the small blind
        (dealer, (dealer + 1) % 2)
    } else {
        let clean_small = |s: &Serial| !waits_for_big(players, *s) && !missed_any(players, *s);
        let sb = match index_add(player_list, dealer, 1, clean_small) {
            Some(i) => i,
            // nobody qualifies cleanly: promote the seat left of the dealer
            None => (dealer + 1) % player_list.len(),
        };
        let bb = match index_add(player_list, sb, 1, |s| !waits_for_big(players, *s)) {
            Some(i) if i != sb => i,
            // the only candidate for big is the small itself: promote the
            // next seat regardless of its wishes
            _ => (sb + 1) % player_list.len(),
        };
        (sb, bb)
    };

    if sb == bb {
        return false;
    }

    for (idx, serial) in player_list.iter().enumerate() {
        let missed = players.get(*serial).and_then(|p| p.missed_blind);
        let state = if idx == sb {
            BlindState::Small
        } else if idx == bb {
            BlindState::Big
        } else {
            match missed {
                Some(MissedBlind::Small) => BlindState::BigAndDead,
                Some(MissedBlind::Big) => BlindState::Late,
                Some(MissedBlind::NotApplicable) | None => BlindState::None,
            }
        };
        if let Some(p) = players.get_mut(*serial) {
            p.blind = state;
            if state != BlindState::None {
                // posting (or being about to post) settles the carry
                p.missed_blind = None;
                if p.sit_state == SitState::WaitForBlind(WaitKind::Big)
                    || p.sit_state == SitState::WaitForBlind(WaitKind::Late)
                {
                    p.sit_state = SitState::Sitting;
                }
            }
        }
    }
    true
}

/// Record what the blinds passing by cost the players who sat this hand out.
/// Walk the seated (playing or not) ring from the dealer's seat: everyone
/// skipped before the acting small blind missed the small, everyone skipped
/// between small and big missed the big.
pub(crate) fn mark_missed(players: &mut Players, dealer_seat: usize) {
    let seated: Vec<(usize, Serial, bool)> = players
        .iter(PlayerFilter::ALL)
        // fresh players with no blind history yet owe nothing for waiting
        .filter(|(_, p)| {
            p.buy_in_payed && p.missed_blind != Some(MissedBlind::NotApplicable)
        })
        .map(|(seat, p)| (seat, p.serial, p.is_in_hand()))
        .collect();
    if seated.iter().filter(|(_, _, playing)| *playing).count() < 2 {
        return;
    }
    let origin = seated
        .iter()
        .position(|(seat, _, _)| *seat == dealer_seat)
        .unwrap_or(0);
    let mut missed = MissedBlind::Small;
    for k in 1..seated.len() {
        let (_, serial, playing) = seated[(origin + k) % seated.len()];
        if playing {
            if missed == MissedBlind::Big {
                // both blind seats found
                break;
            }
            missed = MissedBlind::Big;
        } else if let Some(p) = players.get_mut(serial) {
            if p.missed_blind.map_or(true, |m| m < missed) {
                p.missed_blind = Some(missed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Player;

    fn table(serials_seats: &[(Serial, usize)]) -> (Players, Vec<Serial>) {
        let mut players = Players::default();
        let mut list = vec![];
        for (serial, seat) in serials_seats {
            let mut p = Player::new(*serial, *seat);
            p.money = 1000;
            p.buy_in_payed = true;
            p.sit_state = SitState::Sitting;
            p.playing = true;
            p.missed_blind = None;
            players.add(p);
            list.push(*serial);
        }
        list.sort_by_key(|s| players.get(*s).unwrap().seat);
        (players, list)
    }

    #[test]
    fn three_handed() {
        let (mut players, list) = table(&[(1, 2), (2, 5), (3, 7)]);
        assert!(assign(&mut players, &list, 0));
        assert_eq!(players.get(1).unwrap().blind, BlindState::None);
        assert_eq!(players.get(2).unwrap().blind, BlindState::Small);
        assert_eq!(players.get(3).unwrap().blind, BlindState::Big);
    }

    #[test]
    fn heads_up_dealer_is_small() {
        let (mut players, list) = table(&[(1, 2), (2, 7)]);
        assert!(assign(&mut players, &list, 0));
        assert_eq!(players.get(1).unwrap().blind, BlindState::Small);
        assert_eq!(players.get(2).unwrap().blind, BlindState::Big);
    }

    #[test]
    fn missed_small_pays_big_and_dead_in_late_position() {
        let (mut players, list) = table(&[(1, 0), (2, 2), (3, 4), (4, 6), (5, 8)]);
        players.get_mut(5).unwrap().missed_blind = Some(MissedBlind::Small);
        assert!(assign(&mut players, &list, 0));
        assert_eq!(players.get(2).unwrap().blind, BlindState::Small);
        assert_eq!(players.get(3).unwrap().blind, BlindState::Big);
        assert_eq!(players.get(5).unwrap().blind, BlindState::BigAndDead);
        assert_eq!(players.get(5).unwrap().missed_blind, None);
    }

    #[test]
    fn missed_small_on_the_big_seat_just_pays_big() {
        let (mut players, list) = table(&[(1, 2), (2, 5), (3, 7)]);
        players.get_mut(3).unwrap().missed_blind = Some(MissedBlind::Small);
        assert!(assign(&mut players, &list, 0));
        assert_eq!(players.get(3).unwrap().blind, BlindState::Big);
    }

    #[test]
    fn wait_for_big_skipped_for_small() {
        let (mut players, list) = table(&[(1, 0), (2, 2), (3, 4), (4, 6)]);
        players.get_mut(2).unwrap().sit_state = SitState::WaitForBlind(WaitKind::Big);
        assert!(assign(&mut players, &list, 0));
        // 2 would be small; the obligation moves along
        assert_eq!(players.get(2).unwrap().blind, BlindState::None);
        assert_eq!(players.get(3).unwrap().blind, BlindState::Small);
        assert_eq!(players.get(4).unwrap().blind, BlindState::Big);
    }

    #[test]
    fn wait_for_big_granted_on_the_big_seat() {
        let (mut players, list) = table(&[(1, 0), (2, 2), (3, 4)]);
        players.get_mut(3).unwrap().sit_state = SitState::WaitForBlind(WaitKind::Big);
        assert!(assign(&mut players, &list, 0));
        assert_eq!(players.get(3).unwrap().blind, BlindState::Big);
        assert_eq!(players.get(3).unwrap().sit_state, SitState::Sitting);
    }

    #[test]
    fn degenerate_promotion_keeps_a_pairing() {
        let (mut players, list) = table(&[(1, 0), (2, 2), (3, 4)]);
        players.get_mut(2).unwrap().missed_blind = Some(MissedBlind::Big);
        players.get_mut(3).unwrap().missed_blind = Some(MissedBlind::Big);
        assert!(assign(&mut players, &list, 0));
        // no clean small exists; the seat left of the dealer is promoted
        assert_eq!(players.get(2).unwrap().blind, BlindState::Small);
        assert_eq!(players.get(3).unwrap().blind, BlindState::Big);
    }

    #[test]
    fn sitting_out_on_a_blind_marks_the_miss() {
        let (mut players, _) = table(&[(1, 2), (2, 5), (3, 7)]);
        // 2 sat out this hand: their seat was due the small blind
        {
            let p = players.get_mut(2).unwrap();
            p.playing = false;
            p.sit_state = SitState::SittingOut;
        }
        mark_missed(&mut players, 2);
        assert_eq!(players.get(2).unwrap().missed_blind, Some(MissedBlind::Small));
        assert_eq!(players.get(3).unwrap().missed_blind, None);
    }
}
