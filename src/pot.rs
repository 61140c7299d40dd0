//! The pot and side-pot builder. Chips flow from stack to live bet to pot;
//! when a betting round is swept the round's bets are partitioned into side
//! pots at every all-in cap. Pots keep their ordinal index for the whole
//! hand: later rounds keep filling the highest uncapped pot.

use crate::{Chips, Serial};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One side pot. `total` is cumulative: this pot's chips plus every pot
/// before it, which is the shape replay clients expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotSlice {
    pub in_pot: Chips,
    pub total: Chips,
    capped: bool,
}

/// A player's share of one betting round, as handed to [`SidePots::sweep`].
#[derive(Debug, Clone, Copy)]
pub struct SweepEntry {
    pub serial: Serial,
    pub amount: Chips,
    pub all_in: bool,
}

type RoundContribs = BTreeMap<usize, BTreeMap<Serial, Chips>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidePots {
    pots: Vec<PotSlice>,
    /// Chips mid-sweep that have not landed in a pot yet. Zero between
    /// operations; kept for the conservation check and snapshots.
    building: Chips,
    last_round: usize,
    /// round -> pot index -> serial -> amount.
    contributions: BTreeMap<usize, RoundContribs>,
    /// serial -> everything they have put in this hand, dead included.
    total: BTreeMap<Serial, Chips>,
}

impl SidePots {
    /// Index of the pot currently accepting chips, growing the list if the
    /// last pot was capped by an all-in.
    fn open_index(&mut self) -> usize {
        let needs_new = self.pots.last().map_or(true, |p| p.capped);
        if needs_new {
            let total = self.pots.last().map_or(0, |p| p.total);
            self.pots.push(PotSlice {
                in_pot: 0,
                total,
                capped: false,
            });
        }
        self.pots.len() - 1
    }

    fn add_contribution(&mut self, round: usize, pot_idx: usize, serial: Serial, amount: Chips) {
        if amount <= 0 {
            return;
        }
        *self
            .contributions
            .entry(round)
            .or_default()
            .entry(pot_idx)
            .or_default()
            .entry(serial)
            .or_insert(0) += amount;
        *self.total.entry(serial).or_insert(0) += amount;
        self.pots[pot_idx].in_pot += amount;
    }

    fn recompute_totals(&mut self) {
        let mut running = 0;
        for pot in self.pots.iter_mut() {
            running += pot.in_pot;
            pot.total = running;
        }
    }

    /// Route chips straight into the pot without passing through a live bet:
    /// antes and dead blinds.
    pub fn add_dead(&mut self, round: usize, serial: Serial, amount: Chips) {
        let idx = self.open_index();
        self.add_contribution(round, idx, serial, amount);
        self.recompute_totals();
    }

    /// Close the open pot so the next chips start a new one. Used when a
    /// player went all-in on dead money alone (ante for their whole stack).
    pub fn cap_open(&mut self) -> usize {
        let idx = self.open_index();
        self.pots[idx].capped = true;
        idx
    }

    /// Sweep one betting round's live bets into pots, splitting at every
    /// all-in amount. Returns each contributor's highest pot index.
    ///
    /// # Panics
    ///
    /// Panics if chip conservation breaks; that is a programming error, not
    /// an input error.
    pub fn sweep(&mut self, round: usize, entries: &[SweepEntry]) -> BTreeMap<Serial, usize> {
        self.last_round = round;
        self.building = entries.iter().map(|e| e.amount).sum();
        let mut indexes: BTreeMap<Serial, usize> = BTreeMap::new();

        let mut levels: Vec<Chips> = entries
            .iter()
            .filter(|e| e.all_in && e.amount > 0)
            .map(|e| e.amount)
            .collect();
        levels.sort_unstable();
        levels.dedup();

        let mut prev = 0;
        for cap in levels {
            let idx = self.open_index();
            for e in entries {
                let take = e.amount.min(cap) - prev.min(e.amount);
                if take > 0 {
                    self.add_contribution(round, idx, e.serial, take);
                    self.building -= take;
                    indexes.insert(e.serial, idx);
                }
            }
            self.pots[idx].capped = true;
            prev = cap;
        }
        // whatever exceeds the deepest all-in keeps building the open pot
        if entries.iter().any(|e| e.amount > prev) {
            let idx = self.open_index();
            for e in entries {
                if e.amount > prev {
                    self.add_contribution(round, idx, e.serial, e.amount - prev);
                    self.building -= e.amount - prev;
                    indexes.insert(e.serial, idx);
                }
            }
        }
        self.recompute_totals();
        self.check_conservation();
        indexes
    }

    fn check_conservation(&self) {
        let contributed: Chips = self.total.values().sum();
        let pocketed: Chips = self.pots.iter().map(|p| p.in_pot).sum();
        if contributed != pocketed + self.building {
            panic!(
                "side pot conservation broken: contributed {} != pocketed {} + building {}; {:?}",
                contributed, pocketed, self.building, self
            );
        }
    }

    pub fn pots(&self) -> &[PotSlice] {
        &self.pots
    }

    /// The (in_pot, cumulative) pairs tests and clients compare against.
    pub fn pairs(&self) -> Vec<(Chips, Chips)> {
        self.pots.iter().map(|p| (p.in_pot, p.total)).collect()
    }

    pub fn total(&self) -> Chips {
        self.pots.iter().map(|p| p.in_pot).sum::<Chips>() + self.building
    }

    pub fn last_round(&self) -> usize {
        self.last_round
    }

    pub fn contributed(&self, serial: Serial) -> Chips {
        self.total.get(&serial).copied().unwrap_or(0)
    }

    pub fn contributors(&self) -> &BTreeMap<Serial, Chips> {
        &self.total
    }

    pub fn round_contributions(&self, round: usize) -> Option<&RoundContribs> {
        self.contributions.get(&round)
    }

    /// Hand everything back (hand cancelled during blinds). Returns what each
    /// serial gets and leaves the builder empty.
    pub fn refund_all(&mut self) -> Vec<(Serial, Chips)> {
        let refunds: Vec<(Serial, Chips)> = self
            .total
            .iter()
            .map(|(serial, amount)| (*serial, *amount))
            .collect();
        *self = Self::default();
        refunds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(serial: Serial, amount: Chips, all_in: bool) -> SweepEntry {
        SweepEntry {
            serial,
            amount,
            all_in,
        }
    }

    #[test]
    fn no_all_in_single_pot_stays_open() {
        let mut pots = SidePots::default();
        pots.sweep(
            0,
            &[entry(1, 5, false), entry(2, 5, false), entry(3, 5, false)],
        );
        assert_eq!(pots.pairs(), vec![(15, 15)]);
        // the next round keeps filling it
        pots.sweep(1, &[entry(1, 10, false), entry(2, 10, false)]);
        assert_eq!(pots.pairs(), vec![(35, 35)]);
        assert_eq!(pots.contributed(1), 15);
    }

    #[test]
    fn five_way_heterogeneous_all_in() {
        // stacks 50/10/10/200/10, everyone all-in pre-flop
        let mut pots = SidePots::default();
        let indexes = pots.sweep(
            0,
            &[
                entry(1, 50, true),
                entry(2, 10, true),
                entry(3, 10, true),
                entry(4, 200, true),
                entry(5, 10, true),
            ],
        );
        assert_eq!(pots.pairs(), vec![(50, 50), (80, 130), (150, 280)]);
        assert_eq!(indexes[&1], 1);
        assert_eq!(indexes[&2], 0);
        assert_eq!(indexes[&3], 0);
        assert_eq!(indexes[&4], 2);
        assert_eq!(indexes[&5], 0);
        let round0 = pots.round_contributions(0).unwrap();
        assert_eq!(round0[&1][&1], 40);
        assert_eq!(round0[&2][&4], 150);
    }

    #[test]
    fn cross_round_caps() {
        // pre-flop 4/2/4/4 (2 folded after the blind), then a flop where 5
        // is all-in for 68, 1 for 98, 3 for 198
        let mut pots = SidePots::default();
        pots.sweep(
            0,
            &[
                entry(1, 4, false),
                entry(2, 2, false),
                entry(3, 4, false),
                entry(5, 4, false),
            ],
        );
        let indexes = pots.sweep(
            1,
            &[entry(1, 98, true), entry(3, 198, true), entry(5, 68, true)],
        );
        assert_eq!(pots.pairs(), vec![(218, 218), (60, 278), (100, 378)]);
        assert_eq!(indexes[&1], 1);
        assert_eq!(indexes[&3], 2);
        assert_eq!(indexes[&5], 0);
        assert_eq!(pots.last_round(), 1);
        let round1 = pots.round_contributions(1).unwrap();
        assert_eq!(round1[&0], BTreeMap::from([(1, 68), (3, 68), (5, 68)]));
        assert_eq!(round1[&1], BTreeMap::from([(1, 30), (3, 30)]));
        assert_eq!(round1[&2], BTreeMap::from([(3, 100)]));
    }

    #[test]
    fn folded_partial_bet_lands_under_the_cap() {
        let mut pots = SidePots::default();
        // 3 folded after betting 30; 2 is all-in for 60; 1 covered with 100
        let indexes = pots.sweep(
            0,
            &[entry(1, 100, false), entry(2, 60, true), entry(3, 30, false)],
        );
        assert_eq!(pots.pairs(), vec![(150, 150), (40, 190)]);
        assert_eq!(indexes[&1], 1);
        assert_eq!(indexes[&2], 0);
        assert_eq!(indexes[&3], 0);
    }

    #[test]
    fn dead_money_joins_open_pot() {
        let mut pots = SidePots::default();
        pots.add_dead(0, 3, 500);
        assert_eq!(pots.total(), 500);
        pots.sweep(0, &[entry(1, 1000, false), entry(2, 1000, false)]);
        assert_eq!(pots.pairs(), vec![(2500, 2500)]);
        assert_eq!(pots.contributed(3), 500);
    }

    #[test]
    fn ante_all_in_capped_before_betting() {
        let mut pots = SidePots::default();
        pots.add_dead(0, 1, 5);
        pots.add_dead(0, 2, 5);
        pots.add_dead(0, 3, 2); // player 3's whole stack
        let idx = pots.cap_open();
        assert_eq!(idx, 0);
        pots.sweep(0, &[entry(1, 20, false), entry(2, 20, false)]);
        assert_eq!(pots.pairs(), vec![(12, 12), (40, 52)]);
    }

    #[test]
    fn refund_returns_everything() {
        let mut pots = SidePots::default();
        pots.add_dead(0, 1, 500);
        pots.add_dead(0, 2, 200);
        let refunds = pots.refund_all();
        assert_eq!(refunds, vec![(1, 500), (2, 200)]);
        assert_eq!(pots.total(), 0);
        assert!(pots.pots().is_empty());
    }

    #[test]
    #[should_panic(expected = "conservation")]
    fn conservation_panics_when_broken() {
        let mut pots = SidePots::default();
        pots.sweep(0, &[entry(1, 10, false)]);
        pots.total.insert(9, 99);
        pots.check_conservation();
    }
}
