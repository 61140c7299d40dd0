//! Showdown adjudication and money distribution: per side pot, per winner
//! side, with the odd-chip and uncalled-bet rules the rest of the engine
//! depends on. Produces the structured stack replay clients render.

use crate::cards::Card;
use crate::chips;
use crate::eval::{HandEvaluator, Side};
use crate::player::{PlayerFilter, Players};
use crate::pot::SidePots;
use crate::{Chips, Serial};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How the hand got decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WinCondition {
    /// Everyone else folded.
    Fold,
    /// Betting ended early because the table was all-in; the board ran out.
    AllIn,
    /// A full hand reached the last round.
    Regular,
}

/// Table rake policy. The pot handed to winners is the collected pot minus
/// what this returns.
pub trait RakeModel {
    fn rake(&self, pot: Chips, uncalled: Chips, is_tournament: bool) -> Chips;
}

#[derive(Debug, Default)]
pub struct NoRake;

impl RakeModel for NoRake {
    fn rake(&self, _pot: Chips, _uncalled: Chips, _is_tournament: bool) -> Chips {
        0
    }
}

/// Flat percentage of the called pot.
#[derive(Debug)]
pub struct PercentRake {
    percent: Chips,
}

impl PercentRake {
    pub fn new(percent: Chips) -> Self {
        assert!((0..=100).contains(&percent));
        Self { percent }
    }
}

impl RakeModel for PercentRake {
    fn rake(&self, pot: Chips, uncalled: Chips, _is_tournament: bool) -> Chips {
        ((pot - uncalled) as i64 * self.percent as i64 / 100) as Chips
    }
}

/// One side of one pot resolved: who won it and what they took home.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideResolve {
    pub side: Side,
    pub winners: Vec<Serial>,
    pub serial2share: BTreeMap<Serial, Chips>,
}

/// A stage of the showdown, in presentation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stage {
    /// Always first: the whole hand's money movement at a glance.
    Summary {
        pot: Chips,
        uncalled: Chips,
        uncalled_serial: Option<Serial>,
        serial2share: BTreeMap<Serial, Chips>,
        serial2delta: BTreeMap<Serial, Chips>,
        serial2rake: BTreeMap<Serial, Chips>,
    },
    /// An uncalled bet going home before anything is awarded.
    Uncalled { serial: Serial, amount: Chips },
    /// One side pot paid out.
    Resolve {
        pot_index: usize,
        amount: Chips,
        serials: Vec<Serial>,
        sides: Vec<SideResolve>,
    },
}

pub(crate) struct ShowdownContext<'a> {
    pub players: &'a mut Players,
    /// Rotation this hand, seat order.
    pub player_list: &'a [Serial],
    /// Dealer's index in `player_list`.
    pub dealer: usize,
    pub side_pots: &'a SidePots,
    pub uncalled: Chips,
    pub uncalled_serial: Option<Serial>,
    pub sides: &'a [Side],
    pub evaluator: &'a dyn HandEvaluator,
    pub board: &'a [Card],
    pub rake: &'a dyn RakeModel,
    pub is_tournament: bool,
    pub win_condition: WinCondition,
}

pub(crate) struct Distribution {
    pub stack: Vec<Stage>,
    pub winners: Vec<Serial>,
    pub side2winners: BTreeMap<Side, Vec<Serial>>,
    pub serial2rake: BTreeMap<Serial, Chips>,
}

/// `player_list` indexes walked one seat at a time starting left of the
/// dealer. Odd chips and rake remainders follow this order.
fn dealer_order(player_list: &[Serial], dealer: usize) -> Vec<Serial> {
    (1..=player_list.len())
        .map(|k| player_list[(dealer + k) % player_list.len()])
        .collect()
}

pub(crate) fn distribute(ctx: ShowdownContext<'_>) -> Distribution {
    let pot_total = ctx.side_pots.total();
    let rake_total = ctx
        .rake
        .rake(pot_total, ctx.uncalled, ctx.is_tournament)
        .clamp(0, pot_total - ctx.uncalled);
    let order = dealer_order(ctx.player_list, ctx.dealer);

    // (ordinal, amount) of every non-empty pot, uncalled already peeled off
    // the last one
    let mut pots: Vec<(usize, Chips)> = ctx
        .side_pots
        .pots()
        .iter()
        .enumerate()
        .map(|(i, p)| (i, p.in_pot))
        .filter(|(_, amount)| *amount > 0)
        .collect();
    let mut stack: Vec<Stage> = Vec::new();
    let mut serial2share: BTreeMap<Serial, Chips> = BTreeMap::new();

    if ctx.uncalled > 0 {
        let serial = ctx
            .uncalled_serial
            .unwrap_or_else(|| panic!("uncalled {} with no owner", ctx.uncalled));
        let last = pots
            .last_mut()
            .unwrap_or_else(|| panic!("uncalled {} but no pots: {:?}", ctx.uncalled, ctx.side_pots));
        if last.1 < ctx.uncalled {
            panic!(
                "uncalled pot mismatch: {} < {}; {:?}",
                last.1, ctx.uncalled, ctx.side_pots
            );
        }
        last.1 -= ctx.uncalled;
        if last.1 == 0 {
            pots.pop();
        }
        *serial2share.entry(serial).or_insert(0) += ctx.uncalled;
        stack.push(Stage::Uncalled {
            serial,
            amount: ctx.uncalled,
        });
    }

    // rake comes off each pot in proportion, remainder off the first
    let rake_per_pot = chips::proportional_split(
        rake_total,
        &pots.iter().map(|(_, amount)| *amount).collect::<Vec<_>>(),
    );

    let mut winners: Vec<Serial> = Vec::new();
    let mut side2winners: BTreeMap<Side, Vec<Serial>> = BTreeMap::new();
    for ((pot_index, amount), pot_rake) in pots.iter().copied().zip(rake_per_pot) {
        let eligible: Vec<Serial> = order
            .iter()
            .copied()
            .filter(|s| {
                ctx.players.get(*s).map_or(false, |p| {
                    p.is_not_fold() && p.side_pot_index >= pot_index
                })
            })
            .collect();
        if eligible.is_empty() {
            panic!(
                "side pot {} ({} chips) has no eligible player; {:?}",
                pot_index, amount, ctx.side_pots
            );
        }
        let net = amount - pot_rake;
        let sides = resolve_pot(&ctx, net, &eligible);
        for resolve in &sides {
            for w in &resolve.winners {
                if !winners.contains(w) {
                    winners.push(*w);
                }
                let entry = side2winners.entry(resolve.side).or_default();
                if !entry.contains(w) {
                    entry.push(*w);
                }
            }
            for (s, share) in &resolve.serial2share {
                *serial2share.entry(*s).or_insert(0) += share;
            }
        }
        stack.push(Stage::Resolve {
            pot_index,
            amount,
            serials: eligible,
            sides,
        });
    }

    // rake attribution: contribution-weighted, remainder to the first
    // contributor in dealer order
    let contributors: Vec<Serial> = order
        .iter()
        .copied()
        .filter(|s| ctx.side_pots.contributed(*s) > 0)
        .collect();
    let weights: Vec<Chips> = contributors
        .iter()
        .map(|s| {
            let mut c = ctx.side_pots.contributed(*s);
            if ctx.uncalled_serial == Some(*s) {
                c -= ctx.uncalled;
            }
            c
        })
        .collect();
    let shares = chips::proportional_split(rake_total, &weights);
    let serial2rake: BTreeMap<Serial, Chips> = contributors
        .iter()
        .copied()
        .zip(shares)
        .filter(|(_, r)| *r > 0)
        .collect();

    // move the money and work out the per-player deltas
    let mut serial2delta: BTreeMap<Serial, Chips> = BTreeMap::new();
    for (serial, contributed) in ctx.side_pots.contributors() {
        let share = serial2share.get(serial).copied().unwrap_or(0);
        serial2delta.insert(*serial, share - contributed);
    }
    for (serial, share) in &serial2share {
        if let Some(p) = ctx.players.get_mut(*serial) {
            p.money += share;
        }
    }

    stack.insert(
        0,
        Stage::Summary {
            pot: pot_total,
            uncalled: ctx.uncalled,
            uncalled_serial: ctx.uncalled_serial,
            serial2share,
            serial2delta,
            serial2rake: serial2rake.clone(),
        },
    );
    Distribution {
        stack,
        winners,
        side2winners,
        serial2rake,
    }
}

/// Split one pot's net amount across the variant's sides and their winners.
fn resolve_pot(ctx: &ShowdownContext<'_>, net: Chips, eligible: &[Serial]) -> Vec<SideResolve> {
    if matches!(ctx.win_condition, WinCondition::Fold) || eligible.len() == 1 {
        // nothing to evaluate: the last player standing takes it
        let winner = eligible[0];
        return vec![SideResolve {
            side: Side::Hi,
            winners: vec![winner],
            serial2share: BTreeMap::from([(winner, net)]),
        }];
    }

    // which sides have any qualifying hand at all
    let mut sided: Vec<(Side, Vec<Serial>)> = Vec::new();
    for side in ctx.sides {
        let mut best: Option<(crate::eval::HandStrength, Vec<Serial>)> = None;
        for serial in eligible {
            let player = match ctx.players.get(*serial) {
                Some(p) => p,
                None => continue,
            };
            let strength =
                match ctx
                    .evaluator
                    .best_hand(*side, &player.hand.cards(), ctx.board)
                {
                    Some(s) => s,
                    None => continue,
                };
            match &mut best {
                None => best = Some((strength, vec![*serial])),
                Some((top, who)) => {
                    if strength.score > top.score {
                        *top = strength;
                        *who = vec![*serial];
                    } else if strength.score == top.score {
                        who.push(*serial);
                    }
                }
            }
        }
        if let Some((_, who)) = best {
            sided.push((*side, who));
        }
    }
    assert!(!sided.is_empty(), "no side produced a winner");

    // hi gets the odd chip when the pot splits between sides
    let side_amounts: Vec<Chips> = match sided.len() {
        1 => vec![net],
        n => {
            let each = net / n as Chips;
            let mut v = vec![each; n];
            v[0] += net - each * n as Chips;
            v
        }
    };

    sided
        .into_iter()
        .zip(side_amounts)
        .map(|((side, side_winners), side_amount)| {
            let parts = chips::split_evenly(side_amount, side_winners.len());
            let serial2share: BTreeMap<Serial, Chips> = side_winners
                .iter()
                .copied()
                .zip(parts)
                .filter(|(_, c)| *c > 0)
                .collect();
            SideResolve {
                side,
                winners: side_winners,
                serial2share,
            }
        })
        .collect()
}

/// Serials whose cards stay face down at the end of the hand, given the win
/// condition and each player's auto-muck policy. An all-in showdown shows
/// everything; a regular showdown forces only the winners open.
pub(crate) fn auto_muckable(
    players: &Players,
    winners: &[Serial],
    win_condition: WinCondition,
) -> Vec<Serial> {
    let mut muckable = Vec::new();
    for (_, p) in players.iter(PlayerFilter::NOT_FOLD) {
        let won = winners.contains(&p.serial);
        let mucks = match win_condition {
            WinCondition::Fold => won && p.auto_muck.mucks_on_win(),
            WinCondition::AllIn => false,
            WinCondition::Regular => !won && p.auto_muck.mucks_on_lose(),
        };
        if mucks {
            muckable.push(p.serial);
        }
    }
    muckable
}
