//! The seam between the table and hand-strength evaluation. The engine only
//! ever asks "what is this player's best hand for this side of the pot, and
//! how does it compare to the others"; everything else about evaluation is
//! behind [`HandEvaluator`].

use crate::cards::{Card, Rank};
use enum_map::EnumMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which half of the pot a hand is being valued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Side {
    Hi,
    Low8,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hi => write!(f, "hi"),
            Self::Low8 => write!(f, "low8"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HandClass {
    HighCard,
    Pair,
    TwoPair,
    ThreeOfAKind,
    Straight,
    Flush,
    FullHouse,
    FourOfAKind,
    StraightFlush,
}

impl fmt::Display for HandClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HighCard => write!(f, "high card"),
            Self::Pair => write!(f, "a pair"),
            Self::TwoPair => write!(f, "two pair"),
            Self::ThreeOfAKind => write!(f, "three of a kind"),
            Self::Straight => write!(f, "a straight"),
            Self::Flush => write!(f, "a flush"),
            Self::FullHouse => write!(f, "a full house"),
            Self::FourOfAKind => write!(f, "four of a kind"),
            Self::StraightFlush => write!(f, "a straight flush"),
        }
    }
}

/// A comparable hand value. `score` is lexicographic, greater wins the side;
/// the leading element is the hand class for hi hands. `cards` are the five
/// cards the score was built from, for display and history.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandStrength {
    pub score: Vec<u8>,
    pub cards: Vec<Card>,
}

pub trait HandEvaluator {
    /// The best 5-card value the player can make for `side` out of their own
    /// cards plus the board, or None if they cannot make one (e.g. no
    /// qualifying low).
    fn best_hand(&self, side: Side, hole: &[Card], board: &[Card]) -> Option<HandStrength>;
}

/// The built-in evaluator: any five of hole+board for hi, 8-or-better for
/// low. Variants wanting stricter selection rules (e.g. exactly two hole
/// cards) bring their own impl.
#[derive(Debug, Default)]
pub struct StandardEvaluator;

impl HandEvaluator for StandardEvaluator {
    fn best_hand(&self, side: Side, hole: &[Card], board: &[Card]) -> Option<HandStrength> {
        let mut all: Vec<Card> = hole.to_vec();
        all.extend_from_slice(board);
        if all.len() < 5 {
            return None;
        }
        match side {
            Side::Hi => all
                .iter()
                .copied()
                .combinations(5)
                .map(|five| HandStrength {
                    score: hi_score(&five),
                    cards: five,
                })
                .max(),
            Side::Low8 => low8_strength(&all),
        }
    }
}

/// Score a 5-card hi hand. score[0] is the HandClass discriminant, the rest
/// are the class-specific tiebreakers high-to-low.
pub fn hi_score(five: &[Card]) -> Vec<u8> {
    assert_eq!(five.len(), 5);
    let mut counts: EnumMap<Rank, u8> = EnumMap::default();
    for c in five {
        counts[c.rank()] += 1;
    }
    let is_flush = five.iter().map(|c| c.suit()).all_equal();
    // (count, rank-value) pairs, most-then-highest first
    let mut groups: Vec<(u8, u8)> = counts
        .iter()
        .filter(|(_, n)| **n > 0)
        .map(|(r, n)| (*n, r.value()))
        .collect();
    groups.sort_unstable_by(|a, b| b.cmp(a));
    let straight_high = straight_high(&counts);

    let class = if is_flush && straight_high.is_some() {
        HandClass::StraightFlush
    } else if groups[0].0 == 4 {
        HandClass::FourOfAKind
    } else if groups[0].0 == 3 && groups[1].0 == 2 {
        HandClass::FullHouse
    } else if is_flush {
        HandClass::Flush
    } else if straight_high.is_some() {
        HandClass::Straight
    } else if groups[0].0 == 3 {
        HandClass::ThreeOfAKind
    } else if groups[0].0 == 2 && groups[1].0 == 2 {
        HandClass::TwoPair
    } else if groups[0].0 == 2 {
        HandClass::Pair
    } else {
        HandClass::HighCard
    };

    let mut score = vec![class as u8];
    match class {
        HandClass::Straight | HandClass::StraightFlush => {
            score.push(straight_high.unwrap());
        }
        _ => {
            // group ranks in order already settle every other class
            score.extend(groups.iter().map(|(_, v)| *v));
        }
    }
    score
}

/// High card of the straight the ranks form, if any. The wheel (A5432)
/// counts as a 5-high straight.
fn straight_high(counts: &EnumMap<Rank, u8>) -> Option<u8> {
    let present: Vec<u8> = counts
        .iter()
        .filter(|(_, n)| **n > 0)
        .map(|(r, _)| r.value())
        .collect();
    if present.len() != 5 {
        return None;
    }
    let lo = present.iter().min().unwrap();
    let hi = present.iter().max().unwrap();
    if hi - lo == 4 {
        Some(*hi)
    } else if present.contains(&14) && *lo == 2 && present.iter().filter(|v| **v <= 5).count() == 4
    {
        // A 2 3 4 5
        Some(5)
    } else {
        None
    }
}

/// Best qualifying eight-or-better low from the given cards, if one exists:
/// five distinct ranks, all at most 8 with the ace low. Greater score wins,
/// so each card value is stored inverted.
fn low8_strength(all: &[Card]) -> Option<HandStrength> {
    let mut by_low: Vec<(u8, Card)> = all
        .iter()
        .filter(|c| c.rank().low_value() <= 8)
        .map(|c| (c.rank().low_value(), *c))
        .collect();
    by_low.sort_unstable_by_key(|(v, _)| *v);
    by_low.dedup_by_key(|(v, _)| *v);
    if by_low.len() < 5 {
        return None;
    }
    let five = &by_low[..5];
    // compare from the highest low-card down
    let mut score: Vec<u8> = five.iter().rev().map(|(v, _)| 16 - v).collect();
    score.insert(0, 0); // lows have no class ladder
    Some(HandStrength {
        score,
        cards: five.iter().map(|(_, c)| *c).collect(),
    })
}
