use enum_map::Enum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const SPADE: char = 's';
pub const HEART: char = 'h';
pub const DIAMOND: char = 'd';
pub const CLUB: char = 'c';
pub const ALL_SUITS: [Suit; 4] = [Suit::Club, Suit::Diamond, Suit::Heart, Suit::Spade];
pub const ALL_RANKS: [Rank; 13] = [
    Rank::R2,
    Rank::R3,
    Rank::R4,
    Rank::R5,
    Rank::R6,
    Rank::R7,
    Rank::R8,
    Rank::R9,
    Rank::RT,
    Rank::RJ,
    Rank::RQ,
    Rank::RK,
    Rank::RA,
];

#[derive(
    Hash, Enum, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Debug, Serialize, Deserialize,
)]
pub enum Rank {
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    R8,
    R9,
    RT,
    RJ,
    RQ,
    RK,
    RA,
}

impl Rank {
    /// 2..=14, aces high.
    pub fn value(self) -> u8 {
        self as u8 + 2
    }

    /// 1..=13, aces low. What the low8 side of a split pot cares about.
    pub fn low_value(self) -> u8 {
        match self {
            Rank::RA => 1,
            r => r as u8 + 2,
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::R2 => write!(f, "2"),
            Self::R3 => write!(f, "3"),
            Self::R4 => write!(f, "4"),
            Self::R5 => write!(f, "5"),
            Self::R6 => write!(f, "6"),
            Self::R7 => write!(f, "7"),
            Self::R8 => write!(f, "8"),
            Self::R9 => write!(f, "9"),
            Self::RT => write!(f, "T"),
            Self::RJ => write!(f, "J"),
            Self::RQ => write!(f, "Q"),
            Self::RK => write!(f, "K"),
            Self::RA => write!(f, "A"),
        }
    }
}

impl From<char> for Rank {
    fn from(c: char) -> Self {
        match c {
            '2' => Rank::R2,
            '3' => Rank::R3,
            '4' => Rank::R4,
            '5' => Rank::R5,
            '6' => Rank::R6,
            '7' => Rank::R7,
            '8' => Rank::R8,
            '9' => Rank::R9,
            'T' => Rank::RT,
            'J' => Rank::RJ,
            'Q' => Rank::RQ,
            'K' => Rank::RK,
            'A' => Rank::RA,
            _ => unreachable!("Bad Rank char"),
        }
    }
}

#[derive(
    Hash, Enum, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Debug, Serialize, Deserialize,
)]
pub enum Suit {
    Club,
    Diamond,
    Heart,
    Spade,
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Club => write!(f, "{}", CLUB),
            Self::Diamond => write!(f, "{}", DIAMOND),
            Self::Heart => write!(f, "{}", HEART),
            Self::Spade => write!(f, "{}", SPADE),
        }
    }
}

impl From<char> for Suit {
    fn from(c: char) -> Self {
        match c {
            CLUB => Self::Club,
            DIAMOND => Self::Diamond,
            HEART => Self::Heart,
            SPADE => Self::Spade,
            _ => unreachable!("Bad Suit char"),
        }
    }
}

#[derive(Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Card {
    rank: Rank,
    suit: Suit,
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

impl From<[char; 2]> for Card {
    fn from(cs: [char; 2]) -> Self {
        Self {
            rank: cs[0].into(),
            suit: cs[1].into(),
        }
    }
}

impl FromStr for Card {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut i = s.chars();
        Ok(Card::from([
            i.next().ok_or_else(|| String::from("Failed to parse card"))?,
            i.next().ok_or_else(|| String::from("Failed to parse card"))?,
        ]))
    }
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }

    pub fn rank(self) -> Rank {
        self.rank
    }

    pub fn suit(self) -> Suit {
        self.suit
    }
}

/// Parse a run of two-char card names ("8sAs3h") into cards. Handy for
/// injecting predetermined decks and for tests.
pub fn cards_from_str(s: &str) -> Vec<Card> {
    let mut v = vec![];
    let mut s_chars = s.chars().filter(|c| !c.is_whitespace());
    while let Some(r) = s_chars.next() {
        let s = s_chars.next().expect("Need even number of chars");
        v.push([r, s].into())
    }
    v
}

/// Returns an UNSHUFFLED vec of all 52 cards.
pub fn all_cards() -> Vec<Card> {
    use itertools::Itertools;
    ALL_RANKS
        .iter()
        .cartesian_product(ALL_SUITS.iter())
        .map(|x| Card::new(*x.0, *x.1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_order() {
        // Rank order is used as logic all over the evaluator; this test
        // exists to highlight when it breaks.
        for (i, r) in ALL_RANKS.iter().enumerate() {
            assert_eq!(r.value(), 2 + i as u8);
        }
        assert!(Rank::RA > Rank::RK);
        assert_eq!(Rank::RA.low_value(), 1);
    }

    #[test]
    fn string_single() {
        let c: Card = "Ah".parse().unwrap();
        assert_eq!(c.rank(), Rank::RA);
        assert_eq!(c.suit(), Suit::Heart);
    }

    #[test]
    fn string_multi() {
        let res = cards_from_str("Ah2c6h");
        assert_eq!(res.len(), 3);
        assert_eq!(res[2].rank(), Rank::R6);
    }

    #[test]
    fn string_with_spaces() {
        let res = cards_from_str("8s As 3h 6d");
        assert_eq!(res.len(), 4);
    }

    #[test]
    fn full_deck() {
        let all = all_cards();
        assert_eq!(all.len(), 52);
    }

    #[test]
    fn card_ordering_ignores_nothing() {
        let c1 = Card::new(Rank::RJ, Suit::Club);
        let c2 = Card::new(Rank::RQ, Suit::Diamond);
        assert!(c1 < c2);
    }
}
