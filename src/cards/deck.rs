use super::card::{all_cards, Card};
use base64ct::{Base64, Encoding};
use rand::prelude::*;
use rand_chacha::ChaChaRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const DECK_LEN: usize = 52;
const SEED_LEN: usize = 32;
const ENCODED_SEED_LEN: usize = 4 * ((SEED_LEN + 3 - 1) / 3); // 4 * ceil(SEED_LEN / 3)

#[derive(Debug, PartialEq, derive_more::Display)]
pub enum DeckError {
    OutOfCards,
    DeckSeedDecodeError,
}

impl std::error::Error for DeckError {}

impl From<base64ct::Error> for DeckError {
    fn from(_: base64ct::Error) -> Self {
        Self::DeckSeedDecodeError
    }
}

/// A deck the table consumes strictly in order. The shuffle happened when the
/// deck was built; drawing never reorders anything, so a hand is replayable
/// from the deck alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deck {
    cards: Vec<Card>,
    next: usize,
}

impl Default for Deck {
    fn default() -> Self {
        Self::shuffled(&DeckSeed::default())
    }
}

impl Deck {
    /// A full 52-card deck shuffled by the given seed. The same seed always
    /// yields the same order.
    pub fn shuffled(seed: &DeckSeed) -> Self {
        let mut rng = ChaChaRng::from_seed(seed.0);
        // Cards start in a known order so the shuffle is a pure function of
        // the seed.
        let mut cards = all_cards();
        cards.sort_unstable();
        cards.shuffle(&mut rng);
        assert_eq!(cards.len(), DECK_LEN);
        Deck { cards, next: 0 }
    }

    /// A deck that will deal exactly `cards` front to back. Tests and replays
    /// inject these; the deck may be shorter than 52 cards.
    pub fn predetermined(cards: Vec<Card>) -> Self {
        Deck { cards, next: 0 }
    }

    /// Draw the next card in order.
    pub fn draw(&mut self) -> Result<Card, DeckError> {
        let card = self.cards.get(self.next).ok_or(DeckError::OutOfCards)?;
        self.next += 1;
        Ok(*card)
    }

    pub fn remaining(&self) -> usize {
        self.cards.len() - self.next
    }
}

/// Source of fresh decks between hands. The engine swaps decks only at hand
/// boundaries, so implementations never see a partially-consumed deck.
pub trait Shuffler {
    fn shuffle(&mut self) -> Deck;
}

/// Default shuffler: a new random seed per hand.
#[derive(Debug, Default)]
pub struct SeededShuffler;

impl Shuffler for SeededShuffler {
    fn shuffle(&mut self) -> Deck {
        Deck::default()
    }
}

/// Hands out the given decks in order, then repeats the last one. The test
/// double for everything deal-related.
#[derive(Debug)]
pub struct PredeterminedDecks {
    decks: Vec<Vec<Card>>,
    next: usize,
}

impl PredeterminedDecks {
    pub fn new(decks: Vec<Vec<Card>>) -> Self {
        assert!(!decks.is_empty());
        Self { decks, next: 0 }
    }

    pub fn single(cards: Vec<Card>) -> Self {
        Self::new(vec![cards])
    }
}

impl Shuffler for PredeterminedDecks {
    fn shuffle(&mut self) -> Deck {
        let i = self.next.min(self.decks.len() - 1);
        self.next += 1;
        Deck::predetermined(self.decks[i].clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeckSeed([u8; SEED_LEN]);

impl DeckSeed {
    pub fn new(b: [u8; SEED_LEN]) -> Self {
        Self(b)
    }
}

impl Default for DeckSeed {
    fn default() -> Self {
        let mut b = [0u8; SEED_LEN];
        thread_rng().fill_bytes(&mut b);
        Self(b)
    }
}

impl fmt::Display for DeckSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut b = [0u8; ENCODED_SEED_LEN];
        Base64::encode(&self.0, &mut b).unwrap();
        write!(f, "{}", String::from_utf8_lossy(&b))
    }
}

impl FromStr for DeckSeed {
    type Err = DeckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut b: [u8; SEED_LEN] = [0; SEED_LEN];
        Base64::decode(s, &mut b)?;
        Ok(DeckSeed(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::cards_from_str;
    use std::collections::HashMap;

    const SEED1: DeckSeed = DeckSeed([1; SEED_LEN]);

    #[test]
    fn right_count() {
        let mut d = Deck::default();
        let mut counts: HashMap<Card, u16> = HashMap::new();
        while let Ok(card) = d.draw() {
            *counts.entry(card).or_insert(0) += 1;
        }
        assert_eq!(counts.len(), DECK_LEN);
        assert!(counts.values().all(|c| *c == 1));
    }

    #[test]
    fn draw_all() {
        let mut d = Deck::default();
        for _ in 0..DECK_LEN {
            assert!(d.draw().is_ok());
        }
        assert_eq!(d.draw().unwrap_err(), DeckError::OutOfCards);
    }

    #[test]
    fn deck_is_seedable() {
        let mut a = Deck::shuffled(&SEED1);
        let mut b = Deck::shuffled(&SEED1);
        for _ in 0..DECK_LEN {
            assert_eq!(a.draw().unwrap(), b.draw().unwrap());
        }
    }

    #[test]
    fn predetermined_order() {
        let cards = cards_from_str("8sAs3h6d");
        let mut d = Deck::predetermined(cards.clone());
        for c in cards {
            assert_eq!(d.draw().unwrap(), c);
        }
        assert!(d.draw().is_err());
    }

    #[test]
    fn predetermined_shuffler_repeats_last() {
        let mut s = PredeterminedDecks::single(cards_from_str("AhKh"));
        let mut d1 = s.shuffle();
        let mut d2 = s.shuffle();
        assert_eq!(d1.draw().unwrap(), d2.draw().unwrap());
    }

    #[test]
    fn seed_to_from_string() {
        let d = DeckSeed::default();
        let s = d.to_string();
        let d2: DeckSeed = s.parse().unwrap();
        assert_eq!(d, d2);
    }
}
