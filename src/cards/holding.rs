use super::card::Card;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a dealt card is exposed to the table or only to its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Face {
    Up,
    Down,
}

/// A card plus its table-visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacedCard {
    pub card: Card,
    pub face: Face,
}

impl FacedCard {
    pub fn up(card: Card) -> Self {
        Self {
            card,
            face: Face::Up,
        }
    }

    pub fn down(card: Card) -> Self {
        Self {
            card,
            face: Face::Down,
        }
    }

    pub fn is_up(&self) -> bool {
        matches!(self.face, Face::Up)
    }
}

/// An ordered run of faced cards. Used both for a player's hand and for the
/// board; the deal order is meaningful (stud up-cards, replay).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    cards: Vec<FacedCard>,
}

impl Holding {
    pub fn push(&mut self, card: Card, face: Face) {
        self.cards.push(FacedCard { card, face });
    }

    pub fn clear(&mut self) {
        self.cards.clear();
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Every card, regardless of visibility. The engine's own view.
    pub fn cards(&self) -> Vec<Card> {
        self.cards.iter().map(|fc| fc.card).collect()
    }

    /// Only the cards the rest of the table can see.
    pub fn visible(&self) -> Vec<Card> {
        self.cards
            .iter()
            .filter(|fc| fc.is_up())
            .map(|fc| fc.card)
            .collect()
    }

    pub fn faced(&self) -> &[FacedCard] {
        &self.cards
    }

    pub fn all_visible(&self) -> bool {
        self.cards.iter().all(|fc| fc.is_up())
    }

    pub fn set_all(&mut self, face: Face) {
        for fc in self.cards.iter_mut() {
            fc.face = face;
        }
    }
}

impl fmt::Display for Holding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for fc in &self.cards {
            match fc.face {
                Face::Up => write!(f, "{}", fc.card)?,
                Face::Down => write!(f, "??")?,
            }
        }
        Ok(())
    }
}
