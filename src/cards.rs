pub mod card;
pub mod deck;
pub mod holding;

pub use card::{cards_from_str, Card, Rank, Suit};
pub use deck::{Deck, DeckSeed, Shuffler};
pub use holding::{Face, FacedCard, Holding};
