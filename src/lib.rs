pub mod bet;
pub mod blinds;
pub mod cards;
pub mod chips;
pub mod eval;
pub mod history;
pub mod player;
pub mod pot;
pub mod seats;
pub mod showdown;
pub mod state;
pub mod structure;
pub mod variant;

pub use cards::{card, deck};

/// Highest seat index any table layout uses. Seat numbers are drawn from the
/// deterministic permutations in [`seats`], all of which fit below this.
pub const MAX_SEATS: usize = 10;

pub type Serial = i32;
pub type Chips = i32;
pub type SeatIdx = usize;

/// Fatal configuration problems. Everything else the engine rejects silently
/// (a lagging remote client must not be able to take the table down).
#[derive(Debug, derive_more::Display, derive_more::Error, PartialEq, Eq)]
pub enum ConfigError {
    NoRounds,
    NoSides,
    BadMaxPlayers,
    BadBuyIn,
    EngineRunning,
}

/// Reasons `add_player` can refuse a seat.
#[derive(Debug, derive_more::Display, derive_more::Error, PartialEq, Eq)]
pub enum JoinError {
    Closed,
    NoSeat,
    InvalidSeat,
    SeatTaken,
    AlreadyAdded,
}
