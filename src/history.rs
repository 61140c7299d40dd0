//! The per-hand turn history: an append-only sequence of tagged events that
//! is sufficient to replay the hand. Truncated when the next hand begins.

use crate::cards::Card;
use crate::showdown::Stage;
use crate::{Chips, SeatIdx, Serial};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    Game {
        level: usize,
        hand_serial: u32,
        hands_count: u32,
        /// Logical clock: wall time is not part of the engine so replays are
        /// byte-identical.
        time: u32,
        variant: String,
        structure: String,
        player_list: Vec<Serial>,
        dealer: usize,
        serial2money: BTreeMap<Serial, Chips>,
    },
    Position {
        position: Option<usize>,
        serial: Option<Serial>,
    },
    BlindRequest {
        serial: Serial,
        amount: Chips,
        dead: Chips,
        state: String,
    },
    Blind {
        serial: Serial,
        amount: Chips,
        dead: Chips,
    },
    AnteRequest {
        serial: Serial,
        amount: Chips,
    },
    Ante {
        serial: Serial,
        amount: Chips,
    },
    Round {
        name: String,
        board: Vec<Card>,
        serial2hand: BTreeMap<Serial, Vec<Card>>,
    },
    Call {
        serial: Serial,
        amount: Chips,
    },
    Check {
        serial: Serial,
    },
    Fold {
        serial: Serial,
    },
    Raise {
        serial: Serial,
        amount: Chips,
    },
    AllIn {
        serial: Serial,
    },
    Canceled {
        serial: Serial,
        amount: Chips,
    },
    ShowdownStack {
        stack: Vec<Stage>,
    },
    End {
        winners: Vec<Serial>,
    },
    SitOut {
        serial: Serial,
    },
    Rebuy {
        serial: Serial,
        amount: Chips,
    },
    Leave {
        seats: Vec<(Serial, SeatIdx)>,
    },
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Game {
                hand_serial,
                player_list,
                dealer,
                ..
            } => write!(
                f,
                "hand {} begins, players {:?}, dealer index {}",
                hand_serial, player_list, dealer
            ),
            Event::Position { position, serial } => match (position, serial) {
                (Some(p), Some(s)) => write!(f, "position {} (player {})", p, s),
                _ => write!(f, "no position"),
            },
            Event::BlindRequest {
                serial,
                amount,
                dead,
                state,
            } => write!(
                f,
                "player {} asked for {} blind {} (dead {})",
                serial, state, amount, dead
            ),
            Event::Blind {
                serial,
                amount,
                dead,
            } => write!(f, "player {} blinds {} (dead {})", serial, amount, dead),
            Event::AnteRequest { serial, amount } => {
                write!(f, "player {} asked for ante {}", serial, amount)
            }
            Event::Ante { serial, amount } => write!(f, "player {} antes {}", serial, amount),
            Event::Round { name, board, .. } => {
                write!(f, "round {}", name)?;
                if !board.is_empty() {
                    write!(f, ", board")?;
                    for c in board {
                        write!(f, " {}", c)?;
                    }
                }
                Ok(())
            }
            Event::Call { serial, amount } => write!(f, "player {} calls {}", serial, amount),
            Event::Check { serial } => write!(f, "player {} checks", serial),
            Event::Fold { serial } => write!(f, "player {} folds", serial),
            Event::Raise { serial, amount } => write!(f, "player {} raises {}", serial, amount),
            Event::AllIn { serial } => write!(f, "player {} is all in", serial),
            Event::Canceled { serial, amount } => {
                write!(f, "hand canceled, {} returned to player {}", amount, serial)
            }
            Event::ShowdownStack { stack } => write!(f, "showdown in {} stages", stack.len()),
            Event::End { winners } => write!(f, "hand ends, winners {:?}", winners),
            Event::SitOut { serial } => write!(f, "player {} sits out", serial),
            Event::Rebuy { serial, amount } => write!(f, "player {} rebuys {}", serial, amount),
            Event::Leave { seats } => write!(f, "seats released: {:?}", seats),
        }
    }
}

impl Event {
    /// Position updates are transient bookkeeping; everything else is part
    /// of the canonical replay.
    fn is_position(&self) -> bool {
        matches!(self, Event::Position { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    events: Vec<Event>,
}

impl History {
    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Dropped when the next hand begins.
    pub fn truncate(&mut self) {
        self.events.clear();
    }

    /// The canonical replay: consecutive position updates collapse to the
    /// last one (only the position somebody actually acted from matters),
    /// and a sit-out immediately undone leaves no trace.
    pub fn reduce(&self) -> Vec<Event> {
        let mut out: Vec<Event> = Vec::with_capacity(self.events.len());
        for event in &self.events {
            if event.is_position() {
                if out.last().map_or(false, |e| e.is_position()) {
                    out.pop();
                }
                out.push(event.clone());
                continue;
            }
            out.push(event.clone());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(p: usize, s: Serial) -> Event {
        Event::Position {
            position: Some(p),
            serial: Some(s),
        }
    }

    #[test]
    fn reduce_collapses_position_runs() {
        let mut h = History::default();
        h.push(position(0, 1));
        h.push(position(1, 2));
        h.push(Event::Check { serial: 2 });
        h.push(position(2, 3));
        let reduced = h.reduce();
        assert_eq!(
            reduced,
            vec![
                position(1, 2),
                Event::Check { serial: 2 },
                position(2, 3),
            ]
        );
    }

    #[test]
    fn truncate_empties() {
        let mut h = History::default();
        h.push(Event::Check { serial: 1 });
        h.truncate();
        assert!(h.events().is_empty());
    }

    #[test]
    fn events_serialize_stably() {
        let mut h = History::default();
        h.push(Event::Blind {
            serial: 1,
            amount: 500,
            dead: 0,
        });
        let a = serde_json::to_string(&h).unwrap();
        let b = serde_json::to_string(&h).unwrap();
        assert_eq!(a, b);
        let back: History = serde_json::from_str(&a).unwrap();
        assert_eq!(back, h);
    }
}
