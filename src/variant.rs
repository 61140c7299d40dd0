//! Variant descriptors. A variant is pure data: the ordered betting rounds,
//! what each round deals, who opens it, and which sides of the pot get
//! awarded. The engine dispatches on these enums exhaustively; there is no
//! stringly-typed rule lookup.

use crate::cards::Face;
use crate::eval::Side;
use crate::ConfigError;
use serde::{Deserialize, Serialize};

/// Who acts first once a round's cards are out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    /// First player left of the big blind. Pre-flop rule.
    UnderTheGun,
    /// First player left of the dealer. Post-flop rule.
    NextToDealer,
    /// Player showing the lowest up-card opens (stud bring-in style).
    LowCard,
    /// Player showing the highest up-card opens.
    HighCard,
}

/// One betting round: its deal template and opening rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundInfo {
    pub name: String,
    pub position: Position,
    /// Cards dealt to each player this round, in order, with their face.
    pub deal: Vec<Face>,
    /// Community cards dealt face up this round.
    pub board: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    pub rounds: Vec<RoundInfo>,
    /// The sides each pot is split into. One element for straight-high
    /// games, two for hi/lo split games.
    pub sides: Vec<Side>,
    /// How many cards a player holds by the end of a full hand.
    pub hand_size: usize,
    /// How many board cards exist by the end of a full hand.
    pub board_size: usize,
}

impl Variant {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rounds.is_empty() {
            return Err(ConfigError::NoRounds);
        }
        if self.sides.is_empty() {
            return Err(ConfigError::NoSides);
        }
        Ok(())
    }

    fn flop_game(name: &str, pocket: usize, sides: Vec<Side>) -> Self {
        let pre_deal = vec![Face::Down; pocket];
        Self {
            name: name.to_string(),
            rounds: vec![
                RoundInfo {
                    name: "pre-flop".to_string(),
                    position: Position::UnderTheGun,
                    deal: pre_deal,
                    board: 0,
                },
                RoundInfo {
                    name: "flop".to_string(),
                    position: Position::NextToDealer,
                    deal: vec![],
                    board: 3,
                },
                RoundInfo {
                    name: "turn".to_string(),
                    position: Position::NextToDealer,
                    deal: vec![],
                    board: 1,
                },
                RoundInfo {
                    name: "river".to_string(),
                    position: Position::NextToDealer,
                    deal: vec![],
                    board: 1,
                },
            ],
            sides,
            hand_size: pocket,
            board_size: 5,
        }
    }

    pub fn holdem() -> Self {
        Self::flop_game("holdem", 2, vec![Side::Hi])
    }

    pub fn omaha() -> Self {
        Self::flop_game("omaha", 4, vec![Side::Hi])
    }

    pub fn omaha8() -> Self {
        Self::flop_game("omaha8", 4, vec![Side::Hi, Side::Low8])
    }

    /// Seven-card stud: two down and one up, three up streets, one final
    /// down card. High up-card opens every street after the first.
    pub fn seven_stud(sides: Vec<Side>) -> Self {
        let street = |name: &str, deal: Vec<Face>, position: Position| RoundInfo {
            name: name.to_string(),
            position,
            deal,
            board: 0,
        };
        Self {
            name: "7stud".to_string(),
            rounds: vec![
                street(
                    "third",
                    vec![Face::Down, Face::Down, Face::Up],
                    Position::LowCard,
                ),
                street("fourth", vec![Face::Up], Position::HighCard),
                street("fifth", vec![Face::Up], Position::HighCard),
                street("sixth", vec![Face::Up], Position::HighCard),
                street("river", vec![Face::Down], Position::HighCard),
            ],
            sides,
            hand_size: 7,
            board_size: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holdem_shape() {
        let v = Variant::holdem();
        v.validate().unwrap();
        assert_eq!(v.rounds.len(), 4);
        assert_eq!(v.rounds[0].deal.len(), 2);
        assert_eq!(v.rounds[0].position, Position::UnderTheGun);
        assert_eq!(v.rounds[1].board, 3);
        assert_eq!(
            v.rounds.iter().map(|r| r.board).sum::<usize>(),
            v.board_size
        );
    }

    #[test]
    fn omaha8_sides() {
        let v = Variant::omaha8();
        assert_eq!(v.sides, vec![Side::Hi, Side::Low8]);
        assert_eq!(v.hand_size, 4);
    }

    #[test]
    fn stud_deals_no_board() {
        let v = Variant::seven_stud(vec![Side::Hi]);
        v.validate().unwrap();
        assert_eq!(v.board_size, 0);
        assert_eq!(
            v.rounds.iter().map(|r| r.deal.len()).sum::<usize>(),
            v.hand_size
        );
    }

    #[test]
    fn empty_variant_rejected() {
        let v = Variant {
            name: "nope".to_string(),
            rounds: vec![],
            sides: vec![Side::Hi],
            hand_size: 0,
            board_size: 0,
        };
        assert_eq!(v.validate().unwrap_err(), ConfigError::NoRounds);
    }
}
