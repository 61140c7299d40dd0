use crate::cards::Holding;
use crate::{Chips, SeatIdx, Serial, MAX_SEATS};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Which blind a player still waits for before being dealt in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitKind {
    /// Just sat down: wait for the next hand to start.
    First,
    /// Came back owing a blind: enters late, paying up.
    Late,
    /// Chose to wait until the big blind reaches the seat naturally.
    Big,
}

/// A player's relationship to their seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SitState {
    Sitting,
    SittingOut,
    /// Playing this hand, sitting out once it ends.
    SitOutNextTurn,
    /// Asked to sit back in; takes effect when the engine processes it.
    SitRequested,
    WaitForBlind(WaitKind),
}

/// The blind a player owes (or has paid) this hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlindState {
    None,
    Small,
    Big,
    /// Big blind owed from late position after missing blinds.
    Late,
    /// Live big blind plus dead small.
    BigAndDead,
    Payed,
}

impl BlindState {
    pub fn owes(&self) -> bool {
        !matches!(self, BlindState::None | BlindState::Payed)
    }
}

/// What a sitting-out player let pass them by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MissedBlind {
    /// No blind history yet (fresh player).
    NotApplicable,
    Small,
    Big,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutoMuck {
    Never,
    Always,
    WinOnly,
    LoseOnly,
}

impl AutoMuck {
    pub fn mucks_on_win(&self) -> bool {
        matches!(self, AutoMuck::Always | AutoMuck::WinOnly)
    }

    pub fn mucks_on_lose(&self) -> bool {
        matches!(self, AutoMuck::Always | AutoMuck::LoseOnly)
    }
}

/// How the engine acts for a player when their turn comes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutoPlay {
    /// Wait for the remote client.
    Interactive,
    /// Check when free, fold when not. The timeout policy.
    CheckOrFold,
    /// Stay in cheaply: check when free, call when not.
    Bot,
}

bitflags! {
    /// Conceptual ways to filter players, used by the iterator helpers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PlayerFilter: u8 {
        /// No filtering: every seated player.
        const ALL = 0b1;
        /// Players who will be dealt into the next hand.
        const SITTING = 0b10;
        /// Players dealt into the current hand.
        const IN_HAND = 0b100;
        /// In the current hand and still able to win a pot.
        const NOT_FOLD = 0b1000;
        /// In the current hand and still able to act: not folded, not all-in.
        const IN_GAME = 0b10000;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub serial: Serial,
    pub seat: SeatIdx,
    pub money: Chips,
    /// Current-round live wager, swept into the pot between rounds.
    pub bet: Chips,
    /// Chips owed to the pot that never count toward matching a bet.
    pub dead: Chips,
    /// Queued rebuy, applied between hands.
    pub rebuy: Chips,
    pub buy_in_payed: bool,
    pub sit_state: SitState,
    /// Member of the current hand's rotation.
    pub playing: bool,
    pub fold: bool,
    pub all_in: bool,
    pub remove_next_turn: bool,
    /// Acted at least once this betting round.
    pub talked_once: bool,
    /// Issued any discretionary action this hand.
    pub action_issued: bool,
    pub blind: BlindState,
    pub ante_payed: bool,
    pub missed_blind: Option<MissedBlind>,
    pub auto_play: AutoPlay,
    pub auto_blind_ante: bool,
    pub auto_muck: AutoMuck,
    pub hand: Holding,
    /// Highest side pot this player contributed to, set as pots form.
    pub side_pot_index: usize,
}

impl Player {
    pub fn new(serial: Serial, seat: SeatIdx) -> Self {
        Self {
            serial,
            seat,
            money: 0,
            bet: 0,
            dead: 0,
            rebuy: 0,
            buy_in_payed: false,
            sit_state: SitState::SittingOut,
            playing: false,
            fold: false,
            all_in: false,
            remove_next_turn: false,
            talked_once: false,
            action_issued: false,
            blind: BlindState::None,
            ante_payed: false,
            missed_blind: Some(MissedBlind::NotApplicable),
            auto_play: AutoPlay::Interactive,
            auto_blind_ante: false,
            auto_muck: AutoMuck::Never,
            hand: Holding::default(),
            side_pot_index: 0,
        }
    }

    /// Dealt into the next hand: in the seat and not waiting on anything.
    pub fn is_sitting(&self) -> bool {
        matches!(self.sit_state, SitState::Sitting | SitState::SitOutNextTurn)
    }

    pub fn is_sit_out(&self) -> bool {
        !self.is_sitting()
    }

    pub fn is_in_hand(&self) -> bool {
        self.playing
    }

    pub fn is_not_fold(&self) -> bool {
        self.playing && !self.fold
    }

    /// Still has decisions to make this hand.
    pub fn is_in_game(&self) -> bool {
        self.playing && !self.fold && !self.all_in
    }

    pub fn is_broke(&self) -> bool {
        self.money <= 0
    }

    /// Move up to `amount` from the stack into the live bet. Going to zero
    /// makes the player all-in. Returns what actually moved.
    pub fn money_to_bet(&mut self, amount: Chips) -> Chips {
        let moved = amount.min(self.money);
        self.money -= moved;
        self.bet += moved;
        if self.money == 0 && moved > 0 {
            self.all_in = true;
        }
        moved
    }

    /// Same, but the chips go straight to the dead pile.
    pub fn money_to_dead(&mut self, amount: Chips) -> Chips {
        let moved = amount.min(self.money);
        self.money -= moved;
        self.dead += moved;
        if self.money == 0 && moved > 0 {
            self.all_in = true;
        }
        moved
    }

    /// Per-hand state back to neutral. Seat, money, sit state, blinds
    /// bookkeeping survive.
    pub fn reset_for_hand(&mut self) {
        self.bet = 0;
        self.dead = 0;
        self.playing = false;
        self.fold = false;
        self.all_in = false;
        self.talked_once = false;
        self.action_issued = false;
        self.blind = BlindState::None;
        self.ante_payed = false;
        self.hand.clear();
        self.side_pot_index = 0;
    }
}

/// The seat map. Seat indexes are positions in the table's deterministic
/// permutation; this array is sized for the largest layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Players {
    seats: [Option<Player>; MAX_SEATS],
}

impl Players {
    pub fn get(&self, serial: Serial) -> Option<&Player> {
        self.iter(PlayerFilter::ALL)
            .map(|(_, p)| p)
            .find(|p| p.serial == serial)
    }

    pub fn get_mut(&mut self, serial: Serial) -> Option<&mut Player> {
        self.iter_mut(PlayerFilter::ALL)
            .map(|(_, p)| p)
            .find(|p| p.serial == serial)
    }

    pub fn at_seat(&self, seat: SeatIdx) -> Option<&Player> {
        self.seats.get(seat).and_then(|p| p.as_ref())
    }

    pub fn add(&mut self, player: Player) {
        let seat = player.seat;
        assert!(self.seats[seat].is_none(), "seat {} already taken", seat);
        self.seats[seat] = Some(player);
    }

    pub fn remove(&mut self, serial: Serial) -> Option<Player> {
        for seat in self.seats.iter_mut() {
            if seat.as_ref().map_or(false, |p| p.serial == serial) {
                return seat.take();
            }
        }
        None
    }

    pub fn occupied_seats(&self) -> Vec<SeatIdx> {
        self.iter(PlayerFilter::ALL).map(|(i, _)| i).collect()
    }

    fn matches(player: &Player, filters: PlayerFilter) -> bool {
        filters.contains(PlayerFilter::ALL)
            || filters.contains(PlayerFilter::SITTING) && player.is_sitting()
            || filters.contains(PlayerFilter::IN_HAND) && player.is_in_hand()
            || filters.contains(PlayerFilter::NOT_FOLD) && player.is_not_fold()
            || filters.contains(PlayerFilter::IN_GAME) && player.is_in_game()
    }

    pub fn iter(&self, filters: PlayerFilter) -> impl Iterator<Item = (SeatIdx, &Player)> {
        self.seats
            .iter()
            .enumerate()
            .filter_map(|(idx, p)| p.as_ref().map(|pp| (idx, pp)))
            .filter(move |(_, player)| Self::matches(player, filters))
    }

    pub fn iter_mut(
        &mut self,
        filters: PlayerFilter,
    ) -> impl Iterator<Item = (SeatIdx, &mut Player)> {
        self.seats
            .iter_mut()
            .enumerate()
            .filter_map(|(idx, p)| p.as_mut().map(|pp| (idx, pp)))
            .filter(move |(_, player)| Self::matches(player, filters))
    }

    pub fn count(&self, filters: PlayerFilter) -> usize {
        self.iter(filters).count()
    }

    /// Serials passing the filter, in seat order.
    pub fn serials(&self, filters: PlayerFilter) -> Vec<Serial> {
        self.iter(filters).map(|(_, p)| p.serial).collect()
    }
}
