//! The table engine: one mutable [`Game`] drives the whole hand lifecycle
//! (blinds and antes, data-driven betting rounds, showdown, next-hand
//! preparation) one synchronous call at a time. Illegal or mistimed calls
//! return false and change nothing; a lagging client can never wedge the
//! table. Invariant violations panic: correctness over liveness.

use crate::bet::{bet_limits, BetContext, BetLimits, PossibleAction};
use crate::blinds;
use crate::cards::deck::{Deck, SeededShuffler, Shuffler};
use crate::cards::{Face, Holding};
use crate::eval::{HandEvaluator, Side, StandardEvaluator};
use crate::history::{Event, History};
use crate::player::{
    AutoMuck, AutoPlay, BlindState, MissedBlind, Player, PlayerFilter, Players, SitState, WaitKind,
};
use crate::pot::{SidePots, SweepEntry};
use crate::seats::{best_seat, index_add, seat_permutation};
use crate::showdown::{self, NoRake, RakeModel, ShowdownContext, Stage, WinCondition};
use crate::structure::{BetBound, BettingStructure, NO_CAP};
use crate::variant::{Position, Variant};
use crate::{Chips, ConfigError, JoinError, SeatIdx, Serial};
use std::collections::BTreeMap;

const DEFAULT_MAX_PLAYERS: usize = 10;

/// Where the hand lifecycle stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    BlindAnte,
    Round(usize),
    Muck,
    End,
}

pub struct Game {
    variant: Variant,
    structure: BettingStructure,
    max_players: usize,
    is_open: bool,
    pub is_tournament: bool,
    level: usize,

    pub(crate) players: Players,
    dealer_seat: Option<SeatIdx>,

    hand_serial: u32,
    hands_count: u32,
    phase: Phase,
    /// This hand's rotation: serials in seat order. Stable for the whole
    /// hand; dropped players keep their slot with `playing` cleared.
    player_list: Vec<Serial>,
    /// Index into `player_list`.
    dealer: usize,
    bb_index: Option<usize>,
    /// Whose turn it is (index into `player_list`) during betting rounds.
    position: usize,
    current_round: usize,

    /// Blind-ante bookkeeping: ask order and progress through it.
    blind_order: Vec<usize>,
    blind_pos: usize,
    last_requested: Option<Serial>,

    round_cap_left: u8,
    /// Largest raise increment this round; the min-raise bar.
    last_increment: Chips,
    /// A short all-in froze raising for everyone until a full raise.
    raising_closed: bool,

    side_pots: SidePots,
    uncalled: Chips,
    uncalled_serial: Option<Serial>,
    winners: Vec<Serial>,
    side2winners: BTreeMap<Side, Vec<Serial>>,
    serial2rake: BTreeMap<Serial, Chips>,
    showdown_stack: Vec<Stage>,
    win_condition: WinCondition,
    muck_pending: Vec<Serial>,
    skipped_betting: bool,
    canceled: bool,

    board: Holding,
    deck: Deck,
    shuffler: Box<dyn Shuffler>,
    evaluator: Box<dyn HandEvaluator>,
    rake: Box<dyn RakeModel>,
    history: History,
    /// Authoritative server when true; a replaying client drives the same
    /// machine with is_directing false and lets the server decide outcomes.
    pub is_directing: bool,
}

impl Game {
    pub fn new(variant: Variant, structure: BettingStructure) -> Result<Self, ConfigError> {
        variant.validate()?;
        structure.validate()?;
        Ok(Self {
            variant,
            structure,
            max_players: DEFAULT_MAX_PLAYERS,
            is_open: true,
            is_tournament: false,
            level: 0,
            players: Players::default(),
            dealer_seat: None,
            hand_serial: 0,
            hands_count: 0,
            phase: Phase::Idle,
            player_list: vec![],
            dealer: 0,
            bb_index: None,
            position: 0,
            current_round: 0,
            blind_order: vec![],
            blind_pos: 0,
            last_requested: None,
            round_cap_left: NO_CAP,
            last_increment: 0,
            raising_closed: false,
            side_pots: SidePots::default(),
            uncalled: 0,
            uncalled_serial: None,
            winners: vec![],
            side2winners: BTreeMap::new(),
            serial2rake: BTreeMap::new(),
            showdown_stack: vec![],
            win_condition: WinCondition::Regular,
            muck_pending: vec![],
            skipped_betting: false,
            canceled: false,
            board: Holding::default(),
            deck: Deck::predetermined(vec![]),
            shuffler: Box::new(SeededShuffler),
            evaluator: Box::new(StandardEvaluator),
            rake: Box::new(NoRake),
            history: History::default(),
            is_directing: true,
        })
    }

    // ------------------------------------------------------------------
    // configuration surface (legal only between hands)

    pub fn is_running(&self) -> bool {
        !matches!(self.phase, Phase::Idle)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn set_variant(&mut self, variant: Variant) -> Result<(), ConfigError> {
        if self.is_running() {
            return Err(ConfigError::EngineRunning);
        }
        variant.validate()?;
        self.variant = variant;
        Ok(())
    }

    pub fn set_betting_structure(&mut self, structure: BettingStructure) -> Result<(), ConfigError> {
        if self.is_running() {
            return Err(ConfigError::EngineRunning);
        }
        structure.validate()?;
        self.structure = structure;
        Ok(())
    }

    pub fn set_max_players(&mut self, n: usize) -> Result<(), ConfigError> {
        if self.is_running() {
            return Err(ConfigError::EngineRunning);
        }
        let permutation = seat_permutation(n).ok_or(ConfigError::BadMaxPlayers)?;
        if self
            .players
            .occupied_seats()
            .iter()
            .any(|s| !permutation.contains(s))
        {
            return Err(ConfigError::BadMaxPlayers);
        }
        self.max_players = n;
        Ok(())
    }

    pub fn set_level(&mut self, level: usize) {
        if !self.is_running() {
            self.level = level;
        }
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn set_shuffler(&mut self, shuffler: Box<dyn Shuffler>) {
        self.shuffler = shuffler;
    }

    pub fn set_evaluator(&mut self, evaluator: Box<dyn HandEvaluator>) {
        self.evaluator = evaluator;
    }

    pub fn set_rake(&mut self, rake: Box<dyn RakeModel>) {
        self.rake = rake;
    }

    pub fn open(&mut self) {
        self.is_open = true;
    }

    pub fn close(&mut self) {
        self.is_open = false;
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Only before any hand has started, and only onto a seated player.
    pub fn set_dealer(&mut self, seat: SeatIdx) -> bool {
        if self.is_running() || self.players.at_seat(seat).is_none() {
            return false;
        }
        self.dealer_seat = Some(seat);
        true
    }

    /// Rearrange listed players onto listed seats. All-or-nothing.
    pub fn set_seats(&mut self, assignments: &[(Serial, SeatIdx)]) -> bool {
        if self.is_running() {
            return false;
        }
        let permutation = match seat_permutation(self.max_players) {
            Some(p) => p,
            None => return false,
        };
        let mut taken: Vec<SeatIdx> = self
            .players
            .iter(PlayerFilter::ALL)
            .filter(|(_, p)| !assignments.iter().any(|(s, _)| *s == p.serial))
            .map(|(seat, _)| seat)
            .collect();
        for (serial, seat) in assignments {
            if self.players.get(*serial).is_none()
                || !permutation.contains(seat)
                || taken.contains(seat)
            {
                return false;
            }
            taken.push(*seat);
        }
        for (serial, seat) in assignments {
            let mut p = self.players.remove(*serial).unwrap();
            p.seat = *seat;
            self.players.add(p);
        }
        true
    }

    // ------------------------------------------------------------------
    // player population

    pub fn seats_left(&self) -> Vec<SeatIdx> {
        let occupied = self.players.occupied_seats();
        seat_permutation(self.max_players)
            .map(|perm| {
                perm.iter()
                    .copied()
                    .filter(|s| !occupied.contains(s))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn add_player(&mut self, serial: Serial, seat: Option<SeatIdx>) -> Result<SeatIdx, JoinError> {
        if !self.is_open {
            return Err(JoinError::Closed);
        }
        if self.players.get(serial).is_some() {
            return Err(JoinError::AlreadyAdded);
        }
        let permutation = seat_permutation(self.max_players).ok_or(JoinError::NoSeat)?;
        let occupied = self.players.occupied_seats();
        let seat = match seat {
            Some(seat) => {
                if !permutation.contains(&seat) {
                    return Err(JoinError::InvalidSeat);
                }
                if occupied.contains(&seat) {
                    return Err(JoinError::SeatTaken);
                }
                seat
            }
            None => {
                let dealer = if self.is_running() { self.dealer_seat } else { None };
                best_seat(permutation, &occupied, dealer).ok_or(JoinError::NoSeat)?
            }
        };
        self.players.add(Player::new(serial, seat));
        if self.dealer_seat.is_none() {
            self.dealer_seat = Some(seat);
        }
        Ok(seat)
    }

    /// Queue a removal while the player is in a hand; immediate otherwise.
    /// Returns true when the player left right away.
    pub fn remove_player(&mut self, serial: Serial) -> bool {
        let playing = match self.players.get(serial) {
            Some(p) => p.is_in_hand() && self.is_running(),
            None => return false,
        };
        if playing {
            let p = self.players.get_mut(serial).unwrap();
            p.remove_next_turn = true;
            p.sit_state = SitState::SitOutNextTurn;
            false
        } else {
            if let Some(p) = self.players.remove(serial) {
                self.history.push(Event::Leave {
                    seats: vec![(serial, p.seat)],
                });
            }
            true
        }
    }

    pub fn pay_buy_in(&mut self, serial: Serial, amount: Chips) -> bool {
        let (min, max) = (self.structure.buy_in, self.structure.max_buy_in);
        let bypass = self.is_tournament;
        match self.players.get_mut(serial) {
            Some(p) if !p.buy_in_payed && (bypass || (amount >= min && amount <= max)) => {
                p.money = amount;
                p.buy_in_payed = true;
                true
            }
            _ => false,
        }
    }

    pub fn rebuy(&mut self, serial: Serial, amount: Chips) -> bool {
        let max = self.structure.max_buy_in;
        let playing = self.is_running()
            && self
                .players
                .get(serial)
                .map_or(false, |p| p.is_in_hand());
        match self.players.get_mut(serial) {
            Some(p) if p.buy_in_payed && amount > 0 && p.money + p.rebuy + amount <= max => {
                if playing {
                    p.rebuy += amount;
                } else {
                    p.money += amount;
                    self.history.push(Event::Rebuy { serial, amount });
                }
                true
            }
            _ => false,
        }
    }

    pub fn sit(&mut self, serial: Serial) -> bool {
        let running = self.is_running();
        match self.players.get_mut(serial) {
            Some(p) if p.buy_in_payed && p.money > 0 && p.is_sit_out() => {
                p.sit_state = if running {
                    match p.missed_blind {
                        Some(MissedBlind::Small) | Some(MissedBlind::Big) => {
                            SitState::WaitForBlind(WaitKind::Late)
                        }
                        _ => SitState::WaitForBlind(WaitKind::First),
                    }
                } else {
                    SitState::Sitting
                };
                true
            }
            _ => false,
        }
    }

    pub fn sit_out_next_turn(&mut self, serial: Serial) -> bool {
        let in_hand = self
            .players
            .get(serial)
            .map_or(false, |p| p.is_in_hand() && self.is_running());
        match self.players.get_mut(serial) {
            Some(p) if p.is_sitting() => {
                // between hands there is no turn to wait out
                p.sit_state = if in_hand {
                    SitState::SitOutNextTurn
                } else {
                    SitState::SittingOut
                };
                true
            }
            _ => false,
        }
    }

    pub fn sit_out(&mut self, serial: Serial) -> bool {
        let in_hand = self
            .players
            .get(serial)
            .map_or(false, |p| p.is_in_hand() && self.is_running());
        if !in_hand {
            return match self.players.get_mut(serial) {
                Some(p) if p.is_sitting() => {
                    p.sit_state = SitState::SittingOut;
                    self.history.push(Event::SitOut { serial });
                    true
                }
                _ => false,
            };
        }
        match self.phase {
            Phase::BlindAnte => {
                if self.players.get(serial).unwrap().blind == BlindState::Payed {
                    // already in for this hand; leave when it ends
                    let p = self.players.get_mut(serial).unwrap();
                    p.sit_state = SitState::SitOutNextTurn;
                    self.history.push(Event::SitOut { serial });
                    return true;
                }
                // refusing the blind: out of this hand entirely
                let owed = {
                    let p = self.players.get_mut(serial).unwrap();
                    let owed = p.blind;
                    p.playing = false;
                    p.sit_state = SitState::SittingOut;
                    p.blind = BlindState::None;
                    owed
                };
                if let Some(missed) = match owed {
                    BlindState::Small => Some(MissedBlind::Small),
                    BlindState::Big | BlindState::Late | BlindState::BigAndDead => {
                        Some(MissedBlind::Big)
                    }
                    BlindState::None | BlindState::Payed => None,
                } {
                    self.players.get_mut(serial).unwrap().missed_blind = Some(missed);
                }
                self.history.push(Event::SitOut { serial });
                if self.players.count(PlayerFilter::IN_HAND) < 2 {
                    self.cancel_hand();
                } else {
                    if self.bb_index_serial() == Some(serial) {
                        self.bb_index = None;
                    }
                    self.run_blind_ante();
                }
                true
            }
            Phase::Round(_) => {
                let acted = if self.in_position(serial) {
                    self.fold(serial)
                } else if let Some(p) = self.players.get_mut(serial) {
                    // folds out of turn are honored when the turn arrives;
                    // here we simply mark the exit wish
                    p.sit_state = SitState::SitOutNextTurn;
                    true
                } else {
                    false
                };
                if acted {
                    if let Some(p) = self.players.get_mut(serial) {
                        p.sit_state = SitState::SitOutNextTurn;
                    }
                    self.history.push(Event::SitOut { serial });
                }
                acted
            }
            _ => false,
        }
    }

    pub fn come_back(&mut self, serial: Serial) -> bool {
        self.sit(serial)
    }

    pub fn auto_player(&mut self, serial: Serial) -> bool {
        if self.players.get(serial).is_none() {
            return false;
        }
        self.players.get_mut(serial).unwrap().auto_play = AutoPlay::CheckOrFold;
        if matches!(self.phase, Phase::Round(_)) {
            self.run_auto();
        }
        true
    }

    pub fn bot_player(&mut self, serial: Serial) -> bool {
        if self.players.get(serial).is_none() {
            return false;
        }
        {
            let p = self.players.get_mut(serial).unwrap();
            p.auto_play = AutoPlay::Bot;
            p.auto_blind_ante = true;
            p.auto_muck = AutoMuck::Always;
        }
        match self.phase {
            Phase::BlindAnte => self.run_blind_ante(),
            Phase::Round(_) => self.run_auto(),
            _ => {}
        }
        true
    }

    pub fn interactive_player(&mut self, serial: Serial) -> bool {
        match self.players.get_mut(serial) {
            Some(p) => {
                p.auto_play = AutoPlay::Interactive;
                p.auto_blind_ante = false;
                true
            }
            None => false,
        }
    }

    pub fn auto_blind_ante(&mut self, serial: Serial) -> bool {
        match self.players.get_mut(serial) {
            Some(p) => {
                p.auto_blind_ante = true;
                if matches!(self.phase, Phase::BlindAnte) {
                    self.run_blind_ante();
                }
                true
            }
            None => false,
        }
    }

    pub fn auto_muck(&mut self, serial: Serial, policy: AutoMuck) -> bool {
        match self.players.get_mut(serial) {
            Some(p) => {
                p.auto_muck = policy;
                true
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // hand lifecycle

    /// Start a hand if at least two players qualify; false means no hand
    /// started and the table stays idle.
    pub fn begin_hand(&mut self, hand_serial: u32) -> bool {
        if self.is_running() {
            return false;
        }
        // waiting-for-first players get in now
        for (_, p) in self.players.iter_mut(PlayerFilter::ALL) {
            if p.sit_state == SitState::WaitForBlind(WaitKind::First) {
                p.sit_state = SitState::Sitting;
            }
        }
        // seat order falls out of the seat-array iteration
        let list: Vec<Serial> = self
            .players
            .iter(PlayerFilter::ALL)
            .filter(|(_, p)| {
                p.buy_in_payed
                    && p.money > 0
                    && matches!(
                        p.sit_state,
                        SitState::Sitting
                            | SitState::SitOutNextTurn
                            | SitState::WaitForBlind(WaitKind::Big)
                            | SitState::WaitForBlind(WaitKind::Late)
                    )
            })
            .map(|(_, p)| p.serial)
            .collect();
        if list.len() < 2 {
            return false;
        }

        self.hand_serial = hand_serial;
        self.history.truncate();
        self.showdown_stack.clear();
        self.winners.clear();
        self.side2winners.clear();
        self.serial2rake.clear();
        self.uncalled = 0;
        self.uncalled_serial = None;
        self.side_pots = SidePots::default();
        self.board.clear();
        self.skipped_betting = false;
        self.canceled = false;
        self.muck_pending.clear();
        self.deck = self.shuffler.shuffle();

        for serial in &list {
            let p = self.players.get_mut(*serial).unwrap();
            p.reset_for_hand();
            p.playing = true;
            // once dealt in, the player has a blind history
            if p.missed_blind == Some(MissedBlind::NotApplicable) {
                p.missed_blind = None;
            }
        }
        self.player_list = list;

        // the dealer seat was rotated when the previous hand ended; find it
        // (or the next occupied seat past it) in this hand's rotation
        let dealer_seat = self.dealer_seat.unwrap_or(0);
        let seats: Vec<SeatIdx> = self
            .player_list
            .iter()
            .map(|s| self.players.get(*s).unwrap().seat)
            .collect();
        self.dealer = seats
            .iter()
            .position(|s| *s >= dealer_seat)
            .unwrap_or(0);
        if seats[self.dealer] != dealer_seat {
            // the seat emptied since: the button stays as close as possible
            self.dealer = if self.dealer == 0 { seats.len() - 1 } else { self.dealer - 1 };
        }
        let dealer_seat_now = seats[self.dealer];

        blinds::mark_missed(&mut self.players, dealer_seat_now);

        if self.structure.blinds.is_some()
            && !blinds::assign(&mut self.players, &self.player_list, self.dealer)
        {
            for serial in &self.player_list {
                self.players.get_mut(*serial).unwrap().playing = false;
            }
            self.player_list.clear();
            return false;
        }

        // waiting-for-big players who were not granted the big blind sit
        // this one out, penalty-free
        for serial in self.player_list.clone() {
            let p = self.players.get_mut(serial).unwrap();
            if p.sit_state == SitState::WaitForBlind(WaitKind::Big) && p.blind != BlindState::Big {
                p.playing = false;
            }
        }
        if self.players.count(PlayerFilter::IN_HAND) < 2 {
            for serial in &self.player_list {
                self.players.get_mut(*serial).unwrap().playing = false;
            }
            self.player_list.clear();
            return false;
        }

        self.bb_index = self
            .player_list
            .iter()
            .position(|s| self.players.get(*s).map_or(false, |p| p.blind == BlindState::Big));

        let serial2money: BTreeMap<Serial, Chips> = self
            .player_list
            .iter()
            .map(|s| (*s, self.players.get(*s).unwrap().money))
            .collect();
        self.history.push(Event::Game {
            level: self.level,
            hand_serial,
            hands_count: self.hands_count,
            time: self.hands_count,
            variant: self.variant.name.clone(),
            structure: self.structure.name.clone(),
            player_list: self.player_list.clone(),
            dealer: self.dealer,
            serial2money,
        });

        self.phase = Phase::BlindAnte;
        self.init_blind_ante();
        true
    }

    fn init_blind_ante(&mut self) {
        let n = self.player_list.len();
        // heads-up the dealer posts first; otherwise the seat to their left
        let start = if n == 2 { self.dealer } else { (self.dealer + 1) % n };
        self.blind_order = (0..n).map(|k| (start + k) % n).collect();
        self.blind_pos = 0;
        self.last_requested = None;
        self.run_blind_ante();
    }

    fn bb_index_serial(&self) -> Option<Serial> {
        self.bb_index.map(|i| self.player_list[i])
    }

    /// Walk the blind order, paying for auto players, stopping at the first
    /// player who must act for themselves.
    fn run_blind_ante(&mut self) {
        if !matches!(self.phase, Phase::BlindAnte) {
            return;
        }
        let ante = self.structure.ante(self.level);
        loop {
            let idx = match self.blind_order.get(self.blind_pos) {
                Some(i) => *i,
                None => {
                    self.blind_round_end();
                    return;
                }
            };
            let serial = self.player_list[idx];
            let (playing, needs_ante, needs_blind, auto) = {
                let p = self.players.get(serial).unwrap();
                (
                    p.is_in_hand(),
                    ante > 0 && !p.ante_payed,
                    p.blind.owes(),
                    p.auto_blind_ante,
                )
            };
            if !playing || (!needs_ante && !needs_blind) {
                self.blind_pos += 1;
                continue;
            }
            if auto {
                if needs_ante {
                    self.pay_ante(serial);
                }
                if needs_blind {
                    self.pay_blind(serial);
                }
                self.blind_pos += 1;
                continue;
            }
            if self.last_requested != Some(serial) {
                self.last_requested = Some(serial);
                self.history.push(Event::Position {
                    position: Some(idx),
                    serial: Some(serial),
                });
                if needs_ante {
                    self.history.push(Event::AnteRequest {
                        serial,
                        amount: ante,
                    });
                }
                if needs_blind {
                    let state = self.players.get(serial).unwrap().blind;
                    let (amount, dead) = blinds::blind_amounts(
                        state,
                        self.structure.small_blind(self.level),
                        self.structure.big_blind(self.level),
                    );
                    self.history.push(Event::BlindRequest {
                        serial,
                        amount,
                        dead,
                        state: blind_state_name(state).to_string(),
                    });
                }
            }
            return;
        }
    }

    fn blind_ante_turn(&self) -> Option<Serial> {
        if !matches!(self.phase, Phase::BlindAnte) {
            return None;
        }
        self.blind_order
            .get(self.blind_pos)
            .map(|i| self.player_list[*i])
    }

    fn pay_ante(&mut self, serial: Serial) {
        let ante = self.structure.ante(self.level);
        let p = self.players.get_mut(serial).unwrap();
        let paid = ante.min(p.money);
        p.money -= paid;
        if p.money == 0 && paid > 0 {
            p.all_in = true;
        }
        p.ante_payed = true;
        self.side_pots.add_dead(0, serial, paid);
        self.history.push(Event::Ante {
            serial,
            amount: paid,
        });
        if self.players.get(serial).unwrap().all_in {
            self.history.push(Event::AllIn { serial });
        }
    }

    fn pay_blind(&mut self, serial: Serial) {
        let small = self.structure.small_blind(self.level);
        let big = self.structure.big_blind(self.level);
        let (owed, owed_dead) = {
            let p = self.players.get(serial).unwrap();
            blinds::blind_amounts(p.blind, small, big)
        };
        let (paid, dead_paid, all_in) = {
            let p = self.players.get_mut(serial).unwrap();
            let paid = p.money_to_bet(owed);
            // the dead part never plays: straight to the pot
            let dead_paid = owed_dead.min(p.money);
            p.money -= dead_paid;
            if p.money == 0 && paid + dead_paid > 0 {
                p.all_in = true;
            }
            p.blind = BlindState::Payed;
            p.missed_blind = None;
            if matches!(p.sit_state, SitState::WaitForBlind(_)) {
                p.sit_state = SitState::Sitting;
            }
            (paid, dead_paid, p.all_in)
        };
        if dead_paid > 0 {
            self.side_pots.add_dead(0, serial, dead_paid);
        }
        self.history.push(Event::Blind {
            serial,
            amount: paid,
            dead: dead_paid,
        });
        if all_in {
            self.history.push(Event::AllIn { serial });
        }
    }

    /// External: post the owed blind (plus any owed ante first).
    pub fn blind(&mut self, serial: Serial) -> bool {
        if self.blind_ante_turn() != Some(serial) {
            return false;
        }
        if !self.players.get(serial).map_or(false, |p| p.blind.owes()) {
            return false;
        }
        if self.structure.ante(self.level) > 0
            && !self.players.get(serial).unwrap().ante_payed
        {
            self.pay_ante(serial);
        }
        self.pay_blind(serial);
        self.blind_pos += 1;
        self.last_requested = None;
        self.run_blind_ante();
        true
    }

    /// External: post the owed ante.
    pub fn ante(&mut self, serial: Serial) -> bool {
        if self.blind_ante_turn() != Some(serial) {
            return false;
        }
        let owes = self.structure.ante(self.level) > 0
            && !self.players.get(serial).map_or(true, |p| p.ante_payed);
        if !owes {
            return false;
        }
        self.pay_ante(serial);
        self.last_requested = None;
        self.run_blind_ante();
        true
    }

    /// Ask to be dealt in only when the big blind reaches this seat. During
    /// the blind round this frees the player from posting now, unless the
    /// hand cannot go on without them, in which case the wish is recorded
    /// but the obligation stands.
    pub fn wait_big_blind(&mut self, serial: Serial) -> bool {
        if self.blind_ante_turn() != Some(serial) {
            return false;
        }
        if !self.players.get(serial).map_or(false, |p| p.blind.owes()) {
            return false;
        }
        self.players.get_mut(serial).unwrap().sit_state = SitState::WaitForBlind(WaitKind::Big);
        let others_willing = self
            .players
            .iter(PlayerFilter::IN_HAND)
            .filter(|(_, p)| p.serial != serial)
            .count();
        if others_willing >= 2 {
            let p = self.players.get_mut(serial).unwrap();
            p.playing = false;
            p.blind = BlindState::None;
            if self.bb_index_serial() == Some(serial) {
                self.bb_index = None;
            }
            self.blind_pos += 1;
            self.last_requested = None;
            self.run_blind_ante();
        }
        true
    }

    /// Cancel during the blind round: everyone takes their chips back, the
    /// dealer stays put, the hand ends with no winners.
    fn cancel_hand(&mut self) {
        let refunds = self.side_pots.refund_all();
        for (serial, amount) in refunds {
            if let Some(p) = self.players.get_mut(serial) {
                p.money += amount;
            }
        }
        let mut lone: Option<(Serial, Chips)> = None;
        for (_, p) in self.players.iter_mut(PlayerFilter::IN_HAND) {
            let back = p.bet;
            p.money += back;
            p.bet = 0;
            p.dead = 0;
            p.all_in = false;
            lone = Some((p.serial, back));
        }
        self.canceled = true;
        self.winners.clear();
        self.showdown_stack.clear();
        if let Some((serial, amount)) = lone {
            self.history.push(Event::Canceled { serial, amount });
        }
        self.phase = Phase::End;
        self.history.push(Event::End { winners: vec![] });
    }

    fn blind_round_end(&mut self) {
        for (_, p) in self.players.iter_mut(PlayerFilter::IN_HAND) {
            p.talked_once = false;
        }
        // players felted by the ante alone close the ante pot before any
        // betting joins it
        let felted: Vec<Serial> = self
            .players
            .iter(PlayerFilter::IN_HAND)
            .filter(|(_, p)| p.all_in && p.bet == 0)
            .map(|(_, p)| p.serial)
            .collect();
        if !felted.is_empty() {
            let idx = self.side_pots.cap_open();
            for serial in felted {
                self.players.get_mut(serial).unwrap().side_pot_index = idx;
            }
        }
        self.init_round(0);
    }

    fn init_round(&mut self, round: usize) {
        self.current_round = round;
        self.phase = Phase::Round(round);
        let limits = self.structure.round_limits(round);
        self.round_cap_left = limits.cap;
        self.raising_closed = false;
        self.last_increment = if round == 0 {
            self.structure.big_blind(self.level)
        } else {
            0
        };
        for (_, p) in self.players.iter_mut(PlayerFilter::IN_GAME) {
            p.talked_once = false;
        }
        self.deal_round(round);

        if self.players.count(PlayerFilter::IN_GAME) <= 1 {
            // no betting possible: run the board out
            self.skipped_betting = true;
            self.end_betting_round();
            return;
        }
        match self.first_to_act(round) {
            Some(idx) => {
                self.position = idx;
                self.history.push(Event::Position {
                    position: Some(idx),
                    serial: Some(self.player_list[idx]),
                });
                self.run_auto();
            }
            None => {
                self.skipped_betting = true;
                self.end_betting_round();
            }
        }
    }

    fn deal_round(&mut self, round: usize) {
        let info = self.variant.rounds[round].clone();
        let n = self.player_list.len();
        let mut serial2hand: BTreeMap<Serial, Vec<_>> = BTreeMap::new();
        for k in 1..=n {
            let serial = self.player_list[(self.dealer + k) % n];
            if !self.players.get(serial).unwrap().is_not_fold() {
                continue;
            }
            for face in &info.deal {
                let card = match self.deck.draw() {
                    Ok(c) => c,
                    Err(_) => panic!(
                        "deck exhausted dealing {} to player {}",
                        info.name, serial
                    ),
                };
                self.players.get_mut(serial).unwrap().hand.push(card, *face);
            }
            if !info.deal.is_empty() {
                serial2hand.insert(serial, self.players.get(serial).unwrap().hand.cards());
            }
        }
        for _ in 0..info.board {
            let card = match self.deck.draw() {
                Ok(c) => c,
                Err(_) => panic!("deck exhausted dealing the {} board", info.name),
            };
            self.board.push(card, Face::Up);
        }
        self.history.push(Event::Round {
            name: info.name.clone(),
            board: self.board.cards(),
            serial2hand,
        });
    }

    fn first_to_act(&self, round: usize) -> Option<usize> {
        let in_game =
            |s: &Serial| self.players.get(*s).map_or(false, |p| p.is_in_game());
        match self.variant.rounds[round].position {
            Position::UnderTheGun => {
                let from = self.bb_index.unwrap_or(self.dealer);
                index_add(&self.player_list, from, 1, in_game)
            }
            Position::NextToDealer => index_add(&self.player_list, self.dealer, 1, in_game),
            Position::LowCard | Position::HighCard => {
                let high = matches!(self.variant.rounds[round].position, Position::HighCard);
                let n = self.player_list.len();
                let mut pick: Option<(usize, (u8, u8))> = None;
                for k in 1..=n {
                    let idx = (self.dealer + k) % n;
                    let serial = self.player_list[idx];
                    let p = self.players.get(serial).unwrap();
                    if !p.is_in_game() {
                        continue;
                    }
                    let key = p
                        .hand
                        .visible()
                        .iter()
                        .map(|c| (c.rank().value(), c.suit() as u8))
                        .max()
                        .unwrap_or((0, 0));
                    let better = match &pick {
                        None => true,
                        Some((_, best)) => {
                            if high {
                                key > *best
                            } else {
                                key < *best
                            }
                        }
                    };
                    if better {
                        pick = Some((idx, key));
                    }
                }
                pick.map(|(idx, _)| idx)
            }
        }
    }

    // ------------------------------------------------------------------
    // betting round controller

    pub fn highest_bet_not_fold(&self) -> Chips {
        self.players
            .iter(PlayerFilter::NOT_FOLD)
            .map(|(_, p)| p.bet)
            .max()
            .unwrap_or(0)
    }

    fn bets_on_table(&self) -> Chips {
        self.players
            .iter(PlayerFilter::IN_HAND)
            .map(|(_, p)| p.bet)
            .sum()
    }

    /// Captured pots plus everything still sitting in front of players.
    pub fn pot_amount(&self) -> Chips {
        self.side_pots.total() + self.bets_on_table()
    }

    pub fn in_position(&self, serial: Serial) -> bool {
        matches!(self.phase, Phase::Round(_))
            && self.player_list.get(self.position) == Some(&serial)
            && self.players.get(serial).map_or(false, |p| p.is_in_game())
    }

    pub fn serial_in_position(&self) -> Option<Serial> {
        match self.phase {
            Phase::Round(_) => self.player_list.get(self.position).copied(),
            Phase::BlindAnte => self.blind_ante_turn(),
            _ => None,
        }
    }

    pub fn bet_limits_for(&self, serial: Serial) -> BetLimits {
        if !self.in_position(serial) {
            return BetLimits::default();
        }
        let p = self.players.get(serial).unwrap();
        let limits = self.structure.round_limits(self.current_round);
        let ctx = BetContext {
            highest_bet: self.highest_bet_not_fold(),
            bet: p.bet,
            money: p.money,
            pot_and_bets: self.pot_amount(),
            last_increment: self.last_increment,
            big_blind: self.structure.big_blind(self.level),
            level: self.level,
            cap_left: if self.raising_closed { 0 } else { self.round_cap_left },
        };
        bet_limits(limits, &ctx)
    }

    pub fn possible_actions(&self, serial: Serial) -> Vec<PossibleAction> {
        if !self.in_position(serial) {
            return vec![];
        }
        let p = self.players.get(serial).unwrap();
        let highest = self.highest_bet_not_fold();
        let mut actions = vec![];
        if p.bet == highest {
            actions.push(PossibleAction::Check);
        } else {
            actions.push(PossibleAction::Call);
        }
        if self.round_cap_left > 0
            && !self.raising_closed
            && p.money > (highest - p.bet).max(0)
        {
            actions.push(PossibleAction::Raise);
        }
        actions.push(PossibleAction::Fold);
        actions
    }

    pub fn check(&mut self, serial: Serial) -> bool {
        if !self.in_position(serial) {
            return false;
        }
        if self.players.get(serial).unwrap().bet != self.highest_bet_not_fold() {
            return false;
        }
        {
            let p = self.players.get_mut(serial).unwrap();
            p.talked_once = true;
            p.action_issued = true;
        }
        self.history.push(Event::Check { serial });
        self.post_action();
        true
    }

    pub fn call(&mut self, serial: Serial) -> bool {
        if !self.in_position(serial) {
            return false;
        }
        let highest = self.highest_bet_not_fold();
        let to_call = {
            let p = self.players.get(serial).unwrap();
            highest - p.bet
        };
        if to_call <= 0 {
            return false;
        }
        let (amount, all_in) = {
            let p = self.players.get_mut(serial).unwrap();
            let amount = p.money_to_bet(to_call);
            p.talked_once = true;
            p.action_issued = true;
            (amount, p.all_in)
        };
        self.history.push(Event::Call { serial, amount });
        if all_in {
            self.history.push(Event::AllIn { serial });
        }
        self.post_action();
        true
    }

    pub fn fold(&mut self, serial: Serial) -> bool {
        if !self.in_position(serial) {
            return false;
        }
        {
            let p = self.players.get_mut(serial).unwrap();
            p.fold = true;
            p.talked_once = true;
            p.action_issued = true;
        }
        self.history.push(Event::Fold { serial });
        self.post_action();
        true
    }

    /// Call the current bet and raise `increment` more. The increment is
    /// clamped into the round's limits; a player too short to call at all
    /// simply calls all-in.
    pub fn call_n_raise(&mut self, serial: Serial, increment: Chips) -> bool {
        if !self.in_position(serial) {
            return false;
        }
        if self.round_cap_left == 0 || self.raising_closed {
            return false;
        }
        let highest = self.highest_bet_not_fold();
        let (bet, money) = {
            let p = self.players.get(serial).unwrap();
            (p.bet, p.money)
        };
        let to_call = (highest - bet).max(0);
        if money <= to_call {
            // not even a full call in the stack: this is a call
            return self.call(serial);
        }
        let limits = self.bet_limits_for(serial);
        let inc_min = (limits.min - to_call).max(0);
        let inc_max = (limits.max - to_call).max(0);
        let inc = if inc_max < inc_min {
            inc_max
        } else {
            increment.clamp(inc_min, inc_max)
        };
        let add = to_call + inc;
        let limits_cfg = self.structure.round_limits(self.current_round);
        let base_min = match limits_cfg.min {
            Some(BetBound::Amount(a)) => a,
            Some(BetBound::Big) => self.structure.big_blind(self.level),
            Some(BetBound::Pot) => self.pot_amount(),
            None => 0,
        };
        let required = limits_cfg
            .fixed_amount(self.level)
            .unwrap_or(base_min)
            .max(self.last_increment)
            .max(1);
        let (moved, all_in, new_bet) = {
            let p = self.players.get_mut(serial).unwrap();
            let moved = p.money_to_bet(add);
            p.talked_once = true;
            p.action_issued = true;
            (moved, p.all_in, p.bet)
        };
        let actual_increment = new_bet - highest;
        if actual_increment >= required {
            // a full raise re-opens the action for everyone
            self.last_increment = actual_increment;
            if self.round_cap_left != NO_CAP {
                self.round_cap_left -= 1;
            }
            self.raising_closed = false;
            for (_, p) in self.players.iter_mut(PlayerFilter::IN_GAME) {
                if p.serial != serial {
                    p.talked_once = false;
                }
            }
        } else if actual_increment > 0 {
            // short all-in: nobody gets to raise off the back of it
            self.raising_closed = true;
        }
        self.history.push(Event::Raise {
            serial,
            amount: moved,
        });
        if all_in {
            self.history.push(Event::AllIn { serial });
        }
        self.post_action();
        true
    }

    fn not_fold_count(&self) -> usize {
        self.players.count(PlayerFilter::NOT_FOLD)
    }

    /// The next in-game player who still owes the round an action.
    fn next_needing_action(&self) -> Option<usize> {
        let highest = self.highest_bet_not_fold();
        let n = self.player_list.len();
        for k in 1..=n {
            let idx = (self.position + k) % n;
            let serial = self.player_list[idx];
            if let Some(p) = self.players.get(serial) {
                if p.is_in_game() && (!p.talked_once || p.bet < highest) {
                    return Some(idx);
                }
            }
        }
        None
    }

    fn post_action(&mut self) {
        if self.not_fold_count() == 1 {
            self.win_condition = WinCondition::Fold;
            self.sweep_round();
            self.muck_state(WinCondition::Fold);
            return;
        }
        match self.next_needing_action() {
            Some(idx) => {
                self.position = idx;
                self.history.push(Event::Position {
                    position: Some(idx),
                    serial: Some(self.player_list[idx]),
                });
                self.run_auto();
            }
            None => self.end_betting_round(),
        }
    }

    /// Let auto and bot players act while it is their turn.
    fn run_auto(&mut self) {
        loop {
            if !matches!(self.phase, Phase::Round(_)) {
                return;
            }
            let serial = match self.player_list.get(self.position) {
                Some(s) => *s,
                None => return,
            };
            let auto = self.players.get(serial).map(|p| p.auto_play);
            let highest = self.highest_bet_not_fold();
            let bet = self.players.get(serial).map_or(0, |p| p.bet);
            let acted = match auto {
                Some(AutoPlay::CheckOrFold) => {
                    if bet == highest {
                        self.check(serial)
                    } else {
                        self.fold(serial)
                    }
                }
                Some(AutoPlay::Bot) => {
                    if bet == highest {
                        self.check(serial)
                    } else {
                        self.call(serial)
                    }
                }
                _ => return,
            };
            if !acted {
                return;
            }
        }
    }

    /// Sweep bets into the pots, note any uncalled overage, then either the
    /// next round, the all-in runout, or the showdown.
    fn end_betting_round(&mut self) {
        self.sweep_round();
        if self.current_round + 1 < self.variant.rounds.len() {
            if self.players.count(PlayerFilter::IN_GAME) <= 1 {
                self.skipped_betting = true;
                self.runout_and_muck();
            } else {
                self.init_round(self.current_round + 1);
            }
        } else {
            let cond = if self.skipped_betting {
                WinCondition::AllIn
            } else {
                WinCondition::Regular
            };
            self.muck_state(cond);
        }
    }

    /// Deal every remaining round's cards with no betting, then showdown.
    fn runout_and_muck(&mut self) {
        while self.current_round + 1 < self.variant.rounds.len() {
            self.current_round += 1;
            self.phase = Phase::Round(self.current_round);
            self.deal_round(self.current_round);
        }
        self.muck_state(WinCondition::AllIn);
    }

    fn sweep_round(&mut self) {
        // the lone deepest bet was not matched; remember the overage
        let mut bets: Vec<(Serial, Chips, bool)> = self
            .players
            .iter(PlayerFilter::IN_HAND)
            .map(|(_, p)| (p.serial, p.bet, p.is_not_fold()))
            .collect();
        bets.sort_by_key(|(_, bet, _)| std::cmp::Reverse(*bet));
        let top_not_fold = bets
            .iter()
            .filter(|(_, _, nf)| *nf)
            .map(|(s, b, _)| (*s, *b))
            .next();
        if let Some((serial, top)) = top_not_fold {
            let second = bets
                .iter()
                .filter(|(s, _, _)| *s != serial)
                .map(|(_, b, _)| *b)
                .max()
                .unwrap_or(0);
            if top > second {
                self.uncalled = top - second;
                self.uncalled_serial = Some(serial);
            } else {
                self.uncalled = 0;
                self.uncalled_serial = None;
            }
        }

        let entries: Vec<SweepEntry> = self
            .players
            .iter(PlayerFilter::IN_HAND)
            .filter(|(_, p)| p.bet > 0)
            .map(|(_, p)| SweepEntry {
                serial: p.serial,
                amount: p.bet,
                all_in: p.all_in,
            })
            .collect();
        if !entries.is_empty() {
            let indexes = self.side_pots.sweep(self.current_round, &entries);
            for (serial, idx) in indexes {
                self.players.get_mut(serial).unwrap().side_pot_index = idx;
            }
        }
        for (_, p) in self.players.iter_mut(PlayerFilter::IN_HAND) {
            p.bet = 0;
        }
    }

    // ------------------------------------------------------------------
    // showdown & end of hand

    fn muck_state(&mut self, cond: WinCondition) {
        self.win_condition = cond;
        let dist = showdown::distribute(ShowdownContext {
            players: &mut self.players,
            player_list: &self.player_list,
            dealer: self.dealer,
            side_pots: &self.side_pots,
            uncalled: self.uncalled,
            uncalled_serial: self.uncalled_serial,
            sides: &self.variant.sides,
            evaluator: self.evaluator.as_ref(),
            board: &self.board.cards(),
            rake: self.rake.as_ref(),
            is_tournament: self.is_tournament,
            win_condition: cond,
        });
        self.winners = dist.winners;
        self.side2winners = dist.side2winners;
        self.serial2rake = dist.serial2rake;
        self.showdown_stack = dist.stack;
        self.history.push(Event::ShowdownStack {
            stack: self.showdown_stack.clone(),
        });

        // card visibility per the win condition and each player's policy
        let muckers = showdown::auto_muckable(&self.players, &self.winners, cond);
        self.muck_pending.clear();
        let not_fold = self.players.serials(PlayerFilter::NOT_FOLD);
        for serial in not_fold {
            let won = self.winners.contains(&serial);
            let must_show = match cond {
                WinCondition::AllIn => true,
                WinCondition::Regular => won,
                WinCondition::Fold => false,
            };
            if must_show {
                self.players
                    .get_mut(serial)
                    .unwrap()
                    .hand
                    .set_all(Face::Up);
            } else if !muckers.contains(&serial) {
                self.muck_pending.push(serial);
            }
        }
        if self.muck_pending.is_empty() {
            self.end_state();
        } else {
            self.phase = Phase::Muck;
        }
    }

    /// A pending player chooses to reveal or muck.
    pub fn muck(&mut self, serial: Serial, reveal: bool) -> bool {
        if !matches!(self.phase, Phase::Muck) {
            return false;
        }
        match self.muck_pending.iter().position(|s| *s == serial) {
            Some(i) => {
                self.muck_pending.remove(i);
                if reveal {
                    self.players
                        .get_mut(serial)
                        .unwrap()
                        .hand
                        .set_all(Face::Up);
                }
                if self.muck_pending.is_empty() {
                    self.end_state();
                }
                true
            }
            None => false,
        }
    }

    fn end_state(&mut self) {
        self.phase = Phase::End;
        self.history.push(Event::End {
            winners: self.winners.clone(),
        });
    }

    /// Between hands: rotate the button, apply queued rebuys and removals,
    /// settle sit-out wishes, and return to Idle.
    pub fn end_hand(&mut self) -> bool {
        if !matches!(self.phase, Phase::End) {
            return false;
        }
        if !self.canceled && !self.player_list.is_empty() {
            // the button moves to the next player who is not ducking blinds
            let next = index_add(&self.player_list, self.dealer, 1, |s| {
                self.players
                    .get(*s)
                    .map_or(false, |p| !matches!(p.missed_blind, Some(MissedBlind::Small) | Some(MissedBlind::Big)))
            })
            .unwrap_or((self.dealer + 1) % self.player_list.len());
            self.dealer_seat = self.players.get(self.player_list[next]).map(|p| p.seat);
        }

        let mut leaving: Vec<(Serial, SeatIdx)> = vec![];
        let serials: Vec<Serial> = self.players.serials(PlayerFilter::ALL);
        for serial in serials {
            let p = self.players.get_mut(serial).unwrap();
            p.playing = false;
            if p.rebuy > 0 {
                let amount = p.rebuy;
                p.money += amount;
                p.rebuy = 0;
                self.history.push(Event::Rebuy { serial, amount });
            }
            let p = self.players.get_mut(serial).unwrap();
            if p.remove_next_turn {
                leaving.push((serial, p.seat));
                continue;
            }
            if p.sit_state == SitState::SitOutNextTurn {
                p.sit_state = SitState::SittingOut;
            }
            if p.money <= 0 && !self.is_tournament && p.is_sitting() {
                p.sit_state = SitState::SittingOut;
            }
        }
        if !leaving.is_empty() {
            for (serial, _) in &leaving {
                self.players.remove(*serial);
            }
            self.history.push(Event::Leave { seats: leaving });
        }
        self.player_list.clear();
        self.bb_index = None;
        self.hands_count += 1;
        self.phase = Phase::Idle;
        true
    }

    // ------------------------------------------------------------------
    // queries

    pub fn pots(&self) -> &SidePots {
        &self.side_pots
    }

    pub fn winners(&self) -> &[Serial] {
        &self.winners
    }

    pub fn side_winners(&self, side: Side) -> &[Serial] {
        self.side2winners.get(&side).map_or(&[], |v| v.as_slice())
    }

    pub fn showdown_stack(&self) -> &[Stage] {
        &self.showdown_stack
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn rake_contributions(&self) -> &BTreeMap<Serial, Chips> {
        &self.serial2rake
    }

    pub fn board(&self) -> &Holding {
        &self.board
    }

    pub fn uncalled(&self) -> (Chips, Option<Serial>) {
        (self.uncalled, self.uncalled_serial)
    }

    pub fn win_condition(&self) -> WinCondition {
        self.win_condition
    }

    pub fn hand_serial(&self) -> u32 {
        self.hand_serial
    }

    pub fn hands_count(&self) -> u32 {
        self.hands_count
    }

    pub fn dealer_seat(&self) -> Option<SeatIdx> {
        self.dealer_seat
    }

    pub fn player_list(&self) -> &[Serial] {
        &self.player_list
    }

    pub fn player(&self, serial: Serial) -> Option<&Player> {
        self.players.get(serial)
    }

    pub fn money_map(&self) -> BTreeMap<Serial, Chips> {
        self.players
            .iter(PlayerFilter::ALL)
            .map(|(_, p)| (p.serial, p.money))
            .collect()
    }

    pub fn serials_sitting(&self) -> Vec<Serial> {
        self.players.serials(PlayerFilter::SITTING)
    }

    pub fn serials_in_game(&self) -> Vec<Serial> {
        self.players.serials(PlayerFilter::IN_GAME)
    }

    pub fn serials_not_fold(&self) -> Vec<Serial> {
        self.players.serials(PlayerFilter::NOT_FOLD)
    }
}

fn blind_state_name(state: BlindState) -> &'static str {
    match state {
        BlindState::None => "none",
        BlindState::Small => "small",
        BlindState::Big => "big",
        BlindState::Late => "late",
        BlindState::BigAndDead => "big_and_dead",
        BlindState::Payed => "payed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::cards_from_str;
    use crate::cards::deck::PredeterminedDecks;
    use crate::showdown::PercentRake;

    fn game(small: Chips, big: Chips, buy_min: Chips, buy_max: Chips) -> Game {
        Game::new(
            Variant::holdem(),
            BettingStructure::no_limit(small, big, buy_min, buy_max),
        )
        .unwrap()
    }

    fn seat_all(game: &mut Game, players: &[(Serial, SeatIdx, Chips)]) {
        for (serial, seat, money) in players {
            game.add_player(*serial, Some(*seat)).unwrap();
            assert!(game.pay_buy_in(*serial, game.structure.buy_in));
            game.players.get_mut(*serial).unwrap().money = *money;
            assert!(game.sit(*serial));
        }
    }

    fn total_money(game: &Game) -> Chips {
        game.players
            .iter(PlayerFilter::ALL)
            .map(|(_, p)| p.money + p.bet + p.rebuy)
            .sum::<Chips>()
            + game.pots().total()
    }

    #[test]
    fn seats_are_deterministic() {
        let mut g = game(5, 10, 100, 1000);
        g.set_max_players(3).unwrap();
        assert_eq!(g.seats_left(), vec![2, 7, 5]);
        g.add_player(1, Some(2)).unwrap();
        g.add_player(2, Some(5)).unwrap();
        assert_eq!(g.seats_left(), vec![7]);
        assert!(g.remove_player(2));
        assert_eq!(g.seats_left(), vec![7, 5]);
        assert_eq!(g.add_player(3, None).unwrap(), 7);
    }

    #[test]
    fn add_player_rejections() {
        let mut g = game(5, 10, 100, 1000);
        g.set_max_players(2).unwrap();
        g.add_player(1, Some(2)).unwrap();
        assert_eq!(g.add_player(1, Some(7)).unwrap_err(), JoinError::AlreadyAdded);
        assert_eq!(g.add_player(2, Some(3)).unwrap_err(), JoinError::InvalidSeat);
        assert_eq!(g.add_player(2, Some(2)).unwrap_err(), JoinError::SeatTaken);
        g.add_player(2, None).unwrap();
        assert_eq!(g.add_player(3, None).unwrap_err(), JoinError::NoSeat);
        g.close();
        assert_eq!(g.add_player(4, Some(7)).unwrap_err(), JoinError::Closed);
    }

    #[test]
    fn buy_in_bounds() {
        let mut g = game(5, 10, 100, 1000);
        g.add_player(1, Some(2)).unwrap();
        assert!(!g.pay_buy_in(1, 50));
        assert!(!g.pay_buy_in(1, 2000));
        assert!(g.pay_buy_in(1, 500));
        assert!(!g.pay_buy_in(1, 500)); // only once
        assert_eq!(g.player(1).unwrap().money, 500);
    }

    #[test]
    fn tournament_buy_in_bypasses_bounds() {
        let mut g = game(5, 10, 100, 1000);
        g.is_tournament = true;
        g.add_player(1, Some(2)).unwrap();
        assert!(g.pay_buy_in(1, 5000));
    }

    #[test]
    fn cannot_begin_short_handed() {
        let mut g = game(5, 10, 100, 1000);
        seat_all(&mut g, &[(1, 2, 100)]);
        assert!(!g.begin_hand(1));
        assert_eq!(g.phase(), Phase::Idle);
    }

    /// Heads-up the dealer owes the small blind, posts first, and acts
    /// first before the flop.
    #[test]
    fn heads_up_blind_order() {
        let mut g = game(500, 1000, 1000, 100_000);
        seat_all(&mut g, &[(1, 2, 1600), (2, 7, 1600)]);
        assert!(g.begin_hand(1));
        assert_eq!(g.phase(), Phase::BlindAnte);
        // player 1 sat first, holds the button, owes the small
        assert_eq!(g.serial_in_position(), Some(1));
        assert!(!g.blind(2));
        assert!(g.blind(1));
        assert_eq!(g.player(1).unwrap().bet, 500);
        assert_eq!(g.serial_in_position(), Some(2));
        assert!(g.blind(2));
        assert_eq!(g.player(2).unwrap().bet, 1000);
        assert_eq!(g.phase(), Phase::Round(0));
        // small blind / dealer speaks first pre-flop
        assert_eq!(g.serial_in_position(), Some(1));
    }

    #[test]
    fn big_blind_can_raise_after_limp() {
        let mut g = game(5, 10, 100, 1000);
        seat_all(&mut g, &[(1, 2, 100), (2, 7, 100)]);
        g.auto_blind_ante(1);
        g.auto_blind_ante(2);
        assert!(g.begin_hand(1));
        assert_eq!(g.phase(), Phase::Round(0));
        assert!(g.call(1));
        // the big blind may still raise even though everyone has matched
        assert!(g.possible_actions(2).contains(&PossibleAction::Raise));
        assert!(g.call_n_raise(2, 20));
        assert_eq!(g.player(2).unwrap().bet, 30);
        assert!(g.call(1));
        assert_eq!(g.phase(), Phase::Round(1));
    }

    /// Scenario: heads-up, big blind 1000/small 500. The big blind can only
    /// cover 400 and is all-in on the blind; the small's extra 100 comes
    /// back uncalled, all cards run out, and the 5% rake comes off the
    /// called 800.
    #[test]
    fn two_player_all_in_blind() {
        let mut g = game(500, 1000, 1000, 100_000);
        g.set_max_players(2).unwrap();
        g.set_rake(Box::new(PercentRake::new(5)));
        g.set_shuffler(Box::new(PredeterminedDecks::single(cards_from_str(
            "8sAs3h6d4sQs6s6hAh",
        ))));
        seat_all(&mut g, &[(1, 2, 400), (2, 7, 1600)]);
        // make player 2 the dealer so they owe the small
        assert!(g.set_dealer(7));
        g.auto_blind_ante(1);
        g.auto_blind_ante(2);
        assert!(g.begin_hand(1));

        // betting is impossible, the board ran out and the hand resolved
        assert_eq!(g.phase(), Phase::End);
        assert_eq!(g.uncalled(), (100, Some(2)));
        assert_eq!(g.win_condition(), WinCondition::AllIn);
        let board = g.board().cards();
        assert_eq!(board, cards_from_str("4sQs6s6hAh"));
        assert_eq!(g.player(1).unwrap().hand.cards(), cards_from_str("8sAs"));
        // spade flush for the short stack: 800 called pot minus 40 rake
        assert_eq!(g.winners(), &[1]);
        assert_eq!(g.player(1).unwrap().money, 400 + 400 - 40);
        assert_eq!(g.player(2).unwrap().money, 1600 - 400);
        assert_eq!(g.rake_contributions()[&1], 20);
        assert_eq!(g.rake_contributions()[&2], 20);
        match &g.showdown_stack()[1] {
            Stage::Uncalled { serial, amount } => {
                assert_eq!((*serial, *amount), (2, 100));
            }
            other => panic!("expected the uncalled return, got {:?}", other),
        }
    }

    /// Scenario: five players, stacks 50/10/10/200/10, everybody all-in
    /// pre-flop. Three side pots form and each player is tied to the
    /// highest pot they reached.
    #[test]
    fn five_way_all_in_side_pots() {
        let mut g = game(2, 4, 40, 400);
        g.set_max_players(5).unwrap();
        let deck = cards_from_str(
            "2h7c 3d8s 4h9c 5dTc 6hJc 2c3c4c 5c 6c",
        );
        g.set_shuffler(Box::new(PredeterminedDecks::single(deck)));
        seat_all(
            &mut g,
            &[(1, 0, 50), (2, 2, 10), (3, 4, 10), (4, 6, 200), (5, 8, 10)],
        );
        for s in 1..=5 {
            g.auto_blind_ante(s);
        }
        assert!(g.begin_hand(1));
        assert_eq!(g.phase(), Phase::Round(0));
        // blinds: 2 posts the small, 3 posts the big; under the gun is 4
        assert_eq!(g.serial_in_position(), Some(4));
        assert!(g.call(4));
        assert!(g.call(5));
        assert!(g.call(1));
        assert!(g.call_n_raise(2, 10)); // all-in for 10 total
        assert_eq!(g.player(2).unwrap().bet, 10);
        assert_eq!(g.player(2).unwrap().money, 0);
        assert!(!g.check(3));
        assert!(g.call_n_raise(3, 1000));
        assert!(g.call_n_raise(4, 1000));
        assert!(g.call_n_raise(5, 1000));
        assert!(g.call_n_raise(1, 1000));

        assert_eq!(
            g.pots().pairs(),
            vec![(50, 50), (80, 130), (150, 280)]
        );
        assert_eq!(g.player(1).unwrap().side_pot_index, 1);
        assert_eq!(g.player(2).unwrap().side_pot_index, 0);
        assert_eq!(g.player(3).unwrap().side_pot_index, 0);
        assert_eq!(g.player(4).unwrap().side_pot_index, 2);
        assert_eq!(g.player(5).unwrap().side_pot_index, 0);
        // every card was dealt and the hand resolved without another action
        assert_eq!(g.phase(), Phase::End);
        assert_eq!(g.board().len(), 5);
        assert_eq!(total_money(&g), 280);
    }

    /// Scenario: a short all-in raise re-opens nothing: the players who
    /// already matched the original raise may only call or fold.
    #[test]
    fn short_all_in_does_not_reopen() {
        let mut g = game(50, 100, 1000, 100_000);
        seat_all(&mut g, &[(1, 2, 1000), (2, 5, 380), (3, 7, 1000)]);
        for s in 1..=3 {
            g.auto_blind_ante(s);
        }
        assert!(g.begin_hand(1));
        // 1 is the dealer; 2 small, 3 big, 1 under the gun
        assert_eq!(g.serial_in_position(), Some(1));
        assert!(g.call_n_raise(1, 200)); // raise to 300
        assert_eq!(g.player(1).unwrap().bet, 300);
        // 2 shoves 380 total: 80 more, under the 200 minimum
        assert!(g.call_n_raise(2, 1000));
        assert_eq!(g.player(2).unwrap().bet, 380);
        assert!(g.player(2).unwrap().all_in);
        // 3 may not raise on the back of the short all-in
        assert_eq!(
            g.possible_actions(3),
            vec![PossibleAction::Call, PossibleAction::Fold]
        );
        assert!(!g.call_n_raise(3, 200));
        assert!(g.call(3));
        // action returns to 1 for the 80 difference, call or fold only
        assert_eq!(g.serial_in_position(), Some(1));
        assert_eq!(
            g.possible_actions(1),
            vec![PossibleAction::Call, PossibleAction::Fold]
        );
        assert!(g.call(1));
        assert_eq!(g.phase(), Phase::Round(1));
    }

    /// Scenario: a player who missed the small blind comes back in late
    /// position and owes the big plus a dead small.
    #[test]
    fn missed_small_blind_pays_big_and_dead() {
        let mut g = game(500, 1000, 1000, 100_000);
        g.set_max_players(5).unwrap();
        seat_all(
            &mut g,
            &[
                (1, 0, 10_000),
                (2, 2, 10_000),
                (3, 4, 10_000),
                (4, 6, 10_000),
                (5, 8, 10_000),
            ],
        );
        for s in [1, 3, 4, 5] {
            g.auto_blind_ante(s);
        }
        assert!(g.begin_hand(1));
        // 1 deals; 2 owes the small and refuses it
        assert_eq!(g.serial_in_position(), Some(2));
        assert!(g.sit_out(2));
        assert_eq!(
            g.player(2).unwrap().missed_blind,
            Some(MissedBlind::Small)
        );
        // the hand goes on without them; fold it out quickly
        assert_eq!(g.phase(), Phase::Round(0));
        while matches!(g.phase(), Phase::Round(_)) {
            let s = g.serial_in_position().unwrap();
            g.fold(s);
        }
        if matches!(g.phase(), Phase::Muck) {
            let pending = g.muck_pending.clone();
            for s in pending {
                g.muck(s, false);
            }
        }
        assert_eq!(g.phase(), Phase::End);
        assert!(g.end_hand());

        // back in for the next hand, with the carry
        assert!(g.sit(2));
        assert!(g.auto_blind_ante(2));
        assert!(g.begin_hand(2));
        let p2 = g.player(2).unwrap();
        assert_eq!(p2.bet, 1000, "live big blind");
        assert_eq!(p2.money, 10_000 - 1500);
        assert_eq!(g.pots().contributed(2), 500, "dead small in the pot");
        assert_eq!(p2.missed_blind, None);
    }

    #[test]
    fn fold_win_returns_uncalled_overage() {
        let mut g = game(5, 10, 100, 1000);
        seat_all(&mut g, &[(1, 2, 500), (2, 5, 500), (3, 7, 500)]);
        for s in 1..=3 {
            g.auto_blind_ante(s);
        }
        assert!(g.begin_hand(1));
        assert!(g.call_n_raise(1, 20)); // raise to 30
        assert!(g.fold(2));
        assert!(g.fold(3));
        // the hand is over; 1's unmatched 20 came straight back
        assert_eq!(g.phase(), Phase::Muck);
        assert_eq!(g.winners(), &[1]);
        assert_eq!(g.player(1).unwrap().money, 500 - 30 + 20 + 25);
        assert!(g.muck(1, false));
        assert_eq!(g.phase(), Phase::End);
        assert!(!g.player(1).unwrap().hand.all_visible());
        assert_eq!(total_money(&g), 1500);
    }

    #[test]
    fn cancellation_refunds_blinds_and_keeps_dealer() {
        let mut g = game(500, 1000, 1000, 100_000);
        g.set_max_players(2).unwrap();
        seat_all(&mut g, &[(1, 2, 1600), (2, 7, 1600)]);
        g.auto_blind_ante(1);
        assert!(g.begin_hand(1));
        // 1 auto-posted the small; 2 refuses the big
        assert_eq!(g.player(1).unwrap().bet, 500);
        assert!(g.sit_out(2));
        assert_eq!(g.phase(), Phase::End);
        assert!(g.winners().is_empty());
        assert_eq!(g.player(1).unwrap().money, 1600);
        assert_eq!(g.player(2).unwrap().money, 1600);
        assert!(g
            .history()
            .events()
            .iter()
            .any(|e| matches!(e, Event::Canceled { serial: 1, amount: 500 })));
        let dealer_before = g.dealer_seat();
        assert!(g.end_hand());
        assert_eq!(g.dealer_seat(), dealer_before);
    }

    #[test]
    fn auto_player_checks_or_folds() {
        let mut g = game(5, 10, 100, 1000);
        seat_all(&mut g, &[(1, 2, 500), (2, 5, 500), (3, 7, 500)]);
        for s in 1..=3 {
            g.auto_blind_ante(s);
        }
        assert!(g.begin_hand(1));
        // facing the big blind, the auto player folds
        assert!(g.auto_player(1));
        assert_eq!(g.serial_in_position(), Some(2));
        assert!(g.call(2));
        assert!(g.check(3));
        // post-flop the auto player is gone, the others play on
        assert_eq!(g.phase(), Phase::Round(1));
        assert!(g.player(1).unwrap().fold);
    }

    #[test]
    fn bot_player_calls_down() {
        let mut g = game(5, 10, 100, 1000);
        seat_all(&mut g, &[(1, 2, 500), (2, 5, 500), (3, 7, 500)]);
        for s in 1..=3 {
            g.auto_blind_ante(s);
        }
        g.bot_player(3);
        assert!(g.begin_hand(1));
        assert!(g.call_n_raise(1, 20));
        assert!(g.fold(2));
        // the bot (big blind) called the raise without being asked
        assert_eq!(g.phase(), Phase::Round(1));
        assert_eq!(g.pots().contributed(3), 30);
    }

    #[test]
    fn dealer_rotates_between_hands() {
        let mut g = game(5, 10, 100, 1000);
        seat_all(&mut g, &[(1, 2, 500), (2, 5, 500), (3, 7, 500)]);
        for s in 1..=3 {
            g.auto_blind_ante(s);
            g.bot_player(s);
        }
        assert_eq!(g.dealer_seat(), Some(2));
        assert!(g.begin_hand(1));
        while g.phase() != Phase::End {
            match g.serial_in_position() {
                Some(s) => {
                    g.check(s);
                }
                None => break,
            }
        }
        assert!(g.end_hand());
        assert_eq!(g.dealer_seat(), Some(5));
        assert_eq!(g.hands_count(), 1);
    }

    #[test]
    fn rebuy_queues_during_hand() {
        let mut g = game(5, 10, 100, 1000);
        seat_all(&mut g, &[(1, 2, 500), (2, 5, 500)]);
        g.auto_blind_ante(1);
        g.auto_blind_ante(2);
        assert!(g.begin_hand(1));
        assert!(g.rebuy(1, 200));
        assert_eq!(g.player(1).unwrap().money, 500 - 5, "not yet applied");
        assert!(!g.rebuy(1, 100_000), "over the max buy-in");
        assert!(g.fold(1));
        for s in g.muck_pending.clone() {
            g.muck(s, false);
        }
        assert!(g.end_hand());
        assert_eq!(g.player(1).unwrap().money, 500 - 5 + 200);
    }

    /// Same deck, same actions: byte-identical history and final state.
    #[test]
    fn replays_are_deterministic() {
        fn run() -> (String, BTreeMap<Serial, Chips>) {
            let mut g = game(5, 10, 100, 1000);
            g.set_shuffler(Box::new(PredeterminedDecks::single(cards_from_str(
                "AhKd 7c2s QdQh 3c8d4h Th 2d",
            ))));
            seat_all(&mut g, &[(1, 2, 500), (2, 5, 500), (3, 7, 500)]);
            for s in 1..=3 {
                g.auto_blind_ante(s);
                g.auto_muck(s, AutoMuck::Always);
            }
            g.begin_hand(7);
            g.call(1);
            g.call(2);
            g.check(3);
            while matches!(g.phase(), Phase::Round(_)) {
                let s = g.serial_in_position().unwrap();
                g.check(s);
            }
            (
                serde_json::to_string(g.history()).unwrap(),
                g.money_map(),
            )
        }
        let (h1, m1) = run();
        let (h2, m2) = run();
        assert_eq!(h1, h2);
        assert_eq!(m1, m2);
    }

    #[test]
    fn history_reducer_drops_stale_positions() {
        let mut g = game(5, 10, 100, 1000);
        seat_all(&mut g, &[(1, 2, 500), (2, 5, 500), (3, 7, 500)]);
        for s in 1..=3 {
            g.auto_blind_ante(s);
        }
        g.begin_hand(1);
        g.fold(1);
        g.fold(2);
        let reduced = g.history().reduce();
        let positions = reduced
            .iter()
            .filter(|e| matches!(e, Event::Position { .. }))
            .count();
        let raw_positions = g
            .history()
            .events()
            .iter()
            .filter(|e| matches!(e, Event::Position { .. }))
            .count();
        assert!(positions <= raw_positions);
    }

    #[test]
    fn removal_waits_for_hand_end() {
        let mut g = game(5, 10, 100, 1000);
        seat_all(&mut g, &[(1, 2, 500), (2, 5, 500)]);
        g.auto_blind_ante(1);
        g.auto_blind_ante(2);
        assert!(g.begin_hand(1));
        assert!(!g.remove_player(2), "queued, not immediate");
        assert!(g.player(2).is_some());
        let s = g.serial_in_position().unwrap();
        g.fold(s);
        for s in g.muck_pending.clone() {
            g.muck(s, false);
        }
        assert!(g.end_hand());
        assert!(g.player(2).is_none());
        assert!(g
            .history()
            .events()
            .iter()
            .any(|e| matches!(e, Event::Leave { .. })));
    }

    #[test]
    fn broke_player_sits_out_after_hand() {
        let mut g = game(500, 1000, 1000, 100_000);
        g.set_max_players(2).unwrap();
        g.set_rake(Box::new(NoRake));
        g.set_shuffler(Box::new(PredeterminedDecks::single(cards_from_str(
            "8sAs3h6d4sQs6s6hAh",
        ))));
        seat_all(&mut g, &[(1, 2, 400), (2, 7, 1600)]);
        g.set_dealer(7);
        g.auto_blind_ante(1);
        g.auto_blind_ante(2);
        assert!(g.begin_hand(1));
        assert_eq!(g.phase(), Phase::End);
        // player 1 doubled through; run it again the other way to felt them
        assert!(g.end_hand());
        assert!(g.player(1).unwrap().is_sitting());

        g.players.get_mut(1).unwrap().money = 0;
        assert!(g.end_hand() == false);
        // a felted player cannot be dealt in
        assert!(!g.begin_hand(2));
    }
}
