//! Stacked-pyramid placement game logic with flat cell storage.
//!
//! # Geometry
//!
//! ```text
//! Layer 0 (apex):  1x1   flat index 0
//! Layer 1:         2x2   flat indices 1..5
//! Layer 2 (base):  3x3   flat indices 5..14        (N = 3)
//!
//! Layer l starts at l(l+1)(2l+1)/6 and is stored row-major.
//! Cell (l, r, c) rests on (l+1, r, c), (l+1, r+1, c), (l+1, r, c+1), (l+1, r+1, c+1).
//! ```
//!
//! # Fingerprint
//!
//! ```text
//! One token per cell (L = Left, R = Right, E = empty), layers joined by '-':
//!
//!   E-EEEE-EEEEEEEEE     empty N=3 board
//!   E-EEEE-REEEEEEEE     Right marker on base corner (2,0,0)
//!   E-REEE-RLRRLLLRE     ...after relocations and placements
//! ```
//!
//! Reserves are not spelled out: a player's reserve is always the marker
//! budget minus that player's markers on the board, so the board string
//! identifies the whole position.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Largest supported pyramid. The per-player marker budget must fit in a `u8`.
pub const MAX_LAYERS: u8 = 11;

const EMPTY_TOKEN: char = 'E';
const LAYER_SEPARATOR: char = '-';

/// Player identifier. Left and Right also name the two marker colors.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum Player {
    Left,
    Right,
}

impl Player {
    /// Get the opponent player.
    #[inline]
    pub fn opponent(self) -> Player {
        match self {
            Player::Left => Player::Right,
            Player::Right => Player::Left,
        }
    }

    /// Index into per-player arrays (Left = 0, Right = 1).
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Fingerprint token for a marker of this color.
    #[inline]
    pub const fn token(self) -> char {
        match self {
            Player::Left => 'L',
            Player::Right => 'R',
        }
    }

    #[inline]
    pub fn from_token(token: char) -> Option<Player> {
        match token {
            'L' => Some(Player::Left),
            'R' => Some(Player::Right),
            _ => None,
        }
    }

    /// Both players, Left first.
    pub fn all() -> impl Iterator<Item = Player> {
        [Player::Left, Player::Right].into_iter()
    }
}

/// Cell coordinate: layer 0 is the apex, rows and columns run `0..=layer`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord, derive_more::Display)]
#[display("({layer},{row},{col})")]
pub struct Coord {
    pub layer: u8,
    pub row: u8,
    pub col: u8,
}

impl Coord {
    pub const APEX: Coord = Coord::new(0, 0, 0);

    #[inline]
    pub const fn new(layer: u8, row: u8, col: u8) -> Coord {
        Coord { layer, row, col }
    }

    /// Iterate over every cell of layers `0..layers`, layer by layer, row-major.
    pub fn all(layers: u8) -> impl Iterator<Item = Coord> {
        (0..layers).flat_map(|layer| {
            (0..=layer).flat_map(move |row| (0..=layer).map(move |col| Coord::new(layer, row, col)))
        })
    }

    /// Position in the flat cell buffer. Does not depend on the pyramid size.
    #[inline]
    pub const fn index(self) -> usize {
        layer_offset(self.layer) + self.row as usize * (self.layer as usize + 1) + self.col as usize
    }

    /// The four cells one layer down that this cell rests on.
    ///
    /// Only meaningful above the base layer.
    #[inline]
    pub const fn supports(self) -> [Coord; 4] {
        let below = self.layer + 1;
        [
            Coord::new(below, self.row, self.col),
            Coord::new(below, self.row + 1, self.col),
            Coord::new(below, self.row, self.col + 1),
            Coord::new(below, self.row + 1, self.col + 1),
        ]
    }

    /// The in-range cells one layer up that would rest on this cell (up to four).
    pub fn resting(self) -> impl Iterator<Item = Coord> {
        let Coord { layer, row, col } = self;
        layer.checked_sub(1).into_iter().flat_map(move |above| {
            (row.saturating_sub(1)..=row.min(above)).flat_map(move |r| {
                (col.saturating_sub(1)..=col.min(above)).map(move |c| Coord::new(above, r, c))
            })
        })
    }

    /// Whether this cell's (row, col) is one of the four slots directly over
    /// `source`, i.e. (r-1|r, c-1|c) relative to it. Compared on any layer.
    #[inline]
    fn over_footprint_of(self, source: Coord) -> bool {
        (self.row == source.row || self.row + 1 == source.row)
            && (self.col == source.col || self.col + 1 == source.col)
    }
}

/// Index of the first cell of `layer` in the flat buffer.
#[inline]
const fn layer_offset(layer: u8) -> usize {
    let l = layer as usize;
    l * (l + 1) * (2 * l + 1) / 6
}

/// Total number of cells in a pyramid of `layers` layers.
#[inline]
pub const fn cell_count(layers: u8) -> usize {
    layer_offset(layers)
}

/// Markers each player starts with: half the cell count, rounded up.
#[inline]
pub const fn marker_budget(layers: u8) -> u8 {
    cell_count(layers).div_ceil(2) as u8
}

/// Outcome class of a position under optimal play.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize, derive_more::Display)]
pub enum Outcome {
    /// Left wins whoever moves first.
    #[serde(rename = "CL")]
    #[display("CL")]
    LeftWins,
    /// Right wins whoever moves first.
    #[serde(rename = "CR")]
    #[display("CR")]
    RightWins,
    /// The player who just moved wins.
    #[serde(rename = "CP")]
    #[display("CP")]
    PreviousWins,
    /// The player to move wins.
    #[serde(rename = "CN")]
    #[display("CN")]
    NextWins,
}

impl Outcome {
    pub const ALL: [Outcome; 4] = [
        Outcome::LeftWins,
        Outcome::RightWins,
        Outcome::PreviousWins,
        Outcome::NextWins,
    ];

    /// Outcome of the color-flipped position: CL and CR swap, CP and CN stay.
    #[inline]
    pub const fn flipped(self) -> Outcome {
        match self {
            Outcome::LeftWins => Outcome::RightWins,
            Outcome::RightWins => Outcome::LeftWins,
            other => other,
        }
    }

    /// Whether moving into a position of this class is a winning reply for `player`.
    #[inline]
    pub const fn favors(self, player: Player) -> bool {
        matches!(
            (self, player),
            (Outcome::LeftWins | Outcome::PreviousWins, Player::Left)
                | (Outcome::RightWins | Outcome::PreviousWins, Player::Right)
        )
    }
}

/// A move in the game.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, derive_more::Display)]
pub enum Move {
    /// Take a marker from reserve and put it on a supported empty cell.
    #[display("place {to}")]
    Place { to: Coord },
    /// Lift an exposed marker and put it on a shallower supported empty cell.
    #[display("relocate {from} -> {to}")]
    Relocate { from: Coord, to: Coord },
}

impl Move {
    /// Get the destination of the move.
    #[inline]
    pub fn to(&self) -> Coord {
        match self {
            Move::Place { to } => *to,
            Move::Relocate { to, .. } => *to,
        }
    }
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("a pyramid needs between 1 and {} layers, got {layers}", MAX_LAYERS)]
pub struct LayerCountError {
    pub layers: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("coordinate {coord} is outside a {layers}-layer pyramid")]
pub struct OutOfBoundsError {
    pub coord: Coord,
    pub layers: u8,
}

/// The specific rule a rejected move breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum IllegalMoveError {
    #[display("cell {coord} is already occupied")]
    CellOccupied { coord: Coord },
    #[display("cell {coord} does not rest on four markers")]
    UnsupportedPlatform { coord: Coord },
    #[display("{player} has no markers left in reserve")]
    ReserveExhausted { player: Player },
    #[display("marker at {coord} is covered and cannot move")]
    SourceNotExposed { coord: Coord },
    #[display("expected a {expected} marker at {coord}")]
    WrongColorAtSource { coord: Coord, expected: Player },
    #[display("destination {to} is not above source {from}")]
    NotShallower { from: Coord, to: Coord },
    #[display("destination {to} sits over source {from}")]
    TrivialDestination { from: Coord, to: Coord },
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error, derive_more::From,
)]
pub enum MoveError {
    #[display("{_0}")]
    OutOfBounds(OutOfBoundsError),
    #[display("{_0}")]
    Illegal(IllegalMoveError),
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum FingerprintError {
    #[display("fingerprint has {found} layers, expected 1 to {}", MAX_LAYERS)]
    LayerCount { found: usize },
    #[display("layer {layer} has {found} cells, expected {expected}")]
    LayerLength {
        layer: u8,
        found: usize,
        expected: usize,
    },
    #[display("unknown cell token {token:?}")]
    UnknownToken { token: char },
    #[display("{player} has {found} markers on the board, budget is {budget}")]
    OverBudget {
        player: Player,
        found: usize,
        budget: u8,
    },
}

// ============================================================================
// FINGERPRINT
// ============================================================================

/// Content-derived identifier of a position; the classification cache key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, derive_more::Display)]
pub struct Fingerprint(String);

impl Fingerprint {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn into_string(self) -> String {
        self.0
    }
}

// ============================================================================
// POSITION
// ============================================================================

/// Board contents plus both reserves.
///
/// Immutable: every move returns a new `Position` with its own cell buffer.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Position {
    layers: u8,
    cells: Box<[Option<Player>]>,
    reserves: [u8; 2],
}

impl Position {
    /// Create an empty pyramid of `layers` layers with full reserves.
    pub fn new(layers: u8) -> Result<Position, LayerCountError> {
        if !(1..=MAX_LAYERS).contains(&layers) {
            return Err(LayerCountError { layers });
        }
        Ok(Position::empty(layers))
    }

    fn empty(layers: u8) -> Position {
        let budget = marker_budget(layers);
        Position {
            layers,
            cells: vec![None; cell_count(layers)].into_boxed_slice(),
            reserves: [budget, budget],
        }
    }

    #[inline]
    pub fn layers(&self) -> u8 {
        self.layers
    }

    /// Markers each player started with.
    #[inline]
    pub fn budget(&self) -> u8 {
        marker_budget(self.layers)
    }

    /// Check whether a coordinate lies inside this pyramid.
    #[inline]
    pub fn contains(&self, coord: Coord) -> bool {
        coord.layer < self.layers && coord.row <= coord.layer && coord.col <= coord.layer
    }

    fn check_bounds(&self, coord: Coord) -> Result<(), OutOfBoundsError> {
        if self.contains(coord) {
            Ok(())
        } else {
            Err(OutOfBoundsError {
                coord,
                layers: self.layers,
            })
        }
    }

    #[inline]
    fn cell(&self, coord: Coord) -> Option<Player> {
        debug_assert!(self.contains(coord), "{coord} out of bounds");
        self.cells[coord.index()]
    }

    /// Color of the marker at `coord`, or `None` if the cell is empty.
    pub fn color_at(&self, coord: Coord) -> Result<Option<Player>, OutOfBoundsError> {
        self.check_bounds(coord)?;
        Ok(self.cell(coord))
    }

    pub fn is_empty(&self, coord: Coord) -> Result<bool, OutOfBoundsError> {
        self.color_at(coord).map(|cell| cell.is_none())
    }

    /// Markers `player` can still place.
    #[inline]
    pub fn reserve(&self, player: Player) -> u8 {
        self.reserves[player.index()]
    }

    /// Markers of `player` currently on the board.
    #[inline]
    pub fn on_board(&self, player: Player) -> u8 {
        self.budget() - self.reserve(player)
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_some()).count()
    }

    #[inline]
    pub fn apex_occupied(&self) -> bool {
        self.cells[0].is_some()
    }

    // ========== Legality ==========

    /// Rule broken by putting a marker on `coord`, ignoring reserves.
    fn placement_violation(&self, coord: Coord) -> Option<IllegalMoveError> {
        if self.cell(coord).is_some() {
            return Some(IllegalMoveError::CellOccupied { coord });
        }
        let is_base = coord.layer + 1 == self.layers;
        if !is_base && coord.supports().iter().any(|&s| self.cell(s).is_none()) {
            return Some(IllegalMoveError::UnsupportedPlatform { coord });
        }
        None
    }

    /// Rule broken by landing a marker lifted from `from` on `to`.
    fn destination_violation(&self, from: Coord, to: Coord) -> Option<IllegalMoveError> {
        if to.layer >= from.layer {
            return Some(IllegalMoveError::NotShallower { from, to });
        }
        if to.over_footprint_of(from) {
            return Some(IllegalMoveError::TrivialDestination { from, to });
        }
        self.placement_violation(to)
    }

    /// Check if a marker could be put on `coord`: empty, and resting on four
    /// markers unless it is on the base layer. Reserves are not considered.
    #[inline]
    pub fn can_place(&self, coord: Coord) -> bool {
        self.contains(coord) && self.placement_violation(coord).is_none()
    }

    /// Check if nothing rests on `coord`. Apex cells are always exposed.
    pub fn is_exposed(&self, coord: Coord) -> bool {
        self.contains(coord) && coord.resting().all(|c| self.cell(c).is_none())
    }

    /// Destination rules only: strictly shallower, not over the source, and
    /// placeable. Source color and exposure are not checked.
    #[inline]
    pub fn is_valid_destination(&self, from: Coord, to: Coord) -> bool {
        self.contains(from) && self.contains(to) && self.destination_violation(from, to).is_none()
    }

    /// Full placement check, naming the first rule that fails.
    pub fn check_placement(&self, player: Player, coord: Coord) -> Result<(), MoveError> {
        self.check_bounds(coord)?;
        if self.reserve(player) == 0 {
            return Err(IllegalMoveError::ReserveExhausted { player }.into());
        }
        match self.placement_violation(coord) {
            Some(violation) => Err(violation.into()),
            None => Ok(()),
        }
    }

    /// Full relocation check, naming the first rule that fails.
    pub fn check_relocation(&self, player: Player, from: Coord, to: Coord) -> Result<(), MoveError> {
        self.check_bounds(from)?;
        self.check_bounds(to)?;
        if self.cell(from) != Some(player) {
            return Err(IllegalMoveError::WrongColorAtSource {
                coord: from,
                expected: player,
            }
            .into());
        }
        if !self.is_exposed(from) {
            return Err(IllegalMoveError::SourceNotExposed { coord: from }.into());
        }
        match self.destination_violation(from, to) {
            Some(violation) => Err(violation.into()),
            None => Ok(()),
        }
    }

    pub fn check_move(&self, player: Player, mov: Move) -> Result<(), MoveError> {
        match mov {
            Move::Place { to } => self.check_placement(player, to),
            Move::Relocate { from, to } => self.check_relocation(player, from, to),
        }
    }

    #[inline]
    pub fn is_legal(&self, player: Player, mov: Move) -> bool {
        self.check_move(player, mov).is_ok()
    }

    // ========== Moves ==========

    /// Place a marker of `player` from reserve onto `coord`.
    pub fn place(&self, player: Player, coord: Coord) -> Result<Position, MoveError> {
        self.apply(player, Move::Place { to: coord })
    }

    /// Move an exposed marker of `player` from `from` up to `to`.
    pub fn relocate(&self, player: Player, from: Coord, to: Coord) -> Result<Position, MoveError> {
        self.apply(player, Move::Relocate { from, to })
    }

    /// Validate and apply a move, returning the resulting position.
    pub fn apply(&self, player: Player, mov: Move) -> Result<Position, MoveError> {
        self.check_move(player, mov)?;
        Ok(self.play(player, mov))
    }

    /// Apply a move without validation.
    ///
    /// Caller must ensure the move is legal (e.g. it came from `legal_moves`).
    pub fn play(&self, player: Player, mov: Move) -> Position {
        debug_assert!(self.is_legal(player, mov), "illegal move {mov} for {player}");
        let mut next = self.clone();
        match mov {
            Move::Place { to } => {
                next.cells[to.index()] = Some(player);
                next.reserves[player.index()] -= 1;
            }
            Move::Relocate { from, to } => {
                next.cells[from.index()] = None;
                next.cells[to.index()] = Some(player);
            }
        }
        next
    }

    /// Generate all legal moves for `player`.
    ///
    /// Order: relocations (sources, then destinations, in `Coord::all`
    /// order), then placements if the reserve is not empty.
    pub fn legal_moves(&self, player: Player) -> Vec<Move> {
        let mut moves = Vec::new();

        for from in Coord::all(self.layers) {
            if self.cell(from) != Some(player) || !self.is_exposed(from) {
                continue;
            }
            for to in Coord::all(from.layer) {
                if self.destination_violation(from, to).is_none() {
                    moves.push(Move::Relocate { from, to });
                }
            }
        }

        if self.reserve(player) > 0 {
            for to in Coord::all(self.layers) {
                if self.placement_violation(to).is_none() {
                    moves.push(Move::Place { to });
                }
            }
        }

        moves
    }

    /// Termination measure: (total reserve, sum of layer indices of occupied
    /// cells). Every legal move strictly decreases it lexicographically.
    pub fn potential(&self) -> (u16, u16) {
        let reserve = self.reserves.iter().map(|&r| u16::from(r)).sum();
        let height = Coord::all(self.layers)
            .filter(|&coord| self.cell(coord).is_some())
            .map(|coord| u16::from(coord.layer))
            .sum();
        (reserve, height)
    }

    // ========== Fingerprint ==========

    /// Encode the board as its fingerprint string.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut encoded = String::with_capacity(self.cells.len() + self.layers as usize);
        for layer in 0..self.layers {
            if layer > 0 {
                encoded.push(LAYER_SEPARATOR);
            }
            for cell in &self.cells[layer_offset(layer)..layer_offset(layer + 1)] {
                encoded.push(cell.map_or(EMPTY_TOKEN, Player::token));
            }
        }
        Fingerprint(encoded)
    }

    /// Rebuild a position from its fingerprint. The layer count is taken from
    /// the number of segments; reserves are derived from the marker counts.
    pub fn from_fingerprint(fingerprint: &str) -> Result<Position, FingerprintError> {
        let segments: Vec<&str> = fingerprint.split(LAYER_SEPARATOR).collect();
        let layers = u8::try_from(segments.len())
            .ok()
            .filter(|n| (1..=MAX_LAYERS).contains(n))
            .ok_or(FingerprintError::LayerCount {
                found: segments.len(),
            })?;

        let mut position = Position::empty(layers);
        let mut counts = [0usize; 2];

        for (layer, segment) in (0..layers).zip(&segments) {
            let expected = (layer as usize + 1).pow(2);
            let found = segment.chars().count();
            if found != expected {
                return Err(FingerprintError::LayerLength {
                    layer,
                    found,
                    expected,
                });
            }

            let slots = &mut position.cells[layer_offset(layer)..layer_offset(layer + 1)];
            for (slot, token) in slots.iter_mut().zip(segment.chars()) {
                *slot = if token == EMPTY_TOKEN {
                    None
                } else {
                    let player = Player::from_token(token)
                        .ok_or(FingerprintError::UnknownToken { token })?;
                    counts[player.index()] += 1;
                    Some(player)
                };
            }
        }

        let budget = position.budget();
        for player in Player::all() {
            let found = counts[player.index()];
            if found > usize::from(budget) {
                return Err(FingerprintError::OverBudget {
                    player,
                    found,
                    budget,
                });
            }
            position.reserves[player.index()] = budget - found as u8;
        }

        Ok(position)
    }

    // ========== Symmetry & Color Flip ==========

    /// Apply a coordinate transform to every layer.
    pub fn transformed(&self, symmetry: Symmetry) -> Position {
        let mut cells = vec![None; self.cells.len()].into_boxed_slice();
        for coord in Coord::all(self.layers) {
            cells[symmetry.apply(coord).index()] = self.cell(coord);
        }
        Position {
            layers: self.layers,
            cells,
            reserves: self.reserves,
        }
    }

    /// All geometrically equivalent positions, deduplicated by fingerprint.
    ///
    /// Starts with `self` (the identity transform); has 1, 2, 4 or 8 members.
    pub fn orbit(&self) -> Vec<Position> {
        let mut seen = HashSet::with_capacity(Symmetry::ALL.len());
        let mut members = Vec::with_capacity(Symmetry::ALL.len());
        for symmetry in Symmetry::ALL {
            let member = self.transformed(symmetry);
            if seen.insert(member.fingerprint()) {
                members.push(member);
            }
        }
        members
    }

    /// Smallest fingerprint across the eight transforms.
    ///
    /// Identical for every member of a geometric orbit.
    pub fn canonical_fingerprint(&self) -> Fingerprint {
        Symmetry::ALL[1..]
            .iter()
            .fold(self.fingerprint(), |best, &symmetry| {
                best.min(self.transformed(symmetry).fingerprint())
            })
    }

    /// Swap every Left marker for Right and vice versa, along with reserves.
    pub fn flipped(&self) -> Position {
        Position {
            layers: self.layers,
            cells: self.cells.iter().map(|cell| cell.map(Player::opponent)).collect(),
            reserves: [self.reserves[1], self.reserves[0]],
        }
    }
}

/// Coordinate transforms of a square layer, applied to every layer alike.
///
/// For a layer whose largest index is `s`:
///
/// ```text
/// Identity       (r, c)        Rotate180      (s-r, s-c)
/// Transpose      (c, r)        AntiTranspose  (s-c, s-r)
/// MirrorRows     (s-r, c)      MirrorCols     (r, s-c)
/// Rotate90       (c, s-r)      Rotate270      (s-c, r)
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Symmetry {
    Identity,
    Transpose,
    MirrorRows,
    Rotate90,
    Rotate180,
    AntiTranspose,
    MirrorCols,
    Rotate270,
}

impl Symmetry {
    pub const ALL: [Symmetry; 8] = [
        Symmetry::Identity,
        Symmetry::Transpose,
        Symmetry::MirrorRows,
        Symmetry::Rotate90,
        Symmetry::Rotate180,
        Symmetry::AntiTranspose,
        Symmetry::MirrorCols,
        Symmetry::Rotate270,
    ];

    /// Map (row, col) inside a layer whose largest index is `size`.
    #[inline]
    pub const fn map(self, size: u8, row: u8, col: u8) -> (u8, u8) {
        match self {
            Symmetry::Identity => (row, col),
            Symmetry::Transpose => (col, row),
            Symmetry::MirrorRows => (size - row, col),
            Symmetry::Rotate90 => (col, size - row),
            Symmetry::Rotate180 => (size - row, size - col),
            Symmetry::AntiTranspose => (size - col, size - row),
            Symmetry::MirrorCols => (row, size - col),
            Symmetry::Rotate270 => (size - col, row),
        }
    }

    /// Map a coordinate. The layer never changes.
    #[inline]
    pub const fn apply(self, coord: Coord) -> Coord {
        let (row, col) = self.map(coord.layer, coord.row, coord.col);
        Coord::new(coord.layer, row, col)
    }
}
