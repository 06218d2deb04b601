//! Lazy move generator for the classifier.
//!
//! Instead of collecting every move upfront, this iterator produces moves
//! one at a time, tracking its cursors to resume where it left off. The
//! classifier stops scanning at the first favorable child, so most moves of
//! a position are never generated.

use pyramid_core::{Coord, Move, Player, Position};

/// Lazy move generator that produces moves on demand.
///
/// Generates moves in order:
/// 1. Relocations (sources in layer/row/col order, then destinations over
///    the strictly shallower layers in the same order)
/// 2. Placements (every cell in layer/row/col order, if reserve remains)
///
/// This is the same sequence as `Position::legal_moves`.
pub struct MoveGenerator<'a> {
    position: &'a Position,
    /// Current phase of generation
    phase: MoveGenPhase,
    player: Player,
    /// Current source cell for relocations
    source: Option<Coord>,
    /// Whether `source` holds an exposed marker of `player`
    source_ready: bool,
    /// Next destination to try for the current source
    dest: Option<Coord>,
    /// Next cell to try for placements
    place_to: Option<Coord>,
}

#[derive(Clone, Copy, PartialEq)]
enum MoveGenPhase {
    Relocations,
    Placements,
    Done,
}

/// Next cell after `coord` in layer/row/col order, staying inside layers `0..layers`.
#[inline]
fn step(coord: Coord, layers: u8) -> Option<Coord> {
    let Coord { layer, row, col } = coord;
    if col < layer {
        Some(Coord::new(layer, row, col + 1))
    } else if row < layer {
        Some(Coord::new(layer, row + 1, 0))
    } else if layer + 1 < layers {
        Some(Coord::new(layer + 1, 0, 0))
    } else {
        None
    }
}

impl<'a> MoveGenerator<'a> {
    /// Create a new move generator for `player` in `position`.
    pub fn new(position: &'a Position, player: Player) -> Self {
        Self {
            position,
            phase: MoveGenPhase::Relocations,
            player,
            source: Some(Coord::APEX),
            source_ready: false,
            dest: None,
            place_to: Some(Coord::APEX),
        }
    }

    fn next_relocation(&mut self) -> Option<Move> {
        let position = self.position;
        while let Some(from) = self.source {
            // Check if we need to initialize for this source cell
            if !self.source_ready {
                let movable = from.layer > 0
                    && position.color_at(from) == Ok(Some(self.player))
                    && position.is_exposed(from);
                if !movable {
                    self.source = step(from, position.layers());
                    continue;
                }
                self.source_ready = true;
                self.dest = Some(Coord::APEX);
            }

            // Destinations never reach the source's own layer
            while let Some(to) = self.dest {
                self.dest = step(to, from.layer);
                if position.is_valid_destination(from, to) {
                    return Some(Move::Relocate { from, to });
                }
            }

            // Done with this source cell
            self.source = step(from, position.layers());
            self.source_ready = false;
        }
        None
    }

    fn next_placement(&mut self) -> Option<Move> {
        if self.position.reserve(self.player) == 0 {
            return None;
        }
        while let Some(to) = self.place_to {
            self.place_to = step(to, self.position.layers());
            if self.position.can_place(to) {
                return Some(Move::Place { to });
            }
        }
        None
    }
}

impl Iterator for MoveGenerator<'_> {
    type Item = Move;

    /// Get the next legal move, or None if exhausted.
    fn next(&mut self) -> Option<Move> {
        loop {
            match self.phase {
                MoveGenPhase::Relocations => {
                    if let Some(mov) = self.next_relocation() {
                        return Some(mov);
                    }
                    self.phase = MoveGenPhase::Placements;
                }
                MoveGenPhase::Placements => {
                    if let Some(mov) = self.next_placement() {
                        return Some(mov);
                    }
                    self.phase = MoveGenPhase::Done;
                    return None;
                }
                MoveGenPhase::Done => return None,
            }
        }
    }
}

/// Every position `player` can move to from `position`, in generator order.
///
/// Each child owns fresh cell storage; `position` is left untouched.
pub fn children<'a>(position: &'a Position, player: Player) -> impl Iterator<Item = Position> + 'a {
    MoveGenerator::new(position, player).map(move |mov| position.play(player, mov))
}
