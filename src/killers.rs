/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use chess::ChessMove;

/// Number of ply slots in the killer table. Plies index modulo this.
pub const PLY_SLOTS: usize = 128;

/// Number of killer moves remembered per ply.
pub const K_PER_PLY: usize = 3;

/// Per-ply memory of quiet moves that caused a beta cutoff.
///
/// Sibling nodes at the same ply are likely to fail high on the same move,
/// so the move orderer can try these early.
#[derive(Debug)]
pub struct KillerTable {
    slots: [[Option<ChessMove>; K_PER_PLY]; PLY_SLOTS],
}

impl KillerTable {
    /// Record `mv` as a killer at `ply`.
    ///
    /// The move goes into the first empty slot for that ply. If `mv` is
    /// already present this is a no-op, so the slots of a ply always hold
    /// pairwise-distinct moves. When all slots are full, slot 0 is evicted.
    pub fn store(&mut self, ply: usize, mv: ChessMove) {
        let slots = &mut self.slots[ply % PLY_SLOTS];

        if slots.contains(&Some(mv)) {
            return;
        }

        for slot in slots.iter_mut() {
            if slot.is_none() {
                *slot = Some(mv);
                return;
            }
        }

        slots[0] = Some(mv);
    }

    /// Fetch the killers recorded at `ply`. Empty slots are `None`.
    #[inline(always)]
    pub fn load(&self, ply: usize) -> [Option<ChessMove>; K_PER_PLY] {
        self.slots[ply % PLY_SLOTS]
    }

    /// Forget all recorded killers.
    #[inline(always)]
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

impl Default for KillerTable {
    #[inline(always)]
    fn default() -> Self {
        Self {
            slots: [[None; K_PER_PLY]; PLY_SLOTS],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::{ChessMove, Square};

    fn mv(from: Square, to: Square) -> ChessMove {
        ChessMove::new(from, to, None)
    }

    #[test]
    fn test_fills_slots_in_order() {
        let mut killers = KillerTable::default();
        let a = mv(Square::E2, Square::E4);
        let b = mv(Square::D2, Square::D4);

        killers.store(3, a);
        killers.store(3, b);

        assert_eq!(killers.load(3), [Some(a), Some(b), None]);
    }

    #[test]
    fn test_duplicates_are_ignored() {
        let mut killers = KillerTable::default();
        let a = mv(Square::E2, Square::E4);

        for _ in 0..10 {
            killers.store(5, a);
        }

        let slots = killers.load(5);
        assert_eq!(slots, [Some(a), None, None]);

        // Distinctness holds for arbitrary store sequences.
        let b = mv(Square::D2, Square::D4);
        let c = mv(Square::C2, Square::C4);
        let d = mv(Square::B2, Square::B4);
        for m in [b, a, c, b, d, a] {
            killers.store(5, m);
        }
        let slots = killers.load(5);
        let stored: Vec<_> = slots.iter().flatten().collect();
        assert!(stored.len() <= K_PER_PLY);
        for i in 0..stored.len() {
            for j in (i + 1)..stored.len() {
                assert_ne!(stored[i], stored[j]);
            }
        }
    }

    #[test]
    fn test_overflow_evicts_slot_zero() {
        let mut killers = KillerTable::default();
        let a = mv(Square::E2, Square::E4);
        let b = mv(Square::D2, Square::D4);
        let c = mv(Square::C2, Square::C4);
        let d = mv(Square::B2, Square::B4);

        killers.store(0, a);
        killers.store(0, b);
        killers.store(0, c);
        killers.store(0, d);

        assert_eq!(killers.load(0), [Some(d), Some(b), Some(c)]);
    }

    #[test]
    fn test_ply_wraps_modulo_slots() {
        let mut killers = KillerTable::default();
        let a = mv(Square::G1, Square::F3);

        killers.store(PLY_SLOTS + 2, a);
        assert_eq!(killers.load(2), [Some(a), None, None]);
    }

    #[test]
    fn test_clear() {
        let mut killers = KillerTable::default();
        killers.store(1, mv(Square::E2, Square::E4));
        killers.clear();
        assert_eq!(killers.load(1), [None; K_PER_PLY]);
    }
}
