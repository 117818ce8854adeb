/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use arrayvec::ArrayVec;
use chess::{Board, ChessMove, Piece};

use crate::{BoardExt, MoveKind, MoveList, K_PER_PLY, MAX_MOVES};

/// Stride for the modular walk over the move list.
///
/// Visiting indices as `(PRIME * i + 1) mod N` is a cheap deterministic
/// shuffle: it breaks the generator's tie-order bias without an RNG, so
/// identical inputs always produce identical searches.
const PRIME: usize = 439;

/// Scores a move for ordering purposes.
///
/// Promotions are tried first, then captures, then checks, then everything
/// else. The floor of 1000 guarantees every legal move lands in a bucket.
#[inline(always)]
pub fn move_val(board: &Board, mv: ChessMove) -> i32 {
    if board.move_kind(mv) == MoveKind::Promotion {
        2500
    } else if board.is_capture(mv) {
        2000
    } else if board.gives_check(mv) {
        1500
    } else {
        1000
    }
}

/// A richer scorer that also rewards killer-table hits and orders quiets by
/// the moving piece. Enabled with `--rich-ordering`.
#[inline(always)]
fn move_val_rich(board: &Board, mv: ChessMove, killers: &[Option<ChessMove>; K_PER_PLY]) -> i32 {
    if killers.contains(&Some(mv)) {
        return 2000;
    }
    if board.gives_check(mv) {
        return 1800;
    }

    match board.move_kind(mv) {
        MoveKind::Promotion => return 1400,
        MoveKind::Castling | MoveKind::EnPassant => return 1300,
        MoveKind::Normal => {}
    }

    let offset = if board.is_capture(mv) { 500 } else { 0 };
    match board.piece_on(mv.get_source()) {
        Some(Piece::Pawn) => offset + 600,
        Some(Piece::Bishop) | Some(Piece::Knight) => offset + 500,
        Some(Piece::Rook) => offset + 400,
        Some(Piece::Queen) => offset + 300,
        Some(Piece::King) => offset + 200,
        None => offset + 100,
    }
}

/// Yields the legal moves of a position, most promising first.
///
/// Ordering uses a bucketed partial sort rather than a comparison sort:
/// move values are split into `buckets` ranges of width `max_val / buckets`,
/// and the buckets are emitted highest-first, each traversed with the
/// [`PRIME`] modular walk.
pub struct MovePicker {
    moves: MoveList,
    current: usize,
}

impl MovePicker {
    /// Order the legal moves of `board`.
    ///
    /// `killers` only influences scoring when `rich` is set; the default
    /// scorer ignores it.
    pub fn new(
        board: &Board,
        killers: [Option<ChessMove>; K_PER_PLY],
        buckets: i32,
        rich: bool,
    ) -> Self {
        let legal = board.legal_moves();
        let n = legal.len();

        let mut vals = ArrayVec::<i32, MAX_MOVES>::new();
        let mut max_val = 0;
        for &mv in &legal {
            let val = if rich {
                move_val_rich(board, mv, &killers)
            } else {
                move_val(board, mv)
            };
            vals.push(val);
            max_val = max_val.max(val);
        }

        let mut moves = MoveList::new();
        if n > 0 {
            let buckets = buckets.max(1);
            let target = max_val / buckets;
            for k in (0..buckets).rev() {
                for i in 0..n {
                    let j = (PRIME * i + 1) % n;
                    let val = vals[j];
                    if val > k * target && val <= (k + 1) * target {
                        moves.push(legal[j]);
                    }
                }
            }
        }

        Self { moves, current: 0 }
    }

    /// Number of moves this picker will yield.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    /// Returns `true` if the position has no legal moves.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// The first move in the ordering, if any.
    #[inline(always)]
    pub fn first(&self) -> Option<ChessMove> {
        self.moves.first().copied()
    }
}

impl Iterator for MovePicker {
    type Item = ChessMove;

    #[inline(always)]
    fn next(&mut self) -> Option<Self::Item> {
        let mv = self.moves.get(self.current).copied();
        self.current += 1;
        mv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FEN_STARTPOS;
    use std::str::FromStr;

    const NO_KILLERS: [Option<ChessMove>; K_PER_PLY] = [None; K_PER_PLY];

    /// A busy middlegame position with captures, checks, and castling.
    const FEN_KIWIPETE: &str =
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

    fn picker(fen: &str, buckets: i32) -> MovePicker {
        let board = Board::from_str(fen).unwrap();
        MovePicker::new(&board, NO_KILLERS, buckets, false)
    }

    #[test]
    fn test_orders_exactly_the_legal_moves() {
        for fen in [FEN_STARTPOS, FEN_KIWIPETE] {
            let board = Board::from_str(fen).unwrap();
            let legal = board.legal_moves();
            let ordered: Vec<_> = picker(fen, 5).collect();

            assert_eq!(ordered.len(), legal.len(), "coverage failed on {fen}");
            for mv in &legal {
                assert!(ordered.contains(mv), "{mv} missing from ordering");
            }
            for i in 0..ordered.len() {
                for j in (i + 1)..ordered.len() {
                    assert_ne!(ordered[i], ordered[j], "duplicate move emitted");
                }
            }
        }
    }

    #[test]
    fn test_single_bucket_still_covers_all_moves() {
        let board = Board::from_str(FEN_KIWIPETE).unwrap();
        let ordered: Vec<_> = picker(FEN_KIWIPETE, 1).collect();
        assert_eq!(ordered.len(), board.legal_moves().len());
    }

    #[test]
    fn test_captures_come_before_quiets() {
        // The only capture is dxe5
        let fen = "4k3/8/8/4p3/3P4/8/8/4K3 w - - 0 1";
        let board = Board::from_str(fen).unwrap();
        let first = picker(fen, 5).first().unwrap();
        assert!(board.is_capture(first));
        assert_eq!(first.to_string(), "d4e5");
    }

    #[test]
    fn test_promotions_come_first() {
        // White can promote on e8 or play quiet moves
        let fen = "3q1n2/4P3/8/8/8/8/k7/7K w - - 0 1";
        let board = Board::from_str(fen).unwrap();
        let ordered: Vec<_> = MovePicker::new(&board, NO_KILLERS, 5, false).collect();

        let num_promotions = ordered
            .iter()
            .filter(|mv| mv.get_promotion().is_some())
            .count();
        assert!(num_promotions > 0);
        for mv in &ordered[..num_promotions] {
            assert!(mv.get_promotion().is_some(), "promotion ranked below {mv}");
        }
    }

    #[test]
    fn test_ordering_is_deterministic() {
        let a: Vec<_> = picker(FEN_KIWIPETE, 5).collect();
        let b: Vec<_> = picker(FEN_KIWIPETE, 5).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rich_scorer_ranks_killers_first() {
        let board = Board::from_str(FEN_STARTPOS).unwrap();

        // Pick an arbitrary quiet move as the killer
        let killer = crate::parse_uci_move(&board, "b1c3").unwrap();
        let killers = [Some(killer), None, None];

        let first = MovePicker::new(&board, killers, 5, true).first().unwrap();
        assert_eq!(first, killer);

        // The default scorer ignores killers but still covers every move.
        let ordered: Vec<_> = MovePicker::new(&board, killers, 5, false).collect();
        assert_eq!(ordered.len(), 20);
    }
}
