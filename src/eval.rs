/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use chess::{get_pawn_attacks, get_rank, Board, Color, Piece, Rank, Square};

use crate::{BoardExt, Score};

/// The four central squares, contested by both sides.
const CENTER: [Square; 4] = [Square::D4, Square::E4, Square::D5, Square::E5];

/// Encapsulates the logic of scoring a chess position.
///
/// Scores are always computed from the side-to-move's perspective: a positive
/// number is good for whoever's turn it is.
#[derive(Debug, Clone)]
pub struct Evaluator<'a> {
    /// The position to evaluate.
    board: &'a Board,
}

impl<'a> Evaluator<'a> {
    /// Construct a new [`Evaluator`] for the provided position.
    #[inline(always)]
    pub fn new(board: &'a Board) -> Self {
        Self { board }
    }

    /// Evaluate this position from the side-to-move's perspective.
    #[inline(always)]
    pub fn eval(self) -> Score {
        let stm = self.board.side_to_move();
        Score::new(self.eval_for(stm) - self.eval_for(!stm))
    }

    /// Material and positional terms for `color` alone.
    ///
    /// Positional bonuses only kick in while `color` still has most of its
    /// pawns; in pawn-poor endgames they are noise.
    fn eval_for(&self, color: Color) -> i32 {
        let mut sum = 100 * self.board.piece_parts(color, Piece::Pawn).popcnt() as i32;

        if sum >= 700 {
            sum += 10 * self.center_control(color);
            sum += 10 * self.activity(color);
            sum += 10 * self.pawn_structure(color);
        }

        let minors = self.board.piece_parts(color, Piece::Knight)
            | self.board.piece_parts(color, Piece::Bishop);
        sum += 300 * minors.popcnt() as i32;
        sum += 500 * self.board.piece_parts(color, Piece::Rook).popcnt() as i32;
        sum += 900 * self.board.piece_parts(color, Piece::Queen).popcnt() as i32;
        sum += 10 * self.king_safety(color);

        sum
    }

    /// Number of `color`'s pieces bearing on the four central squares.
    fn center_control(&self, color: Color) -> i32 {
        let mut attackers = chess::EMPTY;
        for square in CENTER {
            attackers |= self.board.attackers_to(square);
        }

        (attackers & self.board.pieces_of(color)).popcnt() as i32
    }

    /// Penalty for enemy pieces bearing on `color`'s king.
    fn king_safety(&self, color: Color) -> i32 {
        let king = self.board.king_square(color);
        let enemies = self.board.pieces_of(!color);

        -((self.board.attackers_to(king) & enemies).popcnt() as i32)
    }

    /// Penalty for minor pieces still sitting on their back rank.
    fn activity(&self, color: Color) -> i32 {
        let minors = self.board.piece_parts(color, Piece::Knight)
            | self.board.piece_parts(color, Piece::Bishop);
        let back_rank = match color {
            Color::White => get_rank(Rank::First),
            Color::Black => get_rank(Rank::Eighth),
        };

        -((minors & back_rank).popcnt() as i32)
    }

    /// Number of `color`'s pawns defended by another of `color`'s pawns.
    fn pawn_structure(&self, color: Color) -> i32 {
        let pawns = self.board.piece_parts(color, Piece::Pawn);

        let mut defended = 0;
        for square in pawns {
            if get_pawn_attacks(square, !color, pawns).popcnt() > 0 {
                defended += 1;
            }
        }

        defended
    }
}
