/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use clap::{ArgAction, Parser};
use uci_parser::UciCommand;

use crate::{TTable, DEFAULT_BUCKETS, DEFAULT_DEPTH};

/// Startup flags controlling the search heuristics and time budget.
///
/// Boolean flags take an explicit value, so heuristics that default to `on`
/// can be disabled with e.g. `--cache false`.
#[derive(Debug, Clone, Parser)]
#[command(version, about, long_about = None)]
pub struct EngineOptions {
    /// Enable the transposition table during search.
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub cache: bool,

    /// Enable the killer-move heuristic during search.
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub killers: bool,

    /// Transposition table capacity, in entries.
    #[arg(long, default_value_t = TTable::DEFAULT_CAPACITY)]
    pub cache_size: usize,

    /// Enable iterative deepening.
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub idfs: bool,

    /// Number of buckets used by the move orderer's partial sort.
    #[arg(long, default_value_t = DEFAULT_BUCKETS)]
    pub order_buckets: i32,

    /// Score moves with the richer killer/piece-aware function instead of
    /// the promotion/capture/check default.
    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    pub rich_ordering: bool,

    /// Maximum depth to search per move, in plies.
    #[arg(long, default_value_t = DEFAULT_DEPTH)]
    pub depth: u8,

    /// Fallback per-move time budget, in seconds, when no clock is given.
    #[arg(long, default_value_t = 1.0)]
    pub max_time: f32,

    /// Multiplier applied to White's per-move time budget.
    #[arg(long, default_value_t = 1.0)]
    pub scale_time: f32,

    /// Initial position as a FEN string.
    #[arg(long)]
    pub fen: Option<String>,
}

impl Default for EngineOptions {
    #[inline(always)]
    fn default() -> Self {
        Self::parse_from(std::iter::empty::<&str>())
    }
}

/// A command to be sent to the engine.
#[derive(Debug, Clone, Parser)]
#[command(multicall = true, about = "Send a command to the engine", rename_all = "lower")]
pub enum EngineCommand {
    /// Print a visual representation of the current board state.
    #[command(alias = "d")]
    Display,

    /// Print an evaluation of the current position.
    Eval,

    /// Quit the engine.
    Exit {
        /// If set, the engine will await the completion of any search threads before exiting.
        #[arg(short, long, default_value = "false")]
        cleanup: bool,
    },

    /// Generate and print a FEN string for the current position.
    Fen,

    /// Display information about the current hash table(s) in the engine.
    #[command(aliases = ["tt", "ttable"])]
    HashInfo,

    /// Apply the provided move to the game, if legal.
    MakeMove { mv_string: String },

    /// Show all legal moves in the current position.
    Moves,

    /// Execute a UCI command on the engine.
    #[command(skip)]
    Uci { cmd: UciCommand },
}
