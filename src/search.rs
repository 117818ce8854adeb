/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    fmt,
    marker::PhantomData,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use chess::{Board, ChessMove, Color};
use uci_parser::{UciInfo, UciResponse, UciSearchOptions};

use crate::{
    manage_time, BoardExt, EngineOptions, Evaluator, KillerTable, LogLevel, MoveList, MovePicker,
    NodeType, Score, TTable, TTableEntry, K_PER_PLY,
};

/// Default maximum search depth, in plies.
pub const DEFAULT_DEPTH: u8 = 20;

/// Default number of buckets used by the move orderer.
pub const DEFAULT_BUCKETS: i32 = 5;

/// The result of a search, containing the best move found, score, and total nodes searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SearchResult {
    /// Number of nodes searched.
    pub nodes: u64,

    /// Best move found during the search.
    pub bestmove: Option<ChessMove>,

    /// Evaluation of the position after `bestmove` is made.
    pub score: Score,

    /// Number of fully-completed deepening iterations.
    pub depth: u8,
}

impl Default for SearchResult {
    /// A default search result should initialize to a *very bad* value,
    /// since there isn't a move to play.
    #[inline(always)]
    fn default() -> Self {
        Self {
            nodes: 0,
            bestmove: None,
            score: Score::ALPHA,
            depth: 0,
        }
    }
}

/// Configuration variables for executing a [`Search`].
#[derive(Debug, Clone, Copy)]
pub struct SearchConfig {
    /// Maximum depth to execute the search.
    pub max_depth: u8,

    /// Start time of the search.
    pub starttime: Instant,

    /// Soft limit on search time.
    ///
    /// Checked on entry to every node and between root moves; once exceeded,
    /// frames unwind with a "no result" sentinel.
    pub timeout: Duration,

    /// Game ply of the position being searched, used to index the killer table.
    pub root_ply: usize,

    /// Whether to probe and store the transposition table.
    pub cache: bool,

    /// Whether to record and load killer moves.
    pub killers: bool,

    /// Whether to iteratively deepen, or to search only at the maximum depth.
    pub idfs: bool,

    /// Number of buckets used by the move orderer's partial sort.
    pub order_buckets: i32,

    /// Whether to use the richer killer/piece-aware move scorer.
    pub rich_ordering: bool,
}

impl SearchConfig {
    /// Constructs a new [`SearchConfig`] from the engine's flags and the
    /// provided UCI `go` options.
    ///
    /// The [`Board`] determines the side to move, which selects the clock to
    /// budget against and whether `scale_time` applies.
    pub fn new(
        options: UciSearchOptions,
        board: &Board,
        engine_options: &EngineOptions,
        root_ply: usize,
    ) -> Self {
        let mut config = Self {
            max_depth: engine_options.depth,
            cache: engine_options.cache,
            killers: engine_options.killers,
            idfs: engine_options.idfs,
            order_buckets: engine_options.order_buckets.max(1),
            rich_ordering: engine_options.rich_ordering,
            root_ply,
            ..Default::default()
        };

        if let Some(depth) = options.depth {
            config.max_depth = depth as u8;
        }

        let is_white = board.side_to_move() == Color::White;

        // If `movetime` was supplied, search exactly that long. Otherwise
        // budget against the remaining clock, falling back to the `max_time`
        // flag when no clock was given.
        let mut seconds = if let Some(movetime) = options.movetime {
            movetime.as_secs_f32()
        } else {
            let (time, inc) = if is_white {
                (options.wtime, options.winc)
            } else {
                (options.btime, options.binc)
            };

            match time {
                Some(time) => manage_time(
                    time.as_millis() as u64,
                    inc.unwrap_or(Duration::ZERO).as_millis() as u64,
                ),
                None => engine_options.max_time,
            }
        };

        if is_white {
            seconds *= engine_options.scale_time;
        }

        config.timeout = Duration::from_secs_f32(seconds.max(0.0));
        config
    }
}

impl Default for SearchConfig {
    /// A default [`SearchConfig`] searches to the default depth with no time limit.
    #[inline(always)]
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_DEPTH,
            starttime: Instant::now(),
            timeout: Duration::MAX,
            root_ply: 0,
            cache: true,
            killers: true,
            idfs: true,
            order_buckets: DEFAULT_BUCKETS,
            rich_ordering: false,
        }
    }
}

/// Executes a search on a game of chess.
///
/// The search itself is a single linear recursion; the tables it borrows are
/// only ever touched by the thread running it.
pub struct Search<'a, Log> {
    /// Number of nodes searched so far, across all iterations.
    nodes: u64,

    /// An atomic flag to determine if the search should be cancelled at any time.
    ///
    /// If this is ever `false`, the search must exit as soon as possible.
    is_searching: Arc<AtomicBool>,

    /// Configuration variables for this instance of the search.
    config: SearchConfig,

    /// Transposition table used to cache search results.
    ttable: &'a mut TTable,

    /// Storage for moves that caused a beta-cutoff during search.
    killers: &'a mut KillerTable,

    /// Marker for the level of logging to print.
    log: PhantomData<Log>,
}

impl<'a, Log: LogLevel> Search<'a, Log> {
    /// Construct a new [`Search`] instance to execute.
    #[inline(always)]
    pub fn new(
        is_searching: Arc<AtomicBool>,
        config: SearchConfig,
        ttable: &'a mut TTable,
        killers: &'a mut KillerTable,
    ) -> Self {
        Self {
            nodes: 0,
            is_searching,
            config,
            ttable,
            killers,
            log: PhantomData,
        }
    }

    /// Start the search on the supplied [`Board`], returning a [`SearchResult`].
    ///
    /// This is the entrypoint of the search; it concludes by sending the
    /// `bestmove` message and lowering the searching flag.
    pub fn start(mut self, board: &Board) -> SearchResult {
        if Log::DEBUG {
            self.send_string(format!("Starting search on {board}"));

            if self.config.timeout < Duration::MAX {
                self.send_string(format!("Timeout := {}ms", self.config.timeout.as_millis()));
            }
            self.send_string(format!("Max depth := {}", self.config.max_depth));
        }

        let res = self.iterative_deepening(board);

        if Log::DEBUG {
            let hits = self.ttable.hits;
            let accesses = self.ttable.accesses;
            let hit_rate = hits as f32 / accesses.max(1) as f32 * 100.0;
            let collisions = self.ttable.collisions;
            self.send_string(format!(
                "TT stats: {hits} hits / {accesses} probes ({hit_rate:.2}% hit rate), {collisions} collisions"
            ));
        }

        // Search has ended; send bestmove
        if Log::INFO {
            self.send_response(UciResponse::BestMove {
                bestmove: res.bestmove.map(|mv| mv.to_string()),
                ponder: None,
            });
        }

        // Search has concluded, alert other thread(s) that we are no longer searching
        self.is_searching.store(false, Ordering::Relaxed);

        res
    }

    /// Performs [iterative deepening](https://www.chessprogramming.org/Iterative_Deepening) on the provided position.
    ///
    /// Searches are run at increasing depths until the budget or the depth
    /// limit is exhausted. A depth whose root loop was cut short by the clock
    /// is discarded as misleading — unless it is the only one available, so
    /// that a move is always produced for a position that has one.
    fn iterative_deepening(&mut self, board: &Board) -> SearchResult {
        let root_ply = self.config.root_ply;
        let root_moves: MoveList = self.ordered_moves(board, root_ply).collect();

        let mut result = SearchResult::default();

        // Best move of each completed deepening iteration, in order.
        let mut line: Vec<Option<ChessMove>> = Vec::new();

        let init = if self.config.idfs {
            0
        } else {
            self.config.max_depth.saturating_sub(1)
        };

        for depth in init..self.config.max_depth {
            // Seed with the first root move so that even a search with no
            // budget recommends something playable.
            let mut iter_best = root_moves.first().copied();
            let mut iter_val = Score::ALPHA;
            let mut completed = true;

            for &mv in &root_moves {
                if self.cancelled() {
                    completed = false;
                    break;
                }

                let new = board.make_move_new(mv);
                let (v, n) = self.negamax(&new, depth, root_ply + 1, Score::ALPHA, Score::BETA);
                self.nodes += n;

                // A zero node count means that search was cut off mid-tree;
                // its value cannot be trusted, so score the move as unusable.
                let val = if n == 0 { Score::ALPHA } else { -v };

                if val > iter_val {
                    iter_best = Some(mv);
                    iter_val = val;
                }
            }

            if completed || line.is_empty() {
                line.push(iter_best);
                result.score = iter_val;

                if Log::INFO {
                    self.send_end_of_iteration_info(depth as u32 + 1, result.score);
                }
            }
        }

        result.bestmove = line.last().copied().flatten();
        result.depth = line.len() as u8;
        result.nodes = self.nodes;
        result
    }

    /// Primary location of search logic.
    ///
    /// [Negamax](https://www.chessprogramming.org/Negamax) in a
    /// [fail-soft](https://www.chessprogramming.org/Alpha-Beta#Negamax_Framework)
    /// framework, returning the value of the node and the number of nodes
    /// visited beneath it. A node count of zero signals that the deadline
    /// expired mid-search and the value must be discarded.
    fn negamax(
        &mut self,
        board: &Board,
        depth: u8,
        ply: usize,
        mut alpha: Score,
        mut beta: Score,
    ) -> (Score, u64) {
        if self.cancelled() {
            return (Score::ALPHA, 0);
        }

        let orig_alpha = alpha;

        /****************************************************************************************************
         * TT Cutoffs: https://www.chessprogramming.org/Transposition_Table#Transposition_Table_Cutoffs
         *
         * If this position was already searched at least this deep, the stored
         * bound applies here as well: bounds are absolute on the position, no
         * matter which window produced them. The three flags are exclusive.
         ****************************************************************************************************/
        if self.config.cache {
            if let Some(entry) = self.probe_tt(board.get_hash()) {
                if entry.depth >= depth {
                    match entry.node_type {
                        NodeType::Exact => return (entry.score, 1),
                        NodeType::Lower => alpha = alpha.max(entry.score),
                        NodeType::Upper => beta = beta.min(entry.score),
                    }

                    if alpha > beta {
                        return (entry.score, 1);
                    }
                }
            }
        }

        let moves = self.ordered_moves(board, ply);

        // No legal moves is either checkmate or stalemate.
        if moves.is_empty() {
            return if board.in_check() {
                (Score::ALPHA, 1)
            } else {
                (Score::DRAW, 1)
            };
        }

        // Leaf node: fall back to the static evaluation.
        if depth == 0 {
            return (Evaluator::new(board).eval(), 1);
        }

        let mut best = Score::ALPHA;
        let mut nodes = 1;

        for mv in moves {
            let new = board.make_move_new(mv);
            let (v, n) = self.negamax(&new, depth - 1, ply + 1, -beta, -alpha);

            best = best.max(-v);
            nodes += n;
            alpha = alpha.max(best);

            if alpha >= beta {
                // This move was good enough to refute the opponent's play;
                // remember it for sibling nodes at this ply.
                if self.config.killers {
                    self.killers.store(ply, mv);
                }
                break;
            }
        }

        if self.config.cache {
            let node_type = NodeType::new(best, orig_alpha, beta);
            self.save_to_tt(board.get_hash(), depth, best, node_type);
        }

        if self.out_of_time() {
            return (Score::ALPHA, 0);
        }

        // The 1% decay makes nearer outcomes score higher than identical
        // distant ones, steering the engine toward faster wins and slower losses.
        ((best * 99) / 100, nodes)
    }

    /// Orders the legal moves of `board`, feeding the killers for `ply` to
    /// the move scorer when the killer heuristic is enabled.
    #[inline(always)]
    fn ordered_moves(&self, board: &Board, ply: usize) -> MovePicker {
        let killers = if self.config.killers {
            self.killers.load(ply)
        } else {
            [None; K_PER_PLY]
        };

        MovePicker::new(
            board,
            killers,
            self.config.order_buckets,
            self.config.rich_ordering,
        )
    }

    /// Whether the soft deadline for this search has passed.
    #[inline(always)]
    fn out_of_time(&self) -> bool {
        self.config.starttime.elapsed() > self.config.timeout
    }

    /// Checks if we've exceeded any conditions that would warrant the search to end.
    #[inline(always)]
    fn cancelled(&self) -> bool {
        // Condition 1: We've exceeded our allotted search time
        self.out_of_time() ||
        // Condition 2: The search was stopped by an external factor, like the `stop` command
        !self.is_searching.load(Ordering::Relaxed)
    }

    /// Probes the [`TTable`] for an entry at the provided `key`.
    #[inline(always)]
    fn probe_tt(&mut self, key: u64) -> Option<TTableEntry> {
        let entry = self.ttable.get(key).copied();

        if Log::DEBUG {
            self.ttable.accesses += 1;
            if entry.is_some() {
                self.ttable.hits += 1;
            }
        }

        entry
    }

    /// Saves the provided data to an entry in the [`TTable`].
    #[inline(always)]
    fn save_to_tt(&mut self, key: u64, depth: u8, score: Score, node_type: NodeType) {
        let old = self.ttable.store(TTableEntry::new(key, depth, score, node_type));

        if Log::DEBUG {
            // If a previous entry existed and had a *different* key, this was a collision
            if old.is_some_and(|old| old.key != key) {
                self.ttable.collisions += 1;
            }
        }
    }

    /// Sends a [`UciResponse`] to `stdout`.
    #[inline(always)]
    fn send_response<T: fmt::Display>(&self, response: UciResponse<T>) {
        println!("{response}");
    }

    /// Sends a [`UciInfo`] to `stdout`.
    #[inline(always)]
    fn send_info(&self, info: UciInfo) {
        let resp = UciResponse::info(info);
        self.send_response(resp);
    }

    /// Sends UCI info about a completed deepening iteration.
    #[inline(always)]
    fn send_end_of_iteration_info(&self, depth: u32, score: Score) {
        let elapsed = self.config.starttime.elapsed();

        self.send_info(
            UciInfo::new()
                .depth(depth)
                .nodes(self.nodes)
                .score(score.into_uci())
                .nps((self.nodes as f32 / elapsed.as_secs_f32()).trunc())
                .time(elapsed.as_millis()),
        );
    }

    /// Helper to send a [`UciInfo`] containing only a `string` message to `stdout`.
    #[inline(always)]
    fn send_string<T: fmt::Display>(&self, string: T) {
        self.send_response(UciResponse::info_string(string));
    }
}
