/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    str::FromStr,
    sync::{atomic::AtomicBool, Arc},
    time::{Duration, Instant},
};

use chess::Board;
use skewer::{
    BoardExt, Evaluator, KillerTable, LogNone, MovePicker, Score, Search, SearchConfig,
    SearchResult, TTable, FEN_STARTPOS, K_PER_PLY,
};

fn run_search(fen: &str, config: SearchConfig) -> SearchResult {
    let mut ttable = TTable::from_capacity(1 << 16);
    let mut killers = KillerTable::default();
    run_search_with_tables(fen, config, &mut ttable, &mut killers)
}

fn run_search_with_tables(
    fen: &str,
    config: SearchConfig,
    ttable: &mut TTable,
    killers: &mut KillerTable,
) -> SearchResult {
    let is_searching = Arc::new(AtomicBool::new(true));
    let board = Board::from_str(fen).unwrap();
    Search::<LogNone>::new(is_searching, config, ttable, killers).start(&board)
}

/// Mirrors a FEN horizontally (file a becomes file h, and so on).
///
/// Only valid for positions without castling rights or an en-passant target.
fn mirror_fen(fen: &str) -> String {
    let mut parts = fen.split_whitespace();
    let placement = parts.next().unwrap();

    let mirrored = placement
        .split('/')
        .map(|rank| rank.chars().rev().collect::<String>())
        .collect::<Vec<_>>()
        .join("/");

    let rest = parts.collect::<Vec<_>>().join(" ");
    assert!(rest.contains('-'), "mirroring requires no castling/ep state");

    format!("{mirrored} {rest}")
}

#[test]
fn test_mate_in_one_is_found() {
    let config = SearchConfig {
        max_depth: 2,
        timeout: Duration::from_secs_f32(5.0),
        ..Default::default()
    };

    let res = run_search("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1", config);
    assert_eq!(res.bestmove.unwrap().to_string(), "a1a8");
}

#[test]
fn test_stalemate_returns_no_move() {
    let fen = "7k/5Q2/6K1/8/8/8/8/8 b - - 0 1";

    let board = Board::from_str(fen).unwrap();
    assert!(board.legal_moves().is_empty());
    assert!(!board.in_check());

    let res = run_search(fen, SearchConfig::default());
    assert!(res.bestmove.is_none());
}

#[test]
fn test_startpos_depth_one() {
    let board = Board::from_str(FEN_STARTPOS).unwrap();
    assert_eq!(Evaluator::new(&board).eval(), Score::DRAW);

    let config = SearchConfig {
        max_depth: 1,
        ..Default::default()
    };

    let res = run_search(FEN_STARTPOS, config);
    let bestmove = res.bestmove.expect("a legal move must be returned");
    assert!(board.legal_moves().contains(&bestmove));
}

#[test]
fn test_capture_is_ordered_and_chosen() {
    let fen = "4k3/8/8/4p3/3P4/8/8/4K3 w - - 0 1";
    let board = Board::from_str(fen).unwrap();

    // The move orderer puts the only capture first
    let first = MovePicker::new(&board, [None; K_PER_PLY], 5, false)
        .first()
        .unwrap();
    assert_eq!(first.to_string(), "d4e5");

    // And the search agrees it's the best move
    let config = SearchConfig {
        max_depth: 2,
        ..Default::default()
    };
    let res = run_search(fen, config);
    assert_eq!(res.bestmove.unwrap().to_string(), "d4e5");
}

#[test]
fn test_iterative_deepening_respects_budget() {
    let config = SearchConfig {
        max_depth: 10,
        timeout: Duration::from_millis(10),
        ..Default::default()
    };

    let start = Instant::now();
    let res = run_search(FEN_STARTPOS, config);

    assert!(res.bestmove.is_some());
    assert!(res.depth >= 1, "at least one iteration is always recorded");
    assert!(
        start.elapsed() < Duration::from_secs(2),
        "the soft deadline must cut the search short"
    );
}

#[test]
fn test_warm_cache_searches_fewer_nodes() {
    let fen = "r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 4";
    let config = SearchConfig {
        max_depth: 4,
        ..Default::default()
    };

    let mut ttable = TTable::from_capacity(1 << 16);
    let mut killers = KillerTable::default();

    let first = run_search_with_tables(fen, config, &mut ttable, &mut killers);
    let second = run_search_with_tables(fen, config, &mut ttable, &mut killers);

    assert_eq!(first.bestmove, second.bestmove);
    assert!(second.nodes <= first.nodes);
}

#[test]
fn test_zero_budget_returns_first_legal_move() {
    let config = SearchConfig {
        timeout: Duration::ZERO,
        ..Default::default()
    };

    let board = Board::from_str(FEN_STARTPOS).unwrap();
    let res = run_search(FEN_STARTPOS, config);

    let bestmove = res.bestmove.expect("a move must be returned, not MOVE_NONE");
    assert!(board.legal_moves().contains(&bestmove));
}

#[test]
fn test_single_bucket_ordering_still_searches() {
    let config = SearchConfig {
        max_depth: 2,
        order_buckets: 1,
        ..Default::default()
    };

    let res = run_search("4k3/8/8/4p3/3P4/8/8/4K3 w - - 0 1", config);
    assert_eq!(res.bestmove.unwrap().to_string(), "d4e5");
}

#[test]
fn test_disabled_heuristics_agree_on_the_value() {
    let fen = "6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1";

    let everything = SearchConfig {
        max_depth: 3,
        ..Default::default()
    };
    let bare = SearchConfig {
        max_depth: 3,
        cache: false,
        killers: false,
        ..Default::default()
    };

    let full = run_search(fen, everything);
    let plain = run_search(fen, bare);
    assert_eq!(full.score, plain.score);
    assert_eq!(full.bestmove, plain.bestmove);
}

#[test]
fn test_mirrored_positions_evaluate_equally() {
    for fen in [
        "6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1",
        "4k3/8/8/4p3/3P4/8/8/4K3 w - - 0 1",
        "r5k1/ppp2ppp/8/8/3n4/8/PPP2PPP/R5K1 b - - 0 1",
    ] {
        let mirrored = mirror_fen(fen);

        let board = Board::from_str(fen).unwrap();
        let mirror = Board::from_str(&mirrored).unwrap();
        assert_eq!(
            Evaluator::new(&board).eval(),
            Evaluator::new(&mirror).eval(),
            "eval differs from mirror on {fen}"
        );

        let config = SearchConfig {
            max_depth: 3,
            ..Default::default()
        };
        let original = run_search(fen, config);
        let reflected = run_search(&mirrored, config);
        assert_eq!(
            original.score, reflected.score,
            "search value differs from mirror on {fen}"
        );
    }
}
