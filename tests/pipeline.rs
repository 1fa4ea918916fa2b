// This file is part of the pgn-sift library.
// Copyright (C) 2017-2019 Niklas Fiekas <niklas.fiekas@backscattering.de>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <http://www.gnu.org/licenses/>.

use std::io::Cursor;

use pgn_sift::apply::{self, NoObserver};
use pgn_sift::config::Config;
use pgn_sift::dedup::DuplicateIndex;
use pgn_sift::fen::{self, FenOpts};
use pgn_sift::game::Game;
use pgn_sift::matcher::material::MaterialCriteria;
use pgn_sift::matcher::MatchEngine;
use pgn_sift::output::Formatter;
use pgn_sift::parser::{Parser, ParserOpts};
use pgn_sift::tags::{self, TagRegistry};

fn parse_and_replay(pgn: &str, registry: &mut TagRegistry) -> Vec<Game> {
    let mut parser = Parser::new(Cursor::new(pgn.as_bytes().to_vec()), ParserOpts::default());
    let mut games = Vec::new();
    while let Some(mut game) = parser.next_game(registry).expect("in-memory read") {
        apply::apply_move_list(&mut game, false, &mut NoObserver).expect("legal moves");
        games.push(game);
    }
    games
}

fn emit(game: &Game, registry: &TagRegistry, config: &Config) -> String {
    let formatter = Formatter::new(config, registry, &[]);
    let mut out = Vec::new();
    formatter.write_game(game, &mut out).expect("write to vec");
    String::from_utf8(out).expect("utf8")
}

#[test]
fn reemission_is_idempotent() {
    let source = "\
[Event \"Wch\"]
[Site \"Reykjavik\"]
[Result \"1/2-1/2\"]

1. c4 e6 {French-like} 2. Nf3 d5 (2... c5 3. d4) 3. d4 Nf6 1/2-1/2
";
    let mut registry = TagRegistry::new();
    let config = Config::default();

    let first = parse_and_replay(source, &mut registry);
    let emitted = emit(&first[0], &registry, &config);

    let second = parse_and_replay(&emitted, &mut registry);
    assert_eq!(first[0].ply_count(), second[0].ply_count());
    assert_eq!(first[0].final_hash, second[0].final_hash);
    assert_eq!(first[0].cumulative_hash, second[0].cumulative_hash);
    for (id, value) in first[0].tag_pairs() {
        assert_eq!(second[0].tag(id), Some(value));
    }
    for (a, b) in first[0].moves.iter().zip(second[0].moves.iter()) {
        assert_eq!(a.san, b.san);
        assert_eq!(a.comments, b.comments);
        assert_eq!(a.variations.len(), b.variations.len());
    }

    // A third pass produces byte-identical output.
    assert_eq!(emit(&second[0], &registry, &config), emitted);
}

#[test]
fn fen_round_trip_is_exact() {
    for fen_text in [
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
        "r1b1k2r/pppp1ppp/2n2n2/4p3/2B1P3/2N2N2/PPPP1PPP/R1BQK2R w KQkq - 4 5",
        "8/5k2/8/8/8/8/3K4/8 b - - 12 47",
        "rnbqkbnr/ppp1pppp/8/8/3pP3/8/PPPP1PP1/RNBQKBNR b KQkq e3 0 3",
    ] {
        let board = fen::board_from_fen(fen_text.as_bytes()).expect("valid fen");
        assert_eq!(fen::fen(&board, &FenOpts::default()), fen_text);
    }
}

#[test]
fn tag_only_differences_are_duplicates() {
    let source = "\
[Event \"One\"]
[Site \"Here\"]

1. e4 e5 2. Nf3 Nc6 *

[Event \"One\"]
[Site \"There\"]

1. e4 e5 2. Nf3 Nc6 *
";
    let mut registry = TagRegistry::new();
    let games = parse_and_replay(source, &mut registry);
    assert_eq!(games.len(), 2);
    assert_eq!(games[0].final_hash, games[1].final_hash);
    assert_eq!(games[0].cumulative_hash, games[1].cumulative_hash);

    let mut index = DuplicateIndex::new(None);
    assert_eq!(index.check_and_insert(&games[0], 0).unwrap(), None);
    assert_eq!(index.check_and_insert(&games[1], 1).unwrap(), Some(0));
}

#[test]
fn empty_game_with_result_tag_is_reemitted() {
    let source = "[Event \"Forfeit\"]\n[Result \"1-0\"]\n\n1-0\n";
    let mut registry = TagRegistry::new();
    let games = parse_and_replay(source, &mut registry);
    assert_eq!(games.len(), 1);
    assert_eq!(games[0].ply_count(), 0);

    let text = emit(&games[0], &registry, &Config::default());
    assert!(text.contains("[Result \"1-0\"]"));
    assert!(text.trim_end().ends_with("1-0"));
}

#[test]
fn pattern_with_material_constraint_fires_mid_game() {
    let mut engine = MatchEngine::new();
    engine
        .patterns
        .add("*/*/*/*/*/*/*/*:KQ-KR", false, Some("qvr"))
        .expect("valid pattern");
    let config = Config::default();

    // The bishop never comes off, so KQ v KR is never on the board.
    let source = "\
[FEN \"4k2r/7b/8/8/8/8/8/Q3K3 b - - 0 1\"]

1... Bg8 2. Qa2 Bh7 *
";
    let mut registry = TagRegistry::new();
    let mut parser = Parser::new(Cursor::new(source.as_bytes().to_vec()), ParserOpts::default());
    let mut game = parser.next_game(&mut registry).expect("read").expect("one game");
    let outcome = engine.check_game(&mut game, &config, false).expect("replayable");
    assert!(!outcome.matched, "bishop still on the board spoils KQ-KR");

    // Capturing the bishop reaches the wanted material mid-game.
    let source = "\
[FEN \"4k2r/6b1/8/8/8/8/8/Q3K3 w - - 0 1\"]

1. Qxg7 Kd8 *
";
    let mut parser = Parser::new(Cursor::new(source.as_bytes().to_vec()), ParserOpts::default());
    let mut game = parser.next_game(&mut registry).expect("read").expect("one game");
    let outcome = engine.check_game(&mut game, &config, false).expect("replayable");
    assert!(outcome.matched);
    assert_eq!(outcome.pattern_label.as_deref(), Some("qvr"));
}

#[test]
fn cumulative_hash_depends_on_the_sequence() {
    let mut registry = TagRegistry::new();
    // Same final position via transposition: final hashes agree, the
    // cumulative fingerprints do not.
    let games = parse_and_replay("1. d4 d5 2. c4 e6 *\n\n1. c4 e6 2. d4 d5 *\n", &mut registry);
    assert_eq!(games[0].final_hash, games[1].final_hash);
    assert_ne!(games[0].cumulative_hash, games[1].cumulative_hash);
}

#[test]
fn material_stability_requires_consecutive_plies() {
    // A two-ply game offers three consecutive KR v K positions, enough
    // for a stability depth of 2 but not of 4.
    let source = "\
[FEN \"4k3/8/8/8/8/8/8/R3K3 w - - 0 1\"]

1. Ra8+ Kf7 *
";
    let config = Config::default();
    let mut registry = TagRegistry::new();

    let mut engine = MatchEngine::new();
    engine.material.push(MaterialCriteria::parse("2 KR K", false).expect("valid"));
    let mut parser = Parser::new(Cursor::new(source.as_bytes().to_vec()), ParserOpts::default());
    let mut game = parser.next_game(&mut registry).expect("read").expect("one game");
    assert!(engine.check_game(&mut game, &config, false).expect("replayable").matched);

    let mut engine = MatchEngine::new();
    engine.material.push(MaterialCriteria::parse("4 KR K", false).expect("valid"));
    let mut parser = Parser::new(Cursor::new(source.as_bytes().to_vec()), ParserOpts::default());
    let mut game = parser.next_game(&mut registry).expect("read").expect("one game");
    assert!(!engine.check_game(&mut game, &config, false).expect("replayable").matched);
}

#[test]
fn broken_games_are_marked_and_parseable_neighbours_survive() {
    let source = "\
[Event \"broken\"]

1. e4 e5 2. Qqq9
[Event \"fine\"]

1. d4 d5 *
";
    let mut registry = TagRegistry::new();
    let mut parser = Parser::new(Cursor::new(source.as_bytes().to_vec()), ParserOpts::default());
    let first = parser.next_game(&mut registry).expect("read").expect("game");
    assert!(first.broken);
    let second = parser.next_game(&mut registry).expect("read").expect("game");
    assert!(!second.broken);
    assert_eq!(second.tag(tags::EVENT), Some(&b"fine"[..]));
}
