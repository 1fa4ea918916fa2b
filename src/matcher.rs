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

//! The match engine: a game is wanted iff every active predicate holds.
//!
//! Predicates are evaluated cheapest first. Tag rules run before any move
//! is replayed; positional, pattern and material predicates hook into the
//! replay itself so they can fire mid-game; board-state predicates run on
//! the final position.

pub mod fen_pattern;
pub mod material;
pub mod positional;
pub mod tag;
pub mod textual;

use crate::apply::{self, ReplayError, ReplayObserver};
use crate::board::Board;
use crate::config::{Config, SetupPolicy, WhoseMove};
use crate::game::Game;
use crate::moves::MoveClass;
use crate::tags;
use crate::types::{CheckStatus, Color, Role};

use self::fen_pattern::FenPatternSet;
use self::material::MaterialCriteria;
use self::positional::PositionalMatcher;
use self::tag::TagMatcher;
use self::textual::TextualVariation;

/// All selection criteria of a run.
#[derive(Debug, Default)]
pub struct MatchEngine {
    pub tag: TagMatcher,
    pub textual: Vec<TextualVariation>,
    pub positional: PositionalMatcher,
    pub patterns: FenPatternSet,
    pub material: Vec<MaterialCriteria>,
}

/// What a game's evaluation produced, beyond the verdict itself.
#[derive(Debug, Default)]
pub struct MatchOutcome {
    pub matched: bool,
    /// Replay was skipped because a cheap predicate already failed.
    pub replayed: bool,
    /// Label of the FEN pattern that fired, possibly empty.
    pub pattern_label: Option<String>,
    /// The colour a material criterion matched for.
    pub material_side: Option<Color>,
    /// Where the first mid-game predicate fired (0 is the initial
    /// position).
    pub match_ply: Option<usize>,
    pub final_board: Option<Board>,
}

/// Replay-time state gathered by the observer.
#[derive(Debug, Default)]
pub struct ReplayState {
    pub positional_hit: bool,
    pub pattern_label: Option<String>,
    pub material_side: Option<Color>,
    pub max_halfmove_clock: u32,
    /// The ply (1-based; 0 is the initial position) where a positional,
    /// pattern or material predicate first fired.
    pub match_ply: Option<usize>,
}

struct ReplayMatcher<'a> {
    engine: &'a mut MatchEngine,
    state: ReplayState,
}

impl ReplayMatcher<'_> {
    fn probe(&mut self, ply: Option<usize>, board: &Board, hash: u64) {
        let within = ply.map_or(true, |p| self.engine.positional.within_depth(p + 1));
        let depth = ply.map_or(0, |p| p + 1);

        if !self.state.positional_hit
            && within
            && !self.engine.positional.is_empty()
            && self.engine.positional.contains(hash)
        {
            self.state.positional_hit = true;
            self.state.match_ply.get_or_insert(depth);
        }

        if self.state.pattern_label.is_none() && within && !self.engine.patterns.is_empty() {
            if let Some(label) = self.engine.patterns.match_board(board) {
                self.state.pattern_label = Some(label.to_owned());
                self.state.match_ply.get_or_insert(depth);
            }
        }

        if self.state.material_side.is_none() && !self.engine.material.is_empty() {
            let counts = board.material();
            for criteria in &mut self.engine.material {
                if let Some(side) = criteria.try_match(&counts) {
                    self.state.material_side = Some(side);
                    self.state.match_ply.get_or_insert(depth);
                    break;
                }
            }
        }

        self.state.max_halfmove_clock = self.state.max_halfmove_clock.max(board.halfmove_clock);
    }
}

impl ReplayObserver for ReplayMatcher<'_> {
    fn after_ply(&mut self, ply: usize, board: &Board, hash: u64) {
        self.probe(Some(ply), board, hash);
    }
}

impl MatchEngine {
    pub fn new() -> MatchEngine {
        MatchEngine::default()
    }

    /// Any criterion that requires the moves to be replayed?
    pub fn has_replay_criteria(&self) -> bool {
        !self.positional.is_empty() || !self.patterns.is_empty() || !self.material.is_empty()
    }

    /// Replays the game's main line with the engine's observers attached.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError`] when the game's moves cannot be applied;
    /// such games are reported and dropped by the driver.
    pub fn replay(
        &mut self,
        game: &mut Game,
        config: &Config,
    ) -> Result<(ReplayState, Board), ReplayError> {
        for criteria in &mut self.material {
            criteria.reset();
        }

        let mut observer = ReplayMatcher { engine: self, state: ReplayState::default() };
        // Positional and material predicates may already hold in the
        // starting position.
        let starting = game.starting_board().map_err(ReplayError::Fen)?;
        observer.probe(None, &starting, crate::zobrist::hash_board(&starting));

        // The observer holds the engine for the duration of the replay.
        let final_board = apply::apply_move_list(game, config.parser.allow_null_moves, &mut observer)?;
        Ok((observer.state, final_board))
    }

    /// Evaluates a game against every active predicate. Replays the main
    /// line unless a cheap predicate already rejected the game and nobody
    /// needs the replayed state.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError`] when the game's moves cannot be applied;
    /// such games are reported and dropped by the driver.
    pub fn check_game(
        &mut self,
        game: &mut Game,
        config: &Config,
        replay_always: bool,
    ) -> Result<MatchOutcome, ReplayError> {
        let mut outcome = MatchOutcome::default();

        let cheap_pass = self.cheap_checks(game, config);
        if !cheap_pass && !replay_always {
            return Ok(outcome);
        }

        let (state, final_board) = self.replay(game, config)?;
        outcome.replayed = true;

        if !cheap_pass {
            outcome.final_board = Some(final_board);
            return Ok(outcome);
        }

        outcome.matched = self.final_checks(game, config, &state, &final_board);
        outcome.match_ply = state.match_ply;
        outcome.pattern_label = state.pattern_label;
        outcome.material_side = state.material_side;
        outcome.final_board = Some(final_board);
        Ok(outcome)
    }

    /// Predicates that need no replay.
    pub fn cheap_checks(&self, game: &Game, config: &Config) -> bool {
        if !self.tag.matches(game) {
            return false;
        }

        match config.setup_policy {
            SetupPolicy::Either => (),
            SetupPolicy::RequireSetup => {
                if !game.has_tag(tags::SET_UP) && !game.has_tag(tags::FEN) {
                    return false;
                }
            }
            SetupPolicy::ForbidSetup => {
                if game.has_tag(tags::SET_UP) || game.has_tag(tags::FEN) {
                    return false;
                }
            }
        }

        if config.keep_only_commented_games && !game.has_comments() {
            return false;
        }

        if let Some((lower, upper)) = config.bounds {
            let plies = game.ply_count() as u32;
            if plies < lower || plies > upper {
                return false;
            }
        }

        if !self.textual.is_empty() {
            let texts: Vec<String> = game
                .moves
                .iter()
                .map(|m| textual::plain_move_text(&m.text))
                .collect();
            let hit = self.textual.iter().any(|variation| {
                if config.match_permutations {
                    variation.permutation_match(&texts)
                } else {
                    variation.straight_match(&texts)
                }
            });
            if !hit {
                return false;
            }
        }

        true
    }

    /// Predicates over the replayed state and the final board.
    pub fn final_checks(
        &self,
        game: &Game,
        config: &Config,
        state: &ReplayState,
        final_board: &Board,
    ) -> bool {
        if (!self.positional.is_empty() || !self.patterns.is_empty())
            && !state.positional_hit
            && state.pattern_label.is_none()
        {
            return false;
        }

        if !self.material.is_empty() && state.material_side.is_none() {
            return false;
        }

        if config.match_only_checkmate
            && game.moves.last().map(|m| m.check) != Some(CheckStatus::Checkmate)
        {
            return false;
        }

        if config.match_only_stalemate && !apply::is_stalemate(final_board) {
            return false;
        }

        if config.match_only_insufficient
            && !material::insufficient_material(&final_board.material())
        {
            return false;
        }

        if config.check_for_repetition > 0
            && game.max_repetition() < config.check_for_repetition
        {
            return false;
        }

        if config.check_for_n_move_rule > 0
            && state.max_halfmove_clock < 2 * config.check_for_n_move_rule
        {
            return false;
        }

        if config.match_underpromotion {
            let underpromotes = game.moves.iter().any(|m| {
                m.decoded.map_or(false, |d| {
                    d.class == MoveClass::PawnPromotion
                        && d.promotion.map_or(false, |p| p != Role::Queen)
                })
            });
            if !underpromotes {
                return false;
            }
        }

        match config.whose_move {
            WhoseMove::Either => (),
            WhoseMove::White => {
                if final_board.turn != Color::White {
                    return false;
                }
            }
            WhoseMove::Black => {
                if final_board.turn != Color::Black {
                    return false;
                }
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Parser, ParserOpts};
    use crate::tags::TagRegistry;
    use std::io::Cursor;

    fn parse_one(pgn: &str) -> Game {
        let mut registry = TagRegistry::new();
        let mut parser = Parser::new(Cursor::new(pgn.as_bytes().to_vec()), ParserOpts::default());
        parser.next_game(&mut registry).expect("read").expect("one game")
    }

    #[test]
    fn test_everything_off_matches() {
        let mut engine = MatchEngine::new();
        let config = Config::default();
        let mut game = parse_one("1. e4 e5 2. Nf3 Nc6 *");
        let outcome = engine.check_game(&mut game, &config, false).expect("replayable");
        assert!(outcome.matched);
        assert!(outcome.replayed);
        assert!(game.moves_ok);
        assert_ne!(game.final_hash, 0);
    }

    #[test]
    fn test_textual_permutation_example() {
        // The Sicilian without an early Nf3: variation `e4 c5 !Nf3`.
        let mut engine = MatchEngine::new();
        engine.textual.push(TextualVariation::parse("e4 c5 !Nf3").unwrap());
        let config = Config::default();

        let mut game = parse_one("1. e4 c5 2. c3 d5 *");
        assert!(engine.check_game(&mut game, &config, false).unwrap().matched);

        let mut game = parse_one("1. e4 c5 2. Nf3 d6 *");
        assert!(!engine.check_game(&mut game, &config, false).unwrap().matched);
    }

    #[test]
    fn test_positional_transposition() {
        let mut engine = MatchEngine::new();
        engine.positional.add_move_line("1. d4 d5 2. c4").expect("legal");
        let config = Config::default();

        // Reached via the English move order: still a match.
        let mut game = parse_one("1. c4 d5 2. d4 e6 *");
        assert!(engine.check_game(&mut game, &config, false).unwrap().matched);

        let mut game = parse_one("1. e4 e5 2. Nf3 Nc6 *");
        assert!(!engine.check_game(&mut game, &config, false).unwrap().matched);
    }

    #[test]
    fn test_material_stability() {
        let mut engine = MatchEngine::new();
        engine.material.push(MaterialCriteria::parse("2 KR K", false).unwrap());
        let config = Config::default();

        // White wins the rook ending; the relation holds from the capture
        // to the end of the game, well past two plies.
        let mut game = parse_one(
            "[FEN \"4k3/8/8/8/8/8/r7/R3K3 w - - 0 1\"]\n\n1. Rxa2 Kd7 2. Ra5 Kc6 3. Ke2 Kb6 *",
        );
        let outcome = engine.check_game(&mut game, &config, false).unwrap();
        assert!(outcome.matched);
        assert_eq!(outcome.material_side, Some(Color::White));
    }

    #[test]
    fn test_checkmate_only() {
        let mut engine = MatchEngine::new();
        let config = Config { match_only_checkmate: true, ..Config::default() };

        let mut game = parse_one("1. f3 e5 2. g4 Qh4# 0-1");
        assert!(engine.check_game(&mut game, &config, false).unwrap().matched);

        let mut game = parse_one("1. e4 e5 *");
        assert!(!engine.check_game(&mut game, &config, false).unwrap().matched);
    }

    #[test]
    fn test_repetition_threshold() {
        let mut engine = MatchEngine::new();
        let config = Config { check_for_repetition: 3, ..Config::default() };

        // Shuffling knights repeat the starting position three times.
        let mut game = parse_one(
            "1. Nf3 Nf6 2. Ng1 Ng8 3. Nf3 Nf6 4. Ng1 Ng8 *",
        );
        assert!(engine.check_game(&mut game, &config, false).unwrap().matched);

        let mut game = parse_one("1. Nf3 Nf6 2. Ng1 Ng8 *");
        assert!(!engine.check_game(&mut game, &config, false).unwrap().matched);
    }

    #[test]
    fn test_ply_bounds() {
        let mut engine = MatchEngine::new();
        let mut config = Config::default();
        config.set_ply_bounds(4, 10);
        let mut game = parse_one("1. e4 e5 *");
        assert!(!engine.check_game(&mut game, &config, false).unwrap().matched);
        let mut game = parse_one("1. e4 e5 2. Nf3 Nc6 *");
        assert!(engine.check_game(&mut game, &config, false).unwrap().matched);
    }
}
