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

//! Positional (transposition-aware) matching.
//!
//! Wanted positions are stored as Polyglot hashes, however they were
//! given: as a move sequence played out from the initial position, as a
//! FEN string, or as an explicit hash value. A game matches when any
//! replayed position within the search depth carries a wanted hash.

use std::error::Error;
use std::fmt;

use fxhash::FxHashSet;

use crate::apply::{self, HashedBoard};
use crate::board::Board;
use crate::fen;
use crate::san::SanPlus;
use crate::zobrist;

/// Extra plies searched beyond the longest variation, to catch
/// transpositions that interpose moves.
const TRANSPOSITION_SLACK: u32 = 8;

/// Error when registering a wanted position.
#[derive(Debug)]
pub enum BadPosition {
    UnplayableMove(String),
    Fen(fen::FenError),
    Hex(String),
}

impl fmt::Display for BadPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            BadPosition::UnplayableMove(ref san) => write!(f, "failed to identify {}", san),
            BadPosition::Fen(ref err) => err.fmt(f),
            BadPosition::Hex(ref value) => write!(f, "bad hash value {}", value),
        }
    }
}

impl Error for BadPosition {}

#[derive(Debug, Default)]
pub struct PositionalMatcher {
    hashes: FxHashSet<u64>,
    /// Plies to search per game; 0 means the whole game.
    pub depth: u32,
}

impl PositionalMatcher {
    pub fn new() -> PositionalMatcher {
        PositionalMatcher::default()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Plays a move line from the initial position and stores the final
    /// hash. Move numbers are tolerated; `*` ends the line.
    ///
    /// # Errors
    ///
    /// Returns [`BadPosition`] for a move that cannot be played.
    pub fn add_move_line(&mut self, line: &str) -> Result<(), BadPosition> {
        let mut board = HashedBoard::new(Board::new());
        let mut plies = 0u32;
        for token in line.split_whitespace() {
            if token == "*" {
                break;
            }
            let token = token
                .trim_start_matches(|c: char| c.is_ascii_digit())
                .trim_start_matches('.');
            if token.is_empty() {
                continue;
            }
            let san = SanPlus::from_ascii(token.as_bytes())
                .map_err(|_| BadPosition::UnplayableMove(token.to_owned()))?
                .san;
            let m = apply::decode_san(&board.board, &san, true)
                .map_err(|_| BadPosition::UnplayableMove(token.to_owned()))?;
            board.play(&m);
            plies += 1;
        }
        if plies == 0 {
            return Ok(());
        }
        self.hashes.insert(board.hash());
        self.deepen(plies + TRANSPOSITION_SLACK);
        Ok(())
    }

    /// Stores the hash of a position given as a FEN.
    pub fn add_fen(&mut self, fen_text: &[u8]) -> Result<(), BadPosition> {
        let board = fen::board_from_fen(fen_text).map_err(BadPosition::Fen)?;
        self.hashes.insert(zobrist::hash_board(&board));
        Ok(())
    }

    /// Stores an explicit Polyglot hash given in hex.
    pub fn add_hex(&mut self, value: &str) -> Result<(), BadPosition> {
        let hash = u64::from_str_radix(value.trim(), 16)
            .map_err(|_| BadPosition::Hex(value.to_owned()))?;
        self.hashes.insert(hash);
        Ok(())
    }

    fn deepen(&mut self, depth: u32) {
        if depth > self.depth {
            self.depth = depth;
        }
    }

    /// Is this ply still within the search depth?
    pub fn within_depth(&self, ply: usize) -> bool {
        self.depth == 0 || (ply as u32) < self.depth
    }

    pub fn contains(&self, hash: u64) -> bool {
        self.hashes.contains(&hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_line_matches_transposition() {
        let mut matcher = PositionalMatcher::new();
        matcher.add_move_line("1. d4 d5 2. c4").expect("legal line");
        assert_eq!(matcher.depth, 3 + TRANSPOSITION_SLACK);

        // The same position reached with the English move order.
        let mut board = HashedBoard::new(Board::new());
        for token in ["c4", "d5", "d4"] {
            let san = SanPlus::from_ascii(token.as_bytes()).unwrap().san;
            let m = apply::decode_san(&board.board, &san, false).unwrap();
            board.play(&m);
        }
        assert!(matcher.contains(board.hash()));
    }

    #[test]
    fn test_fen_and_hex() {
        let mut matcher = PositionalMatcher::new();
        matcher
            .add_fen(b"rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1")
            .expect("valid fen");
        assert!(matcher.contains(0x463b96181691fc9c));
        matcher.add_hex("823c9b50fd114196").expect("valid hex");
        assert!(matcher.contains(0x823c9b50fd114196));
        assert!(matcher.add_hex("nonsense").is_err());
    }

    #[test]
    fn test_depth_window() {
        let mut matcher = PositionalMatcher::new();
        assert!(matcher.within_depth(1000), "no depth limit by default");
        matcher.add_move_line("1. e4").expect("legal");
        assert!(matcher.within_depth(0));
        assert!(!matcher.within_depth((1 + TRANSPOSITION_SLACK) as usize));
    }
}
