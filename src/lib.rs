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

//! A library for sifting large PGN collections.
//!
//! Games stream through a single-pass pipeline: bytes are lexed and
//! parsed one game at a time, every move is legalised against a real
//! board, a set of selection predicates decides whether the game is
//! wanted, and wanted games are re-emitted in one of several notations.
//! One game is held in memory at a time, so inputs with millions of games
//! are fine.
//!
//! # Examples
//!
//! Parse a game and replay its moves:
//!
//! ```
//! use std::io::Cursor;
//! use pgn_sift::apply::{self, NoObserver};
//! use pgn_sift::parser::{Parser, ParserOpts};
//! use pgn_sift::tags::TagRegistry;
//!
//! let pgn = "[Event \"Example\"]\n\n1. e4 e5 2. Nf3 Nc6 *\n";
//! let mut registry = TagRegistry::new();
//! let mut parser = Parser::new(Cursor::new(pgn.as_bytes()), ParserOpts::default());
//!
//! let mut game = parser.next_game(&mut registry)?.expect("one game");
//! apply::apply_move_list(&mut game, false, &mut NoObserver).expect("legal moves");
//! assert!(game.moves_ok);
//! assert_eq!(game.ply_count(), 4);
//! # Ok::<_, std::io::Error>(())
//! ```
//!
//! Select games by a textual variation:
//!
//! ```
//! use pgn_sift::matcher::{textual::TextualVariation, MatchEngine};
//!
//! let mut engine = MatchEngine::new();
//! engine.textual.push(TextualVariation::parse("e4 c5 !Nf3").expect("non-blank"));
//! ```

#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

pub mod apply;
pub mod attacks;
pub mod board;
pub mod config;
pub mod dedup;
pub mod driver;
pub mod eco;
pub mod fen;
pub mod game;
pub mod lexer;
pub mod matcher;
pub mod moves;
pub mod output;
pub mod parser;
pub mod san;
pub mod square;
pub mod tags;
pub mod types;
pub mod zobrist;

pub use crate::board::Board;
pub use crate::config::Config;
pub use crate::driver::Driver;
pub use crate::game::Game;
pub use crate::matcher::MatchEngine;
pub use crate::san::{San, SanPlus};
pub use crate::square::Square;
pub use crate::types::{CastlingSide, CheckStatus, Color, Outcome, Piece, Role};
