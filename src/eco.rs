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

//! ECO classification.
//!
//! The classification file is ordinary PGN parsed by the normal parser:
//! each game is one opening line with `ECO` (and optionally `Opening`,
//! `Variation`, `SubVariation`) tags. Lines are keyed by the hash of their
//! final position together with its half-move count. A game is classified
//! by the deepest position it reaches that carries a key.

use fxhash::FxHashMap;

use crate::game::Game;
use crate::tags;

/// The classification attached to one opening line.
#[derive(Clone, Debug)]
pub struct EcoEntry {
    pub eco: Vec<u8>,
    pub opening: Option<Vec<u8>>,
    pub variation: Option<Vec<u8>>,
    pub sub_variation: Option<Vec<u8>>,
}

/// The table of opening lines.
#[derive(Debug, Default)]
pub struct EcoTable {
    map: FxHashMap<(u64, u32), EcoEntry>,
    /// The longest line in the table bounds the classification scan.
    max_plies: u32,
}

impl EcoTable {
    pub fn new() -> EcoTable {
        EcoTable::default()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Stores one replayed opening line. Lines without an `ECO` tag or
    /// with unplayable moves are skipped by the caller.
    pub fn add_line(&mut self, game: &Game) {
        let eco = match game.tag(tags::ECO) {
            Some(eco) => eco.to_vec(),
            None => return,
        };
        let plies = game.ply_count() as u32;
        let entry = EcoEntry {
            eco,
            opening: game.tag(tags::OPENING).map(<[u8]>::to_vec),
            variation: game.tag(tags::VARIATION_NAME).map(<[u8]>::to_vec),
            sub_variation: game.tag(tags::SUB_VARIATION).map(<[u8]>::to_vec),
        };
        self.map.insert((game.final_hash, plies), entry);
        self.max_plies = self.max_plies.max(plies);
    }

    /// Classifies a replayed game by its deepest position that is a known
    /// opening line.
    pub fn classify(&self, game: &Game) -> Option<&EcoEntry> {
        let mut best = None;
        let scan = (self.max_plies as usize).min(game.ply_count());
        for (ply, record) in game.moves.iter().take(scan).enumerate() {
            if let Some(entry) = self.map.get(&(record.hash_after, ply as u32 + 1)) {
                best = Some(entry);
            }
        }
        best
    }

    /// Writes the classification into the game's tags.
    pub fn apply(&self, game: &mut Game) {
        if let Some(entry) = self.classify(game) {
            let entry = entry.clone();
            game.set_tag(tags::ECO, entry.eco);
            match entry.opening {
                Some(opening) => game.set_tag(tags::OPENING, opening),
                None => game.remove_tag(tags::OPENING),
            }
            match entry.variation {
                Some(variation) => game.set_tag(tags::VARIATION_NAME, variation),
                None => game.remove_tag(tags::VARIATION_NAME),
            }
            match entry.sub_variation {
                Some(sub) => game.set_tag(tags::SUB_VARIATION, sub),
                None => game.remove_tag(tags::SUB_VARIATION),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::{self, NoObserver};
    use crate::parser::{Parser, ParserOpts};
    use crate::tags::TagRegistry;
    use std::io::Cursor;

    fn replayed(pgn: &str) -> Game {
        let mut registry = TagRegistry::new();
        let mut parser = Parser::new(Cursor::new(pgn.as_bytes().to_vec()), ParserOpts::default());
        let mut game = parser.next_game(&mut registry).expect("read").expect("one game");
        apply::apply_move_list(&mut game, false, &mut NoObserver).expect("replayable");
        game
    }

    #[test]
    fn test_classification_prefers_deepest_line() {
        let mut table = EcoTable::new();
        table.add_line(&replayed("[ECO \"B20\"]\n\n1. e4 c5 *"));
        table.add_line(&replayed("[ECO \"B27\"]\n[Opening \"Sicilian\"]\n\n1. e4 c5 2. Nf3 g6 *"));
        assert_eq!(table.len(), 2);

        let mut game = replayed("1. e4 c5 2. Nf3 g6 3. d4 cxd4 *");
        table.apply(&mut game);
        assert_eq!(game.tag(tags::ECO), Some(&b"B27"[..]));
        assert_eq!(game.tag(tags::OPENING), Some(&b"Sicilian"[..]));

        let mut game = replayed("1. e4 c5 2. c3 d5 *");
        table.apply(&mut game);
        assert_eq!(game.tag(tags::ECO), Some(&b"B20"[..]));

        let mut game = replayed("1. d4 d5 *");
        table.apply(&mut game);
        assert_eq!(game.tag(tags::ECO), None);
    }
}
