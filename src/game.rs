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

use fxhash::FxHashMap;

use crate::board::Board;
use crate::fen::{self, FenError};
use crate::moves::{Comment, MoveRecord, Variation};
use crate::tags::{self, TagId};
use crate::types::Outcome;

/// One parsed game: tags, movetext and the state the applier fills in
/// during replay. A game is transient; the driver drops it before parsing
/// the next one.
#[derive(Debug, Default)]
pub struct Game {
    /// Dense tag table indexed by [`TagId`].
    tags: Vec<Option<Vec<u8>>>,
    /// Comments before the first tag or move.
    pub prefix: Vec<Comment>,
    /// Variations that appeared before any move had been played. Anchored
    /// to the game itself rather than being dropped.
    pub prefix_variations: Vec<Variation>,
    pub moves: Vec<MoveRecord>,
    /// The terminating result of the main line.
    pub result: Option<Outcome>,
    /// Source location, 1-based and inclusive.
    pub start_line: u64,
    pub end_line: u64,
    /// Parse recovered from an error; only kept with `--keepbroken`.
    pub broken: bool,
    /// The game must be dropped regardless of other settings, e.g. for an
    /// inconsistent result under `--nobadresults`.
    pub rejected: bool,
    pub moves_checked: bool,
    pub moves_ok: bool,
    pub error_ply: Option<usize>,
    /// How often each position occurred during replay, for repetition
    /// detection. Keyed by position hash.
    pub position_counts: FxHashMap<u64, u32>,
    /// Hash of the final position.
    pub final_hash: u64,
    /// Wrapping sum of the hash after every ply; a fingerprint of the
    /// played sequence.
    pub cumulative_hash: u32,
}

impl Game {
    pub fn new() -> Game {
        Game::default()
    }

    pub fn tag(&self, id: TagId) -> Option<&[u8]> {
        self.tags.get(id).and_then(|v| v.as_deref())
    }

    pub fn set_tag(&mut self, id: TagId, value: Vec<u8>) {
        if self.tags.len() <= id {
            self.tags.resize(id + 1, None);
        }
        self.tags[id] = Some(value);
    }

    pub fn remove_tag(&mut self, id: TagId) {
        if let Some(slot) = self.tags.get_mut(id) {
            *slot = None;
        }
    }

    pub fn has_tag(&self, id: TagId) -> bool {
        self.tag(id).is_some()
    }

    /// Iterator over `(id, value)` for every tag that is set.
    pub fn tag_pairs(&self) -> impl Iterator<Item = (TagId, &[u8])> {
        self.tags
            .iter()
            .enumerate()
            .filter_map(|(id, v)| v.as_deref().map(|v| (id, v)))
    }

    /// Number of half-moves in the main line.
    pub fn ply_count(&self) -> usize {
        self.moves.len()
    }

    /// The position the game starts from: the `FEN` tag if present,
    /// otherwise the standard starting position.
    ///
    /// # Errors
    ///
    /// Returns a [`FenError`] when the `FEN` tag does not parse.
    pub fn starting_board(&self) -> Result<Board, FenError> {
        match self.tag(tags::FEN) {
            Some(fen_tag) => fen::board_from_fen(fen_tag),
            None => Ok(Board::new()),
        }
    }

    /// True if any comment is attached anywhere: the game prefix, a move,
    /// or inside a variation.
    pub fn has_comments(&self) -> bool {
        fn moves_have_comments(moves: &[MoveRecord]) -> bool {
            moves.iter().any(|m| {
                !m.comments.is_empty()
                    || m.variations.iter().any(|v| variation_has_comments(v))
            })
        }
        fn variation_has_comments(variation: &Variation) -> bool {
            !variation.prefix.is_empty()
                || !variation.suffix.is_empty()
                || moves_have_comments(&variation.moves)
        }
        !self.prefix.is_empty() || moves_have_comments(&self.moves)
    }

    /// The highest occurrence count of any position during replay.
    pub fn max_repetition(&self) -> u32 {
        self.position_counts.values().copied().max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::san::San;

    #[test]
    fn test_tag_table() {
        let mut game = Game::new();
        assert_eq!(game.tag(tags::EVENT), None);
        game.set_tag(tags::EVENT, b"Hastings".to_vec());
        game.set_tag(tags::ECO, b"B12".to_vec());
        assert_eq!(game.tag(tags::EVENT), Some(&b"Hastings"[..]));
        assert_eq!(game.tag(tags::ECO), Some(&b"B12"[..]));
        assert_eq!(game.tag_pairs().count(), 2);
        game.remove_tag(tags::ECO);
        assert_eq!(game.tag(tags::ECO), None);
    }

    #[test]
    fn test_comment_detection_descends_into_variations() {
        let mut game = Game::new();
        let mut m = MoveRecord::new(b"e4".to_vec(), "e4".parse::<San>().unwrap());
        assert!(!game.has_comments());
        let mut variation = Variation::default();
        variation
            .moves
            .push(MoveRecord::new(b"d4".to_vec(), "d4".parse::<San>().unwrap()));
        variation.moves[0].comments.push(b"queen's pawn".to_vec());
        m.variations.push(variation);
        game.moves.push(m);
        assert!(game.has_comments());
    }
}
