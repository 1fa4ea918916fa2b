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

//! Duplicate detection within a single run.
//!
//! A game's identity is `(final_hash, cumulative_hash, ply_count)`, so two
//! games with the same moves but different tags are duplicates. With
//! fuzzy matching, identity degrades to the position hash at a fixed ply,
//! catching games that merely transpose early. The index normally lives
//! in memory; `-Z` trades it for a fixed-size probing table backed by
//! `virtual.tmp`, which is removed at end of run.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use fxhash::FxHashMap;

use crate::game::Game;

/// Identifies the source of the prior occurrence of a game.
pub type SourceId = u32;

/// Source id used for games preloaded from a `-c` check file.
pub const CHECK_FILE_SOURCE: SourceId = u32::MAX;

/// What identifies a game for exact duplicate detection.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct GameIdentity {
    pub final_hash: u64,
    pub cumulative_hash: u32,
    pub plies: u32,
}

impl GameIdentity {
    pub fn of(game: &Game) -> GameIdentity {
        GameIdentity {
            final_hash: game.final_hash,
            cumulative_hash: game.cumulative_hash,
            plies: game.ply_count() as u32,
        }
    }
}

const VIRTUAL_FILE: &str = "virtual.tmp";
/// Slots in the on-disk table. Each slot is [`RECORD_SIZE`] bytes.
const VIRTUAL_SLOTS: u64 = 1 << 20;
const RECORD_SIZE: u64 = 24;

#[derive(Debug)]
enum Table {
    Memory(FxHashMap<u64, Vec<(u32, u32, SourceId)>>),
    Virtual { file: File, path: PathBuf },
}

/// The duplicate index.
#[derive(Debug)]
pub struct DuplicateIndex {
    table: Table,
    /// Secondary index keyed by the hash at the fuzzy depth.
    fuzzy: FxHashMap<u64, SourceId>,
    fuzzy_depth: Option<u32>,
}

impl DuplicateIndex {
    /// An in-memory index.
    pub fn new(fuzzy_depth: Option<u32>) -> DuplicateIndex {
        DuplicateIndex {
            table: Table::Memory(FxHashMap::default()),
            fuzzy: FxHashMap::default(),
            fuzzy_depth,
        }
    }

    /// A spill-to-disk index backed by `virtual.tmp` in the working
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the backing file cannot be created.
    pub fn with_virtual_table(fuzzy_depth: Option<u32>) -> io::Result<DuplicateIndex> {
        let path = PathBuf::from(VIRTUAL_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        file.set_len(VIRTUAL_SLOTS * RECORD_SIZE)?;
        Ok(DuplicateIndex {
            table: Table::Virtual { file, path },
            fuzzy: FxHashMap::default(),
            fuzzy_depth,
        })
    }

    /// Records a replayed game and reports the source of its prior
    /// occurrence, if any. Insertion happens regardless of what the
    /// caller then does with the game.
    ///
    /// # Errors
    ///
    /// I/O errors from the virtual table only.
    pub fn check_and_insert(&mut self, game: &Game, source: SourceId) -> io::Result<Option<SourceId>> {
        if let Some(depth) = self.fuzzy_depth {
            if let Some(record) = game.moves.get(depth.saturating_sub(1) as usize) {
                let key = record.hash_after;
                let prior = self.fuzzy.get(&key).copied();
                self.fuzzy.entry(key).or_insert(source);
                return Ok(prior);
            }
            // Shorter than the fuzzy depth: fall through to exact match.
        }
        self.exact_check_and_insert(GameIdentity::of(game), source)
    }

    fn exact_check_and_insert(
        &mut self,
        identity: GameIdentity,
        source: SourceId,
    ) -> io::Result<Option<SourceId>> {
        match &mut self.table {
            Table::Memory(map) => {
                let bucket = map.entry(identity.final_hash).or_default();
                for &(cumulative, plies, prior) in bucket.iter() {
                    if cumulative == identity.cumulative_hash && plies == identity.plies {
                        return Ok(Some(prior));
                    }
                }
                bucket.push((identity.cumulative_hash, identity.plies, source));
                Ok(None)
            }
            Table::Virtual { file, .. } => {
                let mut slot = identity.final_hash % VIRTUAL_SLOTS;
                // Linear probing; give up after a bounded scan rather than
                // looping over a full table.
                for _ in 0..4096 {
                    let mut record = [0u8; RECORD_SIZE as usize];
                    file.seek(SeekFrom::Start(slot * RECORD_SIZE))?;
                    file.read_exact(&mut record)?;
                    if record[0] == 0 {
                        // Free slot: claim it.
                        record[0] = 1;
                        record[4..12].copy_from_slice(&identity.final_hash.to_le_bytes());
                        record[12..16].copy_from_slice(&identity.cumulative_hash.to_le_bytes());
                        record[16..20].copy_from_slice(&identity.plies.to_le_bytes());
                        record[20..24].copy_from_slice(&source.to_le_bytes());
                        file.seek(SeekFrom::Start(slot * RECORD_SIZE))?;
                        file.write_all(&record)?;
                        return Ok(None);
                    }
                    let final_hash = u64::from_le_bytes(record[4..12].try_into().expect("8 bytes"));
                    let cumulative = u32::from_le_bytes(record[12..16].try_into().expect("4 bytes"));
                    let plies = u32::from_le_bytes(record[16..20].try_into().expect("4 bytes"));
                    if final_hash == identity.final_hash
                        && cumulative == identity.cumulative_hash
                        && plies == identity.plies
                    {
                        let prior = u32::from_le_bytes(record[20..24].try_into().expect("4 bytes"));
                        return Ok(Some(prior));
                    }
                    slot = (slot + 1) % VIRTUAL_SLOTS;
                }
                // Table effectively full; treat the game as unseen.
                Ok(None)
            }
        }
    }
}

impl Drop for DuplicateIndex {
    fn drop(&mut self) {
        if let Table::Virtual { path, .. } = &self.table {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game_with(final_hash: u64, cumulative_hash: u32, plies: usize) -> Game {
        let mut game = Game::new();
        game.final_hash = final_hash;
        game.cumulative_hash = cumulative_hash;
        for _ in 0..plies {
            game.moves.push(crate::moves::MoveRecord::new(
                b"e4".to_vec(),
                "e4".parse().expect("valid san"),
            ));
        }
        game
    }

    #[test]
    fn test_exact_duplicate() {
        let mut index = DuplicateIndex::new(None);
        let first = game_with(0xabc, 7, 4);
        assert_eq!(index.check_and_insert(&first, 0).unwrap(), None);
        // Same identity from another file: reported against the first.
        let second = game_with(0xabc, 7, 4);
        assert_eq!(index.check_and_insert(&second, 1).unwrap(), Some(0));
        // Hash collision with different ply count is not a duplicate.
        let third = game_with(0xabc, 7, 6);
        assert_eq!(index.check_and_insert(&third, 2).unwrap(), None);
        let fourth = game_with(0xabc, 8, 4);
        assert_eq!(index.check_and_insert(&fourth, 3).unwrap(), None);
    }

    #[test]
    fn test_fuzzy_duplicate() {
        let mut index = DuplicateIndex::new(Some(2));
        let mut first = game_with(0x1, 1, 4);
        first.moves[1].hash_after = 0xfeed;
        let mut second = game_with(0x2, 2, 6);
        second.moves[1].hash_after = 0xfeed;
        assert_eq!(index.check_and_insert(&first, 0).unwrap(), None);
        assert_eq!(index.check_and_insert(&second, 1).unwrap(), Some(0));
    }

    #[test]
    fn test_virtual_table() {
        let dir = std::env::temp_dir().join("pgn-sift-virtual-test");
        std::fs::create_dir_all(&dir).unwrap();
        let cwd = std::env::current_dir().unwrap();
        std::env::set_current_dir(&dir).unwrap();

        {
            let mut index = DuplicateIndex::with_virtual_table(None).expect("create table");
            let first = game_with(0xdead_beef, 42, 10);
            assert_eq!(index.check_and_insert(&first, 5).unwrap(), None);
            assert_eq!(index.check_and_insert(&first, 6).unwrap(), Some(5));
            assert!(std::path::Path::new(VIRTUAL_FILE).exists());
        }
        // Dropped: the backing file is gone.
        assert!(!std::path::Path::new(VIRTUAL_FILE).exists());

        std::env::set_current_dir(cwd).unwrap();
    }
}
