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

//! The tag name registry.
//!
//! Tag names are interned into dense indices so that a game's tag table is
//! a plain vector. The registry is seeded with the names the tool knows
//! about and grows when input files carry tags it has never seen.

use fxhash::FxHashMap;

pub type TagId = usize;

// The Seven Tag Roster, in output order.
pub const EVENT: TagId = 0;
pub const SITE: TagId = 1;
pub const DATE: TagId = 2;
pub const ROUND: TagId = 3;
pub const WHITE: TagId = 4;
pub const BLACK: TagId = 5;
pub const RESULT: TagId = 6;

// Frequent supplemental tags.
pub const WHITE_ELO: TagId = 7;
pub const BLACK_ELO: TagId = 8;
pub const ECO: TagId = 9;
pub const FEN: TagId = 10;
pub const SET_UP: TagId = 11;
pub const VARIANT: TagId = 12;
pub const PLY_COUNT: TagId = 13;
pub const ANNOTATOR: TagId = 14;
pub const EVENT_DATE: TagId = 15;
pub const TIME_CONTROL: TagId = 16;
pub const TERMINATION: TagId = 17;
pub const UTC_DATE: TagId = 18;
pub const UTC_TIME: TagId = 19;

// Tags this tool synthesises.
pub const HASH_CODE: TagId = 20;
pub const MATERIAL_MATCH: TagId = 21;
pub const MATCH_LABEL: TagId = 22;
pub const TOTAL_PLY_COUNT: TagId = 23;

// ECO classification file tags.
pub const OPENING: TagId = 24;
pub const VARIATION_NAME: TagId = 25;
pub const SUB_VARIATION: TagId = 26;

// Pseudo tags, usable in tag criteria files but never stored in a game.
pub const ELO_DIFF: TagId = 27;
pub const FEN_PATTERN: TagId = 28;
pub const FEN_PATTERN_I: TagId = 29;

const KNOWN_TAGS: [&str; 30] = [
    "Event", "Site", "Date", "Round", "White", "Black", "Result",
    "WhiteElo", "BlackElo", "ECO", "FEN", "SetUp", "Variant", "PlyCount",
    "Annotator", "EventDate", "TimeControl", "Termination", "UTCDate",
    "UTCTime", "HashCode", "MaterialMatch", "MatchLabel", "TotalPlyCount",
    "Opening", "Variation", "SubVariation",
    "EloDiff", "FENPattern", "FENPatternI",
];

pub const STR_TAGS: [TagId; 7] = [EVENT, SITE, DATE, ROUND, WHITE, BLACK, RESULT];

#[derive(Debug)]
pub struct TagRegistry {
    names: Vec<Vec<u8>>,
    index: FxHashMap<Vec<u8>, TagId>,
}

impl TagRegistry {
    pub fn new() -> TagRegistry {
        let mut registry = TagRegistry {
            names: Vec::with_capacity(KNOWN_TAGS.len()),
            index: FxHashMap::default(),
        };
        for name in &KNOWN_TAGS {
            let id = registry.names.len();
            registry.names.push(name.as_bytes().to_vec());
            registry.index.insert(name.as_bytes().to_vec(), id);
        }
        registry
    }

    /// The id for a tag name, interning it if unseen.
    pub fn id(&mut self, name: &[u8]) -> TagId {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = self.names.len();
        self.names.push(name.to_vec());
        self.index.insert(name.to_vec(), id);
        id
    }

    /// The id for a tag name without interning.
    pub fn lookup(&self, name: &[u8]) -> Option<TagId> {
        self.index.get(name).copied()
    }

    pub fn name(&self, id: TagId) -> &[u8] {
        &self.names[id]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for TagRegistry {
    fn default() -> TagRegistry {
        TagRegistry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_tags_are_seeded() {
        let registry = TagRegistry::new();
        assert_eq!(registry.lookup(b"Event"), Some(EVENT));
        assert_eq!(registry.lookup(b"Result"), Some(RESULT));
        assert_eq!(registry.lookup(b"FEN"), Some(FEN));
        assert_eq!(registry.name(WHITE_ELO), b"WhiteElo");
    }

    #[test]
    fn test_interning_extends() {
        let mut registry = TagRegistry::new();
        assert_eq!(registry.lookup(b"MyCustomTag"), None);
        let id = registry.id(b"MyCustomTag");
        assert_eq!(registry.id(b"MyCustomTag"), id);
        assert_eq!(registry.name(id), b"MyCustomTag");
    }
}
