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

//! Material criteria: required piece counts with relational qualifiers.
//!
//! A criterion is written as an optional stability depth followed by two
//! piece sets, e.g. `4 KRP1+ KR`. Within a set each piece letter takes an
//! optional count and qualifier:
//!
//! | suffix | meaning |
//! |---|---|
//! | *(none)* | exactly `n` |
//! | `*` | zero or more |
//! | `+` | `n` or more |
//! | `n-` | `n` or fewer |
//! | `?` | at most one |
//! | `=` | same count as the opponent |
//! | `#` | different count from the opponent |
//! | `<` / `<=` | `n` fewer (or exactly `n` fewer) than the opponent |
//! | `>` / `>=` | `n` more (or exactly `n` more) than the opponent |
//!
//! `L` counts minor pieces (bishops and knights together). Sets are
//! separated by whitespace, `v`, or a bare `-`; an absent second set means
//! a lone king. The relation must hold for `move_depth` consecutive
//! half-moves before a game matches (two by default).

use std::error::Error;
use std::fmt;

use crate::board::MaterialCount;
use crate::types::{Color, Role, Black, White};

/// Error when parsing a material description.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct BadMaterial {
    pub reason: &'static str,
}

impl fmt::Display for BadMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bad material description: {}", self.reason)
    }
}

impl Error for BadMaterial {}

/// How a required count relates to what is on the board.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum Occurs {
    #[default]
    Exactly,
    NumOrMore,
    NumOrLess,
    SameAsOpponent,
    NotSameAsOpponent,
    LessThanOpponent,
    MoreThanOpponent,
    LessEqThanOpponent,
    MoreEqThanOpponent,
}

/// A single material criterion. Criteria form a list; the engine matches a
/// game if any criterion reaches a stable match.
#[derive(Clone, Debug)]
pub struct MaterialCriteria {
    /// Try the piece sets against both colour assignments.
    pub both_colours: bool,
    num_pieces: [[u8; 6]; 2],
    occurs: [[Occurs; 6]; 2],
    num_minor: [u8; 2],
    minor_occurs: [Occurs; 2],
    /// Half-moves the relation must hold before a match is accepted.
    pub move_depth: u32,
    match_depth: [u32; 2],
}

impl MaterialCriteria {
    fn new(both_colours: bool) -> MaterialCriteria {
        let mut criteria = MaterialCriteria {
            both_colours,
            num_pieces: [[0; 6]; 2],
            occurs: [[Occurs::Exactly; 6]; 2],
            num_minor: [0; 2],
            minor_occurs: [Occurs::Exactly; 2],
            move_depth: 2,
            match_depth: [0; 2],
        };
        // Only the king is required by default, for each side.
        criteria.num_pieces[0][Role::King as usize] = 1;
        criteria.num_pieces[1][Role::King as usize] = 1;
        criteria
    }

    /// Parses a material description line.
    ///
    /// # Errors
    ///
    /// Returns [`BadMaterial`] for unknown symbols, counts above 9, or
    /// impossible king and pawn counts.
    pub fn parse(line: &str, both_colours: bool) -> Result<MaterialCriteria, BadMaterial> {
        let mut criteria = MaterialCriteria::new(both_colours);
        let bytes = line.trim().as_bytes();
        let mut i = 0;

        // Optional leading stability depth.
        if bytes.first().map_or(false, u8::is_ascii_digit) {
            let mut depth: u32 = 0;
            while bytes.get(i).map_or(false, u8::is_ascii_digit) {
                depth = depth * 10 + u32::from(bytes[i] - b'0');
                i += 1;
            }
            criteria.move_depth = depth;
        }
        while bytes.get(i).map_or(false, |b| b.is_ascii_whitespace()) {
            i += 1;
        }

        i = criteria.parse_piece_set(bytes, i, 0)?;

        // Separator: whitespace, 'v', or a bare '-'.
        let mut separated = false;
        while bytes
            .get(i)
            .map_or(false, |&b| b.is_ascii_whitespace() || b == b'v' || b == b'-')
        {
            separated = true;
            i += 1;
        }
        if separated && i < bytes.len() {
            criteria.parse_piece_set(bytes, i, 1)?;
        }
        // An absent second set leaves the default lone king.

        Ok(criteria)
    }

    fn parse_piece_set(
        &mut self,
        bytes: &[u8],
        mut i: usize,
        set: usize,
    ) -> Result<usize, BadMaterial> {
        let mut any = false;
        while let Some(&ch) = bytes.get(i) {
            if ch.is_ascii_whitespace() || ch == b'v' {
                break;
            }
            if ch == b'-' && !bytes.get(i.wrapping_sub(1)).map_or(false, u8::is_ascii_digit) {
                // A '-' that does not follow a digit separates the sets.
                break;
            }
            if ch == b'L' || ch == b'l' {
                i += 1;
                let (number, occurs, rest) = parse_combination(bytes, i)?;
                self.num_minor[set] = number;
                self.minor_occurs[set] = occurs;
                i = rest;
                any = true;
                continue;
            }
            let role = Role::from_char(char::from(ch)).ok_or(BadMaterial { reason: "unknown piece letter" })?;
            i += 1;
            let (mut number, occurs, rest) = parse_combination(bytes, i)?;
            if role == Role::King && number != 1 {
                number = 1;
            }
            if role == Role::Pawn && number > 8 {
                return Err(BadMaterial { reason: "more than 8 pawns" });
            }
            self.num_pieces[set][role as usize] = number;
            self.occurs[set][role as usize] = occurs;
            i = rest;
            any = true;
        }
        if any {
            Ok(i)
        } else {
            Err(BadMaterial { reason: "empty piece set" })
        }
    }

    /// Clears the per-game stability state.
    pub fn reset(&mut self) {
        self.match_depth = [0; 2];
    }

    /// One position's worth of matching. Returns the colour that reached
    /// a stable match, preferring white's interpretation.
    pub fn try_match(&mut self, counts: &MaterialCount) -> Option<Color> {
        if self.material_match(counts, White) {
            return Some(White);
        }
        if self.both_colours && self.material_match(counts, Black) {
            return Some(Black);
        }
        None
    }

    /// Single-position test with no stability requirement, for use as a
    /// FEN pattern constraint.
    pub fn constraint_matches(&self, counts: &MaterialCount) -> bool {
        if self.sets_match(counts, White) {
            return true;
        }
        self.both_colours && self.sets_match(counts, Black)
    }

    fn material_match(&mut self, counts: &MaterialCount, game_colour: Color) -> bool {
        if self.sets_match(counts, game_colour) {
            if self.match_depth[game_colour as usize] < self.move_depth {
                self.match_depth[game_colour as usize] += 1;
                false
            } else {
                true
            }
        } else {
            self.match_depth[game_colour as usize] = 0;
            false
        }
    }

    /// Matches the first piece set against `game_colour` and the second
    /// against the opponent.
    fn sets_match(&self, counts: &MaterialCount, game_colour: Color) -> bool {
        self.set_match(counts, game_colour, 0) && self.set_match(counts, !game_colour, 1)
    }

    fn set_match(&self, counts: &MaterialCount, game_colour: Color, set: usize) -> bool {
        // A failure on a minor piece may be recovered by a combined minor
        // count requirement.
        let mut minor_failure = false;

        for &role in &[Role::Pawn, Role::Knight, Role::Bishop, Role::Rook, Role::Queen] {
            let available = counts.by_piece(game_colour, role);
            let opponents = counts.by_piece(!game_colour, role);
            let ok = piece_match(
                available,
                self.num_pieces[set][role as usize],
                opponents,
                self.occurs[set][role as usize],
            );
            if !ok {
                if role.is_minor() {
                    minor_failure = true;
                } else {
                    return false;
                }
            }
        }

        let num_to_find = self.num_minor[set];
        let occurs = self.minor_occurs[set];
        if num_to_find > 0 || occurs != Occurs::Exactly {
            piece_match(
                counts.minors(game_colour),
                num_to_find,
                counts.minors(!game_colour),
                occurs,
            )
        } else {
            !minor_failure
        }
    }
}

fn parse_combination(bytes: &[u8], mut i: usize) -> Result<(u8, Occurs, usize), BadMaterial> {
    let mut number = 1u8;
    if bytes.get(i).map_or(false, u8::is_ascii_digit) {
        number = bytes[i] - b'0';
        i += 1;
        if bytes.get(i).map_or(false, u8::is_ascii_digit) {
            return Err(BadMaterial { reason: "counts above 9 are not supported" });
        }
    }
    let occurs = match bytes.get(i) {
        Some(b'*') => {
            number = 0;
            i += 1;
            Occurs::NumOrMore
        }
        Some(b'+') => {
            i += 1;
            Occurs::NumOrMore
        }
        Some(b'-') if bytes.get(i.wrapping_sub(1)).map_or(false, u8::is_ascii_digit) => {
            i += 1;
            Occurs::NumOrLess
        }
        Some(b'?') => {
            number = 1;
            i += 1;
            Occurs::NumOrLess
        }
        Some(b'=') => {
            i += 1;
            Occurs::SameAsOpponent
        }
        Some(b'#') => {
            i += 1;
            Occurs::NotSameAsOpponent
        }
        Some(b'<') => {
            i += 1;
            if bytes.get(i) == Some(&b'=') {
                i += 1;
                Occurs::LessEqThanOpponent
            } else {
                Occurs::LessThanOpponent
            }
        }
        Some(b'>') => {
            i += 1;
            if bytes.get(i) == Some(&b'=') {
                i += 1;
                Occurs::MoreEqThanOpponent
            } else {
                Occurs::MoreThanOpponent
            }
        }
        _ => Occurs::Exactly,
    };
    Ok((number, occurs, i))
}

fn piece_match(available: u8, to_find: u8, opponents: u8, occurs: Occurs) -> bool {
    let available = i32::from(available);
    let to_find = i32::from(to_find);
    let opponents = i32::from(opponents);
    match occurs {
        Occurs::Exactly => available == to_find,
        Occurs::NumOrMore => available >= to_find,
        Occurs::NumOrLess => available <= to_find,
        Occurs::SameAsOpponent => available == opponents,
        Occurs::NotSameAsOpponent => available != opponents,
        Occurs::LessThanOpponent => available + to_find <= opponents,
        Occurs::MoreThanOpponent => available - to_find >= opponents,
        Occurs::LessEqThanOpponent => available + to_find == opponents,
        Occurs::MoreEqThanOpponent => available - to_find == opponents,
    }
}

/// Neither side can force mate: no pawns, rooks or queens; at most one
/// bishop per side and never bishop plus knight; a pair of knights counts
/// as sufficient, since mates with two knights exist.
pub fn insufficient_material(counts: &MaterialCount) -> bool {
    for &color in &[White, Black] {
        if counts.by_piece(color, Role::Pawn) != 0
            || counts.by_piece(color, Role::Rook) != 0
            || counts.by_piece(color, Role::Queen) != 0
        {
            return false;
        }
        if counts.by_piece(color, Role::Bishop) > 1 {
            return false;
        }
        if counts.by_piece(color, Role::Bishop) != 0 && counts.by_piece(color, Role::Knight) != 0 {
            return false;
        }
        if counts.by_piece(color, Role::Knight) >= 2 {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;
    use crate::fen::board_from_fen;

    fn counts(fen: &str) -> MaterialCount {
        board_from_fen(fen.as_bytes()).expect("valid fen").material()
    }

    #[test]
    fn test_parse_and_single_match() {
        let criteria = MaterialCriteria::parse("KQ KR", false).expect("valid");
        assert!(criteria.constraint_matches(&counts("4k3/7r/8/8/8/8/Q7/4K3 w - - 0 1")));
        assert!(!criteria.constraint_matches(&counts("4k3/7r/8/8/8/8/R7/4K3 w - - 0 1")));
    }

    #[test]
    fn test_dash_separates_sets() {
        let criteria = MaterialCriteria::parse("KQ-KR", false).expect("valid");
        assert!(criteria.constraint_matches(&counts("4k3/7r/8/8/8/8/Q7/4K3 w - - 0 1")));
    }

    #[test]
    fn test_lone_king_default() {
        let criteria = MaterialCriteria::parse("KR", false).expect("valid");
        assert!(criteria.constraint_matches(&counts("4k3/8/8/8/8/8/8/R3K3 w - - 0 1")));
        assert!(!criteria.constraint_matches(&counts("4k3/7r/8/8/8/8/8/R3K3 w - - 0 1")));
    }

    #[test]
    fn test_relational_qualifiers() {
        // One pawn more than the opponent.
        let criteria = MaterialCriteria::parse("KP1> KP*", false).expect("valid");
        assert!(criteria.constraint_matches(&counts("4k3/p7/8/8/8/8/PP6/4K3 w - - 0 1")));
        assert!(!criteria.constraint_matches(&counts("4k3/pp6/8/8/8/8/PP6/4K3 w - - 0 1")));
    }

    #[test]
    fn test_minor_counts() {
        // Two minor pieces of any mix against none.
        let criteria = MaterialCriteria::parse("KL2", false).expect("valid");
        assert!(criteria.constraint_matches(&counts("4k3/8/8/8/8/8/8/1NB1K3 w - - 0 1")));
        assert!(criteria.constraint_matches(&counts("4k3/8/8/8/8/8/8/1NN1K3 w - - 0 1")));
        assert!(!criteria.constraint_matches(&counts("4k3/8/8/8/8/8/8/1N2K3 w - - 0 1")));
    }

    #[test]
    fn test_both_colours() {
        let criteria = MaterialCriteria::parse("KQ KR", true).expect("valid");
        // Reversed assignment: black has the queen.
        assert!(criteria.constraint_matches(&counts("4k3/7q/8/8/8/8/R7/4K3 w - - 0 1")));
        let one_sided = MaterialCriteria::parse("KQ KR", false).expect("valid");
        assert!(!one_sided.constraint_matches(&counts("4k3/7q/8/8/8/8/R7/4K3 w - - 0 1")));
    }

    #[test]
    fn test_stability_depth() {
        let mut criteria = MaterialCriteria::parse("2 KQ KR", false).expect("valid");
        let position = counts("4k3/7r/8/8/8/8/Q7/4K3 w - - 0 1");
        criteria.reset();
        assert_eq!(criteria.try_match(&position), None);
        assert_eq!(criteria.try_match(&position), None);
        assert_eq!(criteria.try_match(&position), Some(White));
        // A position where the relation fails resets the count.
        criteria.reset();
        assert_eq!(criteria.try_match(&position), None);
        assert_eq!(criteria.try_match(&counts("4k3/8/8/8/8/8/Q7/4K3 w - - 0 1")), None);
        assert_eq!(criteria.try_match(&position), None);
    }

    #[test]
    fn test_insufficient_material() {
        assert!(!insufficient_material(&Board::new().material()));
        // K+B v K, K+N v K: insufficient.
        assert!(insufficient_material(&counts("4k3/8/8/8/8/8/8/2B1K3 w - - 0 1")));
        assert!(insufficient_material(&counts("4k3/8/8/8/8/8/8/2N1K3 w - - 0 1")));
        // K+N+N v K: sufficient, constructed mates exist.
        assert!(!insufficient_material(&counts("4k3/8/8/8/8/8/8/1NN1K3 w - - 0 1")));
        // K+R v K: sufficient.
        assert!(!insufficient_material(&counts("4k3/8/8/8/8/8/8/R3K3 w - - 0 1")));
    }

    #[test]
    fn test_rejects() {
        assert!(MaterialCriteria::parse("KX", false).is_err());
        assert!(MaterialCriteria::parse("KP12", false).is_err());
    }
}
