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

//! Textual move-sequence matching.
//!
//! A variation is a whitespace-separated half-move sequence. Each slot may
//! list `|`-separated alternatives (`cxd|cxd4|c5xd4`), be a `*` wildcard,
//! or a `!`-prefixed disallowed move. Two matching modes exist: a strict
//! in-order match, and a permutation match that assigns variation slots to
//! game plies of the same colour in any order.

/// A parsed variation of interest.
#[derive(Clone, Debug)]
pub struct TextualVariation {
    /// One entry per half-move; even indexes are White's.
    moves: Vec<String>,
    /// Wildcard counts per side, consumed during permutation matching.
    num_any: [u32; 2],
    /// Disallowed-move counts per side.
    num_disallowed: [u32; 2],
}

const ANY_MOVE: char = '*';
const DISALLOWED_MOVE: char = '!';

/// Strips a `3.` or `12...` prefix. Returns `None` for a bare number.
fn strip_move_number(token: &str) -> Option<&str> {
    let rest = token.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() == token.len() {
        return Some(token);
    }
    let rest = rest.trim_start_matches('.');
    if rest.is_empty() {
        None
    } else {
        Some(rest)
    }
}

/// Roughly a move character, for the purposes of textual matching.
fn is_move_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'-'
}

/// Searches for `actual` inside `pattern` such that the match is bounded
/// by non-move characters, so that `f3` matches in `Nc6|Nf3|f3` but `c6`
/// does not.
fn move_text_match(pattern: &str, actual: &str) -> bool {
    if actual.is_empty() {
        return false;
    }
    let pattern = pattern.as_bytes();
    let actual = actual.as_bytes();
    let mut start = 0;
    while start + actual.len() <= pattern.len() {
        match find_from(pattern, actual, start) {
            Some(at) => {
                let before_ok = at == 0 || !is_move_char(pattern[at - 1]);
                let after_ok = pattern
                    .get(at + actual.len())
                    .map_or(true, |&c| !is_move_char(c));
                if before_ok && after_ok {
                    return true;
                }
                start = at + 1;
            }
            None => return false,
        }
    }
    false
}

fn find_from(haystack: &[u8], needle: &[u8], start: usize) -> Option<usize> {
    haystack[start..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| start + p)
}

/// The game's move texts with trailing glyphs removed, ready for textual
/// matching.
pub fn plain_move_text(text: &[u8]) -> String {
    let end = text
        .iter()
        .rposition(|&c| !matches!(c, b'+' | b'#' | b'!' | b'?'))
        .map_or(0, |p| p + 1);
    String::from_utf8_lossy(&text[..end]).into_owned()
}

impl TextualVariation {
    /// Parses one variation line. Returns `None` for a blank line.
    pub fn parse(line: &str) -> Option<TextualVariation> {
        let mut moves = Vec::new();
        let mut num_any = [0u32; 2];
        let mut num_disallowed = [0u32; 2];

        for token in line.split_whitespace() {
            let token = match strip_move_number(token) {
                Some(token) => token,
                None => continue,
            };
            let side = moves.len() & 1;
            if token.starts_with(ANY_MOVE) {
                num_any[side] += 1;
            } else if token.starts_with(DISALLOWED_MOVE) {
                num_disallowed[side] += 1;
            }
            moves.push(token.to_owned());
        }

        if moves.is_empty() {
            None
        } else {
            Some(TextualVariation { moves, num_any, num_disallowed })
        }
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Strict in-order comparison against the opening plies of a game.
    pub fn straight_match(&self, game_moves: &[String]) -> bool {
        let mut index = 0;
        for actual in game_moves {
            if index >= self.moves.len() {
                break;
            }
            let slot = &self.moves[index];
            if slot.starts_with(ANY_MOVE) {
                // Anything goes at this ply.
            } else {
                let hit = move_text_match(slot, actual);
                let disallowed = slot.starts_with(DISALLOWED_MOVE);
                if hit {
                    if disallowed {
                        return false;
                    }
                } else if !disallowed {
                    return false;
                }
            }
            index += 1;
        }
        index == self.moves.len()
    }

    /// Two-stage permutation match.
    ///
    /// Stage one fails the match outright if any disallowed move occurs at
    /// its side within the variation's length; surviving disallowed slots
    /// become wildcards. Stage two assigns each game ply to an unmatched
    /// slot of the same side, consuming wildcards when no literal slot
    /// fits.
    pub fn permutation_match(&self, game_moves: &[String]) -> bool {
        let mut matched = vec![false; self.moves.len()];
        let mut num_any = self.num_any;

        if self.num_disallowed.iter().any(|&n| n > 0) {
            for (ply, actual) in game_moves.iter().take(self.moves.len()).enumerate() {
                let side = ply & 1;
                let mut slot = side;
                while slot < self.moves.len() {
                    if self.moves[slot].starts_with(DISALLOWED_MOVE)
                        && move_text_match(&self.moves[slot], actual)
                    {
                        return false;
                    }
                    slot += 2;
                }
            }
            for (slot, text) in self.moves.iter().enumerate() {
                if text.starts_with(DISALLOWED_MOVE) {
                    matched[slot] = true;
                    num_any[slot & 1] += 1;
                }
            }
        }

        let mut matched_moves = 0;
        for (ply, actual) in game_moves.iter().enumerate() {
            if matched_moves >= self.moves.len() {
                break;
            }
            let side = ply & 1;
            let mut hit = false;
            let mut slot = side;
            while !hit && slot < self.moves.len() {
                if !matched[slot] && move_text_match(&self.moves[slot], actual) {
                    matched[slot] = true;
                    hit = true;
                }
                slot += 2;
            }
            if !hit {
                if num_any[side] > 0 {
                    num_any[side] -= 1;
                    hit = true;
                }
            }
            if !hit {
                return false;
            }
            matched_moves += 1;
        }

        matched_moves == self.moves.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(moves: &str) -> Vec<String> {
        moves.split_whitespace().map(str::to_owned).collect()
    }

    #[test]
    fn test_strip_move_number() {
        assert_eq!(strip_move_number("3.e4"), Some("e4"));
        assert_eq!(strip_move_number("12...Nf6"), Some("Nf6"));
        assert_eq!(strip_move_number("12."), None);
        assert_eq!(strip_move_number("e4"), Some("e4"));
    }

    #[test]
    fn test_alternatives_are_bounded() {
        assert!(move_text_match("Nc6|Nf3|f3", "f3"));
        assert!(!move_text_match("Nc6|Nf3|f3", "c6"));
        assert!(move_text_match("cxd|cxd4|c5xd4", "cxd4"));
    }

    #[test]
    fn test_straight_match() {
        let variation = TextualVariation::parse("e4 c5 Nf3").expect("non-blank");
        assert!(variation.straight_match(&game("e4 c5 Nf3 d6")));
        assert!(!variation.straight_match(&game("e4 e5 Nf3")));
        // Game shorter than the variation.
        assert!(!variation.straight_match(&game("e4 c5")));
    }

    #[test]
    fn test_straight_wildcard_and_disallowed() {
        let variation = TextualVariation::parse("* b6").expect("non-blank");
        assert!(variation.straight_match(&game("e4 b6")));
        assert!(variation.straight_match(&game("d4 b6")));

        let variation = TextualVariation::parse("e4 c5 !Nf3").expect("non-blank");
        assert!(variation.straight_match(&game("e4 c5 c3 d5")));
        assert!(!variation.straight_match(&game("e4 c5 Nf3 d6")));
    }

    #[test]
    fn test_permutation_match_transposition() {
        // Queen's gambit reached via either move order.
        let variation = TextualVariation::parse("d4 d5 c4").expect("non-blank");
        assert!(variation.permutation_match(&game("d4 d5 c4 e6")));
        assert!(variation.permutation_match(&game("c4 d5 d4 e6")));
        assert!(!variation.permutation_match(&game("e4 d5 c4")));
    }

    #[test]
    fn test_permutation_disallowed() {
        let variation = TextualVariation::parse("e4 c5 !Nf3").expect("non-blank");
        assert!(variation.permutation_match(&game("e4 c5 c3 d5")));
        assert!(!variation.permutation_match(&game("e4 c5 Nf3 d6")));
    }

    #[test]
    fn test_permutation_wildcards_absorb() {
        let variation = TextualVariation::parse("* * Nf3").expect("non-blank");
        assert!(variation.permutation_match(&game("Nf3 d5 g3")));
        assert!(variation.permutation_match(&game("d4 d5 Nf3")));
        assert!(!variation.permutation_match(&game("d4 d5 c4 e6")));
    }

    #[test]
    fn test_plain_move_text() {
        assert_eq!(plain_move_text(b"Nf3+!?"), "Nf3");
        assert_eq!(plain_move_text(b"e8=Q#"), "e8=Q");
        assert_eq!(plain_move_text(b"O-O"), "O-O");
    }
}
