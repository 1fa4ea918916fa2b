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

//! Tag-value predicates.
//!
//! A rule names a tag, an operator and a value. The positive rule list is
//! disjunctive: any hit selects the game. The negative list is its dual:
//! any hit rejects the game. Values compare numerically when both sides
//! parse as integers, textually otherwise; `=~` compiles the value as a
//! regular expression. The pseudo-tag `EloDiff` compares the absolute
//! rating difference.

use std::error::Error;
use std::fmt;

use regex::Regex;

use crate::game::Game;
use crate::tags::{self, TagId};

/// Error when building a rule from a criteria line.
#[derive(Debug)]
pub enum BadTagRule {
    Regex(regex::Error),
}

impl fmt::Display for BadTagRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            BadTagRule::Regex(ref err) => write!(f, "bad tag regex: {}", err),
        }
    }
}

impl Error for BadTagRule {}

/// Comparison operator of a tag rule.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum TagOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
    Ne,
    Regex,
}

impl TagOp {
    /// Parses an operator prefix from a criteria line, returning the
    /// operator and how many bytes it consumed. An absent operator means
    /// equality.
    pub fn parse(s: &[u8]) -> (TagOp, usize) {
        match (s.first(), s.get(1)) {
            (Some(b'<'), Some(b'=')) => (TagOp::Le, 2),
            (Some(b'<'), Some(b'>')) => (TagOp::Ne, 2),
            (Some(b'<'), _) => (TagOp::Lt, 1),
            (Some(b'>'), Some(b'=')) => (TagOp::Ge, 2),
            (Some(b'>'), _) => (TagOp::Gt, 1),
            (Some(b'='), Some(b'~')) => (TagOp::Regex, 2),
            (Some(b'='), _) => (TagOp::Eq, 1),
            _ => (TagOp::Eq, 0),
        }
    }
}

/// One rule against one tag.
#[derive(Debug)]
pub struct TagRule {
    pub tag: TagId,
    pub op: TagOp,
    pub value: String,
    regex: Option<Regex>,
}

impl TagRule {
    pub fn new(tag: TagId, op: TagOp, value: String) -> Result<TagRule, BadTagRule> {
        let regex = if op == TagOp::Regex {
            Some(Regex::new(&value).map_err(BadTagRule::Regex)?)
        } else {
            None
        };
        Ok(TagRule { tag, op, value, regex })
    }

    fn matches(&self, game: &Game, substring: bool, soundex: bool) -> bool {
        let actual: String = match self.tag {
            tags::ELO_DIFF => match elo_diff(game) {
                Some(diff) => diff.to_string(),
                None => return false,
            },
            tag => match game.tag(tag) {
                Some(value) => String::from_utf8_lossy(value).into_owned(),
                None => return false,
            },
        };

        match self.op {
            TagOp::Regex => self.regex.as_ref().map_or(false, |re| re.is_match(&actual)),
            TagOp::Eq if soundex && is_player_tag(self.tag) => {
                soundex_code(&actual) == soundex_code(&self.value)
            }
            TagOp::Eq if substring => actual.contains(&self.value),
            op => compare(&actual, &self.value, op),
        }
    }
}

fn is_player_tag(tag: crate::tags::TagId) -> bool {
    tag == tags::WHITE || tag == tags::BLACK
}

/// The classic four-character soundex code, for tolerant player-name
/// matching with `-S`.
fn soundex_code(name: &str) -> String {
    fn digit(ch: char) -> Option<char> {
        match ch.to_ascii_lowercase() {
            'b' | 'f' | 'p' | 'v' => Some('1'),
            'c' | 'g' | 'j' | 'k' | 'q' | 's' | 'x' | 'z' => Some('2'),
            'd' | 't' => Some('3'),
            'l' => Some('4'),
            'm' | 'n' => Some('5'),
            'r' => Some('6'),
            _ => None,
        }
    }

    let mut chars = name.chars().filter(|c| c.is_ascii_alphabetic());
    let first = match chars.next() {
        Some(first) => first.to_ascii_uppercase(),
        None => return "0000".to_owned(),
    };
    let mut code = String::with_capacity(4);
    code.push(first);
    let mut previous = digit(first);
    for ch in chars {
        let d = digit(ch);
        if let Some(d) = d {
            if Some(d) != previous {
                code.push(d);
                if code.len() == 4 {
                    break;
                }
            }
        }
        // 'h' and 'w' do not reset the run; vowels do.
        if !matches!(ch.to_ascii_lowercase(), 'h' | 'w') {
            previous = d;
        }
    }
    while code.len() < 4 {
        code.push('0');
    }
    code
}

/// Numeric when both sides are integers, byte-wise otherwise. Dates in
/// `YYYY.MM.DD` form compare correctly byte-wise.
fn compare(actual: &str, wanted: &str, op: TagOp) -> bool {
    let ordering = match (actual.trim().parse::<i64>(), wanted.trim().parse::<i64>()) {
        (Ok(a), Ok(w)) => a.cmp(&w),
        _ => actual.cmp(wanted),
    };
    match op {
        TagOp::Eq => ordering == std::cmp::Ordering::Equal,
        TagOp::Ne => ordering != std::cmp::Ordering::Equal,
        TagOp::Lt => ordering == std::cmp::Ordering::Less,
        TagOp::Le => ordering != std::cmp::Ordering::Greater,
        TagOp::Gt => ordering == std::cmp::Ordering::Greater,
        TagOp::Ge => ordering != std::cmp::Ordering::Less,
        TagOp::Regex => false,
    }
}

fn elo_diff(game: &Game) -> Option<i64> {
    let white = parse_int(game.tag(tags::WHITE_ELO)?)?;
    let black = parse_int(game.tag(tags::BLACK_ELO)?)?;
    Some((white - black).abs())
}

fn parse_int(value: &[u8]) -> Option<i64> {
    std::str::from_utf8(value).ok()?.trim().parse().ok()
}

/// The positive and negative rule lists.
#[derive(Debug, Default)]
pub struct TagMatcher {
    pub positive: Vec<TagRule>,
    pub negative: Vec<TagRule>,
    /// `--tagsubstr`: equality becomes substring containment.
    pub substring: bool,
    /// `-S`: player names compare by soundex code.
    pub soundex: bool,
}

impl TagMatcher {
    pub fn new() -> TagMatcher {
        TagMatcher::default()
    }

    pub fn is_empty(&self) -> bool {
        self.positive.is_empty() && self.negative.is_empty()
    }

    pub fn matches(&self, game: &Game) -> bool {
        if !self.positive.is_empty()
            && !self
                .positive
                .iter()
                .any(|rule| rule.matches(game, self.substring, self.soundex))
        {
            return false;
        }
        !self
            .negative
            .iter()
            .any(|rule| rule.matches(game, self.substring, self.soundex))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game() -> Game {
        let mut game = Game::new();
        game.set_tag(tags::WHITE, b"Kasparov, Garry".to_vec());
        game.set_tag(tags::BLACK, b"Karpov, Anatoly".to_vec());
        game.set_tag(tags::WHITE_ELO, b"2805".to_vec());
        game.set_tag(tags::BLACK_ELO, b"2730".to_vec());
        game.set_tag(tags::DATE, b"1990.10.15".to_vec());
        game
    }

    #[test]
    fn test_operator_parse() {
        assert_eq!(TagOp::parse(b"<=2600"), (TagOp::Le, 2));
        assert_eq!(TagOp::parse(b"<>x"), (TagOp::Ne, 2));
        assert_eq!(TagOp::parse(b"<2600"), (TagOp::Lt, 1));
        assert_eq!(TagOp::parse(b"=~K.*"), (TagOp::Regex, 2));
        assert_eq!(TagOp::parse(b"\"value\""), (TagOp::Eq, 0));
    }

    #[test]
    fn test_numeric_comparison() {
        let game = game();
        let rule = TagRule::new(tags::WHITE_ELO, TagOp::Ge, "2800".to_owned()).unwrap();
        assert!(rule.matches(&game, false, false));
        let rule = TagRule::new(tags::BLACK_ELO, TagOp::Ge, "2800".to_owned()).unwrap();
        assert!(!rule.matches(&game, false, false));
    }

    #[test]
    fn test_date_comparison() {
        let game = game();
        let rule = TagRule::new(tags::DATE, TagOp::Lt, "1991.01.01".to_owned()).unwrap();
        assert!(rule.matches(&game, false, false));
        let rule = TagRule::new(tags::DATE, TagOp::Ge, "1991.01.01".to_owned()).unwrap();
        assert!(!rule.matches(&game, false, false));
    }

    #[test]
    fn test_regex_and_substring() {
        let game = game();
        let rule = TagRule::new(tags::WHITE, TagOp::Regex, "^Kasp".to_owned()).unwrap();
        assert!(rule.matches(&game, false, false));
        let rule = TagRule::new(tags::WHITE, TagOp::Eq, "Garry".to_owned()).unwrap();
        assert!(!rule.matches(&game, false, false));
        assert!(rule.matches(&game, true, false));
    }

    #[test]
    fn test_elo_diff() {
        let game = game();
        let rule = TagRule::new(tags::ELO_DIFF, TagOp::Ge, "75".to_owned()).unwrap();
        assert!(rule.matches(&game, false, false));
        let rule = TagRule::new(tags::ELO_DIFF, TagOp::Gt, "75".to_owned()).unwrap();
        assert!(!rule.matches(&game, false, false));
    }

    #[test]
    fn test_positive_list_is_disjunctive() {
        let game = game();
        let mut matcher = TagMatcher::new();
        matcher
            .positive
            .push(TagRule::new(tags::WHITE, TagOp::Eq, "Nobody".to_owned()).unwrap());
        assert!(!matcher.matches(&game));
        matcher
            .positive
            .push(TagRule::new(tags::BLACK, TagOp::Eq, "Karpov, Anatoly".to_owned()).unwrap());
        assert!(matcher.matches(&game));
    }

    #[test]
    fn test_negative_list_rejects() {
        let game = game();
        let mut matcher = TagMatcher::new();
        matcher
            .negative
            .push(TagRule::new(tags::WHITE, TagOp::Regex, "Kasparov".to_owned()).unwrap());
        assert!(!matcher.matches(&game));
    }

    #[test]
    fn test_soundex() {
        assert_eq!(soundex_code("Robert"), "R163");
        assert_eq!(soundex_code("Rupert"), "R163");
        assert_eq!(soundex_code("Ashcraft"), "A261");
        let game = game();
        let rule = TagRule::new(tags::WHITE, TagOp::Eq, "Kasbarov, Gary".to_owned()).unwrap();
        assert!(!rule.matches(&game, false, false));
        assert!(rule.matches(&game, false, true));
    }

    #[test]
    fn test_missing_tag_never_matches() {
        let game = game();
        let rule = TagRule::new(tags::ECO, TagOp::Eq, "B12".to_owned()).unwrap();
        assert!(!rule.matches(&game, false, false));
    }
}
