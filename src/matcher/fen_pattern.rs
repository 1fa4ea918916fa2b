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

//! FEN patterns: a micro-regex over board ranks.
//!
//! A pattern has eight `/`-separated rank expressions in FEN order (rank 8
//! first). The alphabet:
//!
//! | symbol | meaning |
//! |---|---|
//! | `_` | empty square |
//! | `!` | non-empty square |
//! | `?` | any square |
//! | `*` | zero or more squares, within the rank |
//! | `A` / `a` | any white / black piece |
//! | `m` | any piece except a pawn |
//! | `[xyz]`, `[^xyz]` | character class, no nesting |
//! | `1`-`8` | that many empty squares |
//! | piece letter | that exact piece |
//!
//! Rank expressions compile to a tiny NFA that is simulated without
//! backtracking, so `*` cannot go pathological. Patterns share a trie over
//! ranks; a leaf may carry a label and a material constraint. A pattern may
//! be registered together with its colour-reversed form, whose label gains
//! an `I` suffix.

use std::error::Error;
use std::fmt;

use crate::board::Board;
use crate::matcher::material::MaterialCriteria;

/// Error when registering a badly formed pattern.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct BadFenPattern {
    pub reason: &'static str,
}

impl fmt::Display for BadFenPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "badly formed FEN pattern: {}", self.reason)
    }
}

impl Error for BadFenPattern {}

/// One element of a compiled rank expression.
#[derive(Clone, Eq, PartialEq, Debug)]
enum Inst {
    /// Matches exactly one square against a single pattern symbol.
    One(u8),
    /// Matches one square against a character class.
    Class { members: Vec<u8>, negated: bool },
    /// Matches zero or more squares of any content.
    Star,
}

/// Does one pattern symbol match one square character?
fn match_one(symbol: u8, square: u8) -> bool {
    if symbol == square {
        return true;
    }
    match symbol {
        b'!' => square != b'_',
        b'?' => true,
        b'A' => matches!(square, b'K' | b'Q' | b'R' | b'N' | b'B' | b'P'),
        b'a' => matches!(square, b'k' | b'q' | b'r' | b'n' | b'b' | b'p'),
        b'm' => square != b'P' && square != b'p' && square != b'_',
        _ => false,
    }
}

fn compile_rank(rank: &[u8]) -> Result<Vec<Inst>, BadFenPattern> {
    let mut prog = Vec::new();
    let mut i = 0;
    while i < rank.len() {
        match rank[i] {
            b'*' => prog.push(Inst::Star),
            b'[' => {
                let negated = rank.get(i + 1) == Some(&b'^');
                let start = if negated { i + 2 } else { i + 1 };
                let end = rank[start..]
                    .iter()
                    .position(|&c| c == b']')
                    .map(|p| start + p)
                    .ok_or(BadFenPattern { reason: "missing ]" })?;
                if rank[start..end].iter().any(|&c| c == b'[') {
                    return Err(BadFenPattern { reason: "nested closure" });
                }
                prog.push(Inst::Class {
                    members: rank[start..end].to_vec(),
                    negated,
                });
                i = end;
            }
            b']' | b'^' => return Err(BadFenPattern { reason: "closure syntax" }),
            d @ b'1'..=b'8' => {
                for _ in 0..(d - b'0') {
                    prog.push(Inst::One(b'_'));
                }
            }
            symbol => prog.push(Inst::One(symbol)),
        }
        i += 1;
    }
    Ok(prog)
}

/// NFA simulation of a compiled rank expression over the 8 squares of a
/// rank. Equivalent to leftmost-longest backtracking but linear.
fn rank_matches(prog: &[Inst], text: &[u8]) -> bool {
    let accept = prog.len();
    let mut current = vec![false; accept + 1];
    add_state(prog, &mut current, 0);

    for &square in text {
        let mut next = vec![false; accept + 1];
        for state in 0..accept {
            if !current[state] {
                continue;
            }
            let matched = match &prog[state] {
                Inst::One(symbol) => match_one(*symbol, square),
                Inst::Class { members, negated } => {
                    let any = members.iter().any(|&m| match_one(m, square));
                    any != *negated
                }
                Inst::Star => {
                    // Consume the square and stay on the star.
                    add_state(prog, &mut next, state);
                    continue;
                }
            };
            if matched {
                add_state(prog, &mut next, state + 1);
            }
        }
        current = next;
    }

    current[accept]
}

/// Inserts a state and everything reachable without consuming a square.
fn add_state(prog: &[Inst], set: &mut [bool], state: usize) {
    if set[state] {
        return;
    }
    set[state] = true;
    if let Some(Inst::Star) = prog.get(state) {
        add_state(prog, set, state + 1);
    }
}

/// A node of the pattern trie: one rank expression, its alternatives at
/// the same depth, and the continuation for the next rank.
#[derive(Debug)]
struct PatternNode {
    source: Vec<u8>,
    prog: Vec<Inst>,
    alternative: Option<Box<PatternNode>>,
    next: Option<Box<PatternNode>>,
    /// Leaf only: the label reported on a match; empty for unlabelled.
    label: Option<String>,
    /// Leaf only: material that must also be on the board.
    constraint: Option<MaterialCriteria>,
}

/// The set of FEN patterns to try against each position.
#[derive(Debug, Default)]
pub struct FenPatternSet {
    root: Option<Box<PatternNode>>,
    /// Patterns whose insertion found an identical duplicate.
    pub duplicates: u32,
}

impl FenPatternSet {
    pub fn new() -> FenPatternSet {
        FenPatternSet::default()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Registers a pattern, optionally with its colour-reversed form. An
    /// optional `:material` constraint follows the final rank; the
    /// reversed form carries no constraint, which is why a constraint on a
    /// reversed pattern is parsed for both colours.
    ///
    /// # Errors
    ///
    /// Returns [`BadFenPattern`] for syntax errors.
    pub fn add(
        &mut self,
        pattern: &str,
        add_reverse: bool,
        label: Option<&str>,
    ) -> Result<(), BadFenPattern> {
        let bytes = pattern.as_bytes();
        let end = bytes
            .iter()
            .position(|&c| c == b':' || c == b' ')
            .unwrap_or(bytes.len());
        let board_part = &bytes[..end];

        let ranks: Vec<&[u8]> = board_part.split(|&c| c == b'/').collect();
        if ranks.len() != 8 {
            return Err(BadFenPattern { reason: "expected 8 ranks" });
        }
        if ranks.iter().any(|r| r.is_empty()) {
            return Err(BadFenPattern { reason: "empty rank" });
        }

        let constraint = if bytes.get(end) == Some(&b':') {
            let text = std::str::from_utf8(&bytes[end + 1..])
                .map_err(|_| BadFenPattern { reason: "constraint is not ASCII" })?;
            Some(
                MaterialCriteria::parse(text, add_reverse)
                    .map_err(|_| BadFenPattern { reason: "bad material constraint" })?,
            )
        } else {
            None
        };

        let compiled: Result<Vec<Vec<Inst>>, BadFenPattern> =
            ranks.iter().map(|r| compile_rank(r)).collect();
        let compiled = compiled?;

        self.insert(&ranks, compiled, label.unwrap_or("").to_owned(), constraint);

        if add_reverse {
            let reversed = reverse_pattern(board_part);
            let reversed = String::from_utf8(reversed).expect("ascii pattern");
            let reversed_label = label.map(|l| format!("{}I", l));
            self.add(&reversed, false, reversed_label.as_deref())?;
        }

        Ok(())
    }

    fn insert(
        &mut self,
        ranks: &[&[u8]],
        compiled: Vec<Vec<Inst>>,
        label: String,
        constraint: Option<MaterialCriteria>,
    ) {
        // Build the chain for this pattern.
        let mut chain: Option<Box<PatternNode>> = None;
        for (source, prog) in ranks.iter().zip(compiled).rev() {
            let leaf = chain.is_none();
            chain = Some(Box::new(PatternNode {
                source: source.to_vec(),
                prog,
                alternative: None,
                next: chain,
                label: if leaf { Some(label.clone()) } else { None },
                constraint: if leaf { constraint.clone() } else { None },
            }));
        }
        let chain = chain.expect("eight ranks");

        match self.root.as_mut() {
            None => self.root = Some(chain),
            Some(node) => {
                if !insert_into(node, chain) {
                    self.duplicates += 1;
                }
            }
        }
    }

    /// Tries the board against every pattern. Returns the label of the
    /// first matching leaf whose material constraint (if any) also holds;
    /// the label may be empty.
    pub fn match_board(&self, board: &Board) -> Option<&str> {
        let root = self.root.as_deref()?;
        // Ranks are converted lazily; index 0 is rank 8.
        let mut ranks: [Option<[u8; 8]>; 8] = [None; 8];
        match_rank(root, 0, board, &mut ranks)
    }
}

/// Inserts `chain` under `node`, sharing equal rank prefixes. Returns
/// false when the pattern was an exact duplicate.
fn insert_into(node: &mut PatternNode, chain: Box<PatternNode>) -> bool {
    if node.source == chain.source {
        match (node.next.as_mut(), chain.next) {
            (Some(next), Some(chain_next)) => insert_into(next, chain_next),
            _ => false, // both leaves: duplicate
        }
    } else {
        match node.alternative.as_mut() {
            Some(alternative) => insert_into(alternative, chain),
            None => {
                node.alternative = Some(chain);
                true
            }
        }
    }
}

fn match_rank<'a>(
    mut node: &'a PatternNode,
    depth: usize,
    board: &Board,
    ranks: &mut [Option<[u8; 8]>; 8],
) -> Option<&'a str> {
    let text = *ranks[depth].get_or_insert_with(|| board.rank_text(7 - depth as u8));
    loop {
        if rank_matches(&node.prog, &text) {
            let hit = match node.next.as_deref() {
                Some(next) => match_rank(next, depth + 1, board, ranks),
                None => {
                    let constrained = match &node.constraint {
                        Some(constraint) => constraint.constraint_matches(&board.material()),
                        None => true,
                    };
                    if constrained {
                        node.label.as_deref()
                    } else {
                        None
                    }
                }
            };
            if hit.is_some() {
                return hit;
            }
        }
        node = node.alternative.as_deref()?;
    }
}

/// The colour-reversed form: ranks in the opposite order, piece letters
/// case-swapped.
fn reverse_pattern(pattern: &[u8]) -> Vec<u8> {
    let mut ranks: Vec<Vec<u8>> = pattern
        .split(|&c| c == b'/')
        .map(|rank| {
            rank.iter()
                .map(|&c| {
                    if c.is_ascii_alphabetic() {
                        c ^ 0x20
                    } else {
                        c
                    }
                })
                .collect()
        })
        .collect();
    ranks.reverse();
    ranks.join(&b'/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fen::board_from_fen;

    fn board(fen: &str) -> Board {
        board_from_fen(fen.as_bytes()).expect("valid fen")
    }

    #[test]
    fn test_literal_and_counts() {
        let mut set = FenPatternSet::new();
        set.add("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR", false, None)
            .expect("valid pattern");
        assert_eq!(set.match_board(&Board::new()), Some(""));
        assert_eq!(
            set.match_board(&board("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1")),
            None
        );
    }

    #[test]
    fn test_star_and_classes() {
        let mut set = FenPatternSet::new();
        // A white rook somewhere on the 8th rank, anything below.
        set.add("*R*/?*/*/*/*/*/*/*", false, Some("rook8")).expect("valid");
        assert_eq!(
            set.match_board(&board("3R4/8/8/8/8/8/k6K/8 w - - 0 1")),
            Some("rook8")
        );
        assert_eq!(set.match_board(&board("8/3R4/8/8/8/8/k6K/8 w - - 0 1")), None);
    }

    #[test]
    fn test_class_negation() {
        let mut set = FenPatternSet::new();
        // e1 holds anything but a king: files a-d any, e1 in [^Kk], rest any.
        set.add("*/*/*/*/*/*/*/????[^Kk]???", false, None).expect("valid");
        assert_eq!(set.match_board(&Board::new()), None);
        assert!(set
            .match_board(&board("4k3/8/8/8/8/8/8/4Q3 w - - 0 1"))
            .is_some());
    }

    #[test]
    fn test_meta_symbols() {
        let mut set = FenPatternSet::new();
        // Rank 4 (from the top: index 4) holds at least one black piece and
        // one non-pawn anywhere on rank 1.
        set.add("*/*/*/*/*a*/*/*/*m*", false, None).expect("valid");
        assert!(set
            .match_board(&board("8/8/8/8/2r5/8/8/4K2k w - - 0 1"))
            .is_some());
        assert_eq!(set.match_board(&board("8/8/8/8/2R5/8/8/4K2k w - - 0 1")), None);
    }

    #[test]
    fn test_material_constraint() {
        let mut set = FenPatternSet::new();
        // Empty-board pattern with a material constraint: KQ v KR.
        set.add("*/*/*/*/*/*/*/*:KQkr", false, Some("qr")).expect("valid");
        assert_eq!(
            set.match_board(&board("4k3/7r/8/8/8/8/Q7/4K3 w - - 0 1")),
            Some("qr")
        );
        assert_eq!(set.match_board(&board("4k3/7r/8/8/8/8/R7/4K3 w - - 0 1")), None);
    }

    #[test]
    fn test_reversed_pattern_label() {
        let mut set = FenPatternSet::new();
        // White pawn on a7 about to promote; reversed: black pawn on a2.
        set.add("*/P*/*/*/*/*/*/*", true, Some("promo")).expect("valid");
        assert_eq!(
            set.match_board(&board("4k3/P7/8/8/8/8/8/4K3 w - - 0 1")),
            Some("promo")
        );
        assert_eq!(
            set.match_board(&board("4k3/8/8/8/8/8/p7/4K3 w - - 0 1")),
            Some("promoI")
        );
    }

    #[test]
    fn test_bad_patterns() {
        let mut set = FenPatternSet::new();
        assert!(set.add("8/8/8", false, None).is_err());
        assert!(set.add("8/8/8/8/8/8/8/[K", false, None).is_err());
        assert!(set.add("8/8/8/8/8/8/8//", false, None).is_err());
    }

    #[test]
    fn test_duplicate_detection() {
        let mut set = FenPatternSet::new();
        set.add("*/*/*/*/*/*/*/*", false, None).expect("valid");
        set.add("*/*/*/*/*/*/*/*", false, None).expect("valid");
        assert_eq!(set.duplicates, 1);
    }
}
