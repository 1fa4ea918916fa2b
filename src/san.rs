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

//! Read and write Standard Algebraic Notation.

use std::error::Error;
use std::fmt;
use std::str::FromStr;

use crate::square::Square;
use crate::types::{CastlingSide, Role};

/// Error when parsing a syntactically invalid SAN.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct InvalidSan;

impl fmt::Display for InvalidSan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid san")
    }
}

impl Error for InvalidSan {}

/// A move in Standard Algebraic Notation.
///
/// The source square is usually unfilled until the move is resolved against
/// a position; `file` and `rank` only carry explicit disambiguation present
/// in the text.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum San {
    Normal {
        role: Role,
        file: Option<u8>,
        rank: Option<u8>,
        capture: bool,
        to: Square,
        promotion: Option<Role>,
    },
    Castle(CastlingSide),
    Null,
}

impl San {
    /// Parses a SAN without check suffixes.
    ///
    /// Tolerates the common producer variants: `0-0` for `O-O`, `Z0` and
    /// `--` for a null move, `:` for `x`, and a promotion piece with or
    /// without `=`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidSan`] if the input is not a move.
    pub fn from_ascii(s: &[u8]) -> Result<San, InvalidSan> {
        if s == b"--" || s == b"Z0" || s == b"z0" {
            return Ok(San::Null);
        }
        if s == b"O-O" || s == b"0-0" {
            return Ok(San::Castle(CastlingSide::KingSide));
        }
        if s == b"O-O-O" || s == b"0-0-0" {
            return Ok(San::Castle(CastlingSide::QueenSide));
        }

        let (role, mut i) = match s.first() {
            Some(&ch) if ch.is_ascii_uppercase() => {
                (Role::from_char(char::from(ch)).ok_or(InvalidSan)?, 1)
            }
            Some(_) => (Role::Pawn, 0),
            None => return Err(InvalidSan),
        };

        // Collect up to two coordinate pairs, of which the last is the
        // target and an earlier one is disambiguation.
        let mut file = None;
        let mut rank = None;
        let mut to_file = None;
        let mut to_rank = None;
        let mut capture = false;

        while i < s.len() {
            match s[i] {
                b'a'..=b'h' => {
                    if to_file.is_some() || to_rank.is_some() {
                        // Shift the previous pair into the disambiguation slot.
                        if file.is_some() || rank.is_some() {
                            return Err(InvalidSan);
                        }
                        file = to_file;
                        rank = to_rank;
                        to_rank = None;
                    }
                    to_file = Some(s[i] - b'a');
                }
                b'1'..=b'8' => {
                    if to_rank.is_some() {
                        return Err(InvalidSan);
                    }
                    to_rank = Some(s[i] - b'1');
                }
                b'x' | b':' => {
                    if capture {
                        return Err(InvalidSan);
                    }
                    capture = true;
                    if to_file.is_some() || to_rank.is_some() {
                        if file.is_some() || rank.is_some() {
                            return Err(InvalidSan);
                        }
                        file = to_file;
                        rank = to_rank;
                        to_file = None;
                        to_rank = None;
                    }
                }
                b'=' | b'b'..=b'z' | b'A'..=b'Z' => break,
                _ => return Err(InvalidSan),
            }
            i += 1;
        }

        let to = match (to_file, to_rank) {
            (Some(f), Some(r)) => Square::from_coords(f, r).ok_or(InvalidSan)?,
            _ => return Err(InvalidSan),
        };

        // Promotion suffix, with optional '='.
        let promotion = match s.get(i) {
            None => None,
            Some(&b'=') => {
                i += 1;
                let ch = *s.get(i).ok_or(InvalidSan)?;
                i += 1;
                Some(promotion_role(ch)?)
            }
            Some(&ch) if ch.is_ascii_uppercase() => {
                i += 1;
                Some(promotion_role(ch)?)
            }
            Some(_) => return Err(InvalidSan),
        };

        if i != s.len() {
            return Err(InvalidSan);
        }
        if promotion.is_some() && role != Role::Pawn {
            return Err(InvalidSan);
        }

        Ok(San::Normal { role, file, rank, capture, to, promotion })
    }

    #[inline]
    pub fn is_capture(&self) -> bool {
        matches!(*self, San::Normal { capture: true, .. })
    }
}

fn promotion_role(ch: u8) -> Result<Role, InvalidSan> {
    match Role::from_char(char::from(ch)) {
        Some(Role::Pawn) | Some(Role::King) | None => Err(InvalidSan),
        Some(role) => Ok(role),
    }
}

impl FromStr for San {
    type Err = InvalidSan;

    fn from_str(s: &str) -> Result<San, InvalidSan> {
        San::from_ascii(s.as_bytes())
    }
}

impl fmt::Display for San {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            San::Normal { role, file, rank, capture, to, promotion } => {
                if role != Role::Pawn {
                    write!(f, "{}", role.upper_char())?;
                }
                if let Some(file) = file {
                    write!(f, "{}", (b'a' + file) as char)?;
                }
                if let Some(rank) = rank {
                    write!(f, "{}", (b'1' + rank) as char)?;
                }
                if capture {
                    f.write_str("x")?;
                }
                write!(f, "{}", to)?;
                if let Some(promotion) = promotion {
                    write!(f, "={}", promotion.upper_char())?;
                }
                Ok(())
            }
            San::Castle(CastlingSide::KingSide) => f.write_str("O-O"),
            San::Castle(CastlingSide::QueenSide) => f.write_str("O-O-O"),
            San::Null => f.write_str("--"),
        }
    }
}

/// A [`San`] together with the check or checkmate suffix seen in the text.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct SanPlus {
    pub san: San,
    pub check: bool,
    pub checkmate: bool,
}

impl SanPlus {
    /// Parses a SAN, stripping trailing check, mate and annotation glyphs.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidSan`] if what remains is not a move.
    pub fn from_ascii(s: &[u8]) -> Result<SanPlus, InvalidSan> {
        let mut end = s.len();
        let mut check = false;
        let mut checkmate = false;
        while end > 0 {
            match s[end - 1] {
                b'#' => checkmate = true,
                b'+' => check = true,
                b'!' | b'?' => (),
                _ => break,
            }
            end -= 1;
        }
        San::from_ascii(&s[..end]).map(|san| SanPlus { san, check, checkmate })
    }
}

impl FromStr for SanPlus {
    type Err = InvalidSan;

    fn from_str(s: &str) -> Result<SanPlus, InvalidSan> {
        SanPlus::from_ascii(s.as_bytes())
    }
}

impl fmt::Display for SanPlus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.checkmate {
            write!(f, "{}#", self.san)
        } else if self.check {
            write!(f, "{}+", self.san)
        } else {
            write!(f, "{}", self.san)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write() {
        for san in &["e4", "hxg7", "N2c4", "Nbd2", "d1=N", "Ba5", "Ra1a8", "exd6", "Qh1",
                     "--", "O-O", "O-O-O+", "e8=Q#"] {
            assert_eq!(san.parse::<SanPlus>().expect("valid san").to_string(), *san);
        }
    }

    #[test]
    fn test_tolerated_forms() {
        assert_eq!(San::from_ascii(b"0-0"), Ok(San::Castle(CastlingSide::KingSide)));
        assert_eq!(San::from_ascii(b"Z0"), Ok(San::Null));
        assert_eq!(San::from_ascii(b"e8Q"), San::from_ascii(b"e8=Q"));
        assert_eq!(San::from_ascii(b"N:f3"), San::from_ascii(b"Nxf3"));
    }

    #[test]
    fn test_disambiguation() {
        match San::from_ascii(b"Nbd2").expect("valid") {
            San::Normal { role, file, rank, to, .. } => {
                assert_eq!(role, Role::Knight);
                assert_eq!(file, Some(1));
                assert_eq!(rank, None);
                assert_eq!(to, Square::from_ascii(b"d2").unwrap());
            }
            _ => panic!("expected normal move"),
        }
        match San::from_ascii(b"R1a3").expect("valid") {
            San::Normal { file, rank, .. } => {
                assert_eq!(file, None);
                assert_eq!(rank, Some(0));
            }
            _ => panic!("expected normal move"),
        }
    }

    #[test]
    fn test_rejects() {
        assert_eq!(San::from_ascii(b""), Err(InvalidSan));
        assert_eq!(San::from_ascii(b"Xf3"), Err(InvalidSan));
        assert_eq!(San::from_ascii(b"e9"), Err(InvalidSan));
        assert_eq!(San::from_ascii(b"Ke1=Q"), Err(InvalidSan));
    }
}
