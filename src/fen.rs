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

//! Parse and write Forsyth-Edwards-Notation.

use std::error::Error;
use std::fmt;
use std::fmt::Write as _;

use crate::board::{Board, Castling};
use crate::square::Square;
use crate::types::{CastlingSide, Color, Piece, CASTLING_SIDES, COLORS};

/// Errors that can occur when parsing a FEN.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum FenError {
    InvalidBoard,
    InvalidTurn,
    InvalidCastling,
    InvalidEpSquare,
    InvalidHalfmoveClock,
    InvalidFullmoves,
    MissingKing,
}

impl FenError {
    fn desc(self) -> &'static str {
        match self {
            FenError::InvalidBoard => "invalid board part in fen",
            FenError::InvalidTurn => "invalid turn part in fen",
            FenError::InvalidCastling => "invalid castling part in fen",
            FenError::InvalidEpSquare => "invalid ep square in fen",
            FenError::InvalidHalfmoveClock => "invalid halfmove clock in fen",
            FenError::InvalidFullmoves => "invalid fullmove part in fen",
            FenError::MissingKing => "fen does not have exactly one king per side",
        }
    }
}

impl fmt::Display for FenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.desc())
    }
}

impl Error for FenError {}

/// FEN formatting options.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct FenOpts {
    /// Write castling rights as Shredder file letters, e.g. `HAha`.
    pub shredder: bool,
    /// Suppress the en-passant square when no capture is actually possible.
    pub no_faux_ep: bool,
}

/// Parses a full FEN, or an EPD without the clock fields.
///
/// Castling rights accept both `KQkq` and Shredder file letters so that
/// Chess960 positions round-trip.
///
/// # Errors
///
/// Returns a [`FenError`] describing the first offending field.
pub fn board_from_fen(s: &[u8]) -> Result<Board, FenError> {
    let mut fields = s.split(|&ch| ch == b' ').filter(|f| !f.is_empty());

    let mut board = parse_placement(fields.next().ok_or(FenError::InvalidBoard)?)?;

    for &color in &COLORS {
        match board.king_of(color) {
            Some(king) => board.castling.set_king_file(color, king.file()),
            None => return Err(FenError::MissingKing),
        }
    }

    board.turn = match fields.next() {
        Some(b"w") | None => Color::White,
        Some(b"b") => Color::Black,
        Some(_) => return Err(FenError::InvalidTurn),
    };

    if let Some(castling) = fields.next() {
        parse_castling(&mut board, castling)?;
    }

    board.ep_square = match fields.next() {
        Some(b"-") | None => None,
        Some(sq) => Some(Square::from_ascii(sq).map_err(|_| FenError::InvalidEpSquare)?),
    };

    board.halfmove_clock = match fields.next() {
        Some(n) => btoi::btou(n).map_err(|_| FenError::InvalidHalfmoveClock)?,
        None => 0,
    };

    board.fullmoves = match fields.next() {
        Some(n) => btoi::btou(n).map_err(|_| FenError::InvalidFullmoves)?,
        None => 1,
    };

    Ok(board)
}

fn parse_placement(s: &[u8]) -> Result<Board, FenError> {
    let mut board = Board::empty();
    let mut rank = 7i8;
    let mut file = 0i8;

    for &ch in s {
        if ch == b'/' && file == 8 {
            file = 0;
            rank -= 1;
        } else if (b'1'..=b'8').contains(&ch) {
            file += (ch - b'0') as i8;
            if file > 8 {
                return Err(FenError::InvalidBoard);
            }
        } else if let Some(piece) = Piece::from_char(char::from(ch)) {
            match Square::from_coords(file as u8, rank as u8) {
                Some(sq) if rank >= 0 => board.set_piece_at(sq, piece),
                _ => return Err(FenError::InvalidBoard),
            }
            file += 1;
        } else {
            return Err(FenError::InvalidBoard);
        }
    }

    if rank == 0 && file == 8 {
        Ok(board)
    } else {
        Err(FenError::InvalidBoard)
    }
}

fn parse_castling(board: &mut Board, s: &[u8]) -> Result<(), FenError> {
    board.castling = {
        let mut castling = Castling::empty();
        for &color in &COLORS {
            castling.set_king_file(color, board.castling.king_file(color));
        }
        castling
    };

    if s == b"-" {
        return Ok(());
    }

    for &ch in s {
        let color = Color::from_white(ch.is_ascii_uppercase());
        let king_file = board.castling.king_file(color);
        let back = color.back_rank();
        match ch.to_ascii_lowercase() {
            b'k' => {
                let rook = outermost_rook(board, color, king_file, true).ok_or(FenError::InvalidCastling)?;
                board.castling.set(color, CastlingSide::KingSide, true);
                board.castling.set_rook_file(color, CastlingSide::KingSide, rook);
            }
            b'q' => {
                let rook = outermost_rook(board, color, king_file, false).ok_or(FenError::InvalidCastling)?;
                board.castling.set(color, CastlingSide::QueenSide, true);
                board.castling.set_rook_file(color, CastlingSide::QueenSide, rook);
            }
            file @ b'a'..=b'h' => {
                let file = file - b'a';
                let sq = Square::from_coords(file, back).ok_or(FenError::InvalidCastling)?;
                if board.piece_at(sq) != Some(color.rook()) {
                    return Err(FenError::InvalidCastling);
                }
                let side = if file > king_file {
                    CastlingSide::KingSide
                } else {
                    CastlingSide::QueenSide
                };
                board.castling.set(color, side, true);
                board.castling.set_rook_file(color, side, file);
            }
            _ => return Err(FenError::InvalidCastling),
        }
    }

    Ok(())
}

/// The rook furthest from the centre on the given side of the king, for
/// resolving `K`/`Q` rights in X-FEN.
fn outermost_rook(board: &Board, color: Color, king_file: u8, king_side: bool) -> Option<u8> {
    let back = color.back_rank();
    let files: Vec<u8> = if king_side {
        ((king_file + 1)..8).rev().collect()
    } else {
        (0..king_file).collect()
    };
    files.into_iter().find(|&file| {
        Square::from_coords(file, back)
            .map_or(false, |sq| board.piece_at(sq) == Some(color.rook()))
    })
}

/// The piece placement field alone, e.g. `rnbqkbnr/pppppppp/8/8/...`.
pub fn board_fen(board: &Board) -> String {
    let mut fen = String::with_capacity(70);
    for rank in (0..8).rev() {
        let mut empty = 0;
        for file in 0..8 {
            let sq = Square::from_coords(file, rank).expect("valid coords");
            match board.piece_at(sq) {
                Some(piece) => {
                    if empty > 0 {
                        write!(fen, "{}", empty).expect("write to string");
                        empty = 0;
                    }
                    fen.push(piece.char());
                }
                None => empty += 1,
            }
        }
        if empty > 0 {
            write!(fen, "{}", empty).expect("write to string");
        }
        if rank > 0 {
            fen.push('/');
        }
    }
    fen
}

fn castling_fen(board: &Board, opts: &FenOpts) -> String {
    let mut fen = String::new();
    let shredder = opts.shredder || board.castling.is_chess960();
    for &color in &[Color::White, Color::Black] {
        for &side in &CASTLING_SIDES {
            if board.castling.has(color, side) {
                let ch = if shredder {
                    (b'a' + board.castling.rook_file(color, side)) as char
                } else {
                    match side {
                        CastlingSide::KingSide => 'k',
                        CastlingSide::QueenSide => 'q',
                    }
                };
                fen.push(color.fold(ch.to_ascii_uppercase(), ch));
            }
        }
    }
    if fen.is_empty() {
        fen.push('-');
    }
    fen
}

fn ep_fen(board: &Board, opts: &FenOpts) -> String {
    match board.ep_square {
        Some(ep) if !opts.no_faux_ep || board.ep_capture_exists() => ep.to_string(),
        _ => "-".to_owned(),
    }
}

/// An EPD record: board, turn, castling and en-passant fields.
pub fn epd(board: &Board, opts: &FenOpts) -> String {
    format!(
        "{} {} {} {}",
        board_fen(board),
        board.turn.char(),
        castling_fen(board, opts),
        ep_fen(board, opts),
    )
}

/// A full FEN including halfmove clock and fullmove number.
pub fn fen(board: &Board, opts: &FenOpts) -> String {
    format!("{} {} {}", epd(board, opts), board.halfmove_clock, board.fullmoves)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STARTPOS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn test_startpos_roundtrip() {
        let board = board_from_fen(STARTPOS.as_bytes()).expect("valid fen");
        assert_eq!(board, Board::new());
        assert_eq!(fen(&board, &FenOpts::default()), STARTPOS);
    }

    #[test]
    fn test_partial_fen() {
        let board = board_from_fen(b"8/8/8/8/8/8/8/KQk5 b").expect("valid epd");
        assert_eq!(board.turn, Color::Black);
        assert!(!board.castling.any());
        assert_eq!(board.halfmove_clock, 0);
        assert_eq!(board.fullmoves, 1);
    }

    #[test]
    fn test_rejects() {
        assert_eq!(board_from_fen(b"8/8/8/8/8/8/8/8 w - -"), Err(FenError::MissingKing));
        assert_eq!(
            board_from_fen(b"rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR x KQkq -"),
            Err(FenError::InvalidTurn)
        );
        assert!(board_from_fen(b"rnbqkbnr/pppppppp/9/8/8/8/PPPPPPPP/RNBQKBNR w - -").is_err());
    }

    #[test]
    fn test_shredder_castling() {
        // A Chess960 setup: king on b1, rooks on a1 and c1.
        let board = board_from_fen(b"qkrbbnnr/pppppppp/8/8/8/8/PPPPPPPP/QKRBBNNR w CAca - 0 1")
            .expect("valid fen");
        assert!(board.castling.is_chess960());
        assert_eq!(board.castling.rook_file(Color::White, CastlingSide::KingSide), 2);
        assert_eq!(board.castling.rook_file(Color::White, CastlingSide::QueenSide), 0);
        assert_eq!(
            fen(&board, &FenOpts::default()),
            "qkrbbnnr/pppppppp/8/8/8/8/PPPPPPPP/QKRBBNNR w CAca - 0 1"
        );
    }

    #[test]
    fn test_faux_ep_suppression() {
        let board = board_from_fen(b"rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1")
            .expect("valid fen");
        let faux = FenOpts { no_faux_ep: true, ..FenOpts::default() };
        assert!(fen(&board, &FenOpts::default()).contains(" e3 "));
        assert!(fen(&board, &faux).contains(" - "));
    }
}
