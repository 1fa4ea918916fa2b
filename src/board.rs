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

use std::fmt;
use std::fmt::Write as _;

use crate::square::Square;
use crate::types::{CastlingSide, Color, Piece, Role, CASTLING_SIDES, COLORS, ROLES};

/// Castling rights for both sides, including the starting files of king and
/// rooks so that Chess960 castling can be resolved.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Castling {
    rights: [[bool; 2]; 2], // [color][side]
    king_file: [u8; 2],
    rook_file: [[u8; 2]; 2], // [color][side]
}

impl Castling {
    /// Full rights with standard starting files.
    pub fn standard() -> Castling {
        Castling {
            rights: [[true; 2]; 2],
            king_file: [4, 4],
            rook_file: [[7, 0], [7, 0]],
        }
    }

    pub fn empty() -> Castling {
        Castling {
            rights: [[false; 2]; 2],
            king_file: [4, 4],
            rook_file: [[7, 0], [7, 0]],
        }
    }

    #[inline]
    pub fn has(&self, color: Color, side: CastlingSide) -> bool {
        self.rights[color as usize][side as usize]
    }

    #[inline]
    pub fn any(&self) -> bool {
        COLORS.iter().any(|&c| CASTLING_SIDES.iter().any(|&s| self.has(c, s)))
    }

    #[inline]
    pub fn set(&mut self, color: Color, side: CastlingSide, right: bool) {
        self.rights[color as usize][side as usize] = right;
    }

    #[inline]
    pub fn discard_color(&mut self, color: Color) {
        self.rights[color as usize] = [false; 2];
    }

    #[inline]
    pub fn king_file(&self, color: Color) -> u8 {
        self.king_file[color as usize]
    }

    pub fn set_king_file(&mut self, color: Color, file: u8) {
        self.king_file[color as usize] = file;
    }

    #[inline]
    pub fn rook_file(&self, color: Color, side: CastlingSide) -> u8 {
        self.rook_file[color as usize][side as usize]
    }

    pub fn set_rook_file(&mut self, color: Color, side: CastlingSide, file: u8) {
        self.rook_file[color as usize][side as usize] = file;
    }

    /// The king's starting square for the given side.
    #[inline]
    pub fn king_from(&self, color: Color) -> Square {
        Square::from_coords(self.king_file(color), color.back_rank()).expect("file in range")
    }

    /// The rook's starting square for the given castling.
    #[inline]
    pub fn rook_from(&self, color: Color, side: CastlingSide) -> Square {
        Square::from_coords(self.rook_file(color, side), color.back_rank()).expect("file in range")
    }

    /// True if any starting file differs from the standard chess setup.
    pub fn is_chess960(&self) -> bool {
        self.king_file != [4, 4] || self.rook_file != [[7, 0], [7, 0]]
    }
}

/// Piece counts per colour and role, extracted from a board.
#[derive(Copy, Clone, Eq, PartialEq, Default, Debug)]
pub struct MaterialCount {
    counts: [[u8; 6]; 2],
}

impl MaterialCount {
    #[inline]
    pub fn by_piece(&self, color: Color, role: Role) -> u8 {
        self.counts[color as usize][role as usize]
    }

    /// Knights plus bishops.
    #[inline]
    pub fn minors(&self, color: Color) -> u8 {
        self.by_piece(color, Role::Knight) + self.by_piece(color, Role::Bishop)
    }

    pub fn total(&self, color: Color) -> u8 {
        ROLES.iter().map(|&r| self.by_piece(color, r)).sum()
    }
}

/// A chess position: an 8x8 grid of optional pieces plus the game state
/// needed to legalise moves.
#[derive(Clone, Eq, PartialEq)]
pub struct Board {
    squares: [Option<Piece>; 64],
    pub turn: Color,
    pub castling: Castling,
    pub ep_square: Option<Square>,
    pub halfmove_clock: u32,
    pub fullmoves: u32,
    kings: [Option<Square>; 2],
}

impl Board {
    /// The standard starting position.
    pub fn new() -> Board {
        let mut board = Board::empty();
        const BACK: [Role; 8] = [
            Role::Rook, Role::Knight, Role::Bishop, Role::Queen,
            Role::King, Role::Bishop, Role::Knight, Role::Rook,
        ];
        for (file, &role) in BACK.iter().enumerate() {
            let file = file as u8;
            board.set_piece_at(Square::from_coords(file, 0).expect("valid"), role.of(Color::White));
            board.set_piece_at(Square::from_coords(file, 1).expect("valid"), Color::White.pawn());
            board.set_piece_at(Square::from_coords(file, 6).expect("valid"), Color::Black.pawn());
            board.set_piece_at(Square::from_coords(file, 7).expect("valid"), role.of(Color::Black));
        }
        board.castling = Castling::standard();
        board
    }

    pub fn empty() -> Board {
        Board {
            squares: [None; 64],
            turn: Color::White,
            castling: Castling::empty(),
            ep_square: None,
            halfmove_clock: 0,
            fullmoves: 1,
            kings: [None; 2],
        }
    }

    #[inline]
    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.squares[sq.index()]
    }

    #[inline]
    pub fn is_empty_at(&self, sq: Square) -> bool {
        self.squares[sq.index()].is_none()
    }

    pub fn set_piece_at(&mut self, sq: Square, piece: Piece) {
        self.remove_piece_at(sq);
        self.squares[sq.index()] = Some(piece);
        if piece.role == Role::King {
            self.kings[piece.color as usize] = Some(sq);
        }
    }

    pub fn remove_piece_at(&mut self, sq: Square) -> Option<Piece> {
        let piece = self.squares[sq.index()].take();
        if let Some(p) = piece {
            if p.role == Role::King && self.kings[p.color as usize] == Some(sq) {
                self.kings[p.color as usize] = None;
            }
        }
        piece
    }

    /// The cached square of the given side's king.
    #[inline]
    pub fn king_of(&self, color: Color) -> Option<Square> {
        self.kings[color as usize]
    }

    /// Iterator over all occupied squares.
    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        Square::all().filter_map(move |sq| self.piece_at(sq).map(|p| (sq, p)))
    }

    pub fn material(&self) -> MaterialCount {
        let mut material = MaterialCount::default();
        for (_, piece) in self.pieces() {
            material.counts[piece.color as usize][piece.role as usize] += 1;
        }
        material
    }

    /// One rank as eight bytes, rendered with FEN piece letters and `_` for
    /// empty squares. Used by the FEN pattern matcher.
    pub fn rank_text(&self, rank: u8) -> [u8; 8] {
        let mut text = [b'_'; 8];
        for file in 0..8 {
            if let Some(piece) = self.piece_at(Square::from_coords(file, rank).expect("rank in range")) {
                text[usize::from(file)] = piece.char() as u8;
            }
        }
        text
    }

    /// Checks whether an en-passant capture onto the current ep square is
    /// actually playable. Both the Polyglot hash and `--nofauxep` FEN output
    /// depend on this.
    pub fn ep_capture_exists(&self) -> bool {
        let ep = match self.ep_square {
            Some(ep) => ep,
            None => return false,
        };
        let us = self.turn;
        let dr = us.fold(-1, 1);
        [-1, 1].iter().any(|&df| {
            ep.offset(df, dr)
                .and_then(|from| self.piece_at(from))
                .map_or(false, |p| p == us.pawn())
        })
    }

    /// Clears castling rights that no longer correspond to a king and rook
    /// on their starting squares. Used after FEN setup.
    pub fn fix_castling_rights(&mut self) {
        for &color in &COLORS {
            let king_ok = self.king_of(color) == Some(self.castling.king_from(color));
            for &side in &CASTLING_SIDES {
                if self.castling.has(color, side) {
                    let rook_ok =
                        self.piece_at(self.castling.rook_from(color, side)) == Some(color.rook());
                    if !king_ok || !rook_ok {
                        self.castling.set(color, side, false);
                    }
                }
            }
        }
    }
}

impl Default for Board {
    fn default() -> Board {
        Board::new()
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rank in (0..8).rev() {
            for file in 0..8 {
                let sq = Square::from_coords(file, rank).expect("valid");
                f.write_char(self.piece_at(sq).map_or('.', Piece::char))?;
                f.write_char(if file < 7 { ' ' } else { '\n' })?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starting_position() {
        let board = Board::new();
        assert_eq!(board.piece_at(Square::E1), Some(Color::White.king()));
        assert_eq!(board.piece_at(Square::A8), Some(Color::Black.rook()));
        assert_eq!(board.king_of(Color::White), Some(Square::E1));
        assert_eq!(board.king_of(Color::Black), Some(Square::E8));
        let material = board.material();
        assert_eq!(material.by_piece(Color::White, Role::Pawn), 8);
        assert_eq!(material.minors(Color::Black), 4);
    }

    #[test]
    fn test_king_cache_tracks_moves() {
        let mut board = Board::new();
        board.remove_piece_at(Square::E1);
        assert_eq!(board.king_of(Color::White), None);
        board.set_piece_at(Square::G1, Color::White.king());
        assert_eq!(board.king_of(Color::White), Some(Square::G1));
    }

    #[test]
    fn test_rank_text() {
        let board = Board::new();
        assert_eq!(&board.rank_text(0), b"RNBQKBNR");
        assert_eq!(&board.rank_text(3), b"________");
        assert_eq!(&board.rank_text(6), b"pppppppp");
    }

    #[test]
    fn test_ep_capture_exists() {
        let mut board = Board::new();
        // 1. e4 with black to move: no black pawn attacks e3.
        board.remove_piece_at(Square::from_ascii(b"e2").unwrap());
        board.set_piece_at(Square::from_ascii(b"e4").unwrap(), Color::White.pawn());
        board.turn = Color::Black;
        board.ep_square = Square::from_ascii(b"e3").ok();
        assert!(!board.ep_capture_exists());
        // With a black pawn on d4 the capture is real.
        board.set_piece_at(Square::from_ascii(b"d4").unwrap(), Color::Black.pawn());
        assert!(board.ep_capture_exists());
    }
}
