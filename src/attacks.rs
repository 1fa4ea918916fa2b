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

//! Attack and reachability tests over the mailbox board.

use crate::board::Board;
use crate::square::Square;
use crate::types::{Color, Piece, Role};

pub const KNIGHT_DELTAS: [(i8, i8); 8] = [
    (1, 2), (2, 1), (2, -1), (1, -2), (-1, -2), (-2, -1), (-2, 1), (-1, 2),
];

pub const KING_DELTAS: [(i8, i8); 8] = [
    (0, 1), (1, 1), (1, 0), (1, -1), (0, -1), (-1, -1), (-1, 0), (-1, 1),
];

pub const BISHOP_DIRS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, -1), (-1, 1)];

pub const ROOK_DIRS: [(i8, i8); 4] = [(0, 1), (1, 0), (0, -1), (-1, 0)];

/// Tests whether `sq` is attacked by any piece of `attacker`.
pub fn is_attacked(board: &Board, sq: Square, attacker: Color) -> bool {
    // Knights.
    for &(df, dr) in &KNIGHT_DELTAS {
        if let Some(from) = sq.offset(df, dr) {
            if board.piece_at(from) == Some(attacker.knight()) {
                return true;
            }
        }
    }

    // Pawns: a pawn of `attacker` attacks `sq` from one rank towards its
    // own side.
    let dr = attacker.fold(-1, 1);
    for &df in &[-1, 1] {
        if let Some(from) = sq.offset(df, dr) {
            if board.piece_at(from) == Some(attacker.pawn()) {
                return true;
            }
        }
    }

    // King.
    for &(df, dr) in &KING_DELTAS {
        if let Some(from) = sq.offset(df, dr) {
            if board.piece_at(from) == Some(attacker.king()) {
                return true;
            }
        }
    }

    // Sliders.
    for &(df, dr) in &BISHOP_DIRS {
        if let Some(piece) = first_piece_along(board, sq, df, dr) {
            if piece.color == attacker && (piece.role == Role::Bishop || piece.role == Role::Queen) {
                return true;
            }
        }
    }
    for &(df, dr) in &ROOK_DIRS {
        if let Some(piece) = first_piece_along(board, sq, df, dr) {
            if piece.color == attacker && (piece.role == Role::Rook || piece.role == Role::Queen) {
                return true;
            }
        }
    }

    false
}

/// Tests whether the side to move's king is attacked.
pub fn in_check(board: &Board, color: Color) -> bool {
    board
        .king_of(color)
        .map_or(false, |king| is_attacked(board, king, !color))
}

/// The first piece encountered walking from `sq` in the given direction.
fn first_piece_along(board: &Board, sq: Square, df: i8, dr: i8) -> Option<Piece> {
    let mut current = sq;
    while let Some(next) = current.offset(df, dr) {
        if let Some(piece) = board.piece_at(next) {
            return Some(piece);
        }
        current = next;
    }
    None
}

/// Geometric reachability of a non-pawn move: the piece on `from` can get to
/// `to` in one move given the current occupancy, ignoring whose turn it is
/// and ignoring what occupies the target.
pub fn reachable(board: &Board, role: Role, from: Square, to: Square) -> bool {
    if from == to {
        return false;
    }
    match role {
        Role::Knight => KNIGHT_DELTAS
            .iter()
            .any(|&(df, dr)| from.offset(df, dr) == Some(to)),
        Role::King => from.distance(to) == 1,
        Role::Bishop => aligned_and_clear(board, from, to, &BISHOP_DIRS),
        Role::Rook => aligned_and_clear(board, from, to, &ROOK_DIRS),
        Role::Queen => {
            aligned_and_clear(board, from, to, &BISHOP_DIRS)
                || aligned_and_clear(board, from, to, &ROOK_DIRS)
        }
        Role::Pawn => false, // pawn moves are decoded separately
    }
}

fn aligned_and_clear(board: &Board, from: Square, to: Square, dirs: &[(i8, i8)]) -> bool {
    for &(df, dr) in dirs {
        let mut current = from;
        while let Some(next) = current.offset(df, dr) {
            if next == to {
                return true;
            }
            if !board.is_empty_at(next) {
                break;
            }
            current = next;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attacks_in_starting_position() {
        let board = Board::new();
        // f3 is covered by the g1 knight and the e2/g2 pawns.
        let f3 = Square::from_ascii(b"f3").unwrap();
        assert!(is_attacked(&board, f3, Color::White));
        // e4 is attacked by nobody.
        let e4 = Square::from_ascii(b"e4").unwrap();
        assert!(!is_attacked(&board, e4, Color::White));
        assert!(!is_attacked(&board, e4, Color::Black));
        assert!(!in_check(&board, Color::White));
    }

    #[test]
    fn test_slider_reachability() {
        let mut board = Board::new();
        let a1 = Square::A1;
        let a3 = Square::from_ascii(b"a3").unwrap();
        let a2 = Square::from_ascii(b"a2").unwrap();
        assert!(!reachable(&board, Role::Rook, a1, a3)); // blocked by the a2 pawn
        board.remove_piece_at(a2);
        assert!(reachable(&board, Role::Rook, a1, a3));
        assert!(!reachable(&board, Role::Bishop, a1, a3));
    }

    #[test]
    fn test_knight_reachability() {
        let board = Board::new();
        let g1 = Square::G1;
        assert!(reachable(&board, Role::Knight, g1, Square::from_ascii(b"f3").unwrap()));
        assert!(!reachable(&board, Role::Knight, g1, Square::from_ascii(b"g3").unwrap()));
    }
}
