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

//! Resolving SAN against a position and applying the resulting move.
//!
//! A SAN token is a claim about a position; this module checks the claim.
//! Resolution collects every candidate source square that is consistent
//! with the token, filters geometrically and by the self-check rule, and
//! accepts only a unique survivor. An ambiguous SAN is a data error, never
//! silently resolved.

use std::error::Error;
use std::fmt;

use arrayvec::ArrayVec;

use crate::attacks;
use crate::board::Board;
use crate::moves::{DecodedMove, MoveClass};
use crate::san::San;
use crate::square::Square;
use crate::types::{CastlingSide, CheckStatus, Color, Role, CASTLING_SIDES};
use crate::zobrist;

/// Why a SAN could not be applied to a position.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum MoveError {
    /// No legal move is consistent with the token.
    Illegal,
    /// More than one legal move is consistent with the token.
    Ambiguous,
    /// A null move outside a variation, without `--allownullmoves`.
    NullNotAllowed,
}

impl fmt::Display for MoveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            MoveError::Illegal => "illegal or unrecognised move",
            MoveError::Ambiguous => "ambiguous move",
            MoveError::NullNotAllowed => "null move in the main line",
        })
    }
}

impl Error for MoveError {}

/// At most 8 pieces of one kind can be candidates for a destination.
type Candidates = ArrayVec<Square, 10>;

/// Resolves a [`San`] against a position without mutating it.
pub fn decode_san(board: &Board, san: &San, allow_null: bool) -> Result<DecodedMove, MoveError> {
    match *san {
        San::Null => {
            if !allow_null {
                return Err(MoveError::NullNotAllowed);
            }
            let king = board.king_of(board.turn).ok_or(MoveError::Illegal)?;
            Ok(DecodedMove {
                class: MoveClass::Null,
                from: king,
                to: king,
                piece: board.turn.king(),
                captured: None,
                promotion: None,
            })
        }
        San::Castle(side) => decode_castle(board, side),
        San::Normal { role: Role::Pawn, file, rank, capture, to, promotion } => {
            decode_pawn(board, file, rank, capture, to, promotion)
        }
        San::Normal { role, file, rank, capture: _, to, promotion } => {
            if promotion.is_some() {
                return Err(MoveError::Illegal);
            }
            decode_piece(board, role, file, rank, to)
        }
    }
}

fn decode_castle(board: &Board, side: CastlingSide) -> Result<DecodedMove, MoveError> {
    let us = board.turn;
    if !board.castling.has(us, side) {
        return Err(MoveError::Illegal);
    }

    let king_from = board.castling.king_from(us);
    let rook_from = board.castling.rook_from(us, side);
    let back = us.back_rank();
    let king_to = Square::from_coords(side.king_to_file(), back).expect("file in range");
    let rook_to = Square::from_coords(side.rook_to_file(), back).expect("file in range");

    if board.piece_at(king_from) != Some(us.king()) || board.piece_at(rook_from) != Some(us.rook()) {
        return Err(MoveError::Illegal);
    }

    // Every square either piece crosses or lands on must be free, apart
    // from the king and rook themselves.
    for sq in between_inclusive(king_from, king_to).chain(between_inclusive(rook_from, rook_to)) {
        if sq != king_from && sq != rook_from && !board.is_empty_at(sq) {
            return Err(MoveError::Illegal);
        }
    }

    // The king may not start on, cross or land on an attacked square.
    for sq in std::iter::once(king_from).chain(between_inclusive(king_from, king_to)) {
        if attacks::is_attacked(board, sq, !us) {
            return Err(MoveError::Illegal);
        }
    }

    Ok(DecodedMove {
        class: match side {
            CastlingSide::KingSide => MoveClass::KingsideCastle,
            CastlingSide::QueenSide => MoveClass::QueensideCastle,
        },
        from: king_from,
        to: king_to,
        piece: us.king(),
        captured: None,
        promotion: None,
    })
}

/// The squares from `from` towards `to` along a rank, including `to` but
/// not `from`.
fn between_inclusive(from: Square, to: Square) -> impl Iterator<Item = Square> {
    let step: i8 = if to.file() >= from.file() { 1 } else { -1 };
    let count = (to.file() as i8 - from.file() as i8).abs() as usize;
    (1..=count as i8).filter_map(move |i| from.offset(step * i, 0))
}

fn decode_pawn(
    board: &Board,
    file: Option<u8>,
    rank: Option<u8>,
    capture: bool,
    to: Square,
    promotion: Option<Role>,
) -> Result<DecodedMove, MoveError> {
    let us = board.turn;
    let dr = us.fold(1, -1);
    let last_rank = us.fold(7, 0);

    if (to.rank() == last_rank) != promotion.is_some() {
        return Err(MoveError::Illegal);
    }

    let mut candidates = Candidates::new();
    let mut en_passant = false;

    if capture {
        let target_ok = match board.piece_at(to) {
            Some(piece) => piece.color != us,
            None => board.ep_square == Some(to),
        };
        if !target_ok {
            return Err(MoveError::Illegal);
        }
        en_passant = board.is_empty_at(to);
        for df in [-1i8, 1] {
            if let Some(from) = to.offset(df, -dr) {
                if board.piece_at(from) == Some(us.pawn())
                    && file.map_or(true, |f| f == from.file())
                    && rank.map_or(true, |r| r == from.rank())
                {
                    candidates.push(from);
                }
            }
        }
    } else {
        if !board.is_empty_at(to) || file.map_or(false, |f| f != to.file()) {
            return Err(MoveError::Illegal);
        }
        if let Some(from) = to.offset(0, -dr) {
            if board.piece_at(from) == Some(us.pawn()) {
                if rank.map_or(true, |r| r == from.rank()) {
                    candidates.push(from);
                }
            } else if board.is_empty_at(from) && to.rank() == us.fold(3, 4) {
                // Double push from the home rank through an empty square.
                if let Some(from) = to.offset(0, -2 * dr) {
                    if board.piece_at(from) == Some(us.pawn())
                        && rank.map_or(true, |r| r == from.rank())
                    {
                        candidates.push(from);
                    }
                }
            }
        }
    }

    let captured = if en_passant {
        Some((!us).pawn())
    } else {
        board.piece_at(to)
    };

    let class = if en_passant {
        MoveClass::EnPassant
    } else if promotion.is_some() {
        MoveClass::PawnPromotion
    } else {
        MoveClass::PawnMove
    };

    unique_legal_candidate(board, candidates, |from| DecodedMove {
        class,
        from,
        to,
        piece: us.pawn(),
        captured,
        promotion,
    })
}

fn decode_piece(
    board: &Board,
    role: Role,
    file: Option<u8>,
    rank: Option<u8>,
    to: Square,
) -> Result<DecodedMove, MoveError> {
    let us = board.turn;
    if board.piece_at(to).map_or(false, |p| p.color == us) {
        return Err(MoveError::Illegal);
    }

    let mut candidates = Candidates::new();
    for (from, piece) in board.pieces() {
        if piece == role.of(us)
            && file.map_or(true, |f| f == from.file())
            && rank.map_or(true, |r| r == from.rank())
            && attacks::reachable(board, role, from, to)
        {
            if candidates.try_push(from).is_err() {
                return Err(MoveError::Ambiguous);
            }
        }
    }

    let captured = board.piece_at(to);
    unique_legal_candidate(board, candidates, |from| DecodedMove {
        class: MoveClass::PieceMove,
        from,
        to,
        piece: role.of(us),
        captured,
        promotion: None,
    })
}

/// Applies the self-check filter and demands exactly one survivor.
fn unique_legal_candidate<F>(
    board: &Board,
    candidates: Candidates,
    build: F,
) -> Result<DecodedMove, MoveError>
where
    F: Fn(Square) -> DecodedMove,
{
    let mut result: Option<DecodedMove> = None;
    for from in candidates {
        let m = build(from);
        let mut trial = board.clone();
        play_unchecked(&mut trial, &m);
        if !attacks::in_check(&trial, board.turn) {
            if result.is_some() {
                return Err(MoveError::Ambiguous);
            }
            result = Some(m);
        }
    }
    result.ok_or(MoveError::Illegal)
}

/// Plays a decoded move on the board without re-validating it.
///
/// Updates castling rights, the en-passant square, the clocks, the king
/// cache and the side to move.
pub fn play_unchecked(board: &mut Board, m: &DecodedMove) {
    let us = m.piece.color;
    let zeroing = m.is_zeroing();
    board.ep_square = None;

    match m.class {
        MoveClass::Null => (),
        MoveClass::KingsideCastle | MoveClass::QueensideCastle => {
            let side = if m.class == MoveClass::KingsideCastle {
                CastlingSide::KingSide
            } else {
                CastlingSide::QueenSide
            };
            let rook_from = board.castling.rook_from(us, side);
            let rook_to = Square::from_coords(side.rook_to_file(), us.back_rank()).expect("file in range");
            board.remove_piece_at(m.from);
            board.remove_piece_at(rook_from);
            board.set_piece_at(m.to, us.king());
            board.set_piece_at(rook_to, us.rook());
            board.castling.discard_color(us);
        }
        _ => {
            if m.captured.is_some() {
                let capture_sq = if m.class == MoveClass::EnPassant {
                    Square::from_coords(m.to.file(), m.from.rank()).expect("file in range")
                } else {
                    m.to
                };
                board.remove_piece_at(capture_sq);
                // A rook captured on its starting square loses its right.
                for &side in &CASTLING_SIDES {
                    if board.castling.has(!us, side) && capture_sq == board.castling.rook_from(!us, side) {
                        board.castling.set(!us, side, false);
                    }
                }
            }
            board.remove_piece_at(m.from);
            board.set_piece_at(m.to, m.promotion.map_or(m.piece, |role| role.of(us)));

            match m.piece.role {
                Role::King => board.castling.discard_color(us),
                Role::Rook => {
                    for &side in &CASTLING_SIDES {
                        if board.castling.has(us, side) && m.from == board.castling.rook_from(us, side) {
                            board.castling.set(us, side, false);
                        }
                    }
                }
                Role::Pawn => {
                    if (m.to.rank() as i8 - m.from.rank() as i8).abs() == 2 {
                        board.ep_square =
                            Square::from_coords(m.from.file(), (m.from.rank() + m.to.rank()) / 2);
                    }
                }
                _ => (),
            }
        }
    }

    board.halfmove_clock = if zeroing { 0 } else { board.halfmove_clock + 1 };
    if us == Color::Black {
        board.fullmoves += 1;
    }
    board.turn = !us;
}

/// Checks whether the side to move has any legal move. Castling is not
/// considered: whenever castling is legal the plain king step is too.
pub fn has_legal_move(board: &Board) -> bool {
    let us = board.turn;
    for (from, piece) in board.pieces() {
        if piece.color != us {
            continue;
        }
        if piece.role == Role::Pawn {
            let dr = us.fold(1, -1);
            let mut targets: ArrayVec<(Square, bool), 4> = ArrayVec::new();
            if let Some(to) = from.offset(0, dr) {
                if board.is_empty_at(to) {
                    targets.push((to, false));
                    if from.rank() == us.fold(1, 6) {
                        if let Some(to2) = from.offset(0, 2 * dr) {
                            if board.is_empty_at(to2) {
                                targets.push((to2, false));
                            }
                        }
                    }
                }
            }
            for df in [-1i8, 1] {
                if let Some(to) = from.offset(df, dr) {
                    let enemy = board.piece_at(to).map_or(false, |p| p.color != us);
                    let ep = board.ep_square == Some(to);
                    if enemy || ep {
                        targets.push((to, ep));
                    }
                }
            }
            for (to, ep) in targets {
                let m = DecodedMove {
                    class: if ep { MoveClass::EnPassant } else { MoveClass::PawnMove },
                    from,
                    to,
                    piece,
                    captured: if ep { Some((!us).pawn()) } else { board.piece_at(to) },
                    // Promotion does not affect whether the king is safe.
                    promotion: if to.rank() == us.fold(7, 0) { Some(Role::Queen) } else { None },
                };
                let mut trial = board.clone();
                play_unchecked(&mut trial, &m);
                if !attacks::in_check(&trial, us) {
                    return true;
                }
            }
        } else {
            for to in Square::all() {
                if board.piece_at(to).map_or(false, |p| p.color == us) {
                    continue;
                }
                if !attacks::reachable(board, piece.role, from, to) {
                    continue;
                }
                let m = DecodedMove {
                    class: MoveClass::PieceMove,
                    from,
                    to,
                    piece,
                    captured: board.piece_at(to),
                    promotion: None,
                };
                let mut trial = board.clone();
                play_unchecked(&mut trial, &m);
                if !attacks::in_check(&trial, us) {
                    return true;
                }
            }
        }
    }
    false
}

/// The check status of the side to move.
pub fn check_status(board: &Board) -> CheckStatus {
    if attacks::in_check(board, board.turn) {
        if has_legal_move(board) {
            CheckStatus::Check
        } else {
            CheckStatus::Checkmate
        }
    } else {
        CheckStatus::None
    }
}

/// Stalemate: not in check, but no legal move.
pub fn is_stalemate(board: &Board) -> bool {
    !attacks::in_check(board, board.turn) && !has_legal_move(board)
}

/// A board paired with an incrementally maintained piece-placement hash.
///
/// The full position hash XORs the castling, en-passant and turn state on
/// top, which is cheap to recompute per ply.
#[derive(Clone, Debug)]
pub struct HashedBoard {
    pub board: Board,
    pieces_hash: u64,
}

impl HashedBoard {
    pub fn new(board: Board) -> HashedBoard {
        let pieces_hash = zobrist::hash_pieces(&board);
        HashedBoard { board, pieces_hash }
    }

    /// The full Polyglot hash of the current position.
    pub fn hash(&self) -> u64 {
        self.pieces_hash ^ zobrist::hash_state(&self.board)
    }

    /// Plays a decoded move, updating the placement hash by XOR.
    pub fn play(&mut self, m: &DecodedMove) {
        let us = m.piece.color;
        let mut delta = 0u64;
        match m.class {
            MoveClass::Null => (),
            MoveClass::KingsideCastle | MoveClass::QueensideCastle => {
                let side = if m.class == MoveClass::KingsideCastle {
                    CastlingSide::KingSide
                } else {
                    CastlingSide::QueenSide
                };
                let rook_from = self.board.castling.rook_from(us, side);
                let rook_to =
                    Square::from_coords(side.rook_to_file(), us.back_rank()).expect("file in range");
                delta ^= zobrist::piece_key(us.king(), m.from);
                delta ^= zobrist::piece_key(us.king(), m.to);
                delta ^= zobrist::piece_key(us.rook(), rook_from);
                delta ^= zobrist::piece_key(us.rook(), rook_to);
            }
            _ => {
                if let Some(captured) = m.captured {
                    let capture_sq = if m.class == MoveClass::EnPassant {
                        Square::from_coords(m.to.file(), m.from.rank()).expect("file in range")
                    } else {
                        m.to
                    };
                    delta ^= zobrist::piece_key(captured, capture_sq);
                }
                delta ^= zobrist::piece_key(m.piece, m.from);
                delta ^= zobrist::piece_key(m.promotion.map_or(m.piece, |role| role.of(us)), m.to);
            }
        }
        self.pieces_hash ^= delta;
        play_unchecked(&mut self.board, m);
    }
}

/// Per-ply hook during replay of a game's main line. The match engine uses
/// this to fire positional, pattern and material matches mid-game.
pub trait ReplayObserver {
    fn after_ply(&mut self, _ply: usize, _board: &Board, _hash: u64) {}
}

/// An observer that does nothing.
#[derive(Debug, Default)]
pub struct NoObserver;

impl ReplayObserver for NoObserver {}

/// Why a game's move list could not be replayed to the end.
#[derive(Debug)]
pub enum ReplayError {
    Fen(crate::fen::FenError),
    Move { ply: usize, error: MoveError },
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ReplayError::Fen(ref err) => write!(f, "bad FEN tag: {}", err),
            ReplayError::Move { ply, ref error } => write!(f, "ply {}: {}", ply + 1, error),
        }
    }
}

impl Error for ReplayError {}

impl From<crate::fen::FenError> for ReplayError {
    fn from(err: crate::fen::FenError) -> ReplayError {
        ReplayError::Fen(err)
    }
}

/// Replays the main line of a parsed game, move by move.
///
/// Each [`crate::moves::MoveRecord`] gets its decoded move, true check
/// status and post-move hash filled in; the game's position counts, final
/// hash and cumulative hash are updated as replay proceeds. Variations are
/// replayed best-effort from the position before the move they are attached
/// to, so that alternative notations can later be emitted for them; an
/// error inside a variation leaves its tail undecoded but does not fail
/// the game.
///
/// # Errors
///
/// Returns [`ReplayError`] for a bad FEN tag or the first unplayable
/// main-line move; `game.error_ply` records where replay stopped.
pub fn apply_move_list(
    game: &mut crate::game::Game,
    allow_null_in_mainline: bool,
    observer: &mut dyn ReplayObserver,
) -> Result<Board, ReplayError> {
    let mut board = HashedBoard::new(game.starting_board()?);
    game.moves_checked = true;
    game.moves_ok = true;
    game.error_ply = None;
    game.position_counts.clear();
    game.cumulative_hash = 0;
    *game.position_counts.entry(board.hash()).or_insert(0) += 1;

    for ply in 0..game.moves.len() {
        let before = board.board.clone();

        let decoded = {
            let record = &game.moves[ply];
            decode_san(&before, &record.san, allow_null_in_mainline)
        };
        let m = match decoded {
            Ok(m) => m,
            Err(error) => {
                game.moves_ok = false;
                game.error_ply = Some(ply);
                return Err(ReplayError::Move { ply, error });
            }
        };

        board.play(&m);
        let hash = board.hash();

        let record = &mut game.moves[ply];
        record.decoded = Some(m);
        record.check = check_status(&board.board);
        record.hash_after = hash;

        for variation in &mut record.variations {
            replay_variation(&before, variation);
        }

        *game.position_counts.entry(hash).or_insert(0) += 1;
        game.cumulative_hash = game.cumulative_hash.wrapping_add(hash as u32);
        observer.after_ply(ply, &board.board, hash);
    }

    game.final_hash = board.hash();
    Ok(board.board)
}

/// Replays one variation from the position before the move it annotates.
/// Stops quietly at the first unplayable move.
fn replay_variation(start: &Board, variation: &mut crate::moves::Variation) {
    let mut pre = start.clone();
    for record in &mut variation.moves {
        let m = match decode_san(&pre, &record.san, true) {
            Ok(m) => m,
            Err(_) => return,
        };
        let mut post = pre.clone();
        play_unchecked(&mut post, &m);

        record.decoded = Some(m);
        record.check = check_status(&post);
        record.hash_after = zobrist::hash_board(&post);

        // Sub-variations are alternatives to this move, so they branch off
        // from the position before it.
        for sub in &mut record.variations {
            replay_variation(&pre, sub);
        }

        pre = post;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fen::board_from_fen;
    use crate::san::SanPlus;

    fn play_line(board: &mut HashedBoard, line: &str) {
        for token in line.split_whitespace() {
            let san = SanPlus::from_ascii(token.as_bytes()).expect("valid san").san;
            let m = decode_san(&board.board, &san, false).expect("legal move");
            board.play(&m);
        }
    }

    #[test]
    fn test_polyglot_vectors() {
        // Reference hashes from the Polyglot book format specification.
        let vectors = [
            ("e4", 0x823c9b50fd114196u64),
            ("e4 d5", 0x0756b94461c50fb0),
            ("e4 d5 e5", 0x662fafb965db29d4),
            ("e4 d5 e5 f5", 0x22a48b5a8e47ff78),
            ("e4 e5 Ke2", 0x825f81036d2429d2),
            ("e4 e5 Ke2 Ke7", 0x00fdd303c946bdd9),
            ("a4 b5 h4 b4 c4", 0x3c8123ea7b067637),
            ("a4 b5 h4 b4 c4 bxc3 Ra3", 0x5c3f9b829b279560),
        ];
        for (line, expected) in vectors {
            let mut board = HashedBoard::new(Board::new());
            play_line(&mut board, line);
            assert_eq!(board.hash(), expected, "hash mismatch after {}", line);
            // The incremental hash agrees with a recomputation from scratch.
            assert_eq!(board.hash(), zobrist::hash_board(&board.board));
        }
    }

    #[test]
    fn test_castling_and_knight_capture() {
        // Castling short, then a knight capture resolved from its only
        // reachable source square.
        let board = board_from_fen(
            b"r1b1k2r/pppp1ppp/2n2n2/4p3/2B1P3/2N2N2/PPPP1PPP/R1BQK2R w KQkq - 4 5",
        )
        .expect("valid fen");
        let mut board = HashedBoard::new(board);

        let castle = decode_san(&board.board, &"O-O".parse::<San>().unwrap(), false).expect("legal");
        board.play(&castle);
        assert_eq!(board.board.piece_at(Square::G1), Some(Color::White.king()));
        assert_eq!(board.board.piece_at(Square::F1), Some(Color::White.rook()));
        assert!(board.board.is_empty_at(Square::E1));
        assert!(!board.board.castling.has(Color::White, CastlingSide::KingSide));

        let nxe4 = decode_san(&board.board, &"Nxe4".parse::<San>().unwrap(), false).expect("legal");
        assert_eq!(nxe4.from, Square::from_ascii(b"f6").unwrap());
        assert_eq!(nxe4.captured, Some(Color::White.pawn()));
        board.play(&nxe4);
        assert_ne!(board.hash(), 0);
    }

    #[test]
    fn test_ambiguous_san_is_an_error() {
        let board = board_from_fen(b"4k3/8/8/8/8/8/8/R3K2R w - - 0 1").expect("valid fen");
        let san: San = "Rd1".parse().unwrap();
        assert_eq!(decode_san(&board, &san, false), Err(MoveError::Ambiguous));
        let san: San = "Rad1".parse().unwrap();
        assert!(decode_san(&board, &san, false).is_ok());
    }

    #[test]
    fn test_self_check_disambiguates() {
        // Knights on c4 and e4 both reach d2, but the e4 knight is pinned
        // against the king by the e8 rook, so the SAN stays unambiguous.
        let board = board_from_fen(b"4r1k1/8/8/8/2N1N3/8/8/4K3 w - - 0 1").expect("valid fen");
        let san: San = "Nd2".parse().unwrap();
        let m = decode_san(&board, &san, false).expect("exactly one legal interpretation");
        assert_eq!(m.from, Square::from_ascii(b"c4").unwrap());
    }

    #[test]
    fn test_checkmate_detection() {
        let mut board = HashedBoard::new(Board::new());
        play_line(&mut board, "f3 e5 g4");
        let qh4 = decode_san(&board.board, &"Qh4".parse::<San>().unwrap(), false).expect("legal");
        board.play(&qh4);
        assert_eq!(check_status(&board.board), CheckStatus::Checkmate);
    }

    #[test]
    fn test_stalemate_detection() {
        let board = board_from_fen(b"7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").expect("valid fen");
        assert!(is_stalemate(&board));
        assert_eq!(check_status(&board), CheckStatus::None);
    }

    #[test]
    fn test_en_passant() {
        let mut board = HashedBoard::new(Board::new());
        play_line(&mut board, "e4 Nf6 e5 d5");
        assert!(board.board.ep_capture_exists());
        let ep = decode_san(&board.board, &"exd6".parse::<San>().unwrap(), false).expect("legal");
        assert_eq!(ep.class, MoveClass::EnPassant);
        board.play(&ep);
        assert!(board.board.is_empty_at(Square::from_ascii(b"d5").unwrap()));
        assert_eq!(board.hash(), zobrist::hash_board(&board.board));
    }

    #[test]
    fn test_null_move() {
        let mut board = Board::new();
        let hash_before = zobrist::hash_board(&board);
        let null = decode_san(&board, &San::Null, true).expect("allowed");
        play_unchecked(&mut board, &null);
        assert_eq!(board.turn, Color::Black);
        assert_ne!(zobrist::hash_board(&board), hash_before);
        assert_eq!(decode_san(&board, &San::Null, false), Err(MoveError::NullNotAllowed));
    }

    #[test]
    fn test_promotion() {
        let board = board_from_fen(b"8/4P1k1/8/8/8/8/8/4K3 w - - 0 1").expect("valid fen");
        assert_eq!(
            decode_san(&board, &"e8".parse::<San>().unwrap(), false),
            Err(MoveError::Illegal),
            "promotion piece is required on the last rank"
        );
        let m = decode_san(&board, &"e8=Q".parse::<San>().unwrap(), false).expect("legal");
        assert_eq!(m.class, MoveClass::PawnPromotion);
        let mut board = board;
        play_unchecked(&mut board, &m);
        assert_eq!(board.piece_at(Square::E8), Some(Color::White.queen()));
    }
}
