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

//! The PGN parser: recursive descent with one token of lookahead.
//!
//! ```text
//! Game       := {COMMENT} TagList [NAG*] MoveList [COMMENT] [Result]
//! TagList    := {TagName TagString}
//! MoveList   := {[MoveNumber] Move [NAG* [COMMENT]] {Variation} [COMMENT]}
//! Variation  := '(' [COMMENT] MoveList [Result] [COMMENT] ')' [COMMENT]
//! ```
//!
//! Parse errors are non-fatal: the game is marked broken, a diagnostic is
//! recorded, and the driver decides whether to keep it.

use std::io::{self, BufRead};

use crate::board::Board;
use crate::fen;
use crate::game::Game;
use crate::lexer::{Diagnostic, Lexer, LexerOpts, Token};
use crate::moves::{Comment, MoveRecord, Variation};
use crate::san::SanPlus;
use crate::tags::{self, TagRegistry};
use crate::types::Outcome;

/// Parser behaviour toggles, a subset of the run configuration.
#[derive(Copy, Clone, Debug, Default)]
pub struct ParserOpts {
    pub lexer: LexerOpts,
    /// Tolerate null moves in the main line.
    pub allow_null_moves: bool,
    /// Move a variation's prefix comment onto its first move, working
    /// around a known upstream producer bug.
    pub lichess_comment_fix: bool,
    /// Reject games whose `Result` tag contradicts the terminating result.
    pub reject_inconsistent_results: bool,
    /// Rewrite the `Result` tag from the terminating result.
    pub fix_result_tags: bool,
}

#[derive(Debug)]
pub struct Parser<R> {
    lexer: Lexer<R>,
    lookahead: Option<Token>,
    opts: ParserOpts,
    pub diagnostics: Vec<Diagnostic>,
}

impl<R: BufRead> Parser<R> {
    pub fn new(reader: R, opts: ParserOpts) -> Parser<R> {
        Parser {
            lexer: Lexer::new(reader, opts.lexer),
            lookahead: None,
            opts,
            diagnostics: Vec::new(),
        }
    }

    fn next(&mut self) -> io::Result<Token> {
        match self.lookahead.take() {
            Some(token) => Ok(token),
            None => self.lexer.next_token(),
        }
    }

    fn peek(&mut self) -> io::Result<&Token> {
        if self.lookahead.is_none() {
            self.lookahead = Some(self.lexer.next_token()?);
        }
        Ok(self.lookahead.as_ref().expect("lookahead filled"))
    }

    fn push_back(&mut self, token: Token) {
        debug_assert!(self.lookahead.is_none());
        self.lookahead = Some(token);
    }

    fn diagnose(&mut self, message: String) {
        self.diagnostics.push(Diagnostic {
            line: self.lexer.line_number(),
            message,
        });
    }

    /// Drains lexer diagnostics into the parser's list.
    fn merge_lexer_diagnostics(&mut self) {
        self.diagnostics.append(&mut self.lexer.diagnostics);
    }

    /// Parses the next game, or returns `None` at end of input.
    pub fn next_game(&mut self, registry: &mut TagRegistry) -> io::Result<Option<Game>> {
        let mut game = Game::new();

        // Prefix comments belong to the game that follows them.
        loop {
            match self.next()? {
                Token::Comment(text) => game.prefix.push(text),
                Token::Eof => {
                    self.merge_lexer_diagnostics();
                    return Ok(None);
                }
                token => {
                    self.push_back(token);
                    break;
                }
            }
        }

        game.start_line = self.lexer.line_number();
        self.parse_tags(&mut game, registry)?;

        // Stray NAGs between the tags and the first move.
        while matches!(self.peek()?, Token::Nag(_)) {
            self.next()?;
        }

        let (moves, leading, result) = self.parse_move_list(&mut game, 0)?;
        game.prefix.extend(leading);
        game.moves = moves;

        match result {
            Some(result) => {
                if let Some(last) = game.moves.last_mut() {
                    last.terminating_result = Some(result);
                }
                game.result = Some(result);
            }
            None => {
                self.diagnose("game is missing a terminating result".to_owned());
                game.broken = true;
            }
        }

        self.check_result_tag(&mut game);
        self.check_setup_tags(&mut game);
        game.end_line = self.lexer.line_number();
        self.merge_lexer_diagnostics();
        Ok(Some(game))
    }

    fn parse_tags(&mut self, game: &mut Game, registry: &mut TagRegistry) -> io::Result<()> {
        loop {
            match self.peek()? {
                Token::TagName(_) => {
                    let name = match self.next()? {
                        Token::TagName(name) => name,
                        _ => unreachable!("peeked tag name"),
                    };
                    match self.peek()? {
                        Token::TagString(_) => {
                            let value = match self.next()? {
                                Token::TagString(value) => value,
                                _ => unreachable!("peeked tag string"),
                            };
                            game.set_tag(registry.id(&name), value);
                        }
                        _ => {
                            self.diagnose(format!(
                                "tag {} is missing its value",
                                String::from_utf8_lossy(&name)
                            ));
                            game.broken = true;
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Parses moves at the given RAV depth until a terminating result, a
    /// closing parenthesis, the next game's tags, or end of input.
    ///
    /// Returns the moves, any comments that preceded the first move, and
    /// the terminating result if one was seen.
    #[allow(clippy::type_complexity)]
    fn parse_move_list(
        &mut self,
        game: &mut Game,
        depth: u32,
    ) -> io::Result<(Vec<MoveRecord>, Vec<Comment>, Option<Outcome>)> {
        let mut moves: Vec<MoveRecord> = Vec::new();
        let mut leading: Vec<Comment> = Vec::new();
        let mut result = None;

        loop {
            match self.next()? {
                Token::MoveNumber(_) => (),
                Token::Move(text) => match SanPlus::from_ascii(&text) {
                    Ok(san_plus) => {
                        if san_plus.san == crate::san::San::Null
                            && depth == 0
                            && !self.opts.allow_null_moves
                        {
                            self.diagnose("null move in the main line".to_owned());
                        }
                        moves.push(MoveRecord::new(text, san_plus.san));
                    }
                    Err(_) => {
                        self.diagnose(format!(
                            "unrecognised move {}",
                            String::from_utf8_lossy(&text)
                        ));
                        game.broken = true;
                    }
                },
                Token::Nag(nag) => {
                    if let Some(last) = moves.last_mut() {
                        last.nags.push(nag);
                    }
                }
                Token::Comment(text) => {
                    match moves.last_mut() {
                        Some(last) => last.comments.push(text),
                        None => leading.push(text),
                    }
                }
                Token::RavStart => {
                    let variation = self.parse_variation(game, depth + 1)?;
                    match moves.last_mut() {
                        Some(last) => last.variations.push(variation),
                        None => game.prefix_variations.push(variation),
                    }
                }
                Token::RavEnd => {
                    if depth > 0 {
                        self.push_back(Token::RavEnd);
                        return Ok((moves, leading, result));
                    }
                    self.diagnose("unmatched ')' in the main line".to_owned());
                    game.broken = true;
                }
                Token::Result(outcome) => {
                    result = Some(outcome);
                    return Ok((moves, leading, result));
                }
                Token::TagName(name) => {
                    // The next game has started; this one had no result.
                    self.push_back(Token::TagName(name));
                    return Ok((moves, leading, result));
                }
                Token::TagString(_) => {
                    self.diagnose("stray string in movetext".to_owned());
                    game.broken = true;
                }
                Token::Eof => {
                    self.push_back(Token::Eof);
                    return Ok((moves, leading, result));
                }
            }
        }
    }

    /// Parses one variation; the opening parenthesis has been consumed.
    fn parse_variation(&mut self, game: &mut Game, depth: u32) -> io::Result<Variation> {
        let (moves, prefix, result) = self.parse_move_list(game, depth)?;
        let mut variation = Variation { prefix, moves, suffix: Vec::new(), result };

        if let Some(result) = result {
            if let Some(last) = variation.moves.last_mut() {
                last.terminating_result = Some(result);
            }
        }

        // Comments between the result and the closing parenthesis.
        loop {
            match self.next()? {
                Token::Comment(text) => variation.suffix.push(text),
                Token::RavEnd => break,
                token => {
                    self.diagnose("variation is missing its ')'".to_owned());
                    game.broken = true;
                    self.push_back(token);
                    break;
                }
            }
        }

        if self.opts.lichess_comment_fix && !variation.prefix.is_empty() {
            if let Some(first) = variation.moves.first_mut() {
                let mut prefix = std::mem::take(&mut variation.prefix);
                prefix.append(&mut first.comments);
                first.comments = prefix;
            }
        }

        Ok(variation)
    }

    /// Reconciles the `Result` tag with the terminating result.
    fn check_result_tag(&mut self, game: &mut Game) {
        let terminating = game.result;
        let tag = game.tag(tags::RESULT).map(<[u8]>::to_vec);

        if let Some(tag_value) = &tag {
            if tag_value.as_slice() == b"1/2" {
                game.set_tag(tags::RESULT, b"1/2-1/2".to_vec());
            }
        }

        match (game.tag(tags::RESULT).map(<[u8]>::to_vec), terminating) {
            (None, Some(result)) => {
                game.set_tag(tags::RESULT, result.as_str().as_bytes().to_vec());
            }
            (Some(tag_value), Some(result)) => {
                if tag_value.as_slice() == b"?" {
                    game.set_tag(tags::RESULT, result.as_str().as_bytes().to_vec());
                } else if tag_value.as_slice() != result.as_str().as_bytes() {
                    if self.opts.fix_result_tags {
                        game.set_tag(tags::RESULT, result.as_str().as_bytes().to_vec());
                    } else if self.opts.reject_inconsistent_results {
                        self.diagnose(format!(
                            "Result tag {} contradicts terminating result {}",
                            String::from_utf8_lossy(&tag_value),
                            result
                        ));
                        game.rejected = true;
                    } else {
                        self.diagnose(format!(
                            "Result tag {} does not match terminating result {}",
                            String::from_utf8_lossy(&tag_value),
                            result
                        ));
                    }
                }
            }
            _ => (),
        }
    }

    /// `SetUp`/`FEN` consistency and Chess960 detection.
    fn check_setup_tags(&mut self, game: &mut Game) {
        if let Some(fen_tag) = game.tag(tags::FEN).map(<[u8]>::to_vec) {
            if !game.has_tag(tags::SET_UP) {
                game.set_tag(tags::SET_UP, b"1".to_vec());
            }
            match fen::board_from_fen(&fen_tag) {
                Ok(board) => {
                    if looks_like_chess960(&board) && !game.has_tag(tags::VARIANT) {
                        game.set_tag(tags::VARIANT, b"chess 960".to_vec());
                    }
                }
                Err(err) => {
                    self.diagnose(format!("bad FEN tag: {}", err));
                    game.broken = true;
                }
            }
        } else if game.tag(tags::SET_UP) == Some(b"1") {
            self.diagnose("SetUp tag without a FEN tag".to_owned());
        }
    }

    /// Recovers after a hopeless game by scanning for the next tag section.
    pub fn skip_to_next_game(&mut self) -> io::Result<bool> {
        self.lookahead = None;
        self.lexer.skip_to_next_game()
    }
}

/// A start-like position with full castling rights but a shuffled back
/// rank is taken to be a Chess960 start.
pub fn looks_like_chess960(board: &Board) -> bool {
    use crate::types::{Black, CastlingSide, White};
    let standard = Board::new();
    board.castling.has(White, CastlingSide::KingSide)
        && board.castling.has(White, CastlingSide::QueenSide)
        && board.castling.has(Black, CastlingSide::KingSide)
        && board.castling.has(Black, CastlingSide::QueenSide)
        && crate::square::Square::all().any(|sq| board.piece_at(sq) != standard.piece_at(sq))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse_all(input: &str) -> (Vec<Game>, Vec<Diagnostic>) {
        parse_all_with(input, ParserOpts::default())
    }

    fn parse_all_with(input: &str, opts: ParserOpts) -> (Vec<Game>, Vec<Diagnostic>) {
        let mut registry = TagRegistry::new();
        let mut parser = Parser::new(Cursor::new(input.as_bytes().to_vec()), opts);
        let mut games = Vec::new();
        while let Some(game) = parser.next_game(&mut registry).expect("in-memory read") {
            games.push(game);
        }
        (games, parser.diagnostics)
    }

    const SIMPLE: &str = "\
[Event \"Test\"]
[Result \"1-0\"]

1. e4 e5 2. Nf3 Nc6 1-0
";

    #[test]
    fn test_simple_game() {
        let (games, diagnostics) = parse_all(SIMPLE);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        assert_eq!(games.len(), 1);
        let game = &games[0];
        assert_eq!(game.tag(tags::EVENT), Some(&b"Test"[..]));
        assert_eq!(game.ply_count(), 4);
        assert_eq!(game.result, Some(Outcome::Decisive { winner: crate::types::White }));
        assert_eq!(game.moves[3].terminating_result, game.result);
        assert!(!game.broken);
        assert_eq!(game.start_line, 1);
    }

    #[test]
    fn test_comments_attach_to_preceding_move() {
        let (games, _) = parse_all("{pregame} 1. e4 {best} e5 (1... c5 {sharp}) {solid} *");
        let game = &games[0];
        assert_eq!(game.prefix, vec![b"pregame".to_vec()]);
        assert_eq!(game.moves[0].comments, vec![b"best".to_vec()]);
        assert_eq!(game.moves[1].comments, vec![b"solid".to_vec()]);
        let variation = &game.moves[1].variations[0];
        assert_eq!(variation.moves[0].comments, vec![b"sharp".to_vec()]);
    }

    #[test]
    fn test_variation_prefix_comment() {
        let (games, _) = parse_all("1. e4 ({instead} 1. d4 d5) e5 *");
        let variation = &games[0].moves[0].variations[0];
        assert_eq!(variation.prefix, vec![b"instead".to_vec()]);
        assert_eq!(variation.moves.len(), 2);

        let opts = ParserOpts { lichess_comment_fix: true, ..ParserOpts::default() };
        let (games, _) = parse_all_with("1. e4 ({instead} 1. d4 d5) e5 *", opts);
        let variation = &games[0].moves[0].variations[0];
        assert!(variation.prefix.is_empty());
        assert_eq!(variation.moves[0].comments, vec![b"instead".to_vec()]);
    }

    #[test]
    fn test_missing_result_marks_broken() {
        let (games, diagnostics) = parse_all("[Event \"x\"]\n\n1. e4 e5\n[Event \"y\"]\n\n1. d4 *\n");
        assert_eq!(games.len(), 2);
        assert!(games[0].broken);
        assert!(!games[1].broken);
        assert!(diagnostics.iter().any(|d| d.message.contains("terminating result")));
    }

    #[test]
    fn test_result_tag_filled_from_terminator() {
        let (games, _) = parse_all("[Event \"x\"]\n\n1. e4 1-0\n");
        assert_eq!(games[0].tag(tags::RESULT), Some(&b"1-0"[..]));
    }

    #[test]
    fn test_obsolete_draw_marker() {
        let (games, _) = parse_all("[Result \"1/2\"]\n\n1. e4 e5 1/2\n");
        let game = &games[0];
        assert_eq!(game.result, Some(Outcome::Draw));
        assert_eq!(game.tag(tags::RESULT), Some(&b"1/2-1/2"[..]));
    }

    #[test]
    fn test_reject_inconsistent_results() {
        let opts = ParserOpts { reject_inconsistent_results: true, ..ParserOpts::default() };
        let (games, _) = parse_all_with("[Result \"0-1\"]\n\n1. e4 1-0\n", opts);
        assert!(games[0].rejected);
    }

    #[test]
    fn test_setup_inserted_for_fen() {
        let (games, _) = parse_all(
            "[FEN \"4k3/8/8/8/8/8/8/4K3 w - - 0 1\"]\n\n1. Kd2 *\n",
        );
        assert_eq!(games[0].tag(tags::SET_UP), Some(&b"1"[..]));
    }

    #[test]
    fn test_chess960_variant_inserted() {
        let (games, _) = parse_all(
            "[FEN \"qkrbbnnr/pppppppp/8/8/8/8/PPPPPPPP/QKRBBNNR w CAca - 0 1\"]\n\n1. c4 *\n",
        );
        assert_eq!(games[0].tag(tags::VARIANT), Some(&b"chess 960"[..]));
    }

    #[test]
    fn test_variation_before_first_move() {
        let (games, _) = parse_all("(1. d4) 1. e4 *");
        let game = &games[0];
        assert_eq!(game.prefix_variations.len(), 1);
        assert_eq!(game.ply_count(), 1);
    }

    #[test]
    fn test_multiple_games_and_line_numbers() {
        let (games, _) = parse_all(
            "[Event \"a\"]\n\n1. e4 *\n\n[Event \"b\"]\n\n1. d4 *\n",
        );
        assert_eq!(games.len(), 2);
        assert!(games[0].start_line < games[1].start_line);
        assert_eq!(games[0].tag(tags::EVENT), Some(&b"a"[..]));
        assert_eq!(games[1].tag(tags::EVENT), Some(&b"b"[..]));
    }

    #[test]
    fn test_null_move_diagnostic() {
        let (_, diagnostics) = parse_all("1. e4 -- 2. d4 *");
        assert!(diagnostics.iter().any(|d| d.message.contains("null move")));
        let opts = ParserOpts { allow_null_moves: true, ..ParserOpts::default() };
        let (_, diagnostics) = parse_all_with("1. e4 -- 2. d4 *", opts);
        assert!(!diagnostics.iter().any(|d| d.message.contains("null move")));
    }
}
