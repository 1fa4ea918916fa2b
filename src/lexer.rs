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

//! The PGN lexer.
//!
//! Input is raw bytes, 8-bit clean; only ASCII has lexical meaning. The
//! lexer works line by line so that every token carries a 1-based line
//! number, recovers from ill-formed input by scanning for the next game,
//! and is restartable between games.

use std::io::{self, BufRead};

use crate::moves::Nag;
use crate::types::Outcome;

/// A lexical token of a PGN file.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Token {
    /// The identifier after `[`.
    TagName(Vec<u8>),
    /// A quoted string, escapes already decoded.
    TagString(Vec<u8>),
    MoveNumber(u32),
    /// Raw SAN bytes, possibly with trailing check glyphs.
    Move(Vec<u8>),
    Nag(Nag),
    /// Comment text without braces; line breaks folded to spaces.
    Comment(Vec<u8>),
    RavStart,
    RavEnd,
    Result(Outcome),
    Eof,
}

/// A non-fatal problem found while scanning, reported to the log.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Diagnostic {
    pub line: u64,
    pub message: String,
}

/// Lexer behaviour toggles, a subset of the run configuration.
#[derive(Copy, Clone, Debug, Default)]
pub struct LexerOpts {
    /// `{` nests inside comments instead of being literal.
    pub nested_comments: bool,
    /// Close an unterminated tag string at end of line with a warning.
    pub fix_tag_strings: bool,
}

#[derive(Debug)]
pub struct Lexer<R> {
    reader: R,
    opts: LexerOpts,
    line: Vec<u8>,
    pos: usize,
    line_number: u64,
    eof: bool,
    pub diagnostics: Vec<Diagnostic>,
}

fn is_tag_name_char(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'_'
}

fn is_move_char(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, b'=' | b'+' | b'#' | b'-' | b':')
}

impl<R: BufRead> Lexer<R> {
    pub fn new(reader: R, opts: LexerOpts) -> Lexer<R> {
        Lexer {
            reader,
            opts,
            line: Vec::new(),
            pos: 0,
            line_number: 0,
            eof: false,
            diagnostics: Vec::new(),
        }
    }

    /// The 1-based number of the line the lexer is currently on.
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    fn diagnose(&mut self, message: String) {
        self.diagnostics.push(Diagnostic { line: self.line_number, message });
    }

    /// Reads the next line, stripping the line terminator. Handles the
    /// `%` escape mechanism: such lines are discarded entirely.
    fn next_line(&mut self) -> io::Result<bool> {
        loop {
            self.line.clear();
            self.pos = 0;
            let n = self.reader.read_until(b'\n', &mut self.line)?;
            if n == 0 {
                self.eof = true;
                return Ok(false);
            }
            self.line_number += 1;
            if self.line.first() == Some(&0xef) && self.line_number == 1 {
                // Strip a UTF-8 BOM on the very first line.
                if self.line.starts_with(b"\xef\xbb\xbf") {
                    self.line.drain(..3);
                }
            }
            while matches!(self.line.last(), Some(b'\n') | Some(b'\r')) {
                self.line.pop();
            }
            if self.line.first() == Some(&b'%') {
                continue;
            }
            return Ok(true);
        }
    }

    fn peek(&self) -> Option<u8> {
        self.line.get(self.pos).copied()
    }

    /// Skips whitespace, pulling in fresh lines as needed. Returns false
    /// at end of input.
    fn skip_whitespace(&mut self) -> io::Result<bool> {
        loop {
            match self.peek() {
                Some(ch) if ch.is_ascii_whitespace() => self.pos += 1,
                Some(_) => return Ok(true),
                None => {
                    if !self.next_line()? {
                        return Ok(false);
                    }
                }
            }
        }
    }

    /// Produces the next token.
    pub fn next_token(&mut self) -> io::Result<Token> {
        loop {
            if !self.skip_whitespace()? {
                return Ok(Token::Eof);
            }
            let start = self.pos;
            let ch = self.line[self.pos];
            match ch {
                b'[' => {
                    self.pos += 1;
                    while self.peek().map_or(false, |c| c == b' ' || c == b'\t') {
                        self.pos += 1;
                    }
                    let name_start = self.pos;
                    while self.peek().map_or(false, is_tag_name_char) {
                        self.pos += 1;
                    }
                    if self.pos == name_start {
                        self.diagnose("missing tag name after '['".to_owned());
                        continue;
                    }
                    return Ok(Token::TagName(self.line[name_start..self.pos].to_vec()));
                }
                b']' => {
                    // Consumed silently after a tag string; anywhere else it
                    // is noise from a broken tag.
                    self.pos += 1;
                    continue;
                }
                b'"' => {
                    self.pos += 1;
                    return self.lex_string();
                }
                b'{' => {
                    self.pos += 1;
                    return self.lex_brace_comment();
                }
                b';' => {
                    let comment = self.line[self.pos + 1..].to_vec();
                    self.pos = self.line.len();
                    return Ok(Token::Comment(comment));
                }
                b'(' => {
                    self.pos += 1;
                    return Ok(Token::RavStart);
                }
                b')' => {
                    self.pos += 1;
                    return Ok(Token::RavEnd);
                }
                b'$' | b'!' | b'?' => {
                    self.pos += 1;
                    if ch == b'$' {
                        while self.peek().map_or(false, |c| c.is_ascii_digit()) {
                            self.pos += 1;
                        }
                    } else {
                        while self.peek().map_or(false, |c| c == b'!' || c == b'?') {
                            self.pos += 1;
                        }
                    }
                    match Nag::from_ascii(&self.line[start..self.pos]) {
                        Ok(nag) => return Ok(Token::Nag(nag)),
                        Err(_) => {
                            let text = String::from_utf8_lossy(&self.line[start..self.pos]).into_owned();
                            self.diagnose(format!("invalid annotation glyph {}", text));
                            continue;
                        }
                    }
                }
                b'*' => {
                    self.pos += 1;
                    return Ok(Token::Result(Outcome::Unknown));
                }
                b'0'..=b'9' => {
                    let rest = &self.line[self.pos..];
                    // Castling written with zeros must not lex as a result.
                    if rest.starts_with(b"0-0") {
                        return Ok(self.lex_move());
                    }
                    for result in [&b"1-0"[..], b"0-1", b"1/2-1/2", b"1/2"] {
                        if rest.starts_with(result)
                            && rest.get(result.len()).map_or(true, |&c| !is_move_char(c) && c != b'/')
                        {
                            self.pos += result.len();
                            return Ok(Token::Result(
                                Outcome::from_ascii(result).expect("known result"),
                            ));
                        }
                    }
                    while self.peek().map_or(false, |c| c.is_ascii_digit()) {
                        self.pos += 1;
                    }
                    let number = btoi::btou(&self.line[start..self.pos]).unwrap_or(0);
                    while self.peek() == Some(b'.') {
                        self.pos += 1;
                    }
                    return Ok(Token::MoveNumber(number));
                }
                b'.' => {
                    // Stray continuation dots.
                    self.pos += 1;
                    continue;
                }
                ch if ch.is_ascii_alphabetic() || ch == b'-' => {
                    return Ok(self.lex_move());
                }
                other => {
                    self.pos += 1;
                    self.diagnose(format!("unexpected character '{}'", char::from(other)));
                    continue;
                }
            }
        }
    }

    fn lex_move(&mut self) -> Token {
        let start = self.pos;
        while self.peek().map_or(false, is_move_char) {
            self.pos += 1;
        }
        Token::Move(self.line[start..self.pos].to_vec())
    }

    /// A quoted tag string with `\"` and `\\` escapes. Tag strings do not
    /// span lines; recovery depends on `fix_tag_strings`.
    fn lex_string(&mut self) -> io::Result<Token> {
        let mut value = Vec::new();
        loop {
            match self.peek() {
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(Token::TagString(value));
                }
                Some(b'\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(c @ b'"') | Some(c @ b'\\') => {
                            value.push(c);
                            self.pos += 1;
                        }
                        Some(c) => {
                            value.push(b'\\');
                            value.push(c);
                            self.pos += 1;
                        }
                        None => {
                            value.push(b'\\');
                        }
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.pos += 1;
                }
                None => {
                    if self.opts.fix_tag_strings {
                        self.diagnose("unterminated string closed at end of line".to_owned());
                        return Ok(Token::TagString(value));
                    }
                    self.diagnose("unterminated string".to_owned());
                    return Ok(Token::TagString(value));
                }
            }
        }
    }

    /// A `{ ... }` comment, possibly spanning lines. `{` nests only with
    /// `nested_comments`.
    fn lex_brace_comment(&mut self) -> io::Result<Token> {
        let mut text = Vec::new();
        let mut depth = 1u32;
        loop {
            let rest = &self.line[self.pos..];
            let delimiter = if self.opts.nested_comments {
                memchr::memchr2(b'{', b'}', rest)
            } else {
                memchr::memchr(b'}', rest)
            };
            match delimiter {
                Some(at) => {
                    text.extend_from_slice(&rest[..at]);
                    let ch = rest[at];
                    self.pos += at + 1;
                    if ch == b'{' {
                        depth += 1;
                        text.push(b'{');
                    } else {
                        depth -= 1;
                        if depth == 0 {
                            return Ok(Token::Comment(text));
                        }
                        text.push(b'}');
                    }
                }
                None => {
                    text.extend_from_slice(rest);
                    self.pos = self.line.len();
                    if !self.next_line()? {
                        self.diagnose("unterminated comment at end of input".to_owned());
                        return Ok(Token::Comment(text));
                    }
                    if !text.is_empty() {
                        text.push(b' ');
                    }
                }
            }
        }
    }

    /// Recovery: discards input until a line that starts a new game's tag
    /// section. Returns false at end of input.
    pub fn skip_to_next_game(&mut self) -> io::Result<bool> {
        loop {
            if !self.next_line()? {
                return Ok(false);
            }
            if self.line.first() == Some(&b'[') {
                return Ok(true);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn tokens(input: &str) -> Vec<Token> {
        tokens_with(input, LexerOpts::default())
    }

    fn tokens_with(input: &str, opts: LexerOpts) -> Vec<Token> {
        let mut lexer = Lexer::new(Cursor::new(input.as_bytes().to_vec()), opts);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token().expect("in-memory read");
            let eof = token == Token::Eof;
            out.push(token);
            if eof {
                return out;
            }
        }
    }

    #[test]
    fn test_tag_pair() {
        assert_eq!(
            tokens("[Event \"F/S Return Match\"]\n"),
            vec![
                Token::TagName(b"Event".to_vec()),
                Token::TagString(b"F/S Return Match".to_vec()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            tokens(r#"[Site "He said \"hi\" \\ bye"]"#),
            vec![
                Token::TagName(b"Site".to_vec()),
                Token::TagString(br#"He said "hi" \ bye"#.to_vec()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_movetext() {
        assert_eq!(
            tokens("1. e4 e5 2. Nf3! Nc6 $14 1-0\n"),
            vec![
                Token::MoveNumber(1),
                Token::Move(b"e4".to_vec()),
                Token::Move(b"e5".to_vec()),
                Token::MoveNumber(2),
                Token::Move(b"Nf3".to_vec()),
                Token::Nag(Nag::GOOD_MOVE),
                Token::Move(b"Nc6".to_vec()),
                Token::Nag(Nag(14)),
                Token::Result(Outcome::Decisive { winner: crate::types::White }),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_zero_castling_is_a_move() {
        assert_eq!(
            tokens("0-0-0 0-1"),
            vec![
                Token::Move(b"0-0-0".to_vec()),
                Token::Result(Outcome::Decisive { winner: crate::types::Black }),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_and_variations() {
        assert_eq!(
            tokens("e4 {King's\npawn} (d4) ; tail\ne5"),
            vec![
                Token::Move(b"e4".to_vec()),
                Token::Comment(b"King's pawn".to_vec()),
                Token::RavStart,
                Token::Move(b"d4".to_vec()),
                Token::RavEnd,
                Token::Comment(b" tail".to_vec()),
                Token::Move(b"e5".to_vec()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_nested_comments() {
        let opts = LexerOpts { nested_comments: true, ..LexerOpts::default() };
        assert_eq!(
            tokens_with("{a {b} c}", opts),
            vec![Token::Comment(b"a {b} c".to_vec()), Token::Eof]
        );
        // Without the option the first '}' terminates.
        assert_eq!(
            tokens("{a {b} c}"),
            vec![
                Token::Comment(b"a {b".to_vec()),
                Token::Move(b"c".to_vec()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_escape_percent_lines() {
        assert_eq!(
            tokens("% anything at all\ne4"),
            vec![Token::Move(b"e4".to_vec()), Token::Eof]
        );
    }

    #[test]
    fn test_draw_results() {
        assert_eq!(
            tokens("1/2-1/2"),
            vec![Token::Result(Outcome::Draw), Token::Eof]
        );
        assert_eq!(tokens("1/2"), vec![Token::Result(Outcome::Draw), Token::Eof]);
        assert_eq!(tokens("*"), vec![Token::Result(Outcome::Unknown), Token::Eof]);
    }

    #[test]
    fn test_line_numbers() {
        let mut lexer = Lexer::new(
            Cursor::new(b"e4\n\ne5\n".to_vec()),
            LexerOpts::default(),
        );
        assert_eq!(lexer.next_token().unwrap(), Token::Move(b"e4".to_vec()));
        assert_eq!(lexer.line_number(), 1);
        assert_eq!(lexer.next_token().unwrap(), Token::Move(b"e5".to_vec()));
        assert_eq!(lexer.line_number(), 3);
    }

    #[test]
    fn test_skip_to_next_game() {
        let mut lexer = Lexer::new(
            Cursor::new(b"garbage ((( more\n[Event \"ok\"]\n".to_vec()),
            LexerOpts::default(),
        );
        assert!(lexer.skip_to_next_game().unwrap());
        assert_eq!(lexer.next_token().unwrap(), Token::TagName(b"Event".to_vec()));
    }
}
