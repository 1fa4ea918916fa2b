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

//! Re-emitting selected games.
//!
//! The default output is export-format PGN: the Seven Tag Roster first,
//! remaining tags in configured order, then movetext wrapped at the
//! configured width. `-W` selects alternative move notations, `--json`
//! and `--tsv` select wire formats for programmatic consumption.

use std::io::{self, Write};

use crate::apply;
use crate::board::Board;
use crate::config::{Config, OutputFormat, TagOutputForm};
use crate::fen::{self, FenOpts};
use crate::game::Game;
use crate::moves::{DecodedMove, MoveClass, MoveRecord, Variation};
use crate::san::San;
use crate::tags::{self, TagId, TagRegistry};
use crate::types::{CheckStatus, Color, Role};

/// Formats games according to the run configuration.
pub struct Formatter<'a> {
    pub config: &'a Config,
    pub registry: &'a TagRegistry,
    /// Output order for tags beyond the Seven Tag Roster.
    pub tag_order: &'a [TagId],
}

impl<'a> Formatter<'a> {
    pub fn new(config: &'a Config, registry: &'a TagRegistry, tag_order: &'a [TagId]) -> Formatter<'a> {
        Formatter { config, registry, tag_order }
    }

    /// Writes one game to the sink in the configured format.
    pub fn write_game(&self, game: &Game, out: &mut dyn Write) -> io::Result<()> {
        if self.config.json_format {
            return self.write_json_game(game, out);
        }
        if self.config.tsv_format {
            return self.write_tsv_game(game, out);
        }
        if self.config.output_format == OutputFormat::Epd {
            return self.write_epd_game(game, out);
        }

        if let Some(marker) = &self.config.line_number_marker {
            writeln!(out, "{{{} {} {}}}", marker, game.start_line, game.end_line)?;
        }
        self.write_tags(game, out)?;
        out.write_all(b"\n")?;
        self.write_movetext(game, out)?;
        out.write_all(b"\n")
    }

    fn write_tags(&self, game: &Game, out: &mut dyn Write) -> io::Result<()> {
        if self.config.tag_output_form == TagOutputForm::None {
            return Ok(());
        }

        let mut written = vec![false; self.registry.len()];
        for &id in &tags::STR_TAGS {
            self.write_tag_line(game, id, out)?;
            written[id] = true;
        }
        if self.config.tag_output_form == TagOutputForm::SevenTagRoster {
            return Ok(());
        }

        for &id in self.tag_order {
            if !written.get(id).copied().unwrap_or(false) {
                self.write_tag_line(game, id, out)?;
                if id < written.len() {
                    written[id] = true;
                }
            }
        }
        if self.config.only_output_wanted_tags && !self.tag_order.is_empty() {
            return Ok(());
        }

        for (id, _) in game.tag_pairs() {
            if !written.get(id).copied().unwrap_or(false) {
                self.write_tag_line(game, id, out)?;
            }
        }
        Ok(())
    }

    fn write_tag_line(&self, game: &Game, id: TagId, out: &mut dyn Write) -> io::Result<()> {
        let value = match game.tag(id) {
            Some(value) => value,
            // The Seven Tag Roster is always emitted, with placeholders.
            None if tags::STR_TAGS.contains(&id) => {
                if id == tags::RESULT {
                    &b"*"[..]
                } else {
                    &b"?"[..]
                }
            }
            None => return Ok(()),
        };
        out.write_all(b"[")?;
        out.write_all(self.registry.name(id))?;
        out.write_all(b" \"")?;
        // Escape quotes and backslashes on the way out.
        for &ch in value {
            if ch == b'"' || ch == b'\\' {
                out.write_all(b"\\")?;
            }
            out.write_all(&[ch])?;
        }
        out.write_all(b"\"]\n")
    }

    fn write_movetext(&self, game: &Game, out: &mut dyn Write) -> io::Result<()> {
        let mut wrapper = Wrapper::new(out, self.config.max_line_length);

        for comment in &game.prefix {
            self.emit_comment(comment, &mut wrapper)?;
        }

        let board = game.starting_board().unwrap_or_default();
        for variation in &game.prefix_variations {
            if self.config.keep_variations {
                self.emit_variation(variation, &board, &mut wrapper)?;
            }
        }

        self.emit_moves(&game.moves, &board, true, &mut wrapper)?;

        if self.config.output_fen_string {
            let mut final_board = board.clone();
            for record in &game.moves {
                if let Some(decoded) = record.decoded {
                    apply::play_unchecked(&mut final_board, &decoded);
                }
            }
            let fen_opts = FenOpts { no_faux_ep: self.config.no_faux_ep, ..FenOpts::default() };
            self.emit_comment(fen::fen(&final_board, &fen_opts).as_bytes(), &mut wrapper)?;
        }

        if self.config.keep_results {
            let result = match game.result {
                Some(result) => result.as_str().as_bytes().to_vec(),
                None => game.tag(tags::RESULT).map_or(b"*".to_vec(), <[u8]>::to_vec),
            };
            wrapper.token(&result)?;
        }
        wrapper.finish()
    }

    /// Emits a move sequence from the given starting position. Ply limits
    /// apply only to the main line.
    fn emit_moves(
        &self,
        moves: &[MoveRecord],
        start: &Board,
        main_line: bool,
        wrapper: &mut Wrapper<'_>,
    ) -> io::Result<()> {
        let mut board = start.clone();
        let mut interrupted = true;

        for (ply, record) in moves.iter().enumerate() {
            if main_line {
                if let Some(limit) = self.config.output_ply_limit {
                    if ply as u32 >= limit {
                        break;
                    }
                }
            }

            if self.config.keep_move_numbers {
                if board.turn == Color::White {
                    wrapper.token(format!("{}.", board.fullmoves).as_bytes())?;
                } else if interrupted {
                    wrapper.token(format!("{}...", board.fullmoves).as_bytes())?;
                }
            }
            interrupted = false;

            wrapper.token(&self.move_token(record))?;

            let after = match record.decoded {
                Some(decoded) => {
                    let mut after = board.clone();
                    apply::play_unchecked(&mut after, &decoded);
                    after
                }
                None => board.clone(),
            };

            if self.config.keep_nags {
                for nag in &record.nags {
                    wrapper.token(nag.to_string().as_bytes())?;
                    interrupted = true;
                }
            }
            if self.config.add_fen_comments && record.decoded.is_some() {
                let fen_opts = FenOpts { no_faux_ep: self.config.no_faux_ep, ..FenOpts::default() };
                self.emit_comment(fen::fen(&after, &fen_opts).as_bytes(), wrapper)?;
                interrupted = true;
            }
            if self.config.add_hashcode_comments && record.decoded.is_some() {
                self.emit_comment(format!("{:016x}", record.hash_after).as_bytes(), wrapper)?;
                interrupted = true;
            }
            if self.config.output_evaluation && record.decoded.is_some() {
                self.emit_comment(format!("{:+.2}", evaluate(&after)).as_bytes(), wrapper)?;
                interrupted = true;
            }
            if self.config.keep_comments {
                for comment in &record.comments {
                    self.emit_comment(comment, wrapper)?;
                    interrupted = true;
                }
            }
            if self.config.keep_variations {
                for variation in &record.variations {
                    self.emit_variation(variation, &board, wrapper)?;
                    interrupted = true;
                }
            }

            board = after;
        }
        Ok(())
    }

    fn emit_variation(
        &self,
        variation: &Variation,
        start: &Board,
        wrapper: &mut Wrapper<'_>,
    ) -> io::Result<()> {
        wrapper.open_variation()?;
        if self.config.keep_comments {
            for comment in &variation.prefix {
                self.emit_comment(comment, wrapper)?;
            }
        }
        self.emit_moves(&variation.moves, start, false, wrapper)?;
        if self.config.keep_results {
            if let Some(result) = variation.result {
                wrapper.token(result.as_str().as_bytes())?;
            }
        }
        if self.config.keep_comments {
            for comment in &variation.suffix {
                self.emit_comment(comment, wrapper)?;
            }
        }
        wrapper.close_variation()
    }

    fn emit_comment(&self, text: &[u8], wrapper: &mut Wrapper<'_>) -> io::Result<()> {
        let mut comment = Vec::with_capacity(text.len() + 2);
        comment.push(b'{');
        comment.extend_from_slice(text);
        comment.push(b'}');
        wrapper.comment(&comment)
    }

    /// The piece letter used in output, honouring `-Wsan[letters]`.
    fn piece_letter(&self, role: Role) -> u8 {
        match &self.config.output_piece_letters {
            Some(letters) => letters.as_bytes()[role as usize],
            None => role.upper_char() as u8,
        }
    }

    fn check_suffix(&self, record: &MoveRecord) -> &'static str {
        if !self.config.keep_checks {
            return "";
        }
        match record.check {
            CheckStatus::Checkmate => "#",
            CheckStatus::Check => "+",
            CheckStatus::None => "",
        }
    }

    /// One movetext token for the configured notation.
    fn move_token(&self, record: &MoveRecord) -> Vec<u8> {
        let decoded = match record.decoded {
            Some(decoded) => decoded,
            // Undecoded moves can only be echoed back.
            None => return record.text.clone(),
        };

        match self.config.output_format {
            OutputFormat::San | OutputFormat::Epd | OutputFormat::Cm => self.san_token(record),
            OutputFormat::Lalg => self.lalg_token(&decoded, false),
            OutputFormat::Uci => self.uci_token(&decoded),
            OutputFormat::Halg => self.halg_token(record, &decoded),
            OutputFormat::Elalg | OutputFormat::Xlalg | OutputFormat::Xolalg => {
                self.xlalg_token(record, &decoded)
            }
        }
    }

    fn san_token(&self, record: &MoveRecord) -> Vec<u8> {
        let mut token = Vec::new();
        match &record.san {
            San::Normal { role, file, rank, capture, to, promotion } => {
                if *role != Role::Pawn {
                    token.push(self.piece_letter(*role));
                }
                if let Some(file) = file {
                    token.push(b'a' + file);
                }
                if let Some(rank) = rank {
                    token.push(b'1' + rank);
                }
                if *capture {
                    token.push(b'x');
                }
                token.extend_from_slice(to.to_string().as_bytes());
                if let Some(promotion) = promotion {
                    token.push(b'=');
                    token.push(self.piece_letter(*promotion));
                }
            }
            San::Castle(side) => {
                token.extend_from_slice(if side.is_king_side() {
                    b"O-O".as_ref()
                } else {
                    b"O-O-O".as_ref()
                });
            }
            San::Null => token.extend_from_slice(b"--"),
        }
        token.extend_from_slice(self.check_suffix(record).as_bytes());
        token
    }

    /// Bare long algebraic: source and target squares.
    fn lalg_token(&self, decoded: &DecodedMove, upper_promotion: bool) -> Vec<u8> {
        let mut token = Vec::new();
        let (from, to) = (decoded.from, decoded.to);
        token.extend_from_slice(from.to_string().as_bytes());
        token.extend_from_slice(to.to_string().as_bytes());
        if let Some(promotion) = decoded.promotion {
            token.push(if upper_promotion {
                promotion.upper_char() as u8
            } else {
                promotion.char() as u8
            });
        }
        token
    }

    fn uci_token(&self, decoded: &DecodedMove) -> Vec<u8> {
        if decoded.class == MoveClass::Null {
            return b"0000".to_vec();
        }
        self.lalg_token(decoded, false)
    }

    /// Hyphenated long algebraic: `e2-e4`, `e4xd5`.
    fn halg_token(&self, record: &MoveRecord, decoded: &DecodedMove) -> Vec<u8> {
        let mut token = Vec::new();
        let (from, to) = (decoded.from, decoded.to);
        token.extend_from_slice(from.to_string().as_bytes());
        token.push(if decoded.is_capture() { b'x' } else { b'-' });
        token.extend_from_slice(to.to_string().as_bytes());
        if let Some(promotion) = decoded.promotion {
            token.push(self.piece_letter(promotion));
        }
        token.extend_from_slice(self.check_suffix(record).as_bytes());
        token
    }

    /// Enhanced long algebraic: piece letters, separators, promotions and
    /// checks; `xolalg` keeps `O-O` for castling.
    fn xlalg_token(&self, record: &MoveRecord, decoded: &DecodedMove) -> Vec<u8> {
        if self.config.output_format == OutputFormat::Xolalg && decoded.class != MoveClass::Null {
            if let San::Castle(side) = &record.san {
                let mut token: Vec<u8> =
                    if side.is_king_side() { b"O-O".to_vec() } else { b"O-O-O".to_vec() };
                token.extend_from_slice(self.check_suffix(record).as_bytes());
                return token;
            }
        }

        let mut token = Vec::new();
        if decoded.piece.role != Role::Pawn {
            token.push(self.piece_letter(decoded.piece.role));
        }
        let (from, to) = (decoded.from, decoded.to);
        token.extend_from_slice(from.to_string().as_bytes());
        token.push(if decoded.is_capture() { b'x' } else { b'-' });
        token.extend_from_slice(to.to_string().as_bytes());
        if let Some(promotion) = decoded.promotion {
            token.push(b'=');
            token.push(self.piece_letter(promotion));
        }
        token.extend_from_slice(self.check_suffix(record).as_bytes());
        token
    }

    /// EPD output: one record per position of the main line.
    fn write_epd_game(&self, game: &Game, out: &mut dyn Write) -> io::Result<()> {
        let fen_opts = FenOpts { no_faux_ep: self.config.no_faux_ep, ..FenOpts::default() };
        let mut board = game.starting_board().unwrap_or_default();
        writeln!(out, "{}", fen::epd(&board, &fen_opts))?;
        for record in &game.moves {
            if let Some(decoded) = record.decoded {
                apply::play_unchecked(&mut board, &decoded);
                writeln!(out, "{}", fen::epd(&board, &fen_opts))?;
            }
        }
        out.write_all(b"\n")
    }

    fn write_json_game(&self, game: &Game, out: &mut dyn Write) -> io::Result<()> {
        let mut object = serde_json::Map::new();
        let mut tag_map = serde_json::Map::new();
        for (id, value) in game.tag_pairs() {
            tag_map.insert(
                String::from_utf8_lossy(self.registry.name(id)).into_owned(),
                serde_json::Value::String(String::from_utf8_lossy(value).into_owned()),
            );
        }
        object.insert("tags".to_owned(), serde_json::Value::Object(tag_map));

        let board = game.starting_board().unwrap_or_default();
        let moves: Vec<serde_json::Value> = game
            .moves
            .iter()
            .scan(board, |board, record| {
                let token = self.move_token(record);
                if let Some(decoded) = record.decoded {
                    apply::play_unchecked(board, &decoded);
                }
                Some(serde_json::Value::String(
                    String::from_utf8_lossy(&token).into_owned(),
                ))
            })
            .collect();
        object.insert("moves".to_owned(), serde_json::Value::Array(moves));

        serde_json::to_writer(&mut *out, &serde_json::Value::Object(object))
            .map_err(io::Error::other)?;
        Ok(())
    }

    fn write_tsv_game(&self, game: &Game, out: &mut dyn Write) -> io::Result<()> {
        for (i, &id) in tags::STR_TAGS.iter().enumerate() {
            if i > 0 {
                out.write_all(b"\t")?;
            }
            out.write_all(game.tag(id).unwrap_or(b"?"))?;
        }
        out.write_all(b"\t")?;
        let board = game.starting_board().unwrap_or_default();
        let mut board = board;
        for (i, record) in game.moves.iter().enumerate() {
            if i > 0 {
                out.write_all(b" ")?;
            }
            out.write_all(&self.move_token(record))?;
            if let Some(decoded) = record.decoded {
                apply::play_unchecked(&mut board, &decoded);
            }
        }
        out.write_all(b"\n")
    }
}

/// Rough material evaluation in pawns, positive for White.
fn evaluate(board: &Board) -> f64 {
    let counts = board.material();
    let score = |color: Color| -> i32 {
        i32::from(counts.by_piece(color, Role::Pawn))
            + 3 * i32::from(counts.by_piece(color, Role::Knight))
            + 3 * i32::from(counts.by_piece(color, Role::Bishop))
            + 5 * i32::from(counts.by_piece(color, Role::Rook))
            + 9 * i32::from(counts.by_piece(color, Role::Queen))
    };
    f64::from(score(Color::White) - score(Color::Black))
}


/// Writes space-separated tokens, wrapping at a maximum width. A width of
/// zero disables wrapping entirely.
struct Wrapper<'a> {
    out: &'a mut dyn Write,
    max: usize,
    column: usize,
    /// The next token glues to the previous one, as after `(`.
    glue: bool,
}

impl<'a> Wrapper<'a> {
    fn new(out: &'a mut dyn Write, max: usize) -> Wrapper<'a> {
        Wrapper { out, max, column: 0, glue: false }
    }

    fn token(&mut self, token: &[u8]) -> io::Result<()> {
        let glue = std::mem::take(&mut self.glue);
        if self.column > 0 {
            if self.max > 0 && self.column + usize::from(!glue) + token.len() > self.max {
                self.out.write_all(b"\n")?;
                self.column = 0;
            } else if !glue {
                self.out.write_all(b" ")?;
                self.column += 1;
            }
        }
        self.out.write_all(token)?;
        self.column += token.len();
        Ok(())
    }

    fn open_variation(&mut self) -> io::Result<()> {
        self.token(b"(")?;
        self.glue = true;
        Ok(())
    }

    fn close_variation(&mut self) -> io::Result<()> {
        self.glue = true;
        self.token(b")")
    }

    /// Comments may exceed the width; they are split at spaces.
    fn comment(&mut self, comment: &[u8]) -> io::Result<()> {
        if self.max == 0 || comment.len() + 1 <= self.max {
            return self.token(comment);
        }
        for word in comment.split(|&c| c == b' ').filter(|w| !w.is_empty()) {
            self.token(word)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        if self.column > 0 {
            self.out.write_all(b"\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::NoObserver;
    use crate::parser::{Parser, ParserOpts};
    use std::io::Cursor;

    fn replayed(pgn: &str) -> (Game, TagRegistry) {
        let mut registry = TagRegistry::new();
        let mut parser = Parser::new(Cursor::new(pgn.as_bytes().to_vec()), ParserOpts::default());
        let mut game = parser.next_game(&mut registry).expect("read").expect("one game");
        apply::apply_move_list(&mut game, false, &mut NoObserver).expect("replayable");
        (game, registry)
    }

    fn format(game: &Game, registry: &TagRegistry, config: &Config) -> String {
        let formatter = Formatter::new(config, registry, &[]);
        let mut out = Vec::new();
        formatter.write_game(game, &mut out).expect("write to vec");
        String::from_utf8(out).expect("utf8 output")
    }

    #[test]
    fn test_san_roundtrip_shape() {
        let (game, registry) = replayed(
            "[Event \"Test\"]\n[Result \"1-0\"]\n\n1. e4 e5 2. Nf3 {solid} Nc6 (2... d6) 1-0\n",
        );
        let config = Config::default();
        let text = format(&game, &registry, &config);
        assert!(text.starts_with("[Event \"Test\"]\n"), "{}", text);
        assert!(text.contains("[Result \"1-0\"]\n"));
        assert!(text.contains("1. e4 e5 2. Nf3 {solid} Nc6 (2... d6) 1-0"), "{}", text);
    }

    #[test]
    fn test_placeholder_roster() {
        let (game, registry) = replayed("1. e4 *\n");
        let text = format(&game, &registry, &Config::default());
        assert!(text.contains("[Event \"?\"]"));
        assert!(text.contains("[Result \"*\"]"));
    }

    #[test]
    fn test_check_glyphs_regenerated() {
        // The source has no glyph on the mating move; output adds it.
        let (game, registry) = replayed("1. f3 e5 2. g4 Qh4 0-1\n");
        let text = format(&game, &registry, &Config::default());
        assert!(text.contains("Qh4#"), "{}", text);

        let config = Config { keep_checks: false, ..Config::default() };
        let text = format(&game, &registry, &config);
        assert!(text.contains("Qh4 0-1"), "{}", text);
    }

    #[test]
    fn test_uci_and_halg_output() {
        let (game, registry) = replayed("1. e4 d5 2. exd5 Qxd5 *\n");
        let config = Config { output_format: OutputFormat::Uci, ..Config::default() };
        let text = format(&game, &registry, &config);
        assert!(text.contains("1. e2e4 d7d5 2. e4d5 d8d5"), "{}", text);

        let config = Config { output_format: OutputFormat::Halg, ..Config::default() };
        let text = format(&game, &registry, &config);
        assert!(text.contains("1. e2-e4 d7-d5 2. e4xd5 d8xd5"), "{}", text);
    }

    #[test]
    fn test_line_wrapping() {
        let (game, registry) = replayed(
            "1. e4 e5 2. Nf3 Nc6 3. Bb5 a6 4. Ba4 Nf6 5. O-O Be7 6. Re1 b5 7. Bb3 d6 *\n",
        );
        let config = Config { max_line_length: 20, ..Config::default() };
        let text = format(&game, &registry, &config);
        for line in text.lines() {
            assert!(line.len() <= 20, "line too long: {:?}", line);
        }
    }

    #[test]
    fn test_strip_annotations() {
        let (game, registry) = replayed("1. e4 {comment} e5 $1 (1... c5) *\n");
        let config = Config {
            keep_comments: false,
            keep_nags: false,
            keep_variations: false,
            ..Config::default()
        };
        let text = format(&game, &registry, &config);
        assert!(!text.contains('{'));
        assert!(!text.contains('$'));
        assert!(!text.contains('('));
    }

    #[test]
    fn test_epd_output() {
        let (game, registry) = replayed("1. e4 *\n");
        let config = Config { output_format: OutputFormat::Epd, ..Config::default() };
        let text = format(&game, &registry, &config);
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -")
        );
        assert_eq!(
            lines.next(),
            Some("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3")
        );
    }

    #[test]
    fn test_json_output() {
        let (game, registry) = replayed("[Event \"Test\"]\n\n1. e4 e5 1-0\n");
        let mut config = Config { json_format: true, ..Config::default() };
        config.reconcile_wire_formats().expect("compatible");
        let text = format(&game, &registry, &config);
        let value: serde_json::Value = serde_json::from_str(&text).expect("valid json");
        assert_eq!(value["tags"]["Event"], "Test");
        assert_eq!(value["moves"][0], "e4");
    }

    #[test]
    fn test_fen_tag_start_numbers() {
        let (game, registry) = replayed(
            "[FEN \"4k3/8/8/8/8/8/8/4K3 b - - 0 40\"]\n\n40... Ke7 41. Kd2 *\n",
        );
        let text = format(&game, &registry, &Config::default());
        assert!(text.contains("40... Ke7 41. Kd2"), "{}", text);
    }
}
