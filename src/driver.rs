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

//! The pull pipeline: parse one game, evaluate it, route it, free it.
//!
//! The driver owns the parser, the match engine, the duplicate index, the
//! output sinks and the counters. Per-game state never outlives one trip
//! through [`Driver::process_file`]'s loop.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::apply::{self, NoObserver};
use crate::config::{Config, EcoSplitLevel, OutputFormat};
use crate::dedup::{DuplicateIndex, SourceId, CHECK_FILE_SOURCE};
use crate::eco::EcoTable;
use crate::game::Game;
use crate::lexer::Diagnostic;
use crate::matcher::MatchEngine;
use crate::moves::Comment;
use crate::output::Formatter;
use crate::parser::Parser;
use crate::tags::{self, TagId, TagRegistry};

const PROGRESS_RATE: u64 = 1000;

/// The diagnostic log: stderr by default, a file with `-l`/`-L`.
pub struct Log {
    out: Box<dyn Write>,
    pub quiet: bool,
}

impl std::fmt::Debug for Log {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Log").field("quiet", &self.quiet).finish()
    }
}

impl Log {
    pub fn stderr(quiet: bool) -> Log {
        Log { out: Box::new(io::stderr()), quiet }
    }

    pub fn file(path: &Path, append: bool, quiet: bool) -> io::Result<Log> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)?;
        Ok(Log { out: Box::new(BufWriter::new(file)), quiet })
    }

    /// Always-written diagnostics with source context.
    pub fn diagnostic(&mut self, source: &str, diagnostic: &Diagnostic) {
        let _ = writeln!(
            self.out,
            "{}:{}: {}",
            source, diagnostic.line, diagnostic.message
        );
    }

    /// Progress and summary notes, silenced by `--quiet`.
    pub fn note(&mut self, message: &str) {
        if !self.quiet {
            let _ = writeln!(self.out, "{}", message);
        }
    }
}

/// One output stream, with JSON array framing when needed.
struct Sink {
    out: Box<dyn Write>,
    json: bool,
    games: u64,
}

impl Sink {
    fn new(out: Box<dyn Write>, json: bool) -> Sink {
        Sink { out, json, games: 0 }
    }

    fn create(path: &Path, append: bool, json: bool) -> io::Result<Sink> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)?;
        Ok(Sink::new(Box::new(BufWriter::new(file)), json))
    }

    fn write_game(&mut self, formatter: &Formatter<'_>, game: &Game) -> io::Result<()> {
        if self.json {
            self.out.write_all(if self.games == 0 { b"[\n" } else { b",\n" })?;
        }
        formatter.write_game(game, &mut *self.out)?;
        self.games += 1;
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        if self.json && self.games > 0 {
            self.out.write_all(b"\n]\n")?;
        }
        self.out.flush()
    }
}

/// The main output: a single stream, a rotating sequence of numbered
/// files, or one file per ECO prefix.
enum MainSink {
    Single(Sink),
    Rotating {
        per_file: u64,
        next_number: u64,
        suffix: &'static str,
        json: bool,
        current: Option<Sink>,
    },
    EcoSplit {
        prefix_len: usize,
        suffix: &'static str,
        json: bool,
        sinks: Vec<(String, Sink)>,
    },
}

impl MainSink {
    fn write_game(&mut self, formatter: &Formatter<'_>, game: &Game) -> io::Result<()> {
        match self {
            MainSink::Single(sink) => sink.write_game(formatter, game),
            MainSink::Rotating { per_file, next_number, suffix, json, current } => {
                let rotate = match current {
                    Some(sink) => sink.games >= *per_file,
                    None => true,
                };
                if rotate {
                    if let Some(mut old) = current.take() {
                        old.finish()?;
                    }
                    let path = PathBuf::from(format!("{}{}", next_number, suffix));
                    *next_number += 1;
                    *current = Some(Sink::create(&path, false, *json)?);
                }
                current.as_mut().expect("sink created").write_game(formatter, game)
            }
            MainSink::EcoSplit { prefix_len, suffix, json, sinks } => {
                let eco = game.tag(tags::ECO).unwrap_or(b"");
                let prefix: String = String::from_utf8_lossy(eco)
                    .chars()
                    .take(*prefix_len)
                    .collect();
                let name = if prefix.is_empty() { "noeco".to_owned() } else { prefix };
                if let Some(i) = sinks.iter().position(|(n, _)| *n == name) {
                    return sinks[i].1.write_game(formatter, game);
                }
                let path = PathBuf::from(format!("{}{}", name, suffix));
                let mut sink = Sink::create(&path, false, *json)?;
                sink.write_game(formatter, game)?;
                sinks.push((name, sink));
                Ok(())
            }
        }
    }

    fn finish(&mut self) -> io::Result<()> {
        match self {
            MainSink::Single(sink) => sink.finish(),
            MainSink::Rotating { current, .. } => match current {
                Some(sink) => sink.finish(),
                None => Ok(()),
            },
            MainSink::EcoSplit { sinks, .. } => {
                for (_, sink) in sinks {
                    sink.finish()?;
                }
                Ok(())
            }
        }
    }
}

/// End-of-run totals.
#[derive(Copy, Clone, Debug, Default)]
pub struct Summary {
    pub processed: u64,
    pub matched: u64,
    pub non_matching: u64,
    pub duplicates: u64,
}

#[derive(Debug)]
pub struct Driver {
    pub config: Config,
    pub registry: TagRegistry,
    pub engine: MatchEngine,
    pub eco: EcoTable,
    pub tag_order: Vec<TagId>,
    log: Log,
    dedup: DuplicateIndex,
    main: MainSink,
    duplicates: Option<Sink>,
    non_matching: Option<Sink>,
    sources: Vec<String>,
    summary: Summary,
    /// Ordinal among matched games, for `--selectonly`.
    matched_ordinal: u64,
    done: bool,
}

impl std::fmt::Debug for MainSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainSink").finish()
    }
}

impl std::fmt::Debug for Sink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sink").field("games", &self.games).finish()
    }
}

fn output_suffix(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Epd => ".epd",
        OutputFormat::Cm => ".cm",
        _ => ".pgn",
    }
}

impl Driver {
    /// Builds the run state: opens sinks and the log, prepares the
    /// duplicate index.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if any output file cannot be opened.
    pub fn new(config: Config, registry: TagRegistry, engine: MatchEngine) -> io::Result<Driver> {
        let log = match &config.log_file {
            Some(path) => Log::file(path, config.append_log, config.quiet)?,
            None => Log::stderr(config.quiet),
        };

        let suffix = output_suffix(config.output_format);
        let main = if config.eco_split_level != EcoSplitLevel::DontDivide {
            let prefix_len = match config.eco_split_level {
                EcoSplitLevel::DontDivide => 0,
                EcoSplitLevel::Letter => 1,
                EcoSplitLevel::LetterDigit => 2,
                EcoSplitLevel::LetterDigitDigit => 3,
            };
            MainSink::EcoSplit {
                prefix_len,
                suffix,
                json: config.json_format,
                sinks: Vec::new(),
            }
        } else if config.games_per_file > 0 {
            MainSink::Rotating {
                per_file: config.games_per_file,
                next_number: config.next_file_number,
                suffix,
                json: config.json_format,
                current: None,
            }
        } else {
            match &config.output_file {
                Some(path) => MainSink::Single(Sink::create(path, config.append_output, config.json_format)?),
                None => MainSink::Single(Sink::new(
                    Box::new(BufWriter::new(io::stdout())),
                    config.json_format,
                )),
            }
        };

        let duplicates = match &config.duplicate_file {
            Some(path) => Some(Sink::create(path, false, config.json_format)?),
            None => None,
        };
        let non_matching = match &config.non_matching_file {
            Some(path) => Some(Sink::create(path, false, config.json_format)?),
            None => None,
        };

        let fuzzy = if config.fuzzy_match_duplicates {
            Some(config.fuzzy_match_depth)
        } else {
            None
        };
        let dedup = if config.use_virtual_hash_table {
            DuplicateIndex::with_virtual_table(fuzzy)?
        } else {
            DuplicateIndex::new(fuzzy)
        };

        Ok(Driver {
            config,
            registry,
            engine,
            eco: EcoTable::new(),
            tag_order: Vec::new(),
            log,
            dedup,
            main,
            duplicates,
            non_matching,
            sources: Vec::new(),
            summary: Summary::default(),
            matched_ordinal: 0,
            done: false,
        })
    }

    pub fn log(&mut self) -> &mut Log {
        &mut self.log
    }

    /// True once limits make further games irrelevant.
    pub fn finished(&self) -> bool {
        self.done
    }

    /// Reads an ECO classification file with the ordinary parser and
    /// fills the classification table.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file cannot be read.
    pub fn load_eco_file(&mut self, path: &Path) -> io::Result<()> {
        let reader = BufReader::new(File::open(path)?);
        let mut parser = Parser::new(reader, self.config.parser);
        let source = path.display().to_string();
        while let Some(mut game) = parser.next_game(&mut self.registry)? {
            match apply::apply_move_list(&mut game, true, &mut NoObserver) {
                Ok(_) => self.eco.add_line(&game),
                Err(err) => {
                    let message = format!("unusable ECO line: {}", err);
                    self.log.diagnostic(&source, &Diagnostic { line: game.start_line, message });
                }
            }
        }
        for diagnostic in &parser.diagnostics {
            self.log.diagnostic(&source, diagnostic);
        }
        Ok(())
    }

    /// Preloads a `-c` comparison file: its games enter the duplicate
    /// index so that matching games from real inputs are dropped, but the
    /// preloaded games themselves are never output.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file cannot be read.
    pub fn preload_check_file(&mut self, path: &Path) -> io::Result<()> {
        let reader = BufReader::new(File::open(path)?);
        let mut parser = Parser::new(reader, self.config.parser);
        let source = path.display().to_string();
        while let Some(mut game) = parser.next_game(&mut self.registry)? {
            if apply::apply_move_list(&mut game, true, &mut NoObserver).is_ok() {
                self.dedup.check_and_insert(&game, CHECK_FILE_SOURCE)?;
            }
        }
        for diagnostic in &parser.diagnostics {
            self.log.diagnostic(&source, diagnostic);
        }
        Ok(())
    }

    /// Runs the pipeline over one input file.
    ///
    /// # Errors
    ///
    /// Returns I/O errors from reading the input or writing a sink; all
    /// per-game problems are logged instead.
    pub fn process_file(&mut self, path: &Path) -> io::Result<()> {
        let reader = BufReader::new(File::open(path)?);
        self.process_reader(reader, &path.display().to_string())
    }

    /// The same pipeline over any byte stream, mainly for tests.
    pub fn process_reader<R: BufRead>(&mut self, reader: R, source: &str) -> io::Result<()> {
        let source_id = self.sources.len() as SourceId;
        self.sources.push(source.to_owned());

        let mut parser = Parser::new(reader, self.config.parser);
        while !self.done {
            let game = parser.next_game(&mut self.registry)?;
            for diagnostic in parser.diagnostics.drain(..) {
                self.log.diagnostic(source, &diagnostic);
            }
            match game {
                Some(mut game) => self.handle_game(&mut game, source_id, source)?,
                None => break,
            }
        }
        Ok(())
    }

    fn handle_game(&mut self, game: &mut Game, source_id: SourceId, source: &str) -> io::Result<()> {
        self.summary.processed += 1;
        let number = self.summary.processed;

        if number % PROGRESS_RATE == 0 {
            let message = format!("{} games processed so far.", number);
            self.log.note(&message);
        }
        if number >= self.config.game_limit {
            self.done = true;
        }
        if number < self.config.first_game_number {
            return Ok(());
        }

        if game.rejected {
            self.log.diagnostic(source, &Diagnostic {
                line: game.start_line,
                message: "game rejected".to_owned(),
            });
            return Ok(());
        }
        if game.broken && !self.config.keep_broken_games {
            self.log.diagnostic(source, &Diagnostic {
                line: game.start_line,
                message: "discarding broken game".to_owned(),
            });
            return Ok(());
        }

        let skipped = self.config.skip_game_numbers.contains(number);

        let mut outcome = crate::matcher::MatchOutcome::default();
        if !skipped {
            // ECO classification must precede tag predicates, so the
            // replay comes first when it is active.
            let result = if self.config.add_eco && !self.eco.is_empty() {
                match self.engine.replay(game, &self.config) {
                    Ok((state, final_board)) => {
                        self.eco.apply(game);
                        outcome.replayed = true;
                        outcome.matched = self.engine.cheap_checks(game, &self.config)
                            && self.engine.final_checks(game, &self.config, &state, &final_board);
                        outcome.match_ply = state.match_ply;
                        outcome.pattern_label = state.pattern_label;
                        outcome.material_side = state.material_side;
                        outcome.final_board = Some(final_board);
                        Ok(())
                    }
                    Err(err) => Err(err),
                }
            } else {
                let replay_always = self.non_matching.is_some();
                match self.engine.check_game(game, &self.config, replay_always) {
                    Ok(result) => {
                        outcome = result;
                        Ok(())
                    }
                    Err(err) => Err(err),
                }
            };
            if let Err(err) = result {
                let message = format!(
                    "game starting at line {} discarded: {}",
                    game.start_line, err
                );
                self.log.diagnostic(source, &Diagnostic { line: game.start_line, message });
                return Ok(());
            }
        }

        if !outcome.matched {
            self.summary.non_matching += 1;
            if !self.config.check_only {
                if let Some(sink) = &mut self.non_matching {
                    let formatter =
                        Formatter::new(&self.config, &self.registry, &self.tag_order);
                    sink.write_game(&formatter, game)?;
                }
            }
            return Ok(());
        }

        // Duplicate bookkeeping keys on the replayed hashes, so it only
        // applies to games that were actually replayed.
        let prior = if outcome.replayed {
            self.dedup.check_and_insert(game, source_id)?
        } else {
            None
        };

        if let Some(prior) = prior {
            self.summary.duplicates += 1;
            let is_check_file = prior == CHECK_FILE_SOURCE;
            if !self.config.check_only {
                if let Some(sink) = &mut self.duplicates {
                    let formatter =
                        Formatter::new(&self.config, &self.registry, &self.tag_order);
                    sink.write_game(&formatter, game)?;
                }
            }
            if is_check_file || self.config.suppress_duplicates {
                return Ok(());
            }
        } else if self.config.suppress_originals {
            // Only later occurrences are wanted.
            return Ok(());
        }

        self.matched_ordinal += 1;
        if !self.config.matching_game_numbers.is_empty() {
            if !self.config.matching_game_numbers.contains(self.matched_ordinal) {
                if self.config.matching_game_numbers.exhausted(self.matched_ordinal) {
                    self.done = true;
                }
                return Ok(());
            }
        }

        self.summary.matched += 1;
        if self.config.maximum_matches > 0 && self.summary.matched >= self.config.maximum_matches {
            self.done = true;
        }

        if self.config.check_only {
            return Ok(());
        }

        self.stamp_matched_game(game, &outcome);

        let formatter = Formatter::new(&self.config, &self.registry, &self.tag_order);
        self.main.write_game(&formatter, game)?;

        if self.config.split_variants {
            let splits = split_variant_games(game, self.config.split_depth_limit);
            for mut split in splits {
                let _ = apply::apply_move_list(&mut split, true, &mut NoObserver);
                let formatter = Formatter::new(&self.config, &self.registry, &self.tag_order);
                self.main.write_game(&formatter, &split)?;
            }
        }
        Ok(())
    }

    /// Synthetic tags and comments added to matched games.
    fn stamp_matched_game(&mut self, game: &mut Game, outcome: &crate::matcher::MatchOutcome) {
        if self.config.add_match_tag {
            if let Some(side) = outcome.material_side {
                game.set_tag(
                    tags::MATERIAL_MATCH,
                    side.fold(b"White".to_vec(), b"Black".to_vec()),
                );
            }
        }
        if self.config.add_matchlabel_tag {
            if let Some(label) = &outcome.pattern_label {
                if !label.is_empty() {
                    game.set_tag(tags::MATCH_LABEL, label.as_bytes().to_vec());
                }
            }
        }
        if self.config.add_hashcode_tag && outcome.replayed {
            game.set_tag(tags::HASH_CODE, format!("{:016x}", game.final_hash).into_bytes());
        }
        if self.config.output_plycount {
            game.set_tag(tags::PLY_COUNT, game.ply_count().to_string().into_bytes());
        }
        if self.config.output_total_plycount {
            game.set_tag(
                tags::TOTAL_PLY_COUNT,
                total_ply_count(game).to_string().into_bytes(),
            );
        }
        if self.config.add_position_match_comments {
            if let Some(ply) = outcome.match_ply {
                let comment: Comment = self.config.position_match_comment.clone().into_bytes();
                match ply.checked_sub(1).and_then(|i| game.moves.get_mut(i)) {
                    Some(record) => record.comments.push(comment),
                    None => game.prefix.push(comment),
                }
            }
        }
        if self.config.add_fen_castling {
            fix_fen_castling(game);
        }
    }

    /// Flushes all sinks and reports the totals.
    ///
    /// # Errors
    ///
    /// Returns I/O errors from flushing.
    pub fn finish(mut self) -> io::Result<Summary> {
        self.main.finish()?;
        if let Some(sink) = &mut self.duplicates {
            sink.finish()?;
        }
        if let Some(sink) = &mut self.non_matching {
            sink.finish()?;
        }
        if !self.config.suppress_matched {
            let message = format!(
                "{} game{} matched out of {}; {} did not match.",
                self.summary.matched,
                if self.summary.matched == 1 { "" } else { "s" },
                self.summary.processed,
                self.summary.non_matching
            );
            self.log.note(&message);
        }
        Ok(self.summary)
    }
}

/// Half-moves in the main line and every variation.
fn total_ply_count(game: &Game) -> usize {
    fn count(moves: &[crate::moves::MoveRecord]) -> usize {
        moves
            .iter()
            .map(|m| 1 + m.variations.iter().map(|v| count(&v.moves)).sum::<usize>())
            .sum()
    }
    count(&game.moves)
        + game
            .prefix_variations
            .iter()
            .map(|v| count(&v.moves))
            .sum::<usize>()
}

/// A `FEN` tag with no castling field gets one deduced from the piece
/// placement.
fn fix_fen_castling(game: &mut Game) {
    let fen_tag = match game.tag(tags::FEN) {
        Some(value) => value.to_vec(),
        None => return,
    };
    let fields = fen_tag.split(|&c| c == b' ').filter(|f| !f.is_empty()).count();
    if fields >= 3 {
        return;
    }
    if let Ok(mut board) = crate::fen::board_from_fen(&fen_tag) {
        board.castling = crate::board::Castling::standard();
        for color in [crate::types::White, crate::types::Black] {
            if let Some(king) = board.king_of(color) {
                board.castling.set_king_file(color, king.file());
            }
        }
        board.fix_castling_rights();
        let rewritten = crate::fen::fen(&board, &crate::fen::FenOpts::default());
        game.set_tag(tags::FEN, rewritten.into_bytes());
    }
}

/// Flattens variations into stand-alone games, to the given nesting depth
/// (0 means no limit). A variation's prefix comment moves onto the move
/// it annotated.
pub fn split_variant_games(game: &Game, depth_limit: u32) -> Vec<Game> {
    let mut out = Vec::new();
    split_into(game, &game.moves, &[], 1, depth_limit, &mut out);
    out
}

fn split_into(
    game: &Game,
    moves: &[crate::moves::MoveRecord],
    prefix: &[crate::moves::MoveRecord],
    depth: u32,
    depth_limit: u32,
    out: &mut Vec<Game>,
) {
    if depth_limit > 0 && depth > depth_limit {
        return;
    }
    for (i, record) in moves.iter().enumerate() {
        for variation in &record.variations {
            let mut split = Game::new();
            for (id, value) in game.tag_pairs() {
                split.set_tag(id, value.to_vec());
            }
            split.result = variation.result.or(Some(crate::types::Outcome::Unknown));

            let mut line: Vec<crate::moves::MoveRecord> = prefix.to_vec();
            line.extend(moves[..i].iter().cloned());
            let attach_at = line.len().checked_sub(1);
            let mut body: Vec<crate::moves::MoveRecord> = variation.moves.clone();
            for m in line.iter_mut().chain(body.iter_mut()) {
                m.variations.clear();
                m.terminating_result = None;
            }
            match attach_at {
                Some(i) => line[i].comments.extend(variation.prefix.iter().cloned()),
                None => split.prefix.extend(variation.prefix.iter().cloned()),
            }
            line.append(&mut body);
            split.moves = line;
            out.push(split);

            // Recurse into nested variations with the surrounding line as
            // the new prefix.
            let mut inner_prefix: Vec<crate::moves::MoveRecord> = prefix.to_vec();
            inner_prefix.extend(moves[..i].iter().cloned());
            for m in inner_prefix.iter_mut() {
                m.variations.clear();
                m.terminating_result = None;
            }
            split_into(game, &variation.moves, &inner_prefix, depth + 1, depth_limit, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParserOpts;
    use std::io::Cursor;

    fn parse_one(pgn: &str) -> (Game, TagRegistry) {
        let mut registry = TagRegistry::new();
        let mut parser = Parser::new(Cursor::new(pgn.as_bytes().to_vec()), ParserOpts::default());
        let game = parser.next_game(&mut registry).expect("read").expect("one game");
        (game, registry)
    }

    #[test]
    fn test_total_ply_count() {
        let (game, _) = parse_one("1. e4 (1. d4 d5) e5 *");
        assert_eq!(total_ply_count(&game), 4);
    }

    #[test]
    fn test_split_variants() {
        let (game, _) = parse_one("1. e4 ({better} 1. d4 d5) e5 (1... c5 (1... e6)) *");
        let splits = split_variant_games(&game, 0);
        assert_eq!(splits.len(), 3);
        // First split: the d4 line replacing e4 entirely.
        assert_eq!(splits[0].moves.len(), 2);
        assert_eq!(splits[0].moves[0].text, b"d4".to_vec());
        // The variation's prefix comment lands on the game prefix, since
        // no move precedes it.
        assert_eq!(splits[0].prefix, vec![b"better".to_vec()]);
        // Second split: e4 c5.
        assert_eq!(splits[1].moves.len(), 2);
        assert_eq!(splits[1].moves[1].text, b"c5".to_vec());
        // Third split: the nested e6 line.
        assert_eq!(splits[2].moves.len(), 2);
        assert_eq!(splits[2].moves[1].text, b"e6".to_vec());
    }

    #[test]
    fn test_fix_fen_castling() {
        let (mut game, _) = parse_one(
            "[FEN \"rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w\"]\n\n1. e4 *",
        );
        fix_fen_castling(&mut game);
        let fen = game.tag(tags::FEN).expect("tag present");
        assert!(String::from_utf8_lossy(fen).contains("KQkq"));
    }
}
