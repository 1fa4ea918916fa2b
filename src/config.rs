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

//! The run configuration, read-only once the front end has built it.

use std::error::Error;
use std::fmt;
use std::path::PathBuf;

use crate::lexer::LexerOpts;
use crate::parser::ParserOpts;

/// The movetext rendering selected with `-W`.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum OutputFormat {
    #[default]
    San,
    Epd,
    Lalg,
    Halg,
    Elalg,
    Xlalg,
    Xolalg,
    Uci,
    Cm,
}

impl OutputFormat {
    /// Parses a `-W` argument. A trailing letter set for SAN-like formats
    /// is returned separately.
    pub fn from_arg(arg: &str) -> Option<(OutputFormat, Option<String>)> {
        let lower = arg.to_ascii_lowercase();
        for (name, format, takes_letters) in [
            ("san", OutputFormat::San, true),
            ("epd", OutputFormat::Epd, false),
            ("lalg", OutputFormat::Lalg, false),
            ("halg", OutputFormat::Halg, false),
            ("elalg", OutputFormat::Elalg, true),
            ("xlalg", OutputFormat::Xlalg, true),
            ("xolalg", OutputFormat::Xolalg, true),
            ("uci", OutputFormat::Uci, false),
            ("cm", OutputFormat::Cm, false),
        ] {
            if let Some(rest) = lower.strip_prefix(name) {
                if rest.is_empty() {
                    return Some((format, None));
                }
                if takes_letters && arg.len() == name.len() + 6 {
                    return Some((format, Some(arg[name.len()..].to_owned())));
                }
            }
        }
        None
    }
}

/// Which tags are written with each game.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum TagOutputForm {
    #[default]
    All,
    SevenTagRoster,
    None,
}

/// Policy on games that start from a set-up position.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum SetupPolicy {
    #[default]
    Either,
    RequireSetup,
    ForbidSetup,
}

/// Restriction on the side to move at the end of the game.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum WhoseMove {
    #[default]
    Either,
    White,
    Black,
}

/// ECO output splitting granularity selected with `-E`.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum EcoSplitLevel {
    #[default]
    DontDivide,
    Letter,
    LetterDigit,
    LetterDigitDigit,
}

/// Error when parsing a game-number range list.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct BadRange {
    pub text: String,
}

impl fmt::Display for BadRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bad game number range: {}", self.text)
    }
}

impl Error for BadRange {}

/// An ordered list of `[min,max]` game-number ranges, strictly increasing
/// and non-overlapping, for `--selectonly` and `--skipmatching`.
#[derive(Clone, Debug, Default)]
pub struct GameNumberRanges {
    ranges: Vec<(u64, u64)>,
}

impl GameNumberRanges {
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Adds ranges from text like `1,5-7,20`.
    ///
    /// # Errors
    ///
    /// Returns [`BadRange`] for malformed items or out-of-order ranges.
    pub fn add_list(&mut self, text: &str) -> Result<(), BadRange> {
        for item in text.split(',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            let (min, max) = match item.split_once('-') {
                Some((min, max)) => {
                    let min = min.trim().parse().map_err(|_| BadRange { text: item.to_owned() })?;
                    let max = max.trim().parse().map_err(|_| BadRange { text: item.to_owned() })?;
                    (min, max)
                }
                None => {
                    let n = item.parse().map_err(|_| BadRange { text: item.to_owned() })?;
                    (n, n)
                }
            };
            if min == 0 || max < min {
                return Err(BadRange { text: item.to_owned() });
            }
            if let Some(&(_, last_max)) = self.ranges.last() {
                if min <= last_max {
                    return Err(BadRange { text: item.to_owned() });
                }
            }
            self.ranges.push((min, max));
        }
        Ok(())
    }

    pub fn contains(&self, number: u64) -> bool {
        self.ranges.iter().any(|&(min, max)| min <= number && number <= max)
    }

    /// True once no further number can be in range, for early exit.
    pub fn exhausted(&self, number: u64) -> bool {
        self.ranges.last().map_or(false, |&(_, max)| number > max)
    }
}

/// Everything the front end decides before the run starts. Immutable
/// afterwards; predicates and sinks read it, only the driver owns
/// run-time state.
#[derive(Debug)]
pub struct Config {
    // Parsing.
    pub parser: ParserOpts,
    pub keep_broken_games: bool,

    // Selection.
    pub match_permutations: bool,
    pub check_only: bool,
    pub match_only_checkmate: bool,
    pub match_only_stalemate: bool,
    pub match_only_insufficient: bool,
    pub keep_only_commented_games: bool,
    pub match_underpromotion: bool,
    /// Minimum repetitions of one position (0 disables).
    pub check_for_repetition: u32,
    /// The N of an N-move-rule check (0 disables).
    pub check_for_n_move_rule: u32,
    /// Inclusive ply bounds on the main line.
    pub bounds: Option<(u32, u32)>,
    pub setup_policy: SetupPolicy,
    pub whose_move: WhoseMove,
    pub tag_match_anywhere: bool,

    // Duplicate handling.
    pub suppress_duplicates: bool,
    pub suppress_originals: bool,
    pub fuzzy_match_duplicates: bool,
    pub fuzzy_match_depth: u32,
    pub use_virtual_hash_table: bool,

    // ECO classification.
    pub add_eco: bool,
    pub eco_file: Option<PathBuf>,
    pub eco_split_level: EcoSplitLevel,

    // Output shape.
    pub output_format: OutputFormat,
    /// Replacement piece letters for SAN-like output, `PNBRQK` order.
    pub output_piece_letters: Option<String>,
    pub max_line_length: usize,
    pub tag_output_form: TagOutputForm,
    pub only_output_wanted_tags: bool,
    pub keep_nags: bool,
    pub keep_comments: bool,
    pub keep_variations: bool,
    pub keep_move_numbers: bool,
    pub keep_results: bool,
    pub keep_checks: bool,
    pub json_format: bool,
    pub tsv_format: bool,
    pub no_faux_ep: bool,
    pub output_evaluation: bool,
    /// Append a FEN comment for the final position of each game.
    pub output_fen_string: bool,
    pub add_fen_comments: bool,
    pub add_hashcode_comments: bool,
    pub add_position_match_comments: bool,
    pub position_match_comment: String,
    pub output_plycount: bool,
    pub output_total_plycount: bool,
    pub add_hashcode_tag: bool,
    pub add_match_tag: bool,
    pub add_matchlabel_tag: bool,
    pub add_fen_castling: bool,
    pub line_number_marker: Option<String>,
    /// Truncate output after this many plies (None keeps everything).
    pub output_ply_limit: Option<u32>,
    pub split_variants: bool,
    pub split_depth_limit: u32,

    // Routing and limits.
    pub output_file: Option<PathBuf>,
    pub append_output: bool,
    pub log_file: Option<PathBuf>,
    pub append_log: bool,
    pub duplicate_file: Option<PathBuf>,
    pub non_matching_file: Option<PathBuf>,
    pub games_per_file: u64,
    /// The number of the first rotated output file.
    pub next_file_number: u64,
    pub first_game_number: u64,
    pub game_limit: u64,
    pub maximum_matches: u64,
    pub suppress_matched: bool,
    pub matching_game_numbers: GameNumberRanges,
    pub skip_game_numbers: GameNumberRanges,
    pub quiet: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            parser: ParserOpts::default(),
            keep_broken_games: false,
            match_permutations: true,
            check_only: false,
            match_only_checkmate: false,
            match_only_stalemate: false,
            match_only_insufficient: false,
            keep_only_commented_games: false,
            match_underpromotion: false,
            check_for_repetition: 0,
            check_for_n_move_rule: 0,
            bounds: None,
            setup_policy: SetupPolicy::Either,
            whose_move: WhoseMove::Either,
            tag_match_anywhere: false,
            suppress_duplicates: false,
            suppress_originals: false,
            fuzzy_match_duplicates: false,
            fuzzy_match_depth: 0,
            use_virtual_hash_table: false,
            add_eco: false,
            eco_file: None,
            eco_split_level: EcoSplitLevel::DontDivide,
            output_format: OutputFormat::San,
            output_piece_letters: None,
            max_line_length: 75,
            tag_output_form: TagOutputForm::All,
            only_output_wanted_tags: false,
            keep_nags: true,
            keep_comments: true,
            keep_variations: true,
            keep_move_numbers: true,
            keep_results: true,
            keep_checks: true,
            json_format: false,
            tsv_format: false,
            no_faux_ep: false,
            output_evaluation: false,
            output_fen_string: false,
            add_fen_comments: false,
            add_hashcode_comments: false,
            add_position_match_comments: false,
            position_match_comment: "MATCH".to_owned(),
            output_plycount: false,
            output_total_plycount: false,
            add_hashcode_tag: false,
            add_match_tag: false,
            add_matchlabel_tag: false,
            add_fen_castling: false,
            line_number_marker: None,
            output_ply_limit: None,
            split_variants: false,
            split_depth_limit: 0,
            output_file: None,
            append_output: false,
            log_file: None,
            append_log: false,
            duplicate_file: None,
            non_matching_file: None,
            games_per_file: 0,
            next_file_number: 1,
            first_game_number: 1,
            game_limit: u64::MAX,
            maximum_matches: 0,
            suppress_matched: false,
            matching_game_numbers: GameNumberRanges::default(),
            skip_game_numbers: GameNumberRanges::default(),
            quiet: false,
        }
    }
}

impl Config {
    /// `--json` and `--tsv` override several formatting defaults; invalid
    /// combinations are rejected here rather than at use sites.
    ///
    /// # Errors
    ///
    /// Returns a description of the conflicting settings.
    pub fn reconcile_wire_formats(&mut self) -> Result<(), String> {
        if self.json_format {
            if self.output_format == OutputFormat::Epd
                || self.output_format == OutputFormat::Cm
                || self.tsv_format
                || self.eco_split_level != EcoSplitLevel::DontDivide
            {
                return Err("JSON output is not supported with -E, -Wepd, --tsv or -Wcm".to_owned());
            }
            self.keep_comments = false;
            self.keep_variations = false;
            self.keep_results = false;
        }
        if self.tsv_format {
            if self.output_format == OutputFormat::Cm {
                return Err("TSV output is not supported with -Wcm".to_owned());
            }
            self.max_line_length = 0;
        }
        Ok(())
    }

    /// Sets the ply bounds from a move-count range.
    pub fn set_move_bounds(&mut self, lower: u32, upper: u32) {
        self.bounds = Some((lower.saturating_mul(2).saturating_sub(1), upper.saturating_mul(2)));
    }

    pub fn set_ply_bounds(&mut self, lower: u32, upper: u32) {
        self.bounds = Some((lower, upper));
    }

    pub fn lexer_opts(&self) -> LexerOpts {
        self.parser.lexer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::from_arg("san"), Some((OutputFormat::San, None)));
        assert_eq!(OutputFormat::from_arg("UCI"), Some((OutputFormat::Uci, None)));
        assert_eq!(
            OutputFormat::from_arg("sanBSLTDK"),
            Some((OutputFormat::San, Some("BSLTDK".to_owned())))
        );
        assert_eq!(OutputFormat::from_arg("nonsense"), None);
    }

    #[test]
    fn test_ranges() {
        let mut ranges = GameNumberRanges::default();
        ranges.add_list("1,5-7,20").expect("valid");
        assert!(ranges.contains(1));
        assert!(!ranges.contains(2));
        assert!(ranges.contains(6));
        assert!(ranges.contains(20));
        assert!(!ranges.exhausted(20));
        assert!(ranges.exhausted(21));
        assert!(ranges.add_list("15").is_err(), "ranges must be increasing");
        assert!(ranges.add_list("0").is_err());
        assert!(ranges.add_list("9-5").is_err());
    }

    #[test]
    fn test_json_reconciliation() {
        let mut config = Config { json_format: true, ..Config::default() };
        config.reconcile_wire_formats().expect("compatible");
        assert!(!config.keep_comments);
        assert!(!config.keep_variations);
        assert!(!config.keep_results);

        let mut config = Config {
            json_format: true,
            output_format: OutputFormat::Epd,
            ..Config::default()
        };
        assert!(config.reconcile_wire_formats().is_err());
    }

    #[test]
    fn test_move_bounds() {
        let mut config = Config::default();
        config.set_move_bounds(2, 10);
        assert_eq!(config.bounds, Some((3, 20)));
    }
}
