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

//! The `pgn-sift` command line front end.
//!
//! The front end is plumbing: it parses arguments and criteria files,
//! builds the [`Config`] and the [`MatchEngine`], and hands the input
//! files to the [`Driver`]. An argsfile (`-A`) supplies directives one
//! per line: lines starting with `:` are arguments, other lines are data
//! for the most recent argument that takes multi-line input.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser as ClapParser;

use pgn_sift::config::{Config, EcoSplitLevel, OutputFormat, SetupPolicy, TagOutputForm};
use pgn_sift::driver::Driver;
use pgn_sift::matcher::material::MaterialCriteria;
use pgn_sift::matcher::tag::{TagOp, TagRule};
use pgn_sift::matcher::textual::TextualVariation;
use pgn_sift::matcher::MatchEngine;
use pgn_sift::tags::{self, TagRegistry};

#[derive(ClapParser, Debug)]
#[command(
    name = "pgn-sift",
    about = "Searches, validates and re-formats chess games in PGN files."
)]
struct Cli {
    /// Output only the Seven Tag Roster.
    #[arg(short = '7')]
    seven_tag_roster: bool,

    /// Write N games per output file, numbered 1.pgn, 2.pgn, ...
    #[arg(short = '#', value_name = "N[,M]")]
    games_per_file: Option<String>,

    /// Append output to FILE.
    #[arg(short = 'a', value_name = "FILE")]
    append_file: Option<PathBuf>,

    /// Write output to FILE.
    #[arg(short = 'o', value_name = "FILE")]
    output_file: Option<PathBuf>,

    /// Read further directives from an argsfile.
    #[arg(short = 'A', value_name = "FILE")]
    args_file: Option<PathBuf>,

    /// Bounds on the number of moves: N, lN (at least), uN (at most).
    #[arg(short = 'b', value_name = "[elu]N")]
    move_bounds: Option<String>,

    /// Games whose duplicates are to be suppressed, without being output.
    #[arg(short = 'c', value_name = "FILE")]
    check_file: Vec<PathBuf>,

    /// Drop comments from the output.
    #[arg(short = 'C')]
    no_comments: bool,

    /// Write duplicate games to FILE.
    #[arg(short = 'd', value_name = "FILE")]
    duplicate_file: Option<PathBuf>,

    /// Suppress duplicate games.
    #[arg(short = 'D')]
    suppress_duplicates: bool,

    /// Classify games by ECO code; FILE overrides the default eco.pgn.
    #[arg(short = 'e', value_name = "FILE", num_args = 0..=1, default_missing_value = "")]
    eco: Option<String>,

    /// Split output by ECO code at the given granularity.
    #[arg(short = 'E', value_name = "1|2|3")]
    eco_level: Option<u8>,

    /// Append a FEN comment for the final position of each game.
    #[arg(short = 'F', num_args = 0..=1, default_missing_value = "")]
    final_fen: Option<String>,

    /// Read a list of input file names from FILE.
    #[arg(short = 'f', value_name = "FILE")]
    file_lists: Vec<PathBuf>,

    /// Match games reaching the position with this Polyglot hash.
    #[arg(short = 'H', value_name = "HEX")]
    hashcodes: Vec<String>,

    /// Write the log to FILE.
    #[arg(short = 'l', value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Append the log to FILE.
    #[arg(short = 'L', value_name = "FILE")]
    append_log_file: Option<PathBuf>,

    /// Match only games that end in checkmate.
    #[arg(short = 'M')]
    only_checkmate: bool,

    /// Write non-matching games to FILE.
    #[arg(short = 'n', value_name = "FILE")]
    non_matching_file: Option<PathBuf>,

    /// Drop NAGs from the output.
    #[arg(short = 'N')]
    no_nags: bool,

    /// Match move sequences only in the given order.
    #[arg(short = 'P')]
    no_permutations: bool,

    /// Read the output tag order from FILE.
    #[arg(short = 'R', value_name = "FILE")]
    roster_file: Option<PathBuf>,

    /// Check syntax and legality only; no output.
    #[arg(short = 'r')]
    check_only: bool,

    /// Use soundex matching for player name tags.
    #[arg(short = 'S')]
    soundex: bool,

    /// Report progress and totals less noisily.
    #[arg(short = 's', long = "quiet")]
    quiet: bool,

    /// Read tag criteria from FILE.
    #[arg(short = 't', value_name = "FILE")]
    tag_files: Vec<PathBuf>,

    /// An inline tag criterion, e.g. -TwKasparov, -Td1990, -TeB12.
    #[arg(short = 'T', value_name = "CRITERION")]
    tag_criteria: Vec<String>,

    /// Suppress games that are not duplicated elsewhere.
    #[arg(short = 'U')]
    suppress_originals: bool,

    /// Read textual variations of interest from FILE.
    #[arg(short = 'v', value_name = "FILE")]
    variation_files: Vec<PathBuf>,

    /// Drop variations from the output.
    #[arg(short = 'V')]
    no_variations: bool,

    /// Maximum output line width.
    #[arg(short = 'w', value_name = "N")]
    line_width: Option<usize>,

    /// Output notation: san, epd, lalg, halg, elalg, xlalg, xolalg, uci, cm.
    #[arg(short = 'W', value_name = "FORMAT")]
    output_format: Option<String>,

    /// Read positional variations of interest from FILE.
    #[arg(short = 'x', value_name = "FILE")]
    positional_files: Vec<PathBuf>,

    /// Read material criteria from FILE, tried for both colours.
    #[arg(short = 'y', value_name = "FILE")]
    material_both_files: Vec<PathBuf>,

    /// Read material criteria from FILE, colours as written.
    #[arg(short = 'z', value_name = "FILE")]
    material_files: Vec<PathBuf>,

    /// Spill the duplicate table to virtual.tmp.
    #[arg(short = 'Z')]
    virtual_hash: bool,

    // Long-form options.
    #[arg(long)]
    fuzzy: Option<u32>,
    #[arg(long)]
    keepbroken: bool,
    #[arg(long)]
    nofauxep: bool,
    #[arg(long)]
    json: bool,
    #[arg(long)]
    tsv: bool,
    #[arg(long)]
    tagsubstr: bool,
    #[arg(long)]
    underpromotion: bool,
    #[arg(long)]
    suppressmatched: bool,
    #[arg(long, value_name = "N")]
    repetition: Option<u32>,
    #[arg(long)]
    fifty: bool,
    #[arg(long)]
    seventyfive: bool,
    #[arg(long)]
    stalemate: bool,
    #[arg(long)]
    insufficient: bool,
    #[arg(long)]
    nomovenumbers: bool,
    #[arg(long)]
    noresults: bool,
    #[arg(long)]
    nochecks: bool,
    #[arg(long)]
    notags: bool,
    #[arg(long)]
    evaluation: bool,
    #[arg(long, value_name = "N")]
    plylimit: Option<u32>,
    #[arg(long)]
    plycount: bool,
    #[arg(long)]
    totalplycount: bool,
    #[arg(long)]
    addhashcode: bool,
    #[arg(long)]
    fixresulttags: bool,
    #[arg(long)]
    fixtagstrings: bool,
    #[arg(long)]
    addfencastling: bool,
    #[arg(long, value_name = "DEPTH", num_args = 0..=1, default_missing_value = "0")]
    separatevariants: Option<u32>,
    #[arg(long)]
    nobadresults: bool,
    #[arg(long)]
    allownullmoves: bool,
    #[arg(long)]
    nestedcomments: bool,
    #[arg(long)]
    addmatchtag: bool,
    #[arg(long)]
    addlabeltag: bool,
    #[arg(long)]
    xroster: bool,
    #[arg(long)]
    lichesscommentfix: bool,
    #[arg(long)]
    onlycommented: bool,
    #[arg(long, value_name = "RANGE")]
    selectonly: Option<String>,
    #[arg(long, value_name = "RANGE")]
    skipmatching: Option<String>,
    #[arg(long, value_name = "N")]
    firstgame: Option<u64>,
    #[arg(long, value_name = "N")]
    gamelimit: Option<u64>,
    #[arg(long, value_name = "N")]
    matchmax: Option<u64>,
    #[arg(long, value_name = "MARKER")]
    linenumbers: Option<String>,
    #[arg(long)]
    fencomments: bool,
    #[arg(long)]
    hashcomments: bool,
    #[arg(long, value_name = "LABEL", num_args = 0..=1, default_missing_value = "MATCH")]
    markmatches: Option<String>,
    #[arg(long)]
    onlysetuptags: bool,
    #[arg(long)]
    nosetuptags: bool,
    /// A FEN pattern to match, optionally with a `:material` constraint.
    #[arg(long, value_name = "PATTERN")]
    fenpattern: Vec<String>,
    /// Like --fenpattern, but the colour-reversed form matches too.
    #[arg(long, value_name = "PATTERN")]
    fenpatterni: Vec<String>,

    /// PGN files to process.
    files: Vec<PathBuf>,
}

fn main() {
    let code = match run() {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("pgn-sift: {:#}", err);
            1
        }
    };
    std::process::exit(code);
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::default();
    let mut engine = MatchEngine::new();
    let mut registry = TagRegistry::new();
    let mut roster: Vec<tags::TagId> = Vec::new();
    let mut inputs: Vec<PathBuf> = cli.files.clone();

    apply_cli(&cli, &mut config, &mut engine, &mut registry, &mut roster, &mut inputs)?;

    if let Some(path) = &cli.args_file {
        read_args_file(path, &mut config, &mut engine, &mut registry, &mut inputs)?;
    }
    for list in &cli.file_lists {
        let reader = BufReader::new(
            File::open(list).with_context(|| format!("cannot open {}", list.display()))?,
        );
        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if !line.is_empty() {
                inputs.push(PathBuf::from(line));
            }
        }
    }

    config
        .reconcile_wire_formats()
        .map_err(|message| anyhow::anyhow!(message))?;

    let mut driver = Driver::new(config, registry, engine).context("cannot open outputs")?;
    driver.tag_order = roster;

    if let Some(eco_file) = resolve_eco_file(&cli) {
        driver
            .load_eco_file(&eco_file)
            .with_context(|| format!("unable to open the ECO file {}", eco_file.display()))?;
    }
    for check in &cli.check_file {
        driver
            .preload_check_file(check)
            .with_context(|| format!("cannot open {}", check.display()))?;
    }

    if inputs.is_empty() {
        bail!("no input files");
    }
    for input in &inputs {
        if driver.finished() {
            break;
        }
        driver
            .process_file(input)
            .with_context(|| format!("cannot process {}", input.display()))?;
    }

    driver.finish()?;
    Ok(())
}

/// The `-e` argument, falling back to the `ECO_FILE` environment variable
/// and then `eco.pgn`.
fn resolve_eco_file(cli: &Cli) -> Option<PathBuf> {
    match &cli.eco {
        Some(value) if !value.is_empty() => Some(PathBuf::from(value)),
        Some(_) => Some(
            std::env::var_os("ECO_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("eco.pgn")),
        ),
        None => None,
    }
}

#[allow(clippy::too_many_lines)]
fn apply_cli(
    cli: &Cli,
    config: &mut Config,
    engine: &mut MatchEngine,
    registry: &mut TagRegistry,
    roster: &mut Vec<tags::TagId>,
    _inputs: &mut Vec<PathBuf>,
) -> Result<()> {
    if cli.seven_tag_roster {
        config.tag_output_form = TagOutputForm::SevenTagRoster;
    }
    if cli.notags {
        config.tag_output_form = TagOutputForm::None;
    }
    if let Some(spec) = &cli.games_per_file {
        // `-#N[,M]` rotates output every N games, starting at file M.
        let (n, m) = match spec.split_once(',') {
            Some((n, m)) => (n, m.parse::<u64>().ok()),
            None => (spec.as_str(), None),
        };
        config.games_per_file = n.parse().context("bad -# value")?;
        if let Some(m) = m {
            config.next_file_number = m;
        }
    }
    if let Some(path) = &cli.append_file {
        config.output_file = Some(path.clone());
        config.append_output = true;
    }
    if let Some(path) = &cli.output_file {
        config.output_file = Some(path.clone());
        config.append_output = false;
    }
    if let Some(bounds) = &cli.move_bounds {
        apply_move_bounds(config, bounds)?;
    }
    config.parser.allow_null_moves = cli.allownullmoves;
    config.parser.lichess_comment_fix = cli.lichesscommentfix;
    config.parser.reject_inconsistent_results = cli.nobadresults;
    config.parser.fix_result_tags = cli.fixresulttags;
    config.parser.lexer.fix_tag_strings = cli.fixtagstrings;
    config.parser.lexer.nested_comments = cli.nestedcomments;
    config.keep_broken_games = cli.keepbroken;
    config.keep_comments = !cli.no_comments;
    config.keep_nags = !cli.no_nags;
    config.keep_variations = !cli.no_variations;
    config.keep_move_numbers = !cli.nomovenumbers;
    config.keep_results = !cli.noresults;
    config.keep_checks = !cli.nochecks;
    config.match_permutations = !cli.no_permutations;
    config.suppress_duplicates = cli.suppress_duplicates;
    config.suppress_originals = cli.suppress_originals;
    config.duplicate_file = cli.duplicate_file.clone();
    config.non_matching_file = cli.non_matching_file.clone();
    config.check_only = cli.check_only;
    config.quiet = cli.quiet;
    config.match_only_checkmate = cli.only_checkmate;
    config.match_only_stalemate = cli.stalemate;
    config.match_only_insufficient = cli.insufficient;
    config.keep_only_commented_games = cli.onlycommented;
    config.match_underpromotion = cli.underpromotion;
    config.tag_match_anywhere = cli.tagsubstr;
    config.no_faux_ep = cli.nofauxep;
    config.json_format = cli.json;
    config.tsv_format = cli.tsv;
    config.output_evaluation = cli.evaluation;
    config.output_ply_limit = cli.plylimit;
    config.output_plycount = cli.plycount;
    config.output_total_plycount = cli.totalplycount;
    config.add_hashcode_tag = cli.addhashcode;
    config.add_fen_castling = cli.addfencastling;
    config.add_match_tag = cli.addmatchtag;
    config.add_matchlabel_tag = cli.addlabeltag;
    config.only_output_wanted_tags = cli.xroster;
    config.add_fen_comments = cli.fencomments;
    config.add_hashcode_comments = cli.hashcomments;
    config.suppress_matched = cli.suppressmatched;
    config.use_virtual_hash_table = cli.virtual_hash;
    config.line_number_marker = cli.linenumbers.clone();
    if let Some(label) = &cli.markmatches {
        config.add_position_match_comments = true;
        config.position_match_comment = label.clone();
    }
    if let Some(depth) = cli.separatevariants {
        config.split_variants = true;
        config.split_depth_limit = depth;
    }
    if let Some(depth) = cli.fuzzy {
        config.fuzzy_match_duplicates = true;
        config.fuzzy_match_depth = depth;
    }
    if let Some(n) = cli.repetition {
        config.check_for_repetition = n;
    }
    if cli.fifty {
        config.check_for_n_move_rule = 50;
    }
    if cli.seventyfive {
        config.check_for_n_move_rule = 75;
    }
    if cli.onlysetuptags {
        config.setup_policy = SetupPolicy::RequireSetup;
    }
    if cli.nosetuptags {
        config.setup_policy = SetupPolicy::ForbidSetup;
    }
    if let Some(n) = cli.firstgame {
        config.first_game_number = n;
    }
    if let Some(n) = cli.gamelimit {
        config.game_limit = n;
    }
    if let Some(n) = cli.matchmax {
        config.maximum_matches = n;
    }
    if let Some(ranges) = &cli.selectonly {
        config.matching_game_numbers.add_list(ranges)?;
    }
    if let Some(ranges) = &cli.skipmatching {
        config.skip_game_numbers.add_list(ranges)?;
    }
    if let Some(width) = cli.line_width {
        config.max_line_length = width;
    }
    if let Some(format) = &cli.output_format {
        let (format, letters) = OutputFormat::from_arg(format)
            .with_context(|| format!("unknown output format {}", format))?;
        config.output_format = format;
        config.output_piece_letters = letters;
    }
    if let Some(level) = cli.eco_level {
        config.eco_split_level = match level {
            1 => EcoSplitLevel::Letter,
            2 => EcoSplitLevel::LetterDigit,
            3 => EcoSplitLevel::LetterDigitDigit,
            _ => bail!("-E takes 1, 2 or 3"),
        };
    }
    if cli.eco.is_some() {
        config.add_eco = true;
    }
    if let Some(path) = &cli.log_file {
        config.log_file = Some(path.clone());
        config.append_log = false;
    }
    if let Some(path) = &cli.append_log_file {
        config.log_file = Some(path.clone());
        config.append_log = true;
    }
    engine.tag.substring = cli.tagsubstr;
    engine.tag.soundex = cli.soundex;
    config.output_fen_string = cli.final_fen.is_some();

    for (patterns, reversed) in [(&cli.fenpattern, false), (&cli.fenpatterni, true)] {
        for pattern in patterns.iter() {
            engine
                .patterns
                .add(pattern, reversed, None)
                .map_err(|err| anyhow::anyhow!("{}", err))?;
        }
    }
    for value in &cli.hashcodes {
        engine
            .positional
            .add_hex(value)
            .map_err(|err| anyhow::anyhow!("{}", err))?;
    }
    for criterion in &cli.tag_criteria {
        add_inline_tag_criterion(engine, registry, criterion)?;
    }
    for path in &cli.tag_files {
        read_tag_file(path, engine, registry)?;
    }
    for path in &cli.variation_files {
        read_data_lines(path, |line| {
            if let Some(variation) = TextualVariation::parse(line) {
                engine.textual.push(variation);
            }
            Ok(())
        })?;
    }
    for path in &cli.positional_files {
        read_data_lines(path, |line| {
            engine
                .positional
                .add_move_line(line)
                .map_err(|err| anyhow::anyhow!("{}", err))
        })?;
    }
    for (paths, both) in [(&cli.material_both_files, true), (&cli.material_files, false)] {
        for path in paths.iter() {
            read_data_lines(path, |line| {
                engine.material.push(
                    MaterialCriteria::parse(line, both).map_err(|err| anyhow::anyhow!("{}", err))?,
                );
                Ok(())
            })?;
        }
    }
    if let Some(path) = &cli.roster_file {
        read_data_lines(path, |line| {
            let name = line.trim().trim_start_matches('[');
            let name: String = name
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                .collect();
            if !name.is_empty() {
                roster.push(registry.id(name.as_bytes()));
            }
            Ok(())
        })?;
    }

    Ok(())
}

/// `-b` bounds: `N` for exactly N moves, `lN` for at least, `uN` for at
/// most, `N1:N2` for a range.
fn apply_move_bounds(config: &mut Config, spec: &str) -> Result<()> {
    if let Some(rest) = spec.strip_prefix('l') {
        let n: u32 = rest.parse().context("bad -b value")?;
        config.set_move_bounds(n, 10000);
    } else if let Some(rest) = spec.strip_prefix('u') {
        let n: u32 = rest.parse().context("bad -b value")?;
        config.set_move_bounds(0, n);
    } else if let Some((lower, upper)) = spec.split_once(':') {
        config.set_move_bounds(
            lower.parse().context("bad -b value")?,
            upper.parse().context("bad -b value")?,
        );
    } else {
        let n: u32 = spec.parse().context("bad -b value")?;
        config.set_move_bounds(n, n);
    }
    Ok(())
}

/// `-T` criteria: a selector letter and a value, e.g. `-TbKarpov`.
fn add_inline_tag_criterion(
    engine: &mut MatchEngine,
    registry: &mut TagRegistry,
    criterion: &str,
) -> Result<()> {
    let (selector, value) = criterion
        .split_at_checked(1)
        .filter(|(_, value)| !value.is_empty())
        .with_context(|| format!("bad -T criterion {}", criterion))?;

    let mut push = |tag, op, value: &str| -> Result<()> {
        engine
            .tag
            .positive
            .push(TagRule::new(tag, op, value.to_owned()).map_err(|err| anyhow::anyhow!("{}", err))?);
        Ok(())
    };

    match selector {
        "w" => push(tags::WHITE, TagOp::Eq, value),
        "b" => push(tags::BLACK, TagOp::Eq, value),
        "a" => {
            push(tags::WHITE, TagOp::Eq, value)?;
            push(tags::BLACK, TagOp::Eq, value)
        }
        "e" => push(tags::ECO, TagOp::Eq, value),
        "r" => push(tags::RESULT, TagOp::Eq, value),
        "d" => {
            let (op, consumed) = TagOp::parse(value.as_bytes());
            push(tags::DATE, op, &value[consumed..])
        }
        _ => {
            // Fall back to `Name=value` form.
            match criterion.split_once('=') {
                Some((name, value)) => {
                    let tag = registry.id(name.as_bytes());
                    push(tag, TagOp::Eq, value)
                }
                None => bail!("bad -T criterion {}", criterion),
            }
        }
    }
}

/// Reads a criteria file, skipping blank and `%`-comment lines.
fn read_data_lines<F>(path: &PathBuf, mut add: F) -> Result<()>
where
    F: FnMut(&str) -> Result<()>,
{
    let reader =
        BufReader::new(File::open(path).with_context(|| format!("cannot open {}", path.display()))?);
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() || line.starts_with('%') {
            continue;
        }
        add(&line).with_context(|| format!("in {}", path.display()))?;
    }
    Ok(())
}

/// A `-t` tag criteria file: one `Name [op] "value"` per line.
fn read_tag_file(
    path: &PathBuf,
    engine: &mut MatchEngine,
    registry: &mut TagRegistry,
) -> Result<()> {
    read_data_lines(path, |line| add_tag_criteria_line(line, engine, registry))
}

/// One tag criteria line, `Name [op] "value"`. The pseudo-tags `FEN`,
/// `FENPattern` and `FENPatternI` register positional and pattern matches
/// instead; a leading `!` makes the rule negative.
fn add_tag_criteria_line(
    line: &str,
    engine: &mut MatchEngine,
    registry: &mut TagRegistry,
) -> Result<()> {
    let line = line.trim();
    let (negative, line) = match line.strip_prefix('!') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, line),
    };

    let name_end = line
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(line.len());
    let (name, rest) = line.split_at(name_end);
    if name.is_empty() {
        bail!("missing tag name in criteria line {}", line);
    }
    let rest = rest.trim_start();
    let (op, consumed) = TagOp::parse(rest.as_bytes());
    let rest = rest[consumed..].trim_start();

    let (value, trailer) = rest
        .strip_prefix('"')
        .and_then(|r| r.split_once('"').map(|(v, tail)| (v, tail.trim())))
        .with_context(|| format!("missing quoted tag string in {}", line))?;

    let tag = registry.id(name.as_bytes());
    match tag {
        tags::FEN => engine
            .positional
            .add_fen(value.as_bytes())
            .map_err(|err| anyhow::anyhow!("{}", err)),
        tags::FEN_PATTERN | tags::FEN_PATTERN_I => {
            let label = if trailer.is_empty() { None } else { Some(trailer) };
            engine
                .patterns
                .add(value, tag == tags::FEN_PATTERN_I, label)
                .map_err(|err| anyhow::anyhow!("{}", err))
        }
        tag => {
            let rule =
                TagRule::new(tag, op, value.to_owned()).map_err(|err| anyhow::anyhow!("{}", err))?;
            if negative {
                engine.tag.negative.push(rule);
            } else {
                engine.tag.positive.push(rule);
            }
            Ok(())
        }
    }
}

/// An argsfile: `:`-prefixed lines are directives, other lines are data
/// for the most recent data-taking directive.
fn read_args_file(
    path: &PathBuf,
    config: &mut Config,
    engine: &mut MatchEngine,
    registry: &mut TagRegistry,
    inputs: &mut Vec<PathBuf>,
) -> Result<()> {
    #[derive(Copy, Clone, Eq, PartialEq)]
    enum DataTarget {
        None,
        Variations,
        Positional,
        MaterialBoth,
        Material,
        TagCriteria,
    }

    let reader =
        BufReader::new(File::open(path).with_context(|| format!("cannot open {}", path.display()))?);
    let mut target = DataTarget::None;
    let mut pending_tag_lines: Vec<String> = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim_end();
        if trimmed.is_empty() || trimmed.starts_with('%') {
            continue;
        }

        if let Some(directive) = trimmed.strip_prefix(':') {
            let directive = directive.trim();
            let (flag, value) = match directive.split_once(char::is_whitespace) {
                Some((flag, value)) => (flag, value.trim()),
                None => (directive, ""),
            };
            target = DataTarget::None;
            match flag {
                "-v" => target = DataTarget::Variations,
                "-x" => target = DataTarget::Positional,
                "-y" => target = DataTarget::MaterialBoth,
                "-z" => target = DataTarget::Material,
                "-t" => target = DataTarget::TagCriteria,
                "-D" => config.suppress_duplicates = true,
                "-U" => config.suppress_originals = true,
                "-M" => config.match_only_checkmate = true,
                "-C" => config.keep_comments = false,
                "-N" => config.keep_nags = false,
                "-V" => config.keep_variations = false,
                "-7" => config.tag_output_form = TagOutputForm::SevenTagRoster,
                "-Z" => config.use_virtual_hash_table = true,
                "-w" => config.max_line_length = value.parse().context("bad -w in argsfile")?,
                "-o" => {
                    config.output_file = Some(PathBuf::from(value));
                    config.append_output = false;
                }
                "-a" => {
                    config.output_file = Some(PathBuf::from(value));
                    config.append_output = true;
                }
                "-H" => engine
                    .positional
                    .add_hex(value)
                    .map_err(|err| anyhow::anyhow!("{}", err))?,
                "-F" => config.output_fen_string = true,
                "--fenpattern" => engine
                    .patterns
                    .add(value, false, None)
                    .map_err(|err| anyhow::anyhow!("{}", err))?,
                "--fenpatterni" => engine
                    .patterns
                    .add(value, true, None)
                    .map_err(|err| anyhow::anyhow!("{}", err))?,
                other => bail!("unsupported argsfile directive {}", other),
            }
            continue;
        }

        match target {
            DataTarget::None => inputs.push(PathBuf::from(trimmed)),
            DataTarget::Variations => {
                if let Some(variation) = TextualVariation::parse(trimmed) {
                    engine.textual.push(variation);
                }
            }
            DataTarget::Positional => engine
                .positional
                .add_move_line(trimmed)
                .map_err(|err| anyhow::anyhow!("{}", err))?,
            DataTarget::MaterialBoth => engine.material.push(
                MaterialCriteria::parse(trimmed, true).map_err(|err| anyhow::anyhow!("{}", err))?,
            ),
            DataTarget::Material => engine.material.push(
                MaterialCriteria::parse(trimmed, false).map_err(|err| anyhow::anyhow!("{}", err))?,
            ),
            DataTarget::TagCriteria => pending_tag_lines.push(trimmed.to_owned()),
        }
    }

    for line in pending_tag_lines {
        add_tag_criteria_line(&line, engine, registry)?;
    }
    Ok(())
}
