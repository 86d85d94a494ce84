use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

mod config;
mod corpus;
mod exam;
mod extract;
mod figures;
mod frequency;
mod matcher;
mod normalize;
mod resolve;
mod restructure;

use config::Config;
use corpus::{CorpusIndex, IndexStats};
use matcher::AnswerMatcher;

/// kakomon - Link exam frequency tables back to their question explanations
#[derive(Parser)]
#[command(name = "kakomon")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true, default_value = ".kakomon.toml")]
    config: PathBuf,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Attach problem text and choices to every row of the frequency table
    Link {
        /// Frequency document (defaults to the configured one)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show corpus index statistics
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show how a table answer compares with an explanation answer
    Check {
        /// Answer as written in the frequency table
        row_answer: String,

        /// Answer as written in the explanation
        candidate_answer: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Regroup the theme frequency document by how often each theme was asked
    Restructure {
        /// Input document (defaults to the configured one)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output path (defaults to rewriting the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List questions that come with a figure
    Figures {
        /// Output path (defaults to the configured listing)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the entries as JSON instead of writing the listing
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = Config::load(&cli.config).and_then(|config| match cli.command {
        Commands::Link { file, dry_run, json } => {
            cmd_link(&config, file.as_deref(), dry_run, json, cli.quiet)
        }
        Commands::Stats { json } => cmd_stats(&config, json),
        Commands::Check { row_answer, candidate_answer, json } => {
            cmd_check(&config, &row_answer, &candidate_answer, json)
        }
        Commands::Restructure { input, output } => {
            cmd_restructure(&config, input.as_deref(), output.as_deref(), cli.quiet)
        }
        Commands::Figures { output, json } => {
            cmd_figures(&config, output.as_deref(), json, cli.quiet)
        }
    });

    if let Err(e) = result {
        eprintln!("{}: {:#}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_index(config: &Config) -> Result<CorpusIndex> {
    let exclude = config.exclude_set()?;
    let documents = corpus::discover(&config.exam_dir(), &exclude)?;
    Ok(CorpusIndex::build(documents, &config.explanation_marker))
}

fn cmd_link(
    config: &Config,
    file: Option<&Path>,
    dry_run: bool,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let start = Instant::now();
    let path = file.map(Path::to_path_buf).unwrap_or_else(|| config.frequency_path());

    if !quiet && !json {
        println!("{} {}", "Linking".cyan().bold(), path.display());
    }

    let matcher = AnswerMatcher::new(config.matching).context("building answer matcher")?;
    let index = build_index(config)?;
    let report = frequency::link_file(&path, &index, &matcher, dry_run)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    if quiet {
        return Ok(());
    }

    let stats = index.stats();
    println!();
    println!("{}", "Link Report".green().bold());
    println!("  Documents indexed: {}", stats.documents_indexed.to_string().cyan());
    println!("  Records indexed:   {}", stats.records_indexed.to_string().cyan());
    println!("  Rows:              {}", report.rows.to_string().cyan());
    println!("  Matched (exact):   {}", report.matched_exact.to_string().green());
    println!("  Matched (drifted): {}", report.matched_fallback.to_string().yellow());
    println!("  Unmatched:         {}", report.unmatched.to_string().red());
    println!("  Skipped rows:      {}", report.skipped.to_string().dimmed());
    println!("  Time elapsed:      {:.2?}", start.elapsed());

    if !report.unmatched_rows.is_empty() {
        println!();
        println!("{}", "Unmatched rows".yellow().bold());
        for label in report.unmatched_rows.iter().take(20) {
            println!("  {}", label.dimmed());
        }
        if report.unmatched_rows.len() > 20 {
            println!("{}", format!("  ... and {} more", report.unmatched_rows.len() - 20).dimmed());
        }
    }

    println!();
    if dry_run {
        println!("{}", "Dry run, nothing written".yellow());
    } else {
        println!("{} {}", "Updated".green(), path.display().to_string().cyan());
    }

    Ok(())
}

#[derive(Serialize)]
struct StatsOutput<'a> {
    exams: Vec<String>,
    #[serde(flatten)]
    stats: &'a IndexStats,
}

fn cmd_stats(config: &Config, json: bool) -> Result<()> {
    let index = build_index(config)?;
    let mut exams: Vec<_> = index.exams().copied().collect();
    exams.sort();
    let stats = index.stats();

    if json {
        let output = StatsOutput {
            exams: exams.iter().map(|e| e.to_string()).collect(),
            stats,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", "Corpus Statistics".green().bold());
    println!();
    println!("  Documents seen:     {}", stats.documents_seen.to_string().cyan());
    println!("  Documents indexed:  {}", stats.documents_indexed.to_string().cyan());
    println!("  Documents skipped:  {}", stats.documents_skipped.to_string().dimmed());
    println!("  Question headings:  {}", stats.question_headings.to_string().cyan());
    println!("  Blocks discarded:   {}", stats.blocks_discarded.to_string().dimmed());
    println!("  Records indexed:    {}", stats.records_indexed.to_string().cyan());
    println!("  Question entries:   {}", stats.entries_indexed.to_string().cyan());
    println!();
    println!("{}", "Exams".green().bold());
    println!();

    for exam in exams {
        let count = index.exam_candidates(exam).len();
        let bar = "=".repeat((count / 2).min(40));
        println!("  {:>10} {:>4} {}", exam.to_string().cyan(), count, bar.dimmed());
    }

    Ok(())
}

fn cmd_check(config: &Config, row_answer: &str, candidate_answer: &str, json: bool) -> Result<()> {
    let matcher = AnswerMatcher::new(config.matching).context("building answer matcher")?;
    let comparison = matcher.compare(row_answer, candidate_answer);

    if json {
        println!("{}", serde_json::to_string_pretty(&comparison)?);
        return Ok(());
    }

    let thresholds = &comparison.thresholds;
    println!("  Row:        {}", comparison.row.cyan());
    println!("  Candidate:  {}", comparison.candidate.cyan());
    println!(
        "  {}",
        format!(
            "containment >= {:.2}, tokens >= {} chars",
            thresholds.min_containment_ratio, thresholds.min_token_chars
        )
        .dimmed()
    );
    println!();

    match comparison.rule {
        Some(rule) => println!("{} ({})", "match".green().bold(), rule),
        None => println!("{}", "no match".red().bold()),
    }

    Ok(())
}

fn cmd_restructure(
    config: &Config,
    input: Option<&Path>,
    output: Option<&Path>,
    quiet: bool,
) -> Result<()> {
    let input = input.map(Path::to_path_buf).unwrap_or_else(|| config.choice_frequency_path());
    let output = output.map(Path::to_path_buf).unwrap_or_else(|| input.clone());

    let content = fs::read_to_string(&input)
        .with_context(|| format!("reading {}", input.display()))?;
    let result = restructure::restructure(&content, config.restructure.intro_lines);
    fs::write(&output, &result.text).with_context(|| format!("writing {}", output.display()))?;

    if !quiet {
        println!("{} {}", "Wrote".green(), output.display().to_string().cyan());
        println!("  Themes: {}", result.report.themes.to_string().cyan());
        for (count, themes) in result.report.by_frequency.iter().rev() {
            println!("  {:>3} refs: {}", count, themes);
        }
    }

    Ok(())
}

fn cmd_figures(config: &Config, output: Option<&Path>, json: bool, quiet: bool) -> Result<()> {
    let exam_dir = config.exam_dir();
    let documents = corpus::discover(&exam_dir, &config.figure_exclude_set()?)?;
    let questions = figures::collect_figure_questions(&exam_dir, &documents);

    if json {
        println!("{}", serde_json::to_string_pretty(&questions)?);
        return Ok(());
    }

    let output = output.map(Path::to_path_buf).unwrap_or_else(|| config.figure_list_path());
    fs::write(&output, figures::render_listing(&questions))
        .with_context(|| format!("writing {}", output.display()))?;

    if !quiet {
        println!("{} {}", "Wrote".green(), output.display().to_string().cyan());
        println!("  Figure questions: {}", questions.len().to_string().cyan());
    }

    Ok(())
}
