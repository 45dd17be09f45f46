// Command-line interface - convert, traverse and pioneer
// Thin layer over the library: every command either feeds sinks or reads
// the cached database next to the input.

use std::collections::HashSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rusqlite::Connection;

use crate::cache::ensure_database;
use crate::config::{INPUT_EXTENSIONS, NULL_STRING};
use crate::db::{self, FamilyReport, PersonSummary};
use crate::error::IngestError;
use crate::handlers::force_int;
use crate::parser::ingest_file;
use crate::sink::{discard_existing_output, Sink};
use crate::sinks::{FamilyCsvSink, PrintSink, SqliteSink};

/// Read GEDCOM / PAF genealogy files and convert them to other formats.
#[derive(Parser)]
#[command(name = "ged-ingest")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Input .ged (.paf) file. If not given the current directory is searched.
    #[arg(long, global = true)]
    pub input: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert the input file to various formats
    Convert(ConvertArgs),

    /// Print all descendants of the given people
    Traverse {
        /// File of person ids, one per line
        #[arg(long)]
        ids: PathBuf,
    },

    /// Print every family as tab separated values
    Pioneer,
}

#[derive(Args, Default)]
pub struct ConvertArgs {
    /// Remove data in output files (if any) rather than append. DESTROYS DATA.
    #[arg(short, long)]
    pub replace: bool,

    /// Print records as JSON to stdout (default when nothing else is chosen)
    #[arg(long)]
    pub to_print: bool,

    /// Upsert people and families into a SQLite database
    #[arg(long, value_name = "PATH")]
    pub to_sqlite: Option<PathBuf>,

    /// Append family rows to a CSV file
    #[arg(long, value_name = "PATH")]
    pub to_family_csv: Option<PathBuf>,
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let input = match cli.input {
        Some(path) => path,
        None => {
            let cwd = std::env::current_dir().context("Failed to read current directory")?;
            println!(
                "🔍 Data file not specified, searching {} for .ged & .paf files",
                cwd.display()
            );
            let found = discover_input(&cwd)?;
            println!("✓ Using data file {}", found.display());
            found
        }
    };

    match cli.command {
        Some(Commands::Convert(args)) => convert_command(&input, &args),
        Some(Commands::Traverse { ids }) => traverse_command(&input, &ids),
        Some(Commands::Pioneer) => pioneer_command(&input),
        None => convert_command(&input, &ConvertArgs::default()),
    }
}

/// Find the single `.ged` / `.paf` file in `dir`
pub fn discover_input(dir: &Path) -> crate::error::Result<PathBuf> {
    let mut found: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| INPUT_EXTENSIONS.contains(&ext))
        })
        .collect();
    found.sort();

    match found.len() {
        0 => Err(IngestError::Discovery(format!(
            "no data files in {}, try --input my_file.ged",
            dir.display()
        ))),
        1 => Ok(found.remove(0)),
        n => Err(IngestError::Discovery(format!(
            "found {} data files, pick one, for example --input {}",
            n,
            found[0].display()
        ))),
    }
}

// ============================================================================
// CONVERT
// ============================================================================

fn convert_command(input: &Path, args: &ConvertArgs) -> Result<()> {
    let mut print = (args.to_print || (args.to_sqlite.is_none() && args.to_family_csv.is_none()))
        .then(PrintSink::stdout);
    let mut sqlite = args
        .to_sqlite
        .as_deref()
        .map(SqliteSink::open)
        .transpose()
        .context("Failed to open SQLite output")?;
    let mut family_csv = args
        .to_family_csv
        .as_deref()
        .map(FamilyCsvSink::open)
        .transpose()
        .context("Failed to open family CSV output")?;

    let mut sinks: Vec<&mut dyn Sink> = Vec::new();
    if let Some(sink) = print.as_mut() {
        sinks.push(sink);
    }
    if let Some(sink) = sqlite.as_mut() {
        sinks.push(sink);
    }
    if let Some(sink) = family_csv.as_mut() {
        sinks.push(sink);
    }

    if args.replace {
        discard_existing_output(&mut sinks).context("Failed to clear existing output")?;
    }

    let stats = ingest_file(input, &mut sinks)
        .with_context(|| format!("Failed to convert {}", input.display()))?;

    tracing::info!(
        people = stats.people,
        families = stats.families,
        "Conversion finished"
    );

    Ok(())
}

// ============================================================================
// TRAVERSE
// ============================================================================

fn traverse_command(input: &Path, ids_file: &Path) -> Result<()> {
    let ids = read_ids(ids_file)?;
    if ids.is_empty() {
        return Ok(());
    }

    let status = ensure_database(input)
        .with_context(|| format!("Failed to prepare database for {}", input.display()))?;
    let conn = Connection::open(&status.database)?;

    let stdout = io::stdout();
    traverse(&conn, &ids, &mut stdout.lock())?;
    Ok(())
}

/// Non-blank lines of `path` as numeric person ids
fn read_ids(path: &Path) -> Result<Vec<i64>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read ids from {}", path.display()))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(force_int)
        .collect())
}

fn traverse_row(person: &PersonSummary) -> String {
    format!(
        "{},{},{},{},{},{}",
        person.id,
        person.firstname,
        person.surname,
        person.married_name.as_deref().unwrap_or(NULL_STRING),
        person
            .childhood_family_id
            .map_or_else(|| NULL_STRING.to_string(), |id| id.to_string()),
        person.birth.dashed(NULL_STRING),
    )
}

/// Write the given people, then every descendant generation by generation
///
/// Returns the number of rows written. A person is written at most once.
pub fn traverse<W: Write>(conn: &Connection, ids: &[i64], out: &mut W) -> Result<usize> {
    let mut seen: HashSet<i64> = HashSet::new();
    let mut written = 0;

    for person in db::get_people_by_id(conn, ids)? {
        seen.insert(person.id);
        writeln!(out, "{}", traverse_row(&person))?;
        written += 1;
    }

    let mut generation: Vec<i64> = ids.to_vec();
    while !generation.is_empty() {
        let children = db::get_children_by_parents(conn, &generation)?;
        generation = Vec::new();

        for child in children {
            if !seen.insert(child.id) {
                continue;
            }
            writeln!(out, "{}", traverse_row(&child))?;
            written += 1;
            generation.push(child.id);
        }
    }

    Ok(written)
}

// ============================================================================
// PIONEER
// ============================================================================

fn pioneer_command(input: &Path) -> Result<()> {
    let status = ensure_database(input)
        .with_context(|| format!("Failed to prepare database for {}", input.display()))?;
    let conn = Connection::open(&status.database)?;

    let stdout = io::stdout();
    pioneer(&conn, &mut stdout.lock())?;
    Ok(())
}

/// Write a TSV header and one row per family; nothing when there are none
pub fn pioneer<W: Write>(conn: &Connection, out: &mut W) -> Result<usize> {
    let reports = db::get_family_reports(conn)?;
    if reports.is_empty() {
        return Ok(0);
    }

    writeln!(out, "{}", FamilyReport::row_header("\t"))?;
    for report in &reports {
        writeln!(out, "{}", report.row("\t"))?;
    }
    Ok(reports.len())
}
