// Line-to-Record Driver
// Single forward pass over `<level> <TAG> [value]` lines. Only the current
// entity is kept in memory; each one is finalized and fanned out to the
// sinks as soon as the next boundary (or the trailer) is seen.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::config::{ID_DELIMITER, TRAILER_KEY};
use crate::entities::Entity;
use crate::error::{IngestError, Result};
use crate::record::{EntityKind, RecordBuilder};
use crate::registry::{Scope, Tag};
use crate::sink::{emit, flush_all, Sink};

// ============================================================================
// LINE TOKENIZER
// ============================================================================

/// Split a raw line into (key, value)
///
/// The key is the second whitespace separated token; the value is the rest
/// of the line, trimmed. The leading level number is skipped, not read.
/// Lines with fewer than two tokens yield `None`.
///
/// # Examples
/// ```
/// use ged_ingest::parser::parse_line;
///
/// assert_eq!(parse_line("2 DATE 15 Jan 1920\r\n"), Some(("DATE", "15 Jan 1920")));
/// assert_eq!(parse_line("0 @I1@ INDI"), Some(("@I1@", "INDI")));
/// assert_eq!(parse_line("   "), None);
/// ```
pub fn parse_line(line: &str) -> Option<(&str, &str)> {
    let rest = line.trim_start();
    let level_end = rest.find(char::is_whitespace)?;
    let rest = rest[level_end..].trim_start();
    if rest.is_empty() {
        return None;
    }

    let key_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    Some((&rest[..key_end], rest[key_end..].trim()))
}

/// `@I1@`, `@F23@`: exactly two delimiters
pub fn is_boundary_key(key: &str) -> bool {
    key.matches(ID_DELIMITER).count() == 2
}

// ============================================================================
// STATE MACHINE
// ============================================================================

#[derive(Debug)]
pub enum DriverState {
    /// Before the first entity, or inside a record type we skip
    AwaitingEntity,
    InEntity(RecordBuilder),
    /// Trailer seen; further lines are ignored
    Done,
}

/// Counters for one parse
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub lines: usize,
    pub people: usize,
    pub families: usize,
    /// Boundaries whose record type is neither INDI nor FAM
    pub skipped_records: usize,
}

/// The parser's transition function, free of any I/O
#[derive(Debug)]
pub struct Driver {
    state: DriverState,
    stats: ParseStats,
}

impl Driver {
    pub fn new() -> Self {
        Driver {
            state: DriverState::AwaitingEntity,
            stats: ParseStats::default(),
        }
    }

    pub fn state(&self) -> &DriverState {
        &self.state
    }

    pub fn stats(&self) -> ParseStats {
        self.stats
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, DriverState::Done)
    }

    /// Advance by one line
    ///
    /// Returns the entity finalized by this line, if any. Only boundary and
    /// trailer lines ever finalize.
    pub fn feed_line(&mut self, line: &str) -> Option<Entity> {
        if self.is_done() {
            return None;
        }
        self.stats.lines += 1;

        let (key, value) = parse_line(line)?;

        if key == TRAILER_KEY {
            let finished = self.finalize_open();
            self.state = DriverState::Done;
            return finished;
        }

        if is_boundary_key(key) {
            let finished = self.finalize_open();
            self.start_entity(key, value);
            return finished;
        }

        if let DriverState::InEntity(builder) = &mut self.state {
            apply_field(builder, key, value);
        }
        None
    }

    /// End of input without a trailer
    ///
    /// The open entity is still complete as far as the file goes, so it is
    /// finalized rather than dropped.
    pub fn finish(&mut self) -> Option<Entity> {
        if self.is_done() {
            return None;
        }
        let finished = self.finalize_open();
        if let Some(entity) = &finished {
            tracing::warn!(id = entity.id(), "Input ended without {} line", TRAILER_KEY);
        }
        self.state = DriverState::Done;
        finished
    }

    fn start_entity(&mut self, key: &str, record_type: &str) {
        let id = key.replace(ID_DELIMITER, "");
        self.state = match EntityKind::from_record_type(record_type) {
            Some(kind) => DriverState::InEntity(RecordBuilder::new(id, kind)),
            None => {
                tracing::debug!(id = %id, record_type, "Skipping unsupported record");
                self.stats.skipped_records += 1;
                DriverState::AwaitingEntity
            }
        };
    }

    fn finalize_open(&mut self) -> Option<Entity> {
        match std::mem::replace(&mut self.state, DriverState::AwaitingEntity) {
            DriverState::InEntity(builder) => {
                let entity = Entity::from(builder.finish());
                match entity.kind() {
                    EntityKind::Person => self.stats.people += 1,
                    EntityKind::Family => self.stats.families += 1,
                }
                Some(entity)
            }
            other => {
                self.state = other;
                None
            }
        }
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply one field line to the open entity
///
/// - unknown tag: opens a block named after it, stores nothing
/// - block-scoped tag (`DATE`, `TIME`, `PLAC`): stored in the open block
/// - any other known tag: closes the block, stored flat
pub fn apply_field(builder: &mut RecordBuilder, key: &str, value: &str) {
    let Some(tag) = Tag::from_key(key) else {
        builder.open_block(key);
        return;
    };

    if tag.scope() == Scope::Flat {
        builder.close_block();
    }
    builder.set_field(tag, tag.handler().apply(value));
}

// ============================================================================
// STREAM DRIVERS
// ============================================================================

/// Run the driver over `reader`, fanning entities out to `sinks`
///
/// Does not flush. Stops at the trailer line; anything after it is not read.
pub fn parse_stream<R: BufRead>(mut reader: R, sinks: &mut [&mut dyn Sink]) -> Result<ParseStats> {
    let mut driver = Driver::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }

        let line = String::from_utf8_lossy(&buf);
        if let Some(entity) = driver.feed_line(&line) {
            emit(sinks, &entity)?;
        }
        if driver.is_done() {
            break;
        }
    }

    if let Some(entity) = driver.finish() {
        emit(sinks, &entity)?;
    }

    let stats = driver.stats();
    tracing::info!(
        lines = stats.lines,
        people = stats.people,
        families = stats.families,
        skipped = stats.skipped_records,
        "Parse complete"
    );
    Ok(stats)
}

/// Parse `reader` and flush every sink, whatever happens
///
/// A parse error takes precedence over a flush error.
pub fn ingest<R: BufRead>(reader: R, sinks: &mut [&mut dyn Sink]) -> Result<ParseStats> {
    let parsed = parse_stream(reader, sinks);
    finish_with_flush(parsed, sinks)
}

/// Open `path` and `ingest` it; sinks are flushed even if the open fails
pub fn ingest_file(path: &Path, sinks: &mut [&mut dyn Sink]) -> Result<ParseStats> {
    let parsed = File::open(path)
        .map_err(|source| IngestError::OpenInput {
            path: path.to_path_buf(),
            source,
        })
        .and_then(|file| parse_stream(BufReader::new(file), sinks));
    finish_with_flush(parsed, sinks)
}

fn finish_with_flush(parsed: Result<ParseStats>, sinks: &mut [&mut dyn Sink]) -> Result<ParseStats> {
    let flushed = flush_all(sinks);
    let stats = parsed?;
    flushed?;
    Ok(stats)
}
