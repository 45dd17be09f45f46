use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::config::{CHUNK_SIZE, NULL_STRING};
use crate::entities::{Family, Person};
use crate::error::{IngestError, Result};
use crate::sink::Sink;

/// Family-only CSV: `FamilyId,HusbandId,WifeId,day-month-year`
///
/// Appends to the file (no header). People are ignored.
pub struct FamilyCsvSink {
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
    rows: Vec<[String; 4]>,
    chunk_size: usize,
}

fn csv_writer(file: File) -> csv::Writer<File> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file)
}

impl FamilyCsvSink {
    /// Open `path` for appending, creating it if needed
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(FamilyCsvSink {
            path: path.to_path_buf(),
            writer: Some(csv_writer(file)),
            rows: Vec::new(),
            chunk_size: CHUNK_SIZE,
        })
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn family_row(family: &Family) -> [String; 4] {
        [
            family.id().to_string(),
            family.husband_id().unwrap_or(NULL_STRING).to_string(),
            family.wife_id().unwrap_or(NULL_STRING).to_string(),
            family.marriage().dashed(NULL_STRING),
        ]
    }

    fn write_rows(&mut self) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| IngestError::SinkClosed("family_csv".to_string()))?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        self.rows.clear();
        Ok(())
    }
}

impl Sink for FamilyCsvSink {
    fn name(&self) -> &str {
        "family_csv"
    }

    fn accept_person(&mut self, _person: &Person) -> Result<()> {
        Ok(())
    }

    fn accept_family(&mut self, family: &Family) -> Result<()> {
        self.rows.push(Self::family_row(family));
        if self.rows.len() >= self.chunk_size {
            self.write_rows()?;
        }
        Ok(())
    }

    /// Truncate the file; rows buffered so far are dropped with it
    fn on_discard_existing_output(&mut self) -> Result<()> {
        self.rows.clear();
        self.writer = None;
        let file = File::create(&self.path)?;
        self.writer = Some(csv_writer(file));
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let written = if self.rows.is_empty() {
            Ok(())
        } else {
            self.write_rows()
        };
        // dropping the writer closes the file
        self.writer = None;
        written
    }
}
