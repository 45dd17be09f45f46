use rusqlite::Connection;
use std::path::Path;

use crate::config::CHUNK_SIZE;
use crate::db::{self, FamilyRow, PersonRow};
use crate::entities::{Family, Person};
use crate::error::{IngestError, Result};
use crate::sink::Sink;

/// Buffers rows and upserts them into the people / families tables
///
/// Rows are written every `chunk_size` entities of a kind and on `flush`,
/// which also closes the connection.
pub struct SqliteSink {
    conn: Option<Connection>,
    people: Vec<PersonRow>,
    families: Vec<FamilyRow>,
    chunk_size: usize,
}

impl SqliteSink {
    /// Open (or create) the database at `path` and make sure the tables exist
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        db::setup_database(&conn)?;
        Ok(SqliteSink {
            conn: Some(conn),
            people: Vec::new(),
            families: Vec::new(),
            chunk_size: CHUNK_SIZE,
        })
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Live connection; `None` after `flush`
    pub fn connection(&self) -> Option<&Connection> {
        self.conn.as_ref()
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| IngestError::SinkClosed(self.name().to_string()))
    }

    fn write_people(&mut self) -> Result<()> {
        if self.people.is_empty() {
            return Ok(());
        }
        db::insert_people(self.conn()?, &self.people)?;
        self.people.clear();
        Ok(())
    }

    fn write_families(&mut self) -> Result<()> {
        if self.families.is_empty() {
            return Ok(());
        }
        db::insert_families(self.conn()?, &self.families)?;
        self.families.clear();
        Ok(())
    }
}

impl Sink for SqliteSink {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn accept_person(&mut self, person: &Person) -> Result<()> {
        self.people.push(PersonRow::from_person(person));
        if self.people.len() >= self.chunk_size {
            self.write_people()?;
        }
        Ok(())
    }

    fn accept_family(&mut self, family: &Family) -> Result<()> {
        self.families.push(FamilyRow::from_family(family));
        if self.families.len() >= self.chunk_size {
            self.write_families()?;
        }
        Ok(())
    }

    fn on_discard_existing_output(&mut self) -> Result<()> {
        self.people.clear();
        self.families.clear();
        db::clear_entity_tables(self.conn()?)
    }

    fn flush(&mut self) -> Result<()> {
        // both batches are attempted and the connection closed; first error wins
        let people = self.write_people();
        let families = self.write_families();

        let closed = match self.conn.take() {
            Some(conn) => conn.close().map_err(|(_, e)| IngestError::Sqlite(e)),
            None => Ok(()),
        };
        people.and(families).and(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ingest;
    use std::io::Cursor;

    fn family_file(n: usize) -> String {
        let mut s = String::from("0 HEAD\n");
        for i in 1..=n {
            s.push_str(&format!("0 @I{i}@ INDI\n2 GIVN P{i}\n1 FAMS @F{i}@\n"));
            s.push_str(&format!("0 @F{i}@ FAM\n1 HUSB @I{i}@\n"));
        }
        s.push_str("0 TRLR\n");
        s
    }

    fn run(sink: &mut SqliteSink, input: &str) {
        let mut sinks: Vec<&mut dyn Sink> = vec![sink];
        ingest(Cursor::new(input.to_string()), &mut sinks).unwrap();
    }

    #[test]
    fn test_rows_written_on_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.sqlite");

        let mut sink = SqliteSink::open(&path).unwrap();
        run(&mut sink, &family_file(3));
        assert!(sink.connection().is_none(), "flush closes the connection");

        let conn = Connection::open(&path).unwrap();
        assert_eq!(db::count_people(&conn).unwrap(), 3);
        assert_eq!(db::count_families(&conn).unwrap(), 3);
    }

    #[test]
    fn test_batches_written_before_flush() {
        let mut sink = SqliteSink::from_connection(Connection::open_in_memory().unwrap())
            .unwrap()
            .with_chunk_size(2);

        let input = family_file(5);
        let mut driver = crate::parser::Driver::new();
        for line in input.lines() {
            if let Some(entity) = driver.feed_line(line) {
                let mut sinks: Vec<&mut dyn Sink> = vec![&mut sink];
                crate::sink::emit(&mut sinks, &entity).unwrap();
            }
        }

        // 5 of each seen, two full batches written, one row of each pending
        let conn = sink.connection().unwrap();
        assert_eq!(db::count_people(conn).unwrap(), 4);
        assert_eq!(db::count_families(conn).unwrap(), 4);
    }

    #[test]
    fn test_replace_clears_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.sqlite");

        let mut first = SqliteSink::open(&path).unwrap();
        run(&mut first, &family_file(4));

        let mut second = SqliteSink::open(&path).unwrap();
        second.on_discard_existing_output().unwrap();
        run(&mut second, &family_file(2));

        let conn = Connection::open(&path).unwrap();
        assert_eq!(db::count_people(&conn).unwrap(), 2);
    }

    #[test]
    fn test_append_upserts_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.sqlite");

        for _ in 0..2 {
            let mut sink = SqliteSink::open(&path).unwrap();
            run(&mut sink, &family_file(3));
        }

        let conn = Connection::open(&path).unwrap();
        assert_eq!(db::count_people(&conn).unwrap(), 3);
    }

    #[test]
    fn test_failed_people_batch_still_writes_families() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.sqlite");

        let mut sink = SqliteSink::open(&path).unwrap();
        let mut driver = crate::parser::Driver::new();
        for line in family_file(1).lines() {
            if let Some(entity) = driver.feed_line(line) {
                let mut sinks: Vec<&mut dyn Sink> = vec![&mut sink];
                crate::sink::emit(&mut sinks, &entity).unwrap();
            }
        }

        // a people table that rejects every insert
        sink.connection()
            .unwrap()
            .execute_batch(
                "DROP TABLE people;
                 CREATE TABLE people (id INTEGER CHECK (id < 0));",
            )
            .unwrap();

        assert!(sink.flush().is_err());
        assert!(sink.connection().is_none());

        let conn = Connection::open(&path).unwrap();
        assert_eq!(db::count_families(&conn).unwrap(), 1);
    }

    #[test]
    fn test_use_after_flush_is_an_error() {
        let mut sink = SqliteSink::from_connection(Connection::open_in_memory().unwrap()).unwrap();
        sink.flush().unwrap();
        assert!(matches!(
            sink.on_discard_existing_output(),
            Err(IngestError::SinkClosed(_))
        ));
    }
}
