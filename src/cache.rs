// Cache invalidation - re-parse an input only when its bytes change
//
// Each input gets a database next to it (`family.ged` → `family.ged.sqlite`)
// whose `hash` table remembers the digest of the file it was built from.

use rusqlite::Connection;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::config::{database_path_for, HASH_BLOCK_SIZE};
use crate::db;
use crate::error::{IngestError, Result};
use crate::parser::{ingest_file, ParseStats};
use crate::sink::Sink;
use crate::sinks::SqliteSink;

/// SHA-256 of a file's contents, as lowercase hex
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|source| IngestError::OpenInput {
        path: path.to_path_buf(),
        source,
    })?;

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_BLOCK_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Outcome of `ensure_database`
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStatus {
    pub database: PathBuf,
    /// Present when the input had changed and was parsed again
    pub reparsed: Option<ParseStats>,
}

/// Make sure the database next to `input` reflects its current contents
pub fn ensure_database(input: &Path) -> Result<CacheStatus> {
    let database = database_path_for(input);
    let source = input.to_string_lossy().to_string();
    let current = hash_file(input)?;

    let previous = {
        let conn = Connection::open(&database)?;
        db::setup_database(&conn)?;
        db::last_hash(&conn, &source)?
    };

    if previous.as_deref() == Some(current.as_str()) {
        tracing::info!(input = %input.display(), "Database up to date, skipping parse");
        return Ok(CacheStatus {
            database,
            reparsed: None,
        });
    }

    tracing::info!(input = %input.display(), "Input changed since last read, parsing");
    let mut sink = SqliteSink::open(&database)?;
    let stats = {
        let mut sinks: Vec<&mut dyn Sink> = vec![&mut sink];
        ingest_file(input, &mut sinks)?
    };

    let conn = Connection::open(&database)?;
    db::set_last_hash(&conn, &source, &current)?;

    Ok(CacheStatus {
        database,
        reparsed: Some(stats),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TREE: &str = "0 HEAD\n0 @I1@ INDI\n2 GIVN Ada\n0 @I2@ INDI\n2 GIVN Bob\n0 TRLR\n";

    #[test]
    fn test_hash_file_is_stable_and_content_based() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.ged");
        let b = dir.path().join("b.ged");
        std::fs::write(&a, TREE).unwrap();
        std::fs::write(&b, TREE).unwrap();

        let ha = hash_file(&a).unwrap();
        assert_eq!(ha.len(), 64, "SHA-256 hash should be 64 hex characters");
        assert_eq!(ha, hash_file(&b).unwrap());

        std::fs::write(&b, format!("{TREE}\n")).unwrap();
        assert_ne!(ha, hash_file(&b).unwrap());
    }

    #[test]
    fn test_ensure_database_parses_only_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("tree.ged");
        std::fs::write(&input, TREE).unwrap();

        let first = ensure_database(&input).unwrap();
        assert_eq!(first.database, dir.path().join("tree.ged.sqlite"));
        assert_eq!(first.reparsed.map(|s| s.people), Some(2));

        let second = ensure_database(&input).unwrap();
        assert_eq!(second.reparsed, None);

        std::fs::write(&input, TREE.replace("Bob", "Rob")).unwrap();
        let third = ensure_database(&input).unwrap();
        assert!(third.reparsed.is_some());

        let conn = Connection::open(&third.database).unwrap();
        assert_eq!(db::count_people(&conn).unwrap(), 2);
        let people = db::get_people_by_id(&conn, &[2]).unwrap();
        assert_eq!(people[0].firstname, "Rob");
    }

    #[test]
    fn test_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = ensure_database(&dir.path().join("nope.ged")).unwrap_err();
        assert!(matches!(err, IngestError::OpenInput { .. }));
    }
}
