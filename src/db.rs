// Storage layer - SQLite schema, batched upserts and read-back queries
//
// Ids in the tables are integers: the textual id with every non-digit
// removed ("I0042" → 42). Re-ingesting a file replaces rows by id, so a
// second run over the same input leaves the row counts unchanged.

use rusqlite::{params, params_from_iter, Connection, Row};

use crate::config::LIST_SEPARATOR;
use crate::entities::{Family, Person};
use crate::error::Result;
use crate::handlers::{force_int, PartialDate};

// ============================================================================
// SCHEMA
// ============================================================================

const CREATE_TABLE_PEOPLE: &str = r#"CREATE TABLE IF NOT EXISTS "main"."people" (
    "id" INTEGER PRIMARY KEY NOT NULL,
    "firstname" TEXT NOT NULL,
    "surname" TEXT NOT NULL,
    "married_name" TEXT,
    "aliases" TEXT,
    "given_names" TEXT,
    "is_male" TINYINT NOT NULL,
    "note" TEXT,
    "childhood_family_id" INTEGER,
    "last_updated" INTEGER,
    "birth_place" TEXT,
    "death_place" TEXT,
    "burial_place" TEXT,

    "birth_date_day" INTEGER,
    "birth_date_month" INTEGER,
    "birth_date_year" INTEGER,

    "death_date_day" INTEGER,
    "death_date_month" INTEGER,
    "death_date_year" INTEGER,

    "burial_date_day" INTEGER,
    "burial_date_month" INTEGER,
    "burial_date_year" INTEGER
)"#;

const CREATE_TABLE_FAMILIES: &str = r#"CREATE TABLE IF NOT EXISTS "main"."families" (
    "id" INTEGER PRIMARY KEY NOT NULL,
    "husband_id" INTEGER NOT NULL,
    "wife_id" INTEGER NOT NULL,
    "marriage_day" INTEGER,
    "marriage_month" INTEGER,
    "marriage_year" INTEGER,
    "marriage_place" TEXT,
    "note" TEXT
)"#;

const CREATE_TABLE_HASH: &str = r#"CREATE TABLE IF NOT EXISTS "main"."hash" (
    "date_unix_epoch" INTEGER NOT NULL,
    "source" TEXT PRIMARY KEY NOT NULL,
    "hash" TEXT NOT NULL
)"#;

const INSERT_PERSON: &str = "INSERT OR REPLACE INTO people VALUES (
    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
    ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22
)";

const INSERT_FAMILY: &str = "INSERT OR REPLACE INTO families VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(CREATE_TABLE_PEOPLE, [])?;
    conn.execute(CREATE_TABLE_FAMILIES, [])?;
    conn.execute(CREATE_TABLE_HASH, [])?;

    // ==========================================================================
    // Indexes (descendant walks join on these)
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_people_childhood_family ON people(childhood_family_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_families_husband ON families(husband_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_families_wife ON families(wife_id)",
        [],
    )?;

    Ok(())
}

/// Drop all people and families (the hash table is kept)
pub fn clear_entity_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch("DROP TABLE IF EXISTS people; DROP TABLE IF EXISTS families;")?;
    setup_database(conn)
}

// ============================================================================
// ROWS
// ============================================================================

/// One `people` row, flattened from a `Person`
#[derive(Debug, Clone, PartialEq)]
pub struct PersonRow {
    pub id: i64,
    pub firstname: String,
    pub surname: String,
    pub married_name: String,
    pub aliases: String,
    pub given_names: String,
    pub is_male: bool,
    pub note: String,
    pub childhood_family_id: Option<i64>,
    /// Unix seconds
    pub last_updated: Option<i64>,
    pub birth_place: String,
    pub death_place: String,
    pub burial_place: String,
    pub birth: PartialDate,
    pub death: PartialDate,
    pub burial: PartialDate,
}

impl PersonRow {
    pub fn from_person(person: &Person) -> Self {
        PersonRow {
            id: force_int(person.id()),
            firstname: person.first_name().to_string(),
            surname: person.surname().to_string(),
            married_name: person.married_name().to_string(),
            aliases: person.aliases().join(LIST_SEPARATOR),
            given_names: person.given_names().join(LIST_SEPARATOR),
            is_male: person.is_male(),
            note: person.note().to_string(),
            childhood_family_id: person.childhood_family_id().map(force_int),
            last_updated: person.last_updated().map(|t| t.and_utc().timestamp()),
            birth_place: person.birth_place().to_string(),
            death_place: person.death_place().to_string(),
            burial_place: person.burial_place().to_string(),
            birth: person.birth(),
            death: person.death(),
            burial: person.burial(),
        }
    }
}

/// One `families` row, flattened from a `Family`
#[derive(Debug, Clone, PartialEq)]
pub struct FamilyRow {
    pub id: i64,
    /// 0 when the family has no husband line
    pub husband_id: i64,
    pub wife_id: i64,
    pub marriage: PartialDate,
    pub marriage_place: Option<String>,
    pub note: String,
}

impl FamilyRow {
    pub fn from_family(family: &Family) -> Self {
        FamilyRow {
            id: force_int(family.id()),
            husband_id: family.husband_id().map(force_int).unwrap_or(0),
            wife_id: family.wife_id().map(force_int).unwrap_or(0),
            marriage: family.marriage(),
            marriage_place: family.marriage_place().map(str::to_string),
            note: family.note().to_string(),
        }
    }
}

// ============================================================================
// WRITES
// ============================================================================

/// Upsert a batch of people in one transaction
pub fn insert_people(conn: &Connection, rows: &[PersonRow]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare_cached(INSERT_PERSON)?;
        for p in rows {
            stmt.execute(params![
                p.id,
                p.firstname,
                p.surname,
                p.married_name,
                p.aliases,
                p.given_names,
                p.is_male as i64,
                p.note,
                p.childhood_family_id,
                p.last_updated,
                p.birth_place,
                p.death_place,
                p.burial_place,
                p.birth.day,
                p.birth.month,
                p.birth.year,
                p.death.day,
                p.death.month,
                p.death.year,
                p.burial.day,
                p.burial.month,
                p.burial.year,
            ])?;
        }
    }
    tx.commit()?;

    tracing::debug!(count = rows.len(), "Wrote people batch");
    Ok(rows.len())
}

/// Upsert a batch of families in one transaction
pub fn insert_families(conn: &Connection, rows: &[FamilyRow]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare_cached(INSERT_FAMILY)?;
        for f in rows {
            stmt.execute(params![
                f.id,
                f.husband_id,
                f.wife_id,
                f.marriage.day,
                f.marriage.month,
                f.marriage.year,
                f.marriage_place,
                f.note,
            ])?;
        }
    }
    tx.commit()?;

    tracing::debug!(count = rows.len(), "Wrote families batch");
    Ok(rows.len())
}

// ============================================================================
// SOURCE HASHES
// ============================================================================

/// Hash recorded for `source` by the last successful ingest
pub fn last_hash(conn: &Connection, source: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT hash FROM hash WHERE source = ?1 LIMIT 1")?;
    let mut rows = stmt.query_map([source], |row| row.get::<_, String>(0))?;
    let hash = rows.next().transpose()?;
    Ok(hash)
}

pub fn set_last_hash(conn: &Connection, source: &str, hash: &str) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    conn.execute(
        "INSERT OR REPLACE INTO hash VALUES (?1, ?2, ?3)",
        params![now, source, hash],
    )?;
    Ok(())
}

// ============================================================================
// READS
// ============================================================================

/// Just enough of a person for descendant listings
#[derive(Debug, Clone, PartialEq)]
pub struct PersonSummary {
    pub id: i64,
    pub firstname: String,
    pub surname: String,
    pub married_name: Option<String>,
    pub childhood_family_id: Option<i64>,
    pub birth: PartialDate,
}

impl PersonSummary {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(PersonSummary {
            id: row.get(0)?,
            firstname: row.get(1)?,
            surname: row.get(2)?,
            married_name: row.get(3)?,
            childhood_family_id: row.get(4)?,
            birth: PartialDate::new(row.get(5)?, row.get(6)?, row.get(7)?),
        })
    }
}

const SUMMARY_COLUMNS: &str = "id, firstname, surname, married_name, childhood_family_id, \
     birth_date_day, birth_date_month, birth_date_year";

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

pub fn get_people_by_id(conn: &Connection, ids: &[i64]) -> Result<Vec<PersonSummary>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "SELECT {} FROM people WHERE id IN ({}) ORDER BY id",
        SUMMARY_COLUMNS,
        placeholders(ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let people = stmt
        .query_map(params_from_iter(ids), PersonSummary::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(people)
}

/// Children of any family headed by one of `parent_ids`
pub fn get_children_by_parents(conn: &Connection, parent_ids: &[i64]) -> Result<Vec<PersonSummary>> {
    if parent_ids.is_empty() {
        return Ok(Vec::new());
    }

    let marks = placeholders(parent_ids.len());
    let sql = format!(
        "SELECT {} FROM people
         WHERE childhood_family_id IN (
            SELECT id FROM families
            WHERE husband_id IN ({marks}) OR wife_id IN ({marks})
         )
         ORDER BY id",
        SUMMARY_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let params = parent_ids.iter().chain(parent_ids.iter());
    let children = stmt
        .query_map(params_from_iter(params), PersonSummary::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(children)
}

/// One spouse's side of a `FamilyReport`
#[derive(Debug, Clone, PartialEq)]
pub struct SpouseDetails {
    pub firstname: String,
    pub surname: String,
    pub birth: PartialDate,
    pub birth_place: Option<String>,
    pub death: PartialDate,
    pub death_place: Option<String>,
}

impl SpouseDetails {
    fn from_row(row: &Row, at: usize) -> rusqlite::Result<Self> {
        Ok(SpouseDetails {
            firstname: row.get(at)?,
            surname: row.get(at + 1)?,
            birth: PartialDate::new(row.get(at + 2)?, row.get(at + 3)?, row.get(at + 4)?),
            birth_place: row.get(at + 5)?,
            death: PartialDate::new(row.get(at + 6)?, row.get(at + 7)?, row.get(at + 8)?),
            death_place: row.get(at + 9)?,
        })
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.firstname.clone(),
            self.surname.clone(),
            self.birth.dashed("None"),
            self.birth_place.clone().unwrap_or_default(),
            self.death.dashed("None"),
            self.death_place.clone().unwrap_or_default(),
        ]
    }
}

/// A family joined with both spouses
#[derive(Debug, Clone, PartialEq)]
pub struct FamilyReport {
    pub mrin: i64,
    pub husband_id: i64,
    pub wife_id: i64,
    pub marriage: PartialDate,
    pub husband: SpouseDetails,
    pub wife: SpouseDetails,
}

impl FamilyReport {
    pub fn row_header(sep: &str) -> String {
        [
            "mrin",
            "husband_id",
            "wife_id",
            "marriage_date",
            "husband_name",
            "husband_surname",
            "husband_birth_date",
            "husband_birth_place",
            "husband_death_date",
            "husband_death_place",
            "wife_name",
            "wife_surname",
            "wife_birth_date",
            "wife_birth_place",
            "wife_death_date",
            "wife_death_place",
        ]
        .join(sep)
    }

    /// Values in `row_header` order
    pub fn row(&self, sep: &str) -> String {
        let mut cells = vec![
            self.mrin.to_string(),
            self.husband_id.to_string(),
            self.wife_id.to_string(),
            self.marriage.dashed("None"),
        ];
        cells.extend(self.husband.cells());
        cells.extend(self.wife.cells());
        cells.join(sep)
    }
}

/// Every family whose husband and wife are both known people
pub fn get_family_reports(conn: &Connection) -> Result<Vec<FamilyReport>> {
    let mut stmt = conn.prepare(
        "SELECT
            f.id, f.husband_id, f.wife_id,
            f.marriage_day, f.marriage_month, f.marriage_year,
            ph.firstname, ph.surname,
            ph.birth_date_day, ph.birth_date_month, ph.birth_date_year, ph.birth_place,
            ph.death_date_day, ph.death_date_month, ph.death_date_year, ph.death_place,
            pw.firstname, pw.surname,
            pw.birth_date_day, pw.birth_date_month, pw.birth_date_year, pw.birth_place,
            pw.death_date_day, pw.death_date_month, pw.death_date_year, pw.death_place
         FROM families AS f
         JOIN people AS ph ON f.husband_id = ph.id
         JOIN people AS pw ON f.wife_id = pw.id
         ORDER BY f.id",
    )?;

    let reports = stmt
        .query_map([], |row| {
            Ok(FamilyReport {
                mrin: row.get(0)?,
                husband_id: row.get(1)?,
                wife_id: row.get(2)?,
                marriage: PartialDate::new(row.get(3)?, row.get(4)?, row.get(5)?),
                husband: SpouseDetails::from_row(row, 6)?,
                wife: SpouseDetails::from_row(row, 16)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(reports)
}

pub fn count_people(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM people", [], |row| row.get(0))?;
    Ok(count)
}

pub fn count_families(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM families", [], |row| row.get(0))?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Entity;
    use crate::parser::Driver;

    /// Parse a small file without sinks and return its entities
    fn entities(input: &str) -> Vec<Entity> {
        let mut driver = Driver::new();
        let mut out: Vec<Entity> = input.lines().filter_map(|l| driver.feed_line(l)).collect();
        out.extend(driver.finish());
        out
    }

    const TREE: &str = "\
0 @I1@ INDI
2 GIVN Tom
2 SURN Hart
1 BIRT
2 DATE 1 Feb 1800
2 PLAC Derby
1 DEAT
2 DATE 1870
0 @I2@ INDI
2 GIVN Jane
2 SURN Hart
1 SEX F
0 @I3@ INDI
2 GIVN Sam
2 SURN Hart
1 FAMC @F1@
1 BIRT
2 DATE Mar 1830
0 @I4@ INDI
2 GIVN Lucy
1 FAMC @F1@
0 @F1@ FAM
1 HUSB @I1@
1 WIFE @I2@
1 MARR
2 DATE 1825
1 CHIL @I3@
1 CHIL @I4@
0 TRLR
";

    fn load(conn: &Connection, input: &str) {
        let mut people = Vec::new();
        let mut families = Vec::new();
        for entity in entities(input) {
            match entity {
                Entity::Person(p) => people.push(PersonRow::from_person(&p)),
                Entity::Family(f) => families.push(FamilyRow::from_family(&f)),
            }
        }
        insert_people(conn, &people).unwrap();
        insert_families(conn, &families).unwrap();
    }

    #[test]
    fn test_person_row_flattening() {
        let input = "\
0 @I0042@ INDI
2 GIVN Ann  Beth
2 SURN ROSE
1 SEX F
1 _AKA Nan
1 _AKA Annie
1 FAMC @F7@
1 CHAN
2 DATE 1 Jan 1970
3 TIME 00:01:40
";
        let person = entities(input).remove(0);
        let row = PersonRow::from_person(person.as_person().unwrap());

        assert_eq!(row.id, 42);
        assert_eq!(row.firstname, "Ann");
        assert_eq!(row.given_names, "Ann|Beth");
        assert_eq!(row.aliases, "Nan|Annie");
        assert_eq!(row.surname, "Rose");
        assert_eq!(row.married_name, "Rose");
        assert!(!row.is_male);
        assert_eq!(row.childhood_family_id, Some(7));
        assert_eq!(row.last_updated, Some(100));
    }

    #[test]
    fn test_family_row_missing_spouse_is_zero() {
        let family = entities("0 @F3@ FAM\n1 WIFE @I9@\n").remove(0);
        let row = FamilyRow::from_family(family.as_family().unwrap());
        assert_eq!(row.id, 3);
        assert_eq!(row.husband_id, 0);
        assert_eq!(row.wife_id, 9);
        assert_eq!(row.marriage_place, None);
    }

    #[test]
    fn test_reinsert_is_upsert() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        load(&conn, TREE);
        load(&conn, TREE);

        assert_eq!(count_people(&conn).unwrap(), 4);
        assert_eq!(count_families(&conn).unwrap(), 1);
    }

    #[test]
    fn test_clear_entity_tables_keeps_hashes() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        load(&conn, TREE);
        set_last_hash(&conn, "tree.ged", "abc").unwrap();

        clear_entity_tables(&conn).unwrap();

        assert_eq!(count_people(&conn).unwrap(), 0);
        assert_eq!(count_families(&conn).unwrap(), 0);
        assert_eq!(last_hash(&conn, "tree.ged").unwrap(), Some("abc".to_string()));
    }

    #[test]
    fn test_hash_bookkeeping() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        assert_eq!(last_hash(&conn, "a.ged").unwrap(), None);
        set_last_hash(&conn, "a.ged", "111").unwrap();
        set_last_hash(&conn, "a.ged", "222").unwrap();
        assert_eq!(last_hash(&conn, "a.ged").unwrap(), Some("222".to_string()));
        assert_eq!(last_hash(&conn, "b.ged").unwrap(), None);
    }

    #[test]
    fn test_people_and_children_queries() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        load(&conn, TREE);

        let people = get_people_by_id(&conn, &[1, 2]).unwrap();
        assert_eq!(people.len(), 2);
        assert_eq!(people[0].firstname, "Tom");
        assert_eq!(people[0].birth, PartialDate::new(Some(1), Some(2), Some(1800)));

        let kids = get_children_by_parents(&conn, &[2]).unwrap();
        let names: Vec<&str> = kids.iter().map(|k| k.firstname.as_str()).collect();
        assert_eq!(names, vec!["Sam", "Lucy"]);
        assert_eq!(kids[0].childhood_family_id, Some(1));
        assert_eq!(kids[0].birth, PartialDate::new(None, Some(3), Some(1830)));

        assert!(get_children_by_parents(&conn, &[3]).unwrap().is_empty());
        assert!(get_people_by_id(&conn, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_family_reports() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        load(&conn, TREE);

        let reports = get_family_reports(&conn).unwrap();
        assert_eq!(reports.len(), 1);

        let r = &reports[0];
        assert_eq!(r.mrin, 1);
        assert_eq!(r.husband.firstname, "Tom");
        assert_eq!(r.husband.birth_place.as_deref(), Some("Derby"));
        assert_eq!(r.husband.death, PartialDate::new(None, None, Some(1870)));
        assert_eq!(r.wife.firstname, "Jane");

        let header = FamilyReport::row_header("\t");
        let row = r.row("\t");
        assert_eq!(header.split('\t').count(), row.split('\t').count());
        assert!(row.starts_with("1\t1\t2\tNone-None-1825\tTom\tHart\t1-2-1800\tDerby"));
    }
}
