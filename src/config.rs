// Configuration constants shared by the parser, sinks and CLI

/// Number of rows a batching sink holds before writing them out.
pub const CHUNK_SIZE: usize = 100;

/// Read size used when hashing an input file.
pub const HASH_BLOCK_SIZE: usize = 5000;

/// Suffix appended to an input path to name its cached database.
pub const DATABASE_SUFFIX: &str = ".sqlite";

/// Key that ends the record stream.
pub const TRAILER_KEY: &str = "TRLR";

/// Delimiter wrapping record identifiers (`@I1@`).
pub const ID_DELIMITER: char = '@';

/// Placeholder written to CSV output for absent values.
pub const NULL_STRING: &str = "None";

/// Separator used when a list is flattened into one SQL column.
pub const LIST_SEPARATOR: &str = "|";

/// File extensions recognized by input discovery.
pub const INPUT_EXTENSIONS: [&str; 2] = ["paf", "ged"];

/// Path of the database cached next to `input`.
///
/// # Examples
/// ```
/// use ged_ingest::config::database_path_for;
/// use std::path::Path;
///
/// assert_eq!(
///     database_path_for(Path::new("family.ged")),
///     Path::new("family.ged.sqlite")
/// );
/// ```
pub fn database_path_for(input: &std::path::Path) -> std::path::PathBuf {
    let mut name = input.as_os_str().to_os_string();
    name.push(DATABASE_SUFFIX);
    std::path::PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_database_path_keeps_original_extension() {
        let db = database_path_for(Path::new("/data/tree.paf"));
        assert_eq!(db, Path::new("/data/tree.paf.sqlite"));
    }
}
