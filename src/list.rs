// Genome list reader.
//
// The list file carries the genome count on its first token followed by
// that many names; each name resolves to `{data_dir}/{name}.faa`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PhylosigError, Result};

/// Read a list file and return the ordered proteome paths.
pub fn read_list(path: &Path, data_dir: &Path) -> Result<Vec<PathBuf>> {
    let content = fs::read_to_string(path)?;

    let mut tokens = content
        .lines()
        .enumerate()
        .flat_map(|(idx, line)| line.split_whitespace().map(move |tok| (idx + 1, tok)));

    let (line, count_tok) = tokens.next().ok_or(PhylosigError::ListFormat {
        line: 1,
        msg: "missing genome count".to_string(),
    })?;
    let count: usize = count_tok.parse().map_err(|_| PhylosigError::ListFormat {
        line,
        msg: format!("invalid genome count {count_tok:?}"),
    })?;

    let mut paths = Vec::with_capacity(count);
    let mut last_line = line;
    for _ in 0..count {
        match tokens.next() {
            Some((line, name)) => {
                paths.push(data_dir.join(format!("{name}.faa")));
                last_line = line;
            }
            None => {
                return Err(PhylosigError::ListFormat {
                    line: last_line,
                    msg: format!("expected {count} genome names, found {}", paths.len()),
                });
            }
        }
    }

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_file(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.txt");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn reads_names_in_order() {
        let (_dir, path) = list_file("3\nAB123\nCD456 EF789\n");
        let paths = read_list(&path, Path::new("data")).unwrap();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("data/AB123.faa"),
                PathBuf::from("data/CD456.faa"),
                PathBuf::from("data/EF789.faa"),
            ]
        );
    }

    #[test]
    fn rejects_missing_count() {
        let (_dir, path) = list_file("");
        assert!(matches!(
            read_list(&path, Path::new("data")),
            Err(PhylosigError::ListFormat { line: 1, .. })
        ));
    }

    #[test]
    fn rejects_non_numeric_count() {
        let (_dir, path) = list_file("many\nAB123\n");
        assert!(matches!(
            read_list(&path, Path::new("data")),
            Err(PhylosigError::ListFormat { .. })
        ));
    }

    #[test]
    fn rejects_truncated_name_list() {
        let (_dir, path) = list_file("3\nAB123\nCD456\n");
        match read_list(&path, Path::new("data")) {
            Err(PhylosigError::ListFormat { msg, .. }) => {
                assert!(msg.contains("expected 3"), "{msg}");
            }
            other => panic!("expected ListFormat, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn missing_list_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_list(&dir.path().join("nope.txt"), Path::new("data")),
            Err(PhylosigError::Io(_))
        ));
    }
}
