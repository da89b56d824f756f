//! Capability-scoped access to CSV files on disk.

use std::io::{self, BufRead, BufReader};

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8};

/// Open `path` for reading through a directory capability on its parent.
pub(super) fn open_file(path: &Utf8Path) -> io::Result<fs_utf8::File> {
    let name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{path} does not name a file"),
        )
    })?;
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    dir.open(name)
}

/// Number of lines in `reader`, counting a final line without a trailing
/// newline. Reads in buffer-sized chunks.
pub(super) fn count_lines(reader: impl io::Read) -> io::Result<u64> {
    let mut reader = BufReader::new(reader);
    let mut lines = 0_u64;
    let mut last = None;
    loop {
        let chunk = reader.fill_buf()?;
        let Some(&final_byte) = chunk.last() else {
            break;
        };
        let newlines = chunk.iter().filter(|&&byte| byte == b'\n').count();
        lines += u64::try_from(newlines).unwrap_or(u64::MAX);
        last = Some(final_byte);
        let consumed = chunk.len();
        reader.consume(consumed);
    }
    if last.is_some_and(|byte| byte != b'\n') {
        lines += 1;
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", 0)]
    #[case("header\n", 1)]
    #[case("header", 1)]
    #[case("header\nrow\n", 2)]
    #[case("header\nrow\nrow", 3)]
    #[case("header\r\nrow\r\n", 2)]
    fn counts_lines_with_and_without_trailing_newline(#[case] text: &str, #[case] expected: u64) {
        let lines = count_lines(text.as_bytes()).expect("count lines");
        assert_eq!(lines, expected);
    }

    #[rstest]
    fn opens_existing_files_and_reports_missing_ones() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("trips.csv");
        std::fs::write(&path, "region\n").expect("write csv");
        let utf8 = Utf8Path::from_path(&path).expect("utf8 path");
        assert!(open_file(utf8).is_ok());
        assert!(open_file(Utf8Path::new("missing-trips.csv")).is_err());
    }
}
