//! Log file discovery and line reading.
//!
//! Walks the input directory recursively and streams each file's lines in
//! order. I/O failures are returned to the caller; nothing here skips an
//! unreadable file.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Configuration for file discovery.
#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    /// File extensions to include (e.g., ["log", "csv"]). Empty means all files.
    pub extensions: Vec<String>,
    /// File or directory names to skip (e.g., ["archive"]).
    pub excludes: Vec<String>,
}

impl From<&crate::config::InputConfig> for ScanConfig {
    fn from(config: &crate::config::InputConfig) -> Self {
        Self {
            extensions: config.extensions.clone(),
            excludes: config.excludes.clone(),
        }
    }
}

/// A discovered log file.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    /// Path as reached from the input root (root joined with the relative path).
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

impl ScannedFile {
    /// Path text as recorded in the report.
    pub fn display_path(&self) -> String {
        self.path.display().to_string()
    }
}

/// Recursive scanner over the input directory.
pub struct LogScanner {
    config: ScanConfig,
    root: PathBuf,
}

impl LogScanner {
    /// Create a new scanner rooted at `root`.
    pub fn new(root: PathBuf, config: ScanConfig) -> Self {
        Self { config, root }
    }

    /// Discover all matching files.
    ///
    /// At each directory level the files come first, then the
    /// subdirectories, each group sorted by name.
    pub fn scan(&self) -> Result<Vec<ScannedFile>> {
        if !self.root.is_dir() {
            anyhow::bail!("Input directory not found: {}", self.root.display());
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .sort_by(|a, b| {
                a.file_type()
                    .is_dir()
                    .cmp(&b.file_type().is_dir())
                    .then_with(|| a.file_name().cmp(b.file_name()))
            })
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !self.is_excluded(e));

        for entry in walker {
            let entry = entry
                .with_context(|| format!("Failed to walk {}", self.root.display()))?;
            let path = entry.path();

            if !path.is_file() || !self.matches(path) {
                continue;
            }

            let size = entry
                .metadata()
                .with_context(|| format!("Failed to stat {}", path.display()))?
                .len();

            debug!("Found log file: {} ({} bytes)", path.display(), size);
            files.push(ScannedFile {
                path: path.to_path_buf(),
                size,
            });
        }

        Ok(files)
    }

    /// Check if a file passes the extension filter.
    pub fn matches(&self, path: &Path) -> bool {
        if self.config.extensions.is_empty() {
            return true;
        }

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        self.config.extensions.iter().any(|e| e == ext)
    }

    /// Check if an entry's name is on the exclude list.
    fn is_excluded(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();
        self.config.excludes.iter().any(|pattern| name == pattern.as_str())
    }
}

/// Streaming line reader over one log file.
///
/// `\n`, `\r\n` and a bare `\r` each end a line, and the terminator is left
/// on the line. Iteration stops at the first read or UTF-8 error; `finish`
/// returns it.
pub struct LogLines {
    path: PathBuf,
    reader: BufReader<File>,
    buf: Vec<u8>,
    count: u64,
    error: Option<anyhow::Error>,
}

impl LogLines {
    pub fn open(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            buf: Vec::new(),
            count: 0,
            error: None,
        })
    }

    /// Number of lines read, or the error that cut the file short.
    pub fn finish(self) -> Result<u64> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.count),
        }
    }

    fn read_next(&mut self) -> Result<Option<String>> {
        let line_no = self.count + 1;
        self.buf.clear();
        read_until_eol(&mut self.reader, &mut self.buf).with_context(|| {
            format!("Failed to read {} at line {}", self.path.display(), line_no)
        })?;
        if self.buf.is_empty() {
            return Ok(None);
        }

        let line = std::str::from_utf8(&self.buf).with_context(|| {
            format!("Failed to read {} at line {}", self.path.display(), line_no)
        })?;
        self.count = line_no;
        Ok(Some(line.to_string()))
    }
}

impl Iterator for LogLines {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.error.is_some() {
            return None;
        }

        match self.read_next() {
            Ok(line) => line,
            Err(e) => {
                self.error = Some(e);
                None
            }
        }
    }
}

/// Append bytes up to and including the next line terminator.
///
/// A `\r` directly followed by `\n` is one terminator. Leaves `out` empty at
/// end of input.
fn read_until_eol<R: BufRead>(reader: &mut R, out: &mut Vec<u8>) -> io::Result<()> {
    loop {
        let (found, used) = {
            let available = reader.fill_buf()?;
            if available.is_empty() {
                return Ok(());
            }
            match available.iter().position(|&b| b == b'\n' || b == b'\r') {
                Some(i) => {
                    out.extend_from_slice(&available[..=i]);
                    (true, i + 1)
                }
                None => {
                    out.extend_from_slice(available);
                    (false, available.len())
                }
            }
        };
        reader.consume(used);

        if found {
            if out.last() == Some(&b'\r') && reader.fill_buf()?.first() == Some(&b'\n') {
                out.push(b'\n');
                reader.consume(1);
            }
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup_tree() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("fw02/2024")).unwrap();
        fs::create_dir_all(root.join("archive")).unwrap();
        fs::write(root.join("b.log"), "1\n2\n").unwrap();
        fs::write(root.join("a.log"), "1\n").unwrap();
        fs::write(root.join("notes.txt"), "hello\n").unwrap();
        fs::write(root.join("fw02/2024/c.log"), "x\ny\nz").unwrap();
        fs::write(root.join("archive/old.log"), "old\n").unwrap();
        temp_dir
    }

    fn relative(scanner_root: &Path, files: &[ScannedFile]) -> Vec<String> {
        files
            .iter()
            .map(|f| {
                f.path
                    .strip_prefix(scanner_root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn test_scan_lists_files_before_subdirectories() {
        let temp_dir = setup_tree();
        let scanner = LogScanner::new(temp_dir.path().to_path_buf(), ScanConfig::default());
        let files = scanner.scan().unwrap();

        assert_eq!(
            relative(temp_dir.path(), &files),
            vec![
                "a.log",
                "b.log",
                "notes.txt",
                "archive/old.log",
                "fw02/2024/c.log"
            ]
        );
    }

    #[test]
    fn test_scan_paths_are_joined_to_root() {
        let temp_dir = setup_tree();
        let scanner = LogScanner::new(temp_dir.path().to_path_buf(), ScanConfig::default());
        let files = scanner.scan().unwrap();

        assert!(files.iter().all(|f| f.path.starts_with(temp_dir.path())));
        assert_eq!(files[0].size, 2);
    }

    #[test]
    fn test_scan_with_extensions_and_excludes() {
        let temp_dir = setup_tree();
        let config = ScanConfig {
            extensions: vec!["log".to_string()],
            excludes: vec!["archive".to_string()],
        };
        let scanner = LogScanner::new(temp_dir.path().to_path_buf(), config);
        let files = scanner.scan().unwrap();

        assert_eq!(
            relative(temp_dir.path(), &files),
            vec!["a.log", "b.log", "fw02/2024/c.log"]
        );
    }

    #[test]
    fn test_scan_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let scanner = LogScanner::new(temp_dir.path().join("nope"), ScanConfig::default());
        let err = scanner.scan().unwrap_err();
        assert!(err.to_string().contains("Input directory not found"));
    }

    fn read_all(path: &Path) -> (Vec<String>, Result<u64>) {
        let mut lines = LogLines::open(path).unwrap();
        let seen: Vec<String> = lines.by_ref().collect();
        (seen, lines.finish())
    }

    #[test]
    fn test_log_lines() {
        let temp_dir = setup_tree();
        let (seen, count) = read_all(&temp_dir.path().join("fw02/2024/c.log"));

        assert_eq!(count.unwrap(), 3);
        assert_eq!(seen, vec!["x\n", "y\n", "z"]);
    }

    #[test]
    fn test_log_lines_mixed_terminators() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("mixed.log");
        fs::write(&path, "a\r\nb\rc\n\rd\r").unwrap();

        let (seen, count) = read_all(&path);
        assert_eq!(count.unwrap(), 5);
        assert_eq!(seen, vec!["a\r\n", "b\r", "c\n", "\r", "d\r"]);
    }

    #[test]
    fn test_log_lines_carriage_return_only_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cr.log");
        fs::write(
            &path,
            "t,fw,A,a,b,80,6,,,1,1,1,1\rt,fw,A,a,b,80,6,,,1,1,1,1\r",
        )
        .unwrap();

        let mut lines = LogLines::open(&path).unwrap();
        let (flows, counters) = crate::analysis::aggregate(&mut lines);
        assert_eq!(lines.finish().unwrap(), 2);

        assert_eq!(counters.connections, 2);
        assert_eq!(counters.accepted(), 2);
        assert_eq!(flows.len(), 1);
        assert_eq!(flows.values().next().unwrap().count, 2);
    }

    #[test]
    fn test_log_lines_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.log");
        fs::write(&path, "").unwrap();

        let (seen, count) = read_all(&path);
        assert!(seen.is_empty());
        assert_eq!(count.unwrap(), 0);
    }

    #[test]
    fn test_log_lines_invalid_utf8_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.log");
        fs::write(&path, [b'o', b'k', b'\n', 0xff, 0xfe, b'\n', b'x']).unwrap();

        let (seen, count) = read_all(&path);
        assert_eq!(seen, vec!["ok\n"]);
        let err = count.unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_log_lines_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = LogLines::open(&temp_dir.path().join("gone.log")).err().unwrap();
        assert!(err.to_string().contains("Failed to open"));
    }
}
