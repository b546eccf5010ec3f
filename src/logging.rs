//! `env_logger` setup: `dd-mm-YYYY HH:MM:SS # message` records on stderr,
//! optionally mirrored into a log file that keeps only the newest lines.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

const TIMESTAMP_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

/// Log file that is trimmed to its newest `max_lines` lines as it grows.
pub struct CappedLogFile {
    path: PathBuf,
    max_lines: usize,
    lines: VecDeque<String>,
    pending: Vec<u8>,
    file: File,
}

impl CappedLogFile {
    /// Open (or create) `path`, trimming existing content. `max_lines == 0` disables trimming.
    pub fn open(path: &Path, max_lines: usize) -> io::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let existing = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e),
        };

        let mut log = CappedLogFile {
            path: path.to_path_buf(),
            max_lines,
            lines: VecDeque::new(),
            pending: Vec::new(),
            file: OpenOptions::new().create(true).append(true).open(path)?,
        };
        if max_lines > 0 {
            log.lines = existing.lines().map(str::to_string).collect();
            if log.lines.len() > max_lines {
                let excess = log.lines.len() - max_lines;
                log.lines.drain(..excess);
                log.rewrite()?;
            }
        }
        Ok(log)
    }

    fn rewrite(&mut self) -> io::Result<()> {
        let mut content = String::new();
        for line in &self.lines {
            content.push_str(line);
            content.push('\n');
        }
        fs::write(&self.path, content)?;
        self.file = OpenOptions::new().append(true).open(&self.path)?;
        Ok(())
    }

    fn push_line(&mut self, line: String) -> io::Result<()> {
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        if self.max_lines == 0 {
            return Ok(());
        }
        self.lines.push_back(line);
        if self.lines.len() > self.max_lines {
            self.lines.pop_front();
            self.rewrite()?;
        }
        Ok(())
    }
}

impl Write for CappedLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]).into_owned();
            self.push_line(line)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Writes every record to stderr and to the log file.
struct Tee {
    file: CappedLogFile,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

/// Install the global logger. `RUST_LOG` overrides the default `info` filter.
pub fn init(save_to: Option<(&Path, usize)>) -> Result<(), String> {
    let default_filter = env_logger::Env::default().default_filter_or("info");
    let mut builder = env_logger::Builder::from_env(default_filter);
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} # {}",
            chrono::Local::now().format(TIMESTAMP_FORMAT),
            record.args()
        )
    });

    if let Some((path, max_lines)) = save_to {
        let file = CappedLogFile::open(path, max_lines)
            .map_err(|e| format!("opening log file {} failed: {}", path.display(), e))?;
        builder.target(env_logger::Target::Pipe(Box::new(Tee { file })));
    }

    builder
        .try_init()
        .map_err(|e| format!("logger init failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path).unwrap().lines().map(str::to_string).collect()
    }

    #[test]
    fn keeps_only_newest_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.log");
        let mut log = CappedLogFile::open(&path, 3).unwrap();
        for i in 1..=5 {
            writeln!(log, "line {i}").unwrap();
        }
        log.flush().unwrap();
        assert_eq!(read_lines(&path), vec!["line 3", "line 4", "line 5"]);
    }

    #[test]
    fn trims_existing_file_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.log");
        fs::write(&path, "a\nb\nc\nd\n").unwrap();

        let mut log = CappedLogFile::open(&path, 2).unwrap();
        assert_eq!(read_lines(&path), vec!["c", "d"]);
        writeln!(log, "e").unwrap();
        assert_eq!(read_lines(&path), vec!["d", "e"]);
    }

    #[test]
    fn partial_writes_are_joined_into_one_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.log");
        let mut log = CappedLogFile::open(&path, 10).unwrap();
        log.write_all(b"12-01-2025 10:00:00 # Login").unwrap();
        log.write_all(b" successful.\nsecond\n").unwrap();
        assert_eq!(read_lines(&path), vec!["12-01-2025 10:00:00 # Login successful.", "second"]);
    }

    #[test]
    fn zero_cap_keeps_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("monitor.log");
        let mut log = CappedLogFile::open(&path, 0).unwrap();
        for i in 0..100 {
            writeln!(log, "{i}").unwrap();
        }
        assert_eq!(read_lines(&path).len(), 100);
    }
}
