//! Per-service, per-day log files: `<dir>/<service>_<YYYYMMDD>.log`.

use std::{
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use chrono::{Local, NaiveDate};

const TAIL_BLOCK: u64 = 8 * 1024;

#[derive(Debug, Clone)]
pub struct LogDir {
    dir: PathBuf,
}

impl LogDir {
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn path_for(&self, service: &str, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{service}_{}.log", date.format("%Y%m%d")))
    }

    /// Log file for `service` on the current local date.
    #[must_use]
    pub fn today(&self, service: &str) -> PathBuf {
        self.path_for(service, Local::now().date_naive())
    }

    /// Create the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn prepare(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }
}

/// Last `n` lines of a file. A missing file has no lines.
///
/// Reads backwards in blocks so large logs are not loaded whole.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn tail(path: &Path, n: usize) -> io::Result<Vec<String>> {
    if n == 0 {
        return Ok(Vec::new());
    }
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };

    let len = file.metadata()?.len();
    let mut start = len;
    let mut buf = Vec::new();
    while start > 0 {
        let step = TAIL_BLOCK.min(start);
        start -= step;
        file.seek(SeekFrom::Start(start))?;
        let mut block = vec![0; usize::try_from(step).unwrap_or(usize::MAX)];
        file.read_exact(&mut block)?;
        block.extend_from_slice(&buf);
        buf = block;

        // One extra newline guarantees the first kept line is complete.
        if buf.iter().filter(|b| **b == b'\n').count() > n {
            break;
        }
    }

    let text = String::from_utf8_lossy(&buf);
    let lines: Vec<&str> = text.lines().collect();
    let skip = lines.len().saturating_sub(n);
    Ok(lines[skip..].iter().map(|l| (*l).to_owned()).collect())
}

/// Bytes appended to `path` since `offset`, and the new offset.
///
/// A file shorter than `offset` was rotated or truncated and is read from the
/// start.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn read_new(path: &Path, offset: u64) -> io::Result<(Vec<u8>, u64)> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
        Err(err) => return Err(err),
    };

    let len = file.metadata()?.len();
    let from = if len < offset { 0 } else { offset };
    file.seek(SeekFrom::Start(from))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    let next = from + buf.len() as u64;
    Ok((buf, next))
}
