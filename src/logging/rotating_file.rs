use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Append-only log file rotated by size.
///
/// When a write would push the file past `max_size` bytes the file is renamed to `<path>.1`,
/// older backups shift up to `<path>.<backup_count>` and the oldest one is removed. With no
/// backups the file is truncated instead. A `max_size` of 0 disables rotation.
#[derive(Debug)]
pub struct RotatingFile {
    path: PathBuf,
    max_size: u64,
    backup_count: usize,
    file: File,
    written: u64,
}

impl RotatingFile {
    pub fn open<P: AsRef<Path>>(path: P, max_size: u64, backup_count: usize) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();

        Ok(Self {
            path,
            max_size,
            backup_count,
            file,
            written,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.backup_count == 0 {
            self.file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.path)?;
            self.written = 0;
            return Ok(());
        }

        let oldest = self.backup_path(self.backup_count);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for index in (1..self.backup_count).rev() {
            let from = self.backup_path(index);
            if from.exists() {
                fs::rename(&from, self.backup_path(index + 1))?;
            }
        }
        fs::rename(&self.path, self.backup_path(1))?;

        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.max_size > 0 && self.written > 0 && self.written + buf.len() as u64 > self.max_size
        {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_appends_without_rotation_under_limit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("honeypot.log");
        let mut file = RotatingFile::open(&path, 64, 2).unwrap();

        file.write_all(b"first\n").unwrap();
        file.write_all(b"second\n").unwrap();

        assert_eq!(read(&path), "first\nsecond\n");
        assert!(!dir.path().join("honeypot.log.1").exists());
    }

    #[test]
    fn test_rotation_keeps_bounded_backups() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("honeypot.log");
        let mut file = RotatingFile::open(&path, 10, 2).unwrap();

        for line in ["aaaaaaaa\n", "bbbbbbbb\n", "cccccccc\n", "dddddddd\n"] {
            file.write_all(line.as_bytes()).unwrap();
        }
        file.flush().unwrap();

        assert_eq!(read(&path), "dddddddd\n");
        assert_eq!(read(&dir.path().join("honeypot.log.1")), "cccccccc\n");
        assert_eq!(read(&dir.path().join("honeypot.log.2")), "bbbbbbbb\n");
        assert!(!dir.path().join("honeypot.log.3").exists());
    }

    #[test]
    fn test_no_backups_truncates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("honeypot.log");
        let mut file = RotatingFile::open(&path, 10, 0).unwrap();

        file.write_all(b"aaaaaaaa\n").unwrap();
        file.write_all(b"bbbbbbbb\n").unwrap();

        assert_eq!(read(&path), "bbbbbbbb\n");
        assert!(!dir.path().join("honeypot.log.1").exists());
    }

    #[test]
    fn test_existing_size_counts_towards_limit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("honeypot.log");
        fs::write(&path, "previous run\n").unwrap();

        let mut file = RotatingFile::open(&path, 16, 1).unwrap();
        file.write_all(b"new run\n").unwrap();

        assert_eq!(read(&path), "new run\n");
        assert_eq!(read(&dir.path().join("honeypot.log.1")), "previous run\n");
    }
}
