// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! File round trip: `open(2)`, `write(2)`, `lseek(2)`, `read(2)` and `close(2)`.
//!
//! Every operation issues exactly one call. Short writes are reported as
//! errors rather than retried, and reads never append a terminator.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::fd::close_descriptor;

/// An open file descriptor together with the path it was opened from
#[derive(Debug)]
pub struct FileHandle {
    file: File,
    path: PathBuf,
}

impl FileHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }

    /// Issue a single `write(2)` at the current offset
    pub fn write_once(&mut self, bytes: &[u8]) -> Result<usize> {
        let written = self.file.write(bytes).map_err(|e| Error::io("write", e))?;
        debug!(fd = self.raw_fd(), written, requested = bytes.len(), "write");
        Ok(written)
    }

    /// Write `bytes` with one call; anything less than the full length is an error
    pub fn write_all_once(&mut self, bytes: &[u8]) -> Result<()> {
        let written = self.write_once(bytes)?;
        if written != bytes.len() {
            return Err(Error::ShortWrite {
                written,
                expected: bytes.len(),
            });
        }
        Ok(())
    }
}

/// Open or create `path` read+write, truncating it, then write `bytes` at offset 0.
pub fn create_or_truncate_and_write(path: &Path, bytes: &[u8], mode: u32) -> Result<FileHandle> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)
        .map_err(|e| Error::resource("open", e))?;

    let mut handle = FileHandle {
        file,
        path: path.to_path_buf(),
    };
    debug!(fd = handle.raw_fd(), path = %path.display(), mode = format_args!("{:o}", mode), "opened");

    handle.write_all_once(bytes)?;
    Ok(handle)
}

/// Open `path` read+write, creating it with `mode` if missing; content is kept.
pub fn open_or_create(path: &Path, mode: u32) -> Result<FileHandle> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .mode(mode)
        .open(path)
        .map_err(|e| Error::resource("open", e))?;
    debug!(fd = file.as_raw_fd(), path = %path.display(), "opened");
    Ok(FileHandle {
        file,
        path: path.to_path_buf(),
    })
}

/// Open an existing file read-only, without creating it
pub fn open_existing(path: &Path) -> Result<FileHandle> {
    let file = File::open(path).map_err(|e| Error::resource("open", e))?;
    debug!(fd = file.as_raw_fd(), path = %path.display(), "opened read-only");
    Ok(FileHandle {
        file,
        path: path.to_path_buf(),
    })
}

/// Rewind to the start of the file, then read at most `max_len` bytes into `buf`.
pub fn reset_and_read(handle: &mut FileHandle, buf: &mut [u8], max_len: usize) -> Result<usize> {
    handle.file.seek(SeekFrom::Start(0)).map_err(|e| Error::io("lseek", e))?;
    read_up_to(handle, buf, max_len)
}

/// Read at most `max_len` bytes (bounded by `buf.len()`) from the current offset.
///
/// Returns 0 at end of file and when `max_len` is 0.
pub fn read_up_to(handle: &mut FileHandle, buf: &mut [u8], max_len: usize) -> Result<usize> {
    let limit = max_len.min(buf.len());
    if limit == 0 {
        return Ok(0);
    }
    let count = handle.file.read(&mut buf[..limit]).map_err(|e| Error::io("read", e))?;
    debug!(fd = handle.raw_fd(), count, limit, "read");
    Ok(count)
}

/// Close the descriptor, reporting a failing `close(2)`.
pub fn release(handle: FileHandle) -> Result<()> {
    let what = handle.path.display().to_string();
    close_descriptor(handle.file, &what)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn test_write_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.txt");

        let mut handle = create_or_truncate_and_write(&path, b"Hi", 0o644).unwrap();
        let mut buf = [0u8; 10];
        let capacity = buf.len();
        let n = reset_and_read(&mut handle, &mut buf, capacity).unwrap();
        assert_eq!(&buf[..n], b"Hi");
        release(handle).unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"Hi");
    }

    #[test]
    fn test_truncates_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.txt");
        std::fs::write(&path, b"previous longer content").unwrap();

        let handle = create_or_truncate_and_write(&path, b"Hi", 0o644).unwrap();
        release(handle).unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"Hi");
    }

    #[test]
    fn test_new_file_uses_requested_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mode.txt");

        let handle = create_or_truncate_and_write(&path, b"Hi", 0o600).unwrap();
        release(handle).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn test_zero_length_read_returns_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.txt");

        let mut handle = create_or_truncate_and_write(&path, b"Hi", 0o644).unwrap();
        let mut buf = [0xAAu8; 4];
        assert_eq!(reset_and_read(&mut handle, &mut buf, 0).unwrap(), 0);
        assert_eq!(buf, [0xAA; 4]);
    }

    #[test]
    fn test_read_at_eof_returns_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.txt");

        let mut handle = create_or_truncate_and_write(&path, b"Hi", 0o644).unwrap();
        let mut buf = [0u8; 4];
        // Offset is still past the payload
        assert_eq!(read_up_to(&mut handle, &mut buf, 4).unwrap(), 0);
    }

    #[test]
    fn test_read_is_bounded_by_max_len() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.txt");

        let mut handle = create_or_truncate_and_write(&path, b"abcdef", 0o644).unwrap();
        let mut buf = [0u8; 10];
        let n = reset_and_read(&mut handle, &mut buf, 3).unwrap();
        assert_eq!(&buf[..n], b"abc");
    }

    #[test]
    fn test_open_in_missing_directory_is_resource_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("x.txt");

        let err = create_or_truncate_and_write(&path, b"Hi", 0o644).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ResourceUnavailable);
    }

    #[test]
    fn test_open_or_create_keeps_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.txt");
        std::fs::write(&path, b"Hello").unwrap();

        let mut handle = open_or_create(&path, 0o644).unwrap();
        handle.write_all_once(b"Bye").unwrap();
        release(handle).unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"Byelo");
    }

    #[test]
    fn test_open_existing_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_existing(&dir.path().join("absent")).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ResourceUnavailable);
    }

    #[test]
    fn test_write_on_read_only_handle_is_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.txt");
        std::fs::write(&path, b"Hi").unwrap();

        let mut handle = open_existing(&path).unwrap();
        let err = handle.write_all_once(b"nope").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::IoFailure);
    }
}
