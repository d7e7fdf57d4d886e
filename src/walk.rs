//! Discovery of class files under a scan root.
//!
//! A root is either a directory, walked depth first in file-name order, or a
//! jar/zip archive, read entry by entry. Either way the caller gets a lazy
//! sequence of [`ClassEntry`] values whose bytes were read and whose file
//! handle was closed before the entry was yielded.

use ignore::{Walk, WalkBuilder};
use memmap2::Mmap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

use crate::error::{Result, ScanError};
use crate::filter::PathFilter;
use crate::log::ScanLog;

const ARCHIVE_EXTENSIONS: &[&str] = &["jar", "zip"];
/// Upper bound on the buffer reserved from an entry's declared size.
const MAX_READ_HINT: usize = 1 << 20;

#[derive(Debug, Clone)]
pub struct ClassEntry {
    /// Where the bytes came from; archive entries read as `app.jar!/com/foo/Bar.class`.
    pub path: PathBuf,
    /// `/`-separated path relative to the scan root, as seen by the filter.
    pub name: String,
    pub bytes: Vec<u8>,
}

pub struct Walker<'a> {
    filter: &'a PathFilter,
    log: &'a dyn ScanLog,
    follow_links: bool,
}

impl<'a> Walker<'a> {
    pub fn new(filter: &'a PathFilter, log: &'a dyn ScanLog) -> Self {
        Self {
            filter,
            log,
            follow_links: false,
        }
    }

    pub fn follow_links(mut self, yes: bool) -> Self {
        self.follow_links = yes;
        self
    }

    pub fn walk(&self, root: &Path) -> Result<ClassFiles<'a>> {
        let meta = std::fs::metadata(root).map_err(|e| ScanError::io(root, e))?;

        if meta.is_dir() {
            // Pre-check only: an unreadable root fails before any entry is yielded.
            std::fs::read_dir(root).map_err(|e| ScanError::io(root, e))?;
            return Ok(ClassFiles::Directory(DirectoryWalk::new(
                root,
                self.filter,
                self.log,
                self.follow_links,
            )));
        }

        if meta.is_file() && is_archive(root) {
            return Ok(ClassFiles::Archive(ArchiveWalk::open(
                root,
                self.filter,
                self.log,
            )?));
        }

        Err(ScanError::InvalidArgument(format!(
            "scan root {} is neither a directory nor a jar/zip archive",
            root.display()
        )))
    }
}

pub fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| ARCHIVE_EXTENSIONS.iter().any(|a| e.eq_ignore_ascii_case(a)))
}

pub enum ClassFiles<'a> {
    Directory(DirectoryWalk<'a>),
    Archive(ArchiveWalk<'a>),
}

impl Iterator for ClassFiles<'_> {
    type Item = Result<ClassEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            ClassFiles::Directory(w) => w.next(),
            ClassFiles::Archive(w) => w.next(),
        }
    }
}

pub struct DirectoryWalk<'a> {
    root: PathBuf,
    walk: Walk,
    filter: &'a PathFilter,
    log: &'a dyn ScanLog,
    finished: bool,
}

impl<'a> DirectoryWalk<'a> {
    fn new(root: &Path, filter: &'a PathFilter, log: &'a dyn ScanLog, follow_links: bool) -> Self {
        let walk = WalkBuilder::new(root)
            .hidden(false)
            .ignore(false)
            .parents(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .follow_links(follow_links)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        Self {
            root: root.to_path_buf(),
            walk,
            filter,
            log,
            finished: false,
        }
    }

    fn relative_name(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl Iterator for DirectoryWalk<'_> {
    type Item = Result<ClassEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let entry = match self.walk.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    self.finished = true;
                    return Some(Err(walk_error(&self.root, &err)));
                }
            };

            let path = entry.path();
            let is_file = entry
                .file_type()
                .is_some_and(|t| t.is_file() || (t.is_symlink() && path.is_file()));
            if !is_file {
                continue;
            }

            let name = self.relative_name(path);
            if !self.filter.accepts_logged(&name, self.log) {
                continue;
            }

            let read = std::fs::read(path).map_err(|e| ScanError::io(path, e));
            if read.is_err() {
                self.finished = true;
            }
            return Some(read.map(|bytes| ClassEntry {
                path: path.to_path_buf(),
                name,
                bytes,
            }));
        }
    }
}

fn walk_error(root: &Path, err: &ignore::Error) -> ScanError {
    let kind = err
        .io_error()
        .map_or(std::io::ErrorKind::Other, |e| e.kind());
    let path = error_path(err).unwrap_or(root);
    ScanError::io(path, std::io::Error::new(kind, err.to_string()))
}

/// The entry an ignore error is about, if it names one.
fn error_path(err: &ignore::Error) -> Option<&Path> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path.as_path()),
        ignore::Error::Loop { child, .. } => Some(child.as_path()),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            error_path(err)
        }
        _ => None,
    }
}

pub struct ArchiveWalk<'a> {
    path: PathBuf,
    archive: ZipArchive<Cursor<Mmap>>,
    index: usize,
    filter: &'a PathFilter,
    log: &'a dyn ScanLog,
    finished: bool,
}

impl<'a> ArchiveWalk<'a> {
    fn open(path: &Path, filter: &'a PathFilter, log: &'a dyn ScanLog) -> Result<Self> {
        let file = File::open(path).map_err(|e| ScanError::io(path, e))?;
        // SAFETY: The archive is only read; the mapping stays valid after the
        // file handle is dropped at the end of this function.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| ScanError::io(path, e))?;
        let archive =
            ZipArchive::new(Cursor::new(mmap)).map_err(|source| ScanError::MalformedArchive {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            archive,
            index: 0,
            filter,
            log,
            finished: false,
        })
    }
}

impl Iterator for ArchiveWalk<'_> {
    type Item = Result<ClassEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished && self.index < self.archive.len() {
            let i = self.index;
            self.index += 1;

            let mut entry = match self.archive.by_index(i) {
                Ok(entry) => entry,
                Err(source) => {
                    self.finished = true;
                    return Some(Err(ScanError::MalformedArchive {
                        path: self.path.clone(),
                        source,
                    }));
                }
            };
            if entry.is_dir() {
                continue;
            }

            let name = entry.name().to_string();
            if !self.filter.accepts_logged(&name, self.log) {
                continue;
            }

            let display = PathBuf::from(format!("{}!/{name}", self.path.display()));
            let hint = usize::try_from(entry.size()).map_or(MAX_READ_HINT, |n| n.min(MAX_READ_HINT));
            let mut bytes = Vec::with_capacity(hint);
            if let Err(e) = entry.read_to_end(&mut bytes) {
                self.finished = true;
                return Some(Err(ScanError::io(display, e)));
            }
            return Some(Ok(ClassEntry {
                path: display,
                name,
                bytes,
            }));
        }
        None
    }
}
