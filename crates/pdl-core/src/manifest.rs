//! Resume manifest: the append-only sidecar recording finished chunks.
//!
//! Lives next to the temp file at `<final>.downloading.info`. Plain text, one
//! base-10 chunk index per line. A new sidecar starts with a layout line
//! `#pdl total=<size> chunk=<max-chunk-size> [etag=<v>] [lm=<v>]`, validator
//! values form-urlencoded; it is skipped like any other unparsable line but
//! lets `load` notice that the job's layout or the remote resource changed.
//!
//! A record only counts once its newline is on disk: a trailing line without
//! one (crash mid-append) is ignored and fenced off by the next append.

use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use url::form_urlencoded;

const LAYOUT_PREFIX: &str = "#pdl";

/// Size, chunk size and remote validators the indices refer to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestLayout {
    pub total_size: u64,
    pub chunk_size: u64,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl ManifestLayout {
    pub fn new(total_size: u64, chunk_size: u64) -> Self {
        Self {
            total_size,
            chunk_size,
            ..Self::default()
        }
    }

    pub fn with_validators(mut self, etag: Option<String>, last_modified: Option<String>) -> Self {
        self.etag = etag;
        self.last_modified = last_modified;
        self
    }

    fn header(&self) -> String {
        let mut line = format!("{} total={} chunk={}", LAYOUT_PREFIX, self.total_size, self.chunk_size);
        for (key, value) in [("etag", &self.etag), ("lm", &self.last_modified)] {
            if let Some(v) = value {
                line.push(' ');
                line.push_str(key);
                line.push('=');
                line.extend(form_urlencoded::byte_serialize(v.as_bytes()));
            }
        }
        line.push('\n');
        line
    }

    fn parse(line: &str) -> Option<Self> {
        let rest = line.strip_prefix(LAYOUT_PREFIX)?;
        let mut total_size = None;
        let mut chunk_size = None;
        let mut etag = None;
        let mut last_modified = None;
        for field in rest.split_whitespace() {
            let Some((key, value)) = form_urlencoded::parse(field.as_bytes()).next() else {
                continue;
            };
            match key.as_ref() {
                "total" => total_size = value.parse().ok(),
                "chunk" => chunk_size = value.parse().ok(),
                "etag" => etag = Some(value.into_owned()),
                "lm" => last_modified = Some(value.into_owned()),
                _ => {}
            }
        }
        Some(Self {
            total_size: total_size?,
            chunk_size: chunk_size?,
            etag,
            last_modified,
        })
    }
}

#[derive(Debug)]
pub struct Manifest {
    path: PathBuf,
    layout: ManifestLayout,
    done: BTreeSet<usize>,
    /// The file ends in a torn record; the next append starts a fresh line.
    torn_tail: bool,
}

impl Manifest {
    /// Sidecar path for a temp file: `<temp>.info`.
    pub fn path_for(temp_path: &Path) -> PathBuf {
        let mut s = temp_path.as_os_str().to_owned();
        s.push(".info");
        PathBuf::from(s)
    }

    /// Read the sidecar if present. A missing file is an empty manifest.
    ///
    /// A layout line that disagrees with `layout` (sizes, ETag or
    /// Last-Modified) makes the whole file stale: it is deleted and the
    /// manifest starts empty. Indices at or beyond
    /// `chunk_count` are ignored.
    pub fn load(path: &Path, layout: ManifestLayout, chunk_count: usize) -> io::Result<Self> {
        let mut manifest = Self {
            path: path.to_path_buf(),
            layout,
            done: BTreeSet::new(),
            torn_tail: false,
        };
        let data = match fs::read(path) {
            Ok(d) => d,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(manifest),
            Err(e) => return Err(e),
        };
        let text = String::from_utf8_lossy(&data);
        let mut lines: Vec<&str> = text.split('\n').collect();
        // Everything after the last '\n' is either empty or a torn record.
        if let Some(tail) = lines.pop() {
            manifest.torn_tail = !tail.is_empty();
        }

        for line in lines {
            let line = line.trim();
            if let Some(found) = ManifestLayout::parse(line) {
                if found != manifest.layout {
                    tracing::info!(
                        path = %path.display(),
                        ?found,
                        expected = ?manifest.layout,
                        "manifest layout or remote validators changed, starting over"
                    );
                    manifest.reset()?;
                    return Ok(manifest);
                }
                continue;
            }
            match line.parse::<usize>() {
                Ok(i) if i < chunk_count => {
                    manifest.done.insert(i);
                }
                Ok(i) => tracing::debug!(index = i, "manifest index outside plan, ignored"),
                Err(_) => {}
            }
        }
        Ok(manifest)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_complete(&self, index: usize) -> bool {
        self.done.contains(&index)
    }

    pub fn completed(&self) -> &BTreeSet<usize> {
        &self.done
    }

    /// Append `index` and flush it. Must only be called once the chunk's bytes
    /// are flushed to the temp file. Returns `false` (and writes nothing) if
    /// the index was already recorded.
    pub fn mark_complete(&mut self, index: usize) -> io::Result<bool> {
        if self.done.contains(&index) {
            return Ok(false);
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut record = String::new();
        if file.metadata()?.len() == 0 {
            record.push_str(&self.layout.header());
        } else if self.torn_tail {
            // Turn the torn record into an unparsable line.
            record.push_str("#torn\n");
        }
        record.push_str(&index.to_string());
        record.push('\n');
        file.write_all(record.as_bytes())?;
        file.sync_data()?;
        self.torn_tail = false;
        self.done.insert(index);
        Ok(true)
    }

    /// Forget every record and delete the sidecar.
    pub fn reset(&mut self) -> io::Result<()> {
        self.done.clear();
        self.torn_tail = false;
        remove_if_exists(&self.path)
    }

    /// Best-effort delete after the transfer is published.
    pub fn discard(&mut self) {
        self.done.clear();
        if let Err(e) = remove_if_exists(&self.path) {
            tracing::warn!(path = %self.path.display(), "could not remove manifest: {}", e);
        }
    }
}

/// Delete `path`; a missing file is not an error.
pub(crate) fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
