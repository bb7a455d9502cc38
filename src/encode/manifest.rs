use std::{
    fmt,
    fs::File,
    io::{BufWriter, Write as _},
    path::{Path, PathBuf},
};

use anyhow::Context as _;

use crate::foundation::error::FramepackResult;

/// File name of the frame index written next to the frames.
pub const MANIFEST_FILE_NAME: &str = "manifest.txt";

/// One manifest line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ManifestEntry {
    /// Per-file mode: the frame's file name.
    File(String),
    /// Single-blob mode: frame name plus byte offset inside the blob.
    Offset { name: String, offset: u64 },
}

impl ManifestEntry {
    pub fn name(&self) -> &str {
        match self {
            Self::File(name) | Self::Offset { name, .. } => name,
        }
    }
}

impl fmt::Display for ManifestEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(name) => f.write_str(&to_forward_slashes(name)),
            Self::Offset { name, offset } => {
                write!(f, "{} offset={offset}", to_forward_slashes(name))
            }
        }
    }
}

fn to_forward_slashes(name: &str) -> String {
    name.replace(std::path::MAIN_SEPARATOR, "/")
}

/// Append-only, ordered list of produced frames.
#[derive(Debug, Default)]
pub struct ManifestBuilder {
    entries: Vec<ManifestEntry>,
}

impl ManifestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ManifestEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render every entry as one `\n`-terminated line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for e in &self.entries {
            out.push_str(&e.to_string());
            out.push('\n');
        }
        out
    }

    /// Write `manifest.txt` into `dir`.
    ///
    /// Nothing is written for an empty manifest; `Ok(None)` is returned instead.
    pub fn write_to_dir(&self, dir: &Path) -> FramepackResult<Option<PathBuf>> {
        if self.entries.is_empty() {
            return Ok(None);
        }

        let path = dir.join(MANIFEST_FILE_NAME);
        let f = File::create(&path)
            .with_context(|| format!("create manifest '{}'", path.display()))?;
        let mut w = BufWriter::new(f);
        w.write_all(self.render().as_bytes())
            .and_then(|()| w.flush())
            .with_context(|| format!("write manifest '{}'", path.display()))?;
        Ok(Some(path))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/manifest.rs"]
mod tests;
