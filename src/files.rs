use crate::analyzer::Analyzers;
use crate::error::{Error, Result};
use crate::format::humanize_bytes;
use chrono::{DateTime, Local};
use globset::{GlobBuilder, GlobSetBuilder};
use serde::Serialize;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const PEEK_LIMIT: u64 = 64 * 1024;
const PEEK_DISPLAY: usize = 100;
pub const UNKNOWN_TYPE: &str = "unknown";

#[derive(Clone, Debug, Serialize)]
pub struct LogFile {
    pub path: PathBuf,
    pub name: String,
    pub dir: PathBuf,
    pub size: u64,
    pub modified: DateTime<Local>,
    pub peek: String,
    pub log_type: Option<String>,
    /// Next older file of the same log type.
    pub prev: Option<PathBuf>,
}

impl LogFile {
    pub fn size_human(&self) -> String { humanize_bytes(self.size as f64) }

    pub fn log_type_name(&self) -> &str { self.log_type.as_deref().unwrap_or(UNKNOWN_TYPE) }

    pub fn peek_short(&self) -> String {
        if self.peek.chars().count() > PEEK_DISPLAY { format!("{}...", self.peek.chars().take(PEEK_DISPLAY).collect::<String>()) } else { self.peek.clone() }
    }

    pub fn modified_str(&self) -> String { self.modified.format("%Y-%m-%d %H:%M:%S").to_string() }
}

pub fn first_line<R: BufRead>(mut r: R) -> io::Result<Option<String>> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if r.read_until(b'\n', &mut buf)? == 0 { return Ok(None); }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);
        if !line.trim().is_empty() { return Ok(Some(line.to_string())); }
    }
}

pub fn peek_file(path: &Path) -> io::Result<Option<String>> {
    let f = std::fs::File::open(path)?;
    first_line(BufReader::new(f.take(PEEK_LIMIT)))
}

fn inspect(path: &Path, analyzers: &Analyzers) -> io::Result<LogFile> {
    let meta = std::fs::metadata(path)?;
    let peek = peek_file(path)?.unwrap_or_default();
    let log_type = analyzers.iter().find(|p| p.matches(&peek)).map(|p| p.name.clone());
    Ok(LogFile {
        path: path.to_path_buf(),
        name: path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
        dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
        size: meta.len(),
        modified: DateTime::<Local>::from(meta.modified()?),
        peek,
        log_type,
        prev: None,
    })
}

/// Walks `root`, optionally filtered by a case-insensitive glob on the path,
/// and classifies every file by the first analyzer matching its first line.
/// Files are ordered by log type, directory, newest first, then name
/// descending; each gets the next older file of its type as `prev`.
pub fn list_logs(root: &Path, glob: Option<&str>, analyzers: &Analyzers) -> Result<Vec<LogFile>> {
    let set = match glob {
        Some(g) => {
            let bad = |source| Error::InvalidGlob { glob: g.to_string(), source };
            let mut gs = GlobSetBuilder::new();
            gs.add(GlobBuilder::new(g).case_insensitive(true).build().map_err(bad)?);
            Some(gs.build().map_err(bad)?)
        }
        None => None,
    };
    let mut files = Vec::new();
    for de in WalkDir::new(root).follow_links(false).into_iter() {
        let de = match de {
            Ok(de) => de,
            Err(e) => { log::warn!("skipping entry under {}: {}", root.display(), e); continue; }
        };
        let p = de.path();
        if !de.file_type().is_file() { continue; }
        if let Some(set) = &set && !set.is_match(p) { continue; }
        match inspect(p, analyzers) {
            Ok(f) => files.push(f),
            Err(e) => log::warn!("skipping {}: {}", p.display(), e),
        }
    }
    files.sort_by(|a, b| {
        a.log_type_name().cmp(b.log_type_name())
            .then_with(|| a.dir.cmp(&b.dir))
            .then_with(|| b.modified.cmp(&a.modified))
            .then_with(|| b.name.cmp(&a.name))
    });
    for i in 0..files.len() {
        let prev = files[i + 1..].iter().find(|f| f.log_type == files[i].log_type).map(|f| f.path.clone());
        files[i].prev = prev;
    }
    log::debug!("found {} files under {}", files.len(), root.display());
    Ok(files)
}

pub fn previous_of<'a>(files: &'a [LogFile], path: &Path) -> Option<&'a Path> {
    files.iter().find(|f| f.path == path).and_then(|f| f.prev.as_deref())
}
