//! Trace file formats used by the command-line front end.
//!
//! All files are whitespace separated; numbers may be decimal or `0x` hex.
//! Blank lines and lines starting with `#` are ignored.

use std::fs;
use std::path::{Path, PathBuf};

use crate::ProcessId;
use crate::replacement::VirtualPageId;

#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
}

fn parse_error(line: usize, message: impl Into<String>) -> IoError {
    IoError::Parse { line, message: message.into() }
}

fn read(path: &Path) -> Result<String, IoError> {
    fs::read_to_string(path).map_err(|source| IoError::Read { path: path.to_path_buf(), source })
}

/// Meaningful lines with their 1-based line numbers
fn lines(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

fn parse_u64(token: &str, what: &str, line: usize) -> Result<u64, IoError> {
    let parsed = match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => token.parse(),
    };
    parsed.map_err(|_| parse_error(line, format!("Invalid {}: {}", what, token)))
}

fn parse_i64(token: &str, what: &str, line: usize) -> Result<i64, IoError> {
    let value = match token.strip_prefix('-') {
        Some(rest) => -i128::from(parse_u64(rest, what, line)?),
        None => i128::from(parse_u64(token, what, line)?),
    };
    i64::try_from(value).map_err(|_| parse_error(line, format!("{} out of range: {}", what, token)))
}

fn parse_pid(token: &str, line: usize) -> Result<ProcessId, IoError> {
    token
        .parse()
        .map_err(|_| parse_error(line, format!("Invalid process id: {}", token)))
}

/// A process and the pages it starts with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessPages {
    pub process: ProcessId,
    pub pages: Vec<u64>,
}

/// Parse `pid page page ...` lines
pub fn parse_process_pages(content: &str) -> Result<Vec<ProcessPages>, IoError> {
    lines(content)
        .map(|(n, line)| {
            let mut tokens = line.split_whitespace();
            let process = parse_pid(tokens.next().unwrap_or_default(), n)?;
            let pages = tokens.map(|t| parse_u64(t, "page number", n)).collect::<Result<_, _>>()?;
            Ok(ProcessPages { process, pages })
        })
        .collect()
}

pub fn read_process_pages<P: AsRef<Path>>(path: P) -> Result<Vec<ProcessPages>, IoError> {
    parse_process_pages(&read(path.as_ref())?)
}

/// Parse `pid address` pairs. Pairs may span lines.
pub fn parse_address_pairs(content: &str) -> Result<Vec<(ProcessId, u64)>, IoError> {
    let mut tokens = Vec::new();
    for (n, line) in lines(content) {
        tokens.extend(line.split_whitespace().map(|t| (n, t)));
    }
    if tokens.len() % 2 != 0 {
        let line = tokens.last().map_or(0, |(n, _)| *n);
        return Err(parse_error(line, format!("got {} tokens, expected pid/address pairs", tokens.len())));
    }
    tokens
        .chunks(2)
        .map(|pair| {
            let (n, pid) = pair[0];
            let (m, addr) = pair[1];
            Ok((parse_pid(pid, n)?, parse_u64(addr, "address", m)?))
        })
        .collect()
}

pub fn read_address_pairs<P: AsRef<Path>>(path: P) -> Result<Vec<(ProcessId, u64)>, IoError> {
    parse_address_pairs(&read(path.as_ref())?)
}

/// One `pid seg name size [base]` line of a segment init file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSpec {
    pub process: ProcessId,
    pub segment: u32,
    pub name: String,
    pub size: u64,
    pub base: Option<u64>,
}

pub fn parse_segment_specs(content: &str) -> Result<Vec<SegmentSpec>, IoError> {
    lines(content)
        .map(|(n, line)| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if !(4..=5).contains(&tokens.len()) {
                return Err(parse_error(n, format!("expected `pid seg name size [base]`, got {} tokens", tokens.len())));
            }
            let segment = parse_u64(tokens[1], "segment number", n)?;
            let segment = u32::try_from(segment)
                .map_err(|_| parse_error(n, format!("Segment number {} too large", segment)))?;
            Ok(SegmentSpec {
                process: parse_pid(tokens[0], n)?,
                segment,
                name: tokens[2].to_string(),
                size: parse_u64(tokens[3], "segment size", n)?,
                base: tokens.get(4).map(|t| parse_u64(t, "base address", n)).transpose()?,
            })
        })
        .collect()
}

pub fn read_segment_specs<P: AsRef<Path>>(path: P) -> Result<Vec<SegmentSpec>, IoError> {
    parse_segment_specs(&read(path.as_ref())?)
}

/// Parse `pid seg offset` triples, one per line
pub fn parse_segment_addresses(content: &str) -> Result<Vec<(ProcessId, u32, i64)>, IoError> {
    lines(content)
        .map(|(n, line)| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() != 3 {
                return Err(parse_error(n, format!("expected `pid seg offset`, got {} tokens", tokens.len())));
            }
            let segment = parse_u64(tokens[1], "segment number", n)?;
            let segment = u32::try_from(segment)
                .map_err(|_| parse_error(n, format!("Segment number {} too large", segment)))?;
            Ok((parse_pid(tokens[0], n)?, segment, parse_i64(tokens[2], "offset", n)?))
        })
        .collect()
}

pub fn read_segment_addresses<P: AsRef<Path>>(path: P) -> Result<Vec<(ProcessId, u32, i64)>, IoError> {
    parse_segment_addresses(&read(path.as_ref())?)
}

/// One `pid page [r|w]` line of a virtual memory access trace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageAccess {
    pub process: ProcessId,
    pub page: VirtualPageId,
    pub write: bool,
}

pub fn parse_page_accesses(content: &str) -> Result<Vec<PageAccess>, IoError> {
    lines(content)
        .map(|(n, line)| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let write = match tokens.get(2).copied() {
                None | Some("r") | Some("R") => false,
                Some("w") | Some("W") => true,
                Some(other) => return Err(parse_error(n, format!("Invalid access mode: {}", other))),
            };
            if !(2..=3).contains(&tokens.len()) {
                return Err(parse_error(n, format!("expected `pid page [r|w]`, got {} tokens", tokens.len())));
            }
            Ok(PageAccess {
                process: parse_pid(tokens[0], n)?,
                page: VirtualPageId(parse_u64(tokens[1], "page number", n)?),
                write,
            })
        })
        .collect()
}

pub fn read_page_accesses<P: AsRef<Path>>(path: P) -> Result<Vec<PageAccess>, IoError> {
    parse_page_accesses(&read(path.as_ref())?)
}

/// Parse a reference string. Commas are accepted as separators too.
pub fn parse_reference_string(content: &str) -> Result<Vec<VirtualPageId>, IoError> {
    let mut pages = Vec::new();
    for (n, line) in lines(content) {
        for token in line.split(|c: char| c.is_whitespace() || c == ',').filter(|t| !t.is_empty()) {
            pages.push(VirtualPageId(parse_u64(token, "page number", n)?));
        }
    }
    Ok(pages)
}

pub fn read_reference_string<P: AsRef<Path>>(path: P) -> Result<Vec<VirtualPageId>, IoError> {
    parse_reference_string(&read(path.as_ref())?)
}

/// Write space-separated results (-1 for failed translations)
pub fn write_results<P: AsRef<Path>>(path: P, results: &[i64]) -> Result<(), IoError> {
    let output: Vec<String> = results.iter().map(|r| r.to_string()).collect();
    let path = path.as_ref();
    fs::write(path, output.join(" ")).map_err(|source| IoError::Write { path: path.to_path_buf(), source })
}
