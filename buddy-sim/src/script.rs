//! Parsing for script files consumed by `buddy-sim run --script`.
//!
//! A script is a plain text file, one operation per line:
//!
//! ```text
//! # comment
//! alloc 4096
//! alloc 8192
//! free 0
//! stats
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.

use anyhow::{bail, Result};

/// One operation from a script, addressed to the running [`Arena`](buddy_core::Arena)
/// via [`crate::driver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Allocate a block able to hold this many pages.
    Alloc(u64),
    /// Free the handle recorded at this slot.
    Free(usize),
    /// Print the current per-order table.
    Stats,
}

/// Parse a full script's text into an ordered list of operations.
pub fn parse(text: &str) -> Result<Vec<Operation>> {
    text.lines()
        .enumerate()
        .filter_map(|(lineno, line)| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                None
            } else {
                Some(parse_line(lineno + 1, line))
            }
        })
        .collect()
}

fn parse_line(lineno: usize, line: &str) -> Result<Operation> {
    let mut words = line.split_whitespace();
    let command = match words.next() {
        Some(c) => c,
        None => bail!("line {lineno}: empty operation"),
    };
    match command {
        "alloc" => {
            let size = words
                .next()
                .and_then(|w| w.parse::<u64>().ok())
                .ok_or_else(|| anyhow::anyhow!("line {lineno}: `alloc` needs a numeric size"))?;
            Ok(Operation::Alloc(size))
        }
        "free" => {
            let slot = words
                .next()
                .and_then(|w| w.parse::<usize>().ok())
                .ok_or_else(|| anyhow::anyhow!("line {lineno}: `free` needs a numeric slot"))?;
            Ok(Operation::Free(slot))
        }
        "stats" => Ok(Operation::Stats),
        other => bail!("line {lineno}: unknown operation `{other}`"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_three_operations() {
        let ops = parse("alloc 4096\nfree 0\nstats\n").unwrap();
        assert_eq!(ops, vec![Operation::Alloc(4096), Operation::Free(0), Operation::Stats]);
    }

    #[test]
    fn skips_blank_lines_and_comments() {
        let ops = parse("# a comment\n\nalloc 1\n  \nstats\n").unwrap();
        assert_eq!(ops, vec![Operation::Alloc(1), Operation::Stats]);
    }

    #[test]
    fn rejects_unknown_operation() {
        assert!(parse("frobnicate 9").is_err());
    }

    #[test]
    fn rejects_missing_argument() {
        assert!(parse("alloc").is_err());
        assert!(parse("free").is_err());
    }
}
