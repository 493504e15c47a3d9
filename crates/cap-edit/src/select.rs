//! Record selection by 1-based index ranges.

use tracing::warn;

use crate::error::CapError;

/// Most items a selection list will hold; extras are dropped with a
/// warning rather than aborting the run.
pub const MAX_SELECTIONS: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SelectItem {
    Single(u64),
    /// Inclusive; `u64::MAX` as the end for open-ended (`A-0`) ranges.
    Range(u64, u64),
}

/// An ordered list of record numbers and ranges plus the largest index
/// any of them can match.
#[derive(Debug, Default)]
pub struct SelectionSet {
    items: Vec<SelectItem>,
    max_selection: u64,
    overflowed: bool,
}

impl SelectionSet {
    /// Parse one `N` or `A-B` argument and append it. An end of 0 means
    /// "A through the end of the capture"; a reversed finite range is
    /// swapped.
    pub fn add(&mut self, arg: &str) -> Result<(), CapError> {
        if self.items.len() >= MAX_SELECTIONS {
            if !self.overflowed {
                warn!("only {MAX_SELECTIONS} selections are supported; ignoring the rest");
                self.overflowed = true;
            }
            return Ok(());
        }

        let item = match arg.split_once('-') {
            Some((a, b)) => {
                let a = parse_index(arg, a)?;
                let b = parse_index(arg, b)?;
                if b == 0 {
                    SelectItem::Range(a, u64::MAX)
                } else if b < a {
                    SelectItem::Range(b, a)
                } else {
                    SelectItem::Range(a, b)
                }
            }
            None => SelectItem::Single(parse_index(arg, arg)?),
        };

        self.max_selection = self.max_selection.max(match item {
            SelectItem::Single(n) => n,
            SelectItem::Range(_, end) => end,
        });
        self.items.push(item);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Largest record index any item can match; `u64::MAX` when a range
    /// is open-ended. Drives early loop termination in keep mode.
    pub fn max_selection(&self) -> u64 {
        self.max_selection
    }

    pub fn selected(&self, n: u64) -> bool {
        self.items.iter().any(|item| match *item {
            SelectItem::Single(s) => s == n,
            SelectItem::Range(a, b) => a <= n && n <= b,
        })
    }
}

fn parse_index(arg: &str, s: &str) -> Result<u64, CapError> {
    s.trim()
        .parse()
        .map_err(|_| CapError::Config(format!("\"{arg}\" isn't a valid record number or range")))
}
