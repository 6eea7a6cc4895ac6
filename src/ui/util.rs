use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::Transaction;

/// Dollar amount with thousand separators and two decimals.
/// e.g. `-1234567.891` → `"-$1,234,567.89"`
pub(crate) fn format_amount(val: Decimal) -> String {
    let rounded = val
        .abs()
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{rounded:.2}");
    let (int_part, dec_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let digits: Vec<char> = int_part.chars().collect();
    let grouped = digits
        .rchunks(3)
        .rev()
        .map(|group| group.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(",");

    let sign = if val < Decimal::ZERO && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}${grouped}.{dec_part}")
}

/// Amount as it affects the balance: `+$2,000.00` or `-$50.00`.
pub(crate) fn format_signed(txn: &Transaction) -> String {
    let sign = if txn.is_income() { "+" } else { "-" };
    format!("{sign}{}", format_amount(txn.amount))
}

/// Truncate to `max` visible characters, ending in "…" when cut.
pub(crate) fn truncate(s: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max - 1).collect();
    format!("{kept}…")
}

/// Selection and scroll offset of a list that is taller than its viewport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ListCursor {
    pub(crate) index: usize,
    pub(crate) scroll: usize,
}

impl ListCursor {
    pub(crate) fn down(&mut self, len: usize, page: usize) {
        if self.index + 1 < len {
            self.index += 1;
            if self.index >= self.scroll + page.max(1) {
                self.scroll = self.index + 1 - page.max(1);
            }
        }
    }

    pub(crate) fn up(&mut self) {
        self.index = self.index.saturating_sub(1);
        self.scroll = self.scroll.min(self.index);
    }

    pub(crate) fn top(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn bottom(&mut self, len: usize, page: usize) {
        if len > 0 {
            self.index = len - 1;
            self.scroll = self.index.saturating_sub(page.saturating_sub(1));
        }
    }

    /// Keep the cursor inside a list that may have shrunk.
    pub(crate) fn clamp(&mut self, len: usize) {
        if len == 0 {
            self.top();
            return;
        }
        self.index = self.index.min(len - 1);
        self.scroll = self.scroll.min(self.index);
    }
}
