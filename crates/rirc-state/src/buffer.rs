//! The scrollback-aware ring buffer of lines (C6) that every display
//! surface reads from.
//!
//! Fixed capacity, unsigned `head`/`tail`/`scrollback` cursors that
//! wrap on overflow, and a scrollback cursor pinned against eviction
//! while it trails behind `head`. Whether scrollback is currently
//! tracking `head` reduces to a plain index comparison, since
//! `scrollback` is always either equal to `head` or inside
//! `[tail, head)`.

use std::cell::Cell;

use crate::fatal;

pub const BUFFER_LINES_MAX: usize = 1 << 10;
const MASK: u32 = (BUFFER_LINES_MAX as u32) - 1;

pub const TEXT_LENGTH_MAX: usize = 510;
pub const FROM_LENGTH_MAX: usize = 100;

/// ABI-stable per §6: these three values must not be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BufferLineKind {
    Other = 0,
    Chat = 1,
    Pinged = 2,
}

#[derive(Debug, Clone)]
pub struct BufferLine {
    pub kind: BufferLineKind,
    pub from: String,
    pub text: String,
    pub from_len: usize,
    pub text_len: usize,
    pub time: time::Tm,
    /// A CTCP ACTION (`/me ...`), rendered without the `\x01` framing.
    pub is_action: bool,
    wrap_cache: Cell<Option<(u32, u32)>>,
}

impl BufferLine {
    /// Number of rows this line wraps to at `width` columns, memoised
    /// until queried at a different width.
    pub fn rows(&self, width: u32) -> u32 {
        if width == 0 {
            fatal!("width is zero");
        }
        if let Some((w, rows)) = self.wrap_cache.get() {
            if w == width {
                return rows;
            }
        }
        let rows = word_wrap_rows(&self.text, width as usize) as u32;
        self.wrap_cache.set(Some((width, rows)));
        rows
    }
}

/// Word-wrap row count: break on whitespace, hard-break mid-word when a
/// single word exceeds `width`, empty text occupies one row.
fn word_wrap_rows(text: &str, width: usize) -> usize {
    if text.is_empty() {
        return 1;
    }

    let mut rows = 1usize;
    let mut col = 0usize;

    for word in text.split_whitespace() {
        let wlen = word.chars().count();
        let needed = if col == 0 { wlen } else { col + 1 + wlen };

        if needed <= width {
            col = needed;
            continue;
        }

        if wlen > width {
            if col > 0 {
                rows += 1;
            }
            let mut remaining = wlen;
            while remaining > width {
                rows += 1;
                remaining -= width;
            }
            col = remaining;
        } else {
            rows += 1;
            col = wlen;
        }
    }

    rows
}

fn floor_char_boundary(s: &str, idx: usize) -> usize {
    if idx >= s.len() {
        return s.len();
    }
    let mut idx = idx;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn truncate_bytes(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_owned()
    } else {
        s[..floor_char_boundary(s, max)].to_owned()
    }
}

/// Fixed-capacity ring buffer of lines with a scrollback cursor.
#[derive(Debug)]
pub struct Buffer {
    lines: Vec<Option<BufferLine>>,
    head: u32,
    tail: u32,
    scrollback: u32,
    pad: usize,
}

impl Default for Buffer {
    fn default() -> Buffer {
        Buffer::new()
    }
}

impl Buffer {
    pub fn new() -> Buffer {
        let mut lines = Vec::with_capacity(BUFFER_LINES_MAX);
        lines.resize_with(BUFFER_LINES_MAX, || None);
        Buffer {
            lines,
            head: 0,
            tail: 0,
            scrollback: 0,
            pad: 0,
        }
    }

    fn mask(i: u32) -> usize {
        (i & MASK) as usize
    }

    pub fn size(&self) -> u32 {
        self.head.wrapping_sub(self.tail)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn pad(&self) -> usize {
        self.pad
    }

    pub fn scrollback(&self) -> u32 {
        self.scrollback
    }

    pub fn head_index(&self) -> Option<u32> {
        if self.is_empty() {
            None
        } else {
            Some(self.head.wrapping_sub(1))
        }
    }

    pub fn tail_index(&self) -> Option<u32> {
        if self.is_empty() {
            None
        } else {
            Some(self.tail)
        }
    }

    pub fn head(&self) -> Option<&BufferLine> {
        self.head_index().map(|i| self.line(i))
    }

    pub fn tail(&self) -> Option<&BufferLine> {
        self.tail_index().map(|i| self.line(i))
    }

    fn in_range(&self, i: u32) -> bool {
        if self.head > self.tail {
            !(i < self.tail || i >= self.head)
        } else if self.tail > self.head {
            !(i < self.tail && i >= self.head)
        } else {
            false
        }
    }

    /// Returns the line at index `i`. `i` must lie in `[tail, head)`
    /// modularly; violating that is a programmer error (fatal), never
    /// something caused by peer input.
    pub fn line(&self, i: u32) -> &BufferLine {
        if !self.in_range(i) {
            fatal!("invalid buffer index: {}", i);
        }
        self.lines[Self::mask(i)]
            .as_ref()
            .unwrap_or_else(|| fatal!("in-range buffer slot {} was never populated", i))
    }

    pub fn line_rows(&self, i: u32, width: u32) -> u32 {
        self.line(i).rows(width)
    }

    fn push(&mut self) -> u32 {
        if self.scrollback == self.head {
            self.scrollback = self.head.wrapping_add(1);
        }
        if self.size() == BUFFER_LINES_MAX as u32 {
            if self.scrollback == self.tail {
                self.scrollback = self.scrollback.wrapping_add(1);
            }
            self.tail = self.tail.wrapping_add(1);
        }
        let idx = self.head;
        self.head = self.head.wrapping_add(1);
        idx
    }

    fn push_line(&mut self, line: BufferLine) {
        let idx = self.push();
        self.lines[Self::mask(idx)] = Some(line);
    }

    fn push_single(&mut self, kind: BufferLineKind, from: &str, text: &str, is_action: bool) {
        let from_len = from.len();
        if from_len > self.pad {
            self.pad = from_len;
        }
        self.push_line(BufferLine {
            kind,
            from: from.to_owned(),
            text: text.to_owned(),
            from_len,
            text_len: text.len(),
            time: time::now(),
            is_action,
            wrap_cache: Cell::new(None),
        });
    }

    /// Pushes a new line, splitting `text` longer than 510 bytes into
    /// several lines that all carry the same `from`/`kind`. `from` is
    /// truncated to 100 bytes.
    pub fn newline(&mut self, kind: BufferLineKind, from: &str, text: &str) {
        self.newline_inner(kind, from, text, false)
    }

    pub fn newline_action(&mut self, kind: BufferLineKind, from: &str, text: &str) {
        self.newline_inner(kind, from, text, true)
    }

    fn newline_inner(&mut self, kind: BufferLineKind, from: &str, text: &str, is_action: bool) {
        let from = truncate_bytes(from, FROM_LENGTH_MAX);
        if text.len() <= TEXT_LENGTH_MAX {
            self.push_single(kind, &from, text, is_action);
            return;
        }
        let mut rest = text;
        while !rest.is_empty() {
            let cut = floor_char_boundary(rest, TEXT_LENGTH_MAX.min(rest.len()));
            let cut = if cut == 0 { rest.len().min(TEXT_LENGTH_MAX.max(1)) } else { cut };
            let (chunk, remainder) = rest.split_at(cut);
            self.push_single(kind, &from, chunk, is_action);
            rest = remainder;
        }
    }

    /// Moves `scrollback` toward `tail` by whole lines without the
    /// cumulative row count at `width` exceeding `rows`. Clamps at tail.
    pub fn page_back(&mut self, width: u32, rows: u32) {
        if self.is_empty() {
            return;
        }
        let mut i = self.scrollback;
        let mut used = 0u32;
        while i > self.tail {
            let prev = i.wrapping_sub(1);
            let r = self.line(prev).rows(width);
            if used + r > rows {
                break;
            }
            used += r;
            i = prev;
        }
        self.scrollback = i;
    }

    /// Moves `scrollback` toward `head`; moving past head re-enters
    /// tail-follow mode.
    pub fn page_forward(&mut self, width: u32, rows: u32) {
        if self.is_empty() {
            return;
        }
        let mut i = self.scrollback;
        let mut used = 0u32;
        while i < self.head {
            let r = self.line(i).rows(width);
            if used + r > rows {
                break;
            }
            used += r;
            i = i.wrapping_add(1);
        }
        self.scrollback = i;
    }

    /// `0` in tail-follow mode, else `(head - scrollback) / size` in `(0, 1]`.
    pub fn scrollback_status(&self) -> f32 {
        if self.is_empty() || self.scrollback == self.head {
            return 0.0;
        }
        self.head.wrapping_sub(self.scrollback) as f32 / self.size() as f32
    }
}
