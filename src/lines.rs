//! Functions and types for dealing in strings in terms of lines.
//!
//! The offset/line-column mapping follows rust-analyzer's `line-index`.
//! LSP positions are always UTF-16; everything internal is UTF-8.

use lsp_types::TextDocumentContentChangeEvent;
use nohash_hasher::IntMap;
use rowan::{TextRange, TextSize};

/// `(line, column)` information in the native, UTF-8 encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineCol {
	/// Zero-based.
	pub line: u32,
	/// Zero-based UTF-8 offset.
	pub col: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WideChar {
	/// Start offset of a character inside a line, zero-based.
	start: TextSize,
	/// End offset of a character inside a line, zero-based.
	end: TextSize,
}

impl WideChar {
	fn len(&self) -> TextSize {
		self.end - self.start
	}

	/// Returns the length in UTF-16 code units.
	fn wide_len(&self) -> u32 {
		if self.len() == TextSize::from(4) {
			2
		} else {
			1
		}
	}
}

/// Maps flat [`TextSize`] offsets to/from `(line, column)` representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
	/// Offset the beginning of each line (except the first, which always has offset 0).
	newlines: Box<[TextSize]>,
	/// Offset of the end of each line's content, before any `\n` or `\r\n`.
	line_ends: Box<[TextSize]>,
	/// List of non-ASCII characters on each line.
	line_wide_chars: IntMap<u32, Box<[WideChar]>>,
	/// The length of the entire text.
	len: TextSize,
}

impl LineIndex {
	#[must_use]
	pub fn new(text: &str) -> LineIndex {
		let (newlines, line_wide_chars) = analyze_source_file(text);
		let bytes = text.as_bytes();

		let line_ends = newlines
			.iter()
			.map(|&next| {
				let mut end = u32::from(next) - 1;

				if end > 0 && bytes[end as usize - 1] == b'\r' {
					end -= 1;
				}

				TextSize::from(end)
			})
			.chain(std::iter::once(TextSize::of(text)))
			.collect();

		LineIndex {
			newlines: newlines.into_boxed_slice(),
			line_ends,
			line_wide_chars,
			len: TextSize::of(text),
		}
	}

	/// Returns `None` if the `offset` was invalid, e.g. if it extends past the end of the text or
	/// points to the middle of a multi-byte character.
	#[must_use]
	pub fn try_line_col(&self, offset: TextSize) -> Option<LineCol> {
		if offset > self.len {
			return None;
		}

		let line = self.newlines.partition_point(|&it| it <= offset);
		let start = self.start_offset(line)?;
		let col = offset - start;

		let ret = LineCol {
			line: line as u32,
			col: col.into(),
		};

		self.line_wide_chars
			.get(&ret.line)
			.into_iter()
			.flat_map(|it| it.iter())
			.all(|it| col <= it.start || it.end <= col)
			.then_some(ret)
	}

	fn start_offset(&self, line: usize) -> Option<TextSize> {
		match line.checked_sub(1) {
			None => Some(TextSize::from(0)),
			Some(it) => self.newlines.get(it).copied(),
		}
	}

	/// UTF-8 column to UTF-16 column.
	#[must_use]
	fn to_wide(&self, line_col: LineCol) -> Option<LineCol> {
		let mut col = line_col.col;

		if let Some(wide_chars) = self.line_wide_chars.get(&line_col.line) {
			for c in wide_chars.iter() {
				if u32::from(c.end) <= line_col.col {
					col = col.checked_sub(u32::from(c.len()) - c.wide_len())?;
				} else {
					// From here on, all wide characters come *after* the character
					// being mapped, so they don't need to be taken into account.
					break;
				}
			}
		}

		Some(LineCol {
			line: line_col.line,
			col,
		})
	}

	/// UTF-16 column to UTF-8 column.
	#[must_use]
	fn to_utf8(&self, line_col: LineCol) -> Option<LineCol> {
		let mut col = line_col.col;

		if let Some(wide_chars) = self.line_wide_chars.get(&line_col.line) {
			for c in wide_chars.iter() {
				if col > u32::from(c.start) {
					col = col.checked_add(u32::from(c.len()) - c.wide_len())?;
				} else {
					break;
				}
			}
		}

		Some(LineCol {
			line: line_col.line,
			col,
		})
	}

	/// Offsets past the end of the text are clamped to the end.
	#[must_use]
	pub fn position(&self, offset: TextSize) -> lsp_types::Position {
		let offset = offset.min(self.len);

		let lc = self
			.try_line_col(offset)
			.and_then(|lc| self.to_wide(lc))
			.unwrap_or(LineCol {
				line: self.newlines.partition_point(|&it| it <= offset) as u32,
				col: 0,
			});

		lsp_types::Position {
			line: lc.line,
			character: lc.col,
		}
	}

	#[must_use]
	pub fn range(&self, range: TextRange) -> lsp_types::Range {
		lsp_types::Range {
			start: self.position(range.start()),
			end: self.position(range.end()),
		}
	}

	/// Maps an LSP (UTF-16) position back to a flat offset.
	///
	/// A column past the end of its line means the end of that line, and a
	/// line past the last one means the end of the text. A column inside a
	/// surrogate pair snaps back to the start of its character.
	#[must_use]
	pub fn offset_of(&self, pos: lsp_types::Position) -> TextSize {
		let (Some(start), Some(&end)) = (
			self.start_offset(pos.line as usize),
			self.line_ends.get(pos.line as usize),
		) else {
			return self.len;
		};

		let line_len = u32::from(end - start);

		let mut col = self
			.to_utf8(LineCol {
				line: pos.line,
				col: pos.character,
			})
			.map_or(line_len, |lc| lc.col.min(line_len));

		if let Some(wide_chars) = self.line_wide_chars.get(&pos.line) {
			if let Some(c) = wide_chars
				.iter()
				.find(|c| u32::from(c.start) < col && col < u32::from(c.end))
			{
				col = c.start.into();
			}
		}

		start + TextSize::from(col)
	}

	/// The ends of an inverted range are swapped.
	#[must_use]
	pub fn text_range_of(&self, range: lsp_types::Range) -> TextRange {
		let start = self.offset_of(range.start);
		let end = self.offset_of(range.end);
		TextRange::new(start.min(end), start.max(end))
	}

	/// Returns the length of the original text.
	#[must_use]
	pub fn len(&self) -> TextSize {
		self.len
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len == TextSize::from(0)
	}
}

/// Adapted from the rustc_span crate, https://github.com/rust-lang/rust/blob/master/compiler/rustc_span/src/analyze_source_file.rs
fn analyze_source_file(src: &str) -> (Vec<TextSize>, IntMap<u32, Box<[WideChar]>>) {
	let mut lines = vec![];
	let mut line_wide_chars = IntMap::<u32, Vec<WideChar>>::default();
	let src_bytes = src.as_bytes();
	let mut i = 0;

	while i < src.len() {
		let byte = src_bytes[i];
		let mut char_len = 1;

		if byte == b'\n' {
			lines.push(TextSize::from(i as u32 + 1));
		} else if byte >= 127 {
			// The slow path: just decode to `char`.
			let Some(c) = src[i..].chars().next() else {
				break;
			};

			char_len = c.len_utf8();

			if char_len > 1 {
				let line_start = lines.last().copied().unwrap_or_default();
				let start = TextSize::from(i as u32) - line_start;

				line_wide_chars
					.entry(lines.len() as u32)
					.or_default()
					.push(WideChar {
						start,
						end: start + TextSize::from(char_len as u32),
					});
			}
		}

		i += char_len;
	}

	(
		lines,
		line_wide_chars
			.into_iter()
			.map(|(k, v)| (k, v.into_boxed_slice()))
			.collect(),
	)
}

/// From rust-analyzer. Applies LSP content changes to `text` in order.
/// Positions outside the text are clamped as in [`LineIndex::offset_of`].
pub fn splice_changes(text: &mut String, mut changes: Vec<TextDocumentContentChangeEvent>) {
	// Skip to the last full document change,
	// as it invalidates all previous changes anyways.
	let mut start = changes
		.iter()
		.rev()
		.position(|change| change.range.is_none())
		.map_or(0, |idx| changes.len() - idx - 1);

	match changes.get_mut(start) {
		Some(TextDocumentContentChangeEvent {
			range: None,
			text: full,
			..
		}) => {
			*text = std::mem::take(full);
			start += 1;

			// The only change is a full document update.
			if start == changes.len() {
				return;
			}
		}
		Some(_) => {}
		// We received no content changes.
		None => return,
	}

	let mut lndx = LineIndex::new(text);

	// The changes we got must be applied sequentially, but can cross lines so we
	// have to keep our line index updated. Some clients (e.g. VSCode) sort the
	// ranges in reverse. As an optimization, we remember the last valid line in
	// the index and only rebuild it if needed.
	let mut index_valid = u32::MAX;

	for change in changes.into_iter().skip(start) {
		let Some(range) = change.range else {
			continue;
		};

		if index_valid <= range.end.line {
			lndx = LineIndex::new(text);
		}

		index_valid = range.start.line;

		let range = lndx.text_range_of(range);
		text.replace_range(std::ops::Range::<usize>::from(range), &change.text);
	}
}
