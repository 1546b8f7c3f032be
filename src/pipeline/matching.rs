//! The match phase: source text in, [`MatchResult`] out.

use rowan::{GreenNode, TextSize};

use crate::gml::{parse, SyntaxNode};

/// A grammar which classifies any text, however malformed, without panicking.
pub trait Grammar: Send + Sync {
	fn matches(&self, text: &str) -> MatchResult;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GmlGrammar;

impl Grammar for GmlGrammar {
	fn matches(&self, text: &str) -> MatchResult {
		match parse::file(text) {
			Ok(parsed) => MatchResult::Success(Matched {
				green: parsed.green,
			}),
			Err(err) => MatchResult::Failure(MatchFailure {
				offset: err.offset,
				found: err.found,
				expected: err.expected,
			}),
		}
	}
}

/// Immutable once produced; the next edit supersedes it wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
	Success(Matched),
	Failure(MatchFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matched {
	pub green: GreenNode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchFailure {
	pub offset: TextSize,
	pub found: &'static str,
	/// Sorted and deduplicated.
	pub expected: Vec<&'static str>,
}

impl MatchResult {
	#[must_use]
	pub fn is_success(&self) -> bool {
		matches!(self, Self::Success(_))
	}

	/// `None` on failure.
	#[must_use]
	pub fn root(&self) -> Option<SyntaxNode> {
		match self {
			Self::Success(matched) => Some(SyntaxNode::new_root(matched.green.clone())),
			Self::Failure(_) => None,
		}
	}
}
