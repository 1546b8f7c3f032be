//! Turns a [`MatchResult`] into syntax diagnostics, and derives the
//! signature token list from a successful match.

use lsp_types::{Diagnostic, DiagnosticSeverity};
use rowan::{ast::AstNode, TextRange, TextSize};

use crate::{
	gml::{ast, Syn},
	lines::LineIndex,
	util::DiagBuilder,
};

use super::matching::{MatchFailure, MatchResult};

pub const PARSER_SOURCE: &str = "gml-ls-parser";

/// One call site, as needed by signature help.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigToken {
	pub callee: String,
	pub callee_range: TextRange,
	pub open_paren: TextSize,
	/// `None` if the argument list is not closed.
	pub close_paren: Option<TextSize>,
	pub commas: Vec<TextSize>,
}

impl SigToken {
	/// Which argument a cursor at `offset` is in, if it is inside the parentheses at all.
	#[must_use]
	pub fn active_parameter(&self, offset: TextSize) -> Option<usize> {
		if offset <= self.open_paren || self.close_paren.is_some_and(|c| offset > c) {
			return None;
		}

		Some(self.commas.iter().filter(|c| **c < offset).count())
	}
}

/// At most one diagnostic; none on success.
#[must_use]
pub fn diagnose(matched: &MatchResult, lines: &LineIndex) -> (Vec<Diagnostic>, Vec<SigToken>) {
	match matched {
		MatchResult::Success(_) => (vec![], signature_tokens(matched)),
		MatchResult::Failure(failure) => (vec![failure_diag(failure, lines)], vec![]),
	}
}

#[must_use]
fn failure_diag(failure: &MatchFailure, lines: &LineIndex) -> Diagnostic {
	let pos = lines.position(failure.offset);
	let mut msg = format!("Unexpected {}.", failure.found);

	if !failure.expected.is_empty() {
		msg.push_str(" Expected one of the following: ");
		msg.push_str(&failure.expected.join(", "));
	}

	DiagBuilder::new(
		lsp_types::Range::new(pos, pos),
		DiagnosticSeverity::ERROR,
		msg,
	)
	.source(PARSER_SOURCE)
	.build()
}

#[must_use]
fn signature_tokens(matched: &MatchResult) -> Vec<SigToken> {
	let Some(root) = matched.root() else {
		return vec![];
	};

	root.descendants()
		.filter_map(ast::CallExpr::cast)
		.filter_map(|call| {
			let callee = call.callee_name()?;
			let args = call.arg_list()?;

			let mut open_paren = None;
			let mut close_paren = None;

			for token in args.syntax().children_with_tokens().filter_map(|e| e.into_token()) {
				match token.kind() {
					Syn::LParen if open_paren.is_none() => open_paren = Some(token.text_range().start()),
					Syn::RParen => close_paren = Some(token.text_range().start()),
					_ => {}
				}
			}

			Some(SigToken {
				callee: callee.text().to_string(),
				callee_range: callee.text_range(),
				open_paren: open_paren?,
				close_paren,
				commas: args.commas().map(|c| c.text_range().start()).collect(),
			})
		})
		.collect()
}
