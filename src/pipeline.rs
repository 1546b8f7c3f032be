//! The per-document analysis pipeline:
//! match → syntax diagnostics → semantic passes → reconciliation.
//!
//! A [`Pipeline`] is shared by every document; serializing runs for any one
//! URI is the caller's responsibility (see [`crate::session`]).

pub mod matching;
pub mod semantics;
pub mod syntax;

use std::sync::Arc;

use lsp_types::{Diagnostic, Url};
use tracing::debug;

use crate::{
	lines::LineIndex,
	passes::{PassTable, Passes},
	store::SymbolStore,
	workspace::UnitInfo,
};

use self::{
	matching::{GmlGrammar, Grammar, MatchResult},
	syntax::SigToken,
};

/// One analyzed document, as of one version of its text.
#[derive(Debug)]
pub struct SourceUnit {
	pub uri: Url,
	pub info: UnitInfo,
	pub text: String,
	pub lines: LineIndex,
	pub matched: MatchResult,
	/// Empty unless `matched` is a success.
	pub sig_tokens: Vec<SigToken>,
}

pub struct Pipeline {
	grammar: Box<dyn Grammar>,
	passes: PassTable,
	store: Arc<SymbolStore>,
}

impl Pipeline {
	#[must_use]
	pub fn new(store: Arc<SymbolStore>) -> Self {
		Self {
			grammar: Box::new(GmlGrammar),
			passes: PassTable::standard(),
			store,
		}
	}

	#[must_use]
	pub fn with_passes(mut self, passes: PassTable) -> Self {
		self.passes = passes;
		self
	}

	#[must_use]
	pub fn with_grammar(mut self, grammar: impl Grammar + 'static) -> Self {
		self.grammar = Box::new(grammar);
		self
	}

	#[must_use]
	pub fn store(&self) -> &Arc<SymbolStore> {
		&self.store
	}

	/// Runs every phase over `text` and returns the unit alongside its
	/// diagnostics, syntax diagnostics first.
	pub fn run(
		&self,
		uri: Url,
		info: UnitInfo,
		text: String,
		request: Passes,
	) -> (SourceUnit, Vec<Diagnostic>) {
		let start_time = std::time::Instant::now();
		let matched = self.grammar.matches(&text);
		let lines = LineIndex::new(&text);

		debug!(
			"Matched {uri} in {}ms (success: {}).",
			start_time.elapsed().as_millis(),
			matched.is_success()
		);

		let start_time = std::time::Instant::now();
		let (mut diags, sig_tokens) = syntax::diagnose(&matched, &lines);

		debug!(
			"Syntax diagnostics for {uri} took {}ms.",
			start_time.elapsed().as_millis()
		);

		let unit = SourceUnit {
			uri,
			info,
			text,
			lines,
			matched,
			sig_tokens,
		};

		if !unit.matched.is_success() {
			return (unit, diags);
		}

		let start_time = std::time::Instant::now();
		diags.extend(semantics::run(&unit, request, &self.passes, &self.store));

		debug!(
			"Semantics for {} took {}ms.",
			unit.uri,
			start_time.elapsed().as_millis()
		);

		(unit, diags)
	}
}

impl Default for Pipeline {
	fn default() -> Self {
		Self::new(Arc::new(SymbolStore::new()))
	}
}

impl std::fmt::Debug for Pipeline {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Pipeline")
			.field("passes", &self.passes)
			.field("store", &self.store)
			.finish_non_exhaustive()
	}
}
