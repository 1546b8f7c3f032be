//! Dispatches the requested passes in order and reconciles what each discovers.

use lsp_types::{Diagnostic, DiagnosticSeverity};
use tracing::{debug, error};

use crate::{
	passes::{Pass, PassContext, PassOutput, PassTable, Passes},
	reconcile::{reconcile, Baseline},
	store::{Category, SymbolRecord, SymbolStore},
	util::DiagBuilder,
	workspace::DocKind,
};

use super::SourceUnit;

/// Returns nothing if `unit` did not match successfully.
#[must_use]
pub fn run(
	unit: &SourceUnit,
	request: Passes,
	table: &PassTable,
	store: &SymbolStore,
) -> Vec<Diagnostic> {
	let Some(root) = unit.matched.root() else {
		return vec![];
	};

	let ctx = PassContext {
		unit,
		root,
		store,
	};

	let mut diags = vec![];

	for (pass, imp) in table.iter() {
		if !request.contains(pass.flag()) {
			continue;
		}

		if pass == Pass::Signatures && !unit.info.kind.is_documentable() {
			continue;
		}

		let output = match imp.run(&ctx) {
			Ok(o) => o,
			Err(err) => {
				error!("{} pass failed on {}: {err}", pass.name(), unit.uri);
				PassOutput::default()
			}
		};

		diags.extend(output.diagnostics);
		commit(unit, pass, output.symbols, store, &mut diags);
	}

	diags
}

fn commit(
	unit: &SourceUnit,
	pass: Pass,
	mut symbols: Vec<SymbolRecord>,
	store: &SymbolStore,
	diags: &mut Vec<Diagnostic>,
) {
	for &category in pass.categories() {
		let (discovered, rest) = symbols
			.into_iter()
			.partition::<Vec<_>, _>(|rec| rec.data.category() == category);

		symbols = rest;

		if category != Category::InstanceVariable {
			reconcile(store, &unit.uri, category, discovered, Baseline::Attributed);
			continue;
		}

		let object = match (unit.info.kind, unit.info.resource.as_deref()) {
			(DocKind::ObjectEvent, Some(object)) => object,
			_ => {
				// Only object events own instance variables; anything left over
				// from a reclassified unit goes.
				reconcile(store, &unit.uri, category, vec![], Baseline::Attributed);
				continue;
			}
		};

		reconcile(store, &unit.uri, category, discovered, Baseline::Manifest { object });
		diags.extend(missing_expected(object, store));
	}

	if !symbols.is_empty() {
		debug!(
			"{} pass produced {} symbol(s) outside its categories for {}",
			pass.name(),
			symbols.len(),
			unit.uri
		);
	}
}

/// One hint per manifest variable which no event of `object` assigns.
#[must_use]
fn missing_expected(object: &str, store: &SymbolStore) -> Option<Diagnostic> {
	let missing = store
		.expected_instance_variables(object)
		.into_iter()
		.filter(|name| !store.is_provided(object, name))
		.collect::<Vec<_>>();

	if missing.is_empty() {
		return None;
	}

	let start = lsp_types::Position::new(0, 0);

	Some(
		DiagBuilder::new(
			lsp_types::Range::new(start, start),
			DiagnosticSeverity::HINT,
			format!(
				"`{object}` declares variable definition(s) never assigned by any event: {}",
				missing.join(", ")
			),
		)
		.build(),
	)
}
