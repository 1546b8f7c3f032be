//! Per-URI, per-category reconciliation of discovered symbols against the store.
//!
//! One cycle: `stale = baseline - names(discovered)`; evict `stale` for this
//! URI only; upsert everything discovered. The whole cycle runs under the
//! store's write lock, so two URIs reconciling at once never observe each
//! other half-done.

use lsp_types::Url;
use tracing::debug;

use crate::{
	store::{Category, SymbolRecord, SymbolStore},
	FxIndexMap, FxIndexSet,
};

/// What the discovered set is diffed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Baseline<'b> {
	/// The names the store currently attributes to the URI.
	Attributed,
	/// The attributed names plus every variable the object's manifest expects.
	/// Only meaningful for [`Category::InstanceVariable`].
	Manifest { object: &'b str },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Reconciled {
	/// Stale names which the URI actually contributed and which were removed.
	pub evicted: Vec<String>,
}

pub fn reconcile(
	store: &SymbolStore,
	uri: &Url,
	category: Category,
	discovered: Vec<SymbolRecord>,
	baseline: Baseline,
) -> Reconciled {
	// Later declarations of one name win.
	let mut discovered = discovered
		.into_iter()
		.map(|rec| (rec.name.clone(), rec))
		.collect::<FxIndexMap<_, _>>();

	discovered.retain(|_, rec| rec.data.category() == category);

	let mut guard = store.write();
	let attributed = guard.attributed_names(uri, category);

	let mut stale = match baseline {
		Baseline::Attributed => attributed.clone(),
		Baseline::Manifest { object } => {
			let mut names = attributed.clone();
			names.extend(guard.expected_instance_variables(object));
			names
		}
	};

	stale.retain(|name| !discovered.contains_key(name));

	let evicted = stale
		.iter()
		.filter(|name| attributed.contains(name.as_str()))
		.cloned()
		.collect::<Vec<_>>();

	guard.evict(uri, category, stale.iter().map(String::as_str));

	guard.upsert(uri, category, discovered.into_values());
	drop(guard);

	if !evicted.is_empty() {
		debug!(
			"Evicted {} stale {category:?} symbol(s) from {uri}: {evicted:?}",
			evicted.len()
		);
	}

	Reconciled { evicted }
}

/// Convenience for checking the eviction-correctness property.
#[must_use]
pub fn names_of(records: &[SymbolRecord]) -> FxIndexSet<String> {
	records.iter().map(|rec| rec.name.clone()).collect()
}

#[cfg(test)]
mod test {
	use lsp_types::Range;

	use super::*;
	use crate::store::SymbolData;

	#[must_use]
	fn uri(path: &str) -> Url {
		Url::parse(&format!("file:///project/{path}")).unwrap()
	}

	#[must_use]
	fn enum_rec(name: &str) -> SymbolRecord {
		SymbolRecord {
			name: name.to_string(),
			range: Range::default(),
			data: SymbolData::Enum { members: vec![] },
		}
	}

	#[must_use]
	fn ivar(name: &str) -> SymbolRecord {
		SymbolRecord {
			name: name.to_string(),
			range: Range::default(),
			data: SymbolData::InstanceVariable {
				object: "obj_player".to_string(),
			},
		}
	}

	#[test]
	fn attributed_equals_discovered() {
		let store = SymbolStore::new();
		let a = uri("a.gml");

		let first = vec![enum_rec("Colors"), enum_rec("States")];
		reconcile(&store, &a, Category::Enum, first, Baseline::Attributed);

		let second = vec![enum_rec("States"), enum_rec("Weapons")];
		let out = reconcile(&store, &a, Category::Enum, second.clone(), Baseline::Attributed);

		assert_eq!(out.evicted, ["Colors"]);
		assert_eq!(store.attributed_names(&a, Category::Enum), names_of(&second));
	}

	#[test]
	fn empty_discovery_evicts_everything() {
		let store = SymbolStore::new();
		let a = uri("a.gml");
		reconcile(&store, &a, Category::Enum, vec![enum_rec("Colors")], Baseline::Attributed);
		let out = reconcile(&store, &a, Category::Enum, vec![], Baseline::Attributed);
		assert_eq!(out.evicted, ["Colors"]);
		assert!(store.attributed_names(&a, Category::Enum).is_empty());
	}

	#[test]
	fn other_uri_untouched() {
		let store = SymbolStore::new();
		let (a, b) = (uri("a.gml"), uri("b.gml"));
		reconcile(&store, &a, Category::Enum, vec![enum_rec("Colors")], Baseline::Attributed);
		reconcile(&store, &b, Category::Enum, vec![enum_rec("Colors")], Baseline::Attributed);
		reconcile(&store, &a, Category::Enum, vec![], Baseline::Attributed);
		assert_eq!(store.attributed_names(&b, Category::Enum).len(), 1);
	}

	#[test]
	fn manifest_baseline() {
		let store = SymbolStore::new();
		let create = uri("objects/obj_player/Create_0.gml");
		store.set_expected_instance_variables("obj_player", ["hp".to_string(), "mp".to_string()]);

		let baseline = Baseline::Manifest {
			object: "obj_player",
		};

		reconcile(&store, &create, Category::InstanceVariable, vec![ivar("hp")], baseline);
		assert!(store.is_provided("obj_player", "hp"));

		let out = reconcile(&store, &create, Category::InstanceVariable, vec![ivar("mp")], baseline);
		// `hp` was contributed and is now gone; `mp` was expected and is now present.
		assert_eq!(out.evicted, ["hp"]);
		assert!(!store.is_provided("obj_player", "hp"));
		assert!(store.is_provided("obj_player", "mp"));
	}
}
