//! The global symbol store, shared by every document's pipeline.
//!
//! Records live in one arena and are keyed by `(URI, category, name)`. The
//! per-URI index answers "what does this URI currently contribute"; the
//! per-name and per-object indexes serve providers and the lint pass.
//! One coarse [`RwLock`] guards everything.

use lsp_types::{Range, Url};
use parking_lot::{RwLock, RwLockWriteGuard};
use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::SlotMap;

use crate::{FxIndexMap, FxIndexSet};

/// Symbols are reconciled per `(URI, category)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
	InstanceVariable,
	LocalVariable,
	Enum,
	Macro,
	Signature,
}

impl Category {
	pub const ALL: [Self; 5] = [
		Self::InstanceVariable,
		Self::LocalVariable,
		Self::Enum,
		Self::Macro,
		Self::Signature,
	];
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRecord {
	pub name: String,
	/// Where the symbol is declared in its owning document.
	pub range: Range,
	pub data: SymbolData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolData {
	InstanceVariable {
		/// Name of the object resource this variable belongs to.
		object: String,
	},
	LocalVariable {
		is_static: bool,
	},
	Enum {
		members: Vec<String>,
	},
	Macro {
		expansion: String,
		/// Set for the `#macro Config:NAME` form.
		config: Option<String>,
	},
	Signature(Signature),
}

impl SymbolData {
	#[must_use]
	pub fn category(&self) -> Category {
		match self {
			Self::InstanceVariable { .. } => Category::InstanceVariable,
			Self::LocalVariable { .. } => Category::LocalVariable,
			Self::Enum { .. } => Category::Enum,
			Self::Macro { .. } => Category::Macro,
			Self::Signature(_) => Category::Signature,
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
	/// The script resource which declares this function.
	pub script: Option<String>,
	pub params: Vec<SigParam>,
	pub description: Option<String>,
	pub returns: Option<String>,
	pub min_args: usize,
	/// `None` if the function is variadic.
	pub max_args: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SigParam {
	pub name: String,
	pub type_spec: Option<String>,
	pub description: Option<String>,
	pub optional: bool,
}

slotmap::new_key_type! {
	pub struct SymbolKey;
}

#[derive(Debug, Clone)]
struct Entry {
	uri: Url,
	record: SymbolRecord,
}

#[derive(Debug, Default)]
pub struct SymbolStore {
	inner: RwLock<Symbols>,
}

impl SymbolStore {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// The names of every symbol of `category` that `uri` currently contributes.
	/// Empty if the store has never heard of `uri`.
	#[must_use]
	pub fn attributed_names(&self, uri: &Url, category: Category) -> FxIndexSet<String> {
		self.inner.read().attributed_names(uri, category)
	}

	/// Returns how many records were removed. Names which `uri` does not
	/// contribute are skipped.
	pub fn evict<'n>(
		&self,
		uri: &Url,
		category: Category,
		names: impl IntoIterator<Item = &'n str>,
	) -> usize {
		self.inner.write().evict(uri, category, names)
	}

	pub fn upsert(
		&self,
		uri: &Url,
		category: Category,
		records: impl IntoIterator<Item = SymbolRecord>,
	) {
		self.inner.write().upsert(uri, category, records);
	}

	#[must_use]
	pub fn expected_instance_variables(&self, object: &str) -> FxIndexSet<String> {
		self.inner.read().expected_instance_variables(object)
	}

	pub fn set_expected_instance_variables(
		&self,
		object: impl Into<String>,
		names: impl IntoIterator<Item = String>,
	) {
		self.inner
			.write()
			.expected
			.insert(object.into(), names.into_iter().collect());
	}

	/// Full reset; the manifest of expected instance variables goes too.
	pub fn clear_all(&self) {
		let mut guard = self.inner.write();
		*guard = Symbols::default();
	}

	/// Every record named `name` in `category`, across all URIs.
	#[must_use]
	pub fn lookup(&self, category: Category, name: &str) -> Vec<(Url, SymbolRecord)> {
		let guard = self.inner.read();

		guard
			.by_name
			.get(&(category, name.to_string()))
			.into_iter()
			.flatten()
			.filter_map(|key| guard.arena.get(*key))
			.map(|entry| (entry.uri.clone(), entry.record.clone()))
			.collect()
	}

	/// Every record in `category`, across all URIs, in no particular order.
	#[must_use]
	pub fn all(&self, category: Category) -> Vec<(Url, SymbolRecord)> {
		self.inner
			.read()
			.arena
			.values()
			.filter(|entry| entry.record.data.category() == category)
			.map(|entry| (entry.uri.clone(), entry.record.clone()))
			.collect()
	}

	/// The instance variables of `object` contributed by any of its events.
	#[must_use]
	pub fn object_variables(&self, object: &str) -> FxIndexSet<String> {
		let guard = self.inner.read();

		guard
			.by_object
			.get(object)
			.into_iter()
			.flatten()
			.filter_map(|key| guard.arena.get(*key))
			.map(|entry| entry.record.name.clone())
			.collect()
	}

	#[must_use]
	pub fn is_provided(&self, object: &str, name: &str) -> bool {
		self.inner.read().is_provided(object, name)
	}

	/// A documented signature named `name` that some URI other than
	/// `excluding` contributes.
	#[must_use]
	pub fn signature_excluding(&self, name: &str, excluding: &Url) -> Option<Signature> {
		let guard = self.inner.read();

		guard
			.by_name
			.get(&(Category::Signature, name.to_string()))
			.into_iter()
			.flatten()
			.filter_map(|key| guard.arena.get(*key))
			.filter(|entry| entry.uri != *excluding)
			.find_map(|entry| match &entry.record.data {
				SymbolData::Signature(sig) => Some(sig.clone()),
				_ => None,
			})
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.inner.read().arena.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// For reconciliation, which must read and write under one lock.
	pub(crate) fn write(&self) -> RwLockWriteGuard<Symbols> {
		self.inner.write()
	}
}

/// Everything behind the store's lock.
#[derive(Debug, Default)]
pub(crate) struct Symbols {
	arena: SlotMap<SymbolKey, Entry>,
	by_uri: FxHashMap<Url, FxHashMap<Category, FxIndexMap<String, SymbolKey>>>,
	by_name: FxHashMap<(Category, String), FxIndexSet<SymbolKey>>,
	by_object: FxHashMap<String, FxHashSet<SymbolKey>>,
	/// Object resource name to the variables its manifest declares.
	expected: FxHashMap<String, FxIndexSet<String>>,
}

impl Symbols {
	#[must_use]
	pub(crate) fn attributed_names(&self, uri: &Url, category: Category) -> FxIndexSet<String> {
		self.by_uri
			.get(uri)
			.and_then(|cats| cats.get(&category))
			.map(|names| names.keys().cloned().collect())
			.unwrap_or_default()
	}

	#[must_use]
	pub(crate) fn expected_instance_variables(&self, object: &str) -> FxIndexSet<String> {
		self.expected.get(object).cloned().unwrap_or_default()
	}

	#[must_use]
	pub(crate) fn is_provided(&self, object: &str, name: &str) -> bool {
		self.by_object.get(object).is_some_and(|keys| {
			keys.iter()
				.filter_map(|key| self.arena.get(*key))
				.any(|entry| entry.record.name == name)
		})
	}

	pub(crate) fn evict<'n>(
		&mut self,
		uri: &Url,
		category: Category,
		names: impl IntoIterator<Item = &'n str>,
	) -> usize {
		let Some(cats) = self.by_uri.get_mut(uri) else {
			return 0;
		};

		let Some(owned) = cats.get_mut(&category) else {
			return 0;
		};

		let mut removed = vec![];

		for name in names {
			if let Some(key) = owned.swap_remove(name) {
				removed.push(key);
			}
		}

		if owned.is_empty() {
			cats.remove(&category);
		}

		if cats.is_empty() {
			self.by_uri.remove(uri);
		}

		for key in &removed {
			self.unlink(*key);
		}

		removed.len()
	}

	pub(crate) fn upsert(
		&mut self,
		uri: &Url,
		category: Category,
		records: impl IntoIterator<Item = SymbolRecord>,
	) {
		for record in records {
			debug_assert_eq!(record.data.category(), category);

			let owned = self
				.by_uri
				.entry(uri.clone())
				.or_default()
				.entry(category)
				.or_default();

			if let Some(key) = owned.get(&record.name).copied() {
				self.unlink_object(key);
				self.link_object(key, &record);

				if let Some(entry) = self.arena.get_mut(key) {
					entry.record = record;
				}

				continue;
			}

			let name = record.name.clone();

			let key = self.arena.insert(Entry {
				uri: uri.clone(),
				record,
			});

			owned.insert(name.clone(), key);
			self.by_name.entry((category, name)).or_default().insert(key);

			if let Some(entry) = self.arena.get(key) {
				let record = entry.record.clone();
				self.link_object(key, &record);
			}
		}
	}

	/// Removes `key` from the arena and every index except `by_uri`.
	fn unlink(&mut self, key: SymbolKey) {
		self.unlink_object(key);

		let Some(entry) = self.arena.remove(key) else {
			return;
		};

		let name_key = (entry.record.data.category(), entry.record.name);

		if let Some(keys) = self.by_name.get_mut(&name_key) {
			keys.swap_remove(&key);

			if keys.is_empty() {
				self.by_name.remove(&name_key);
			}
		}
	}

	fn link_object(&mut self, key: SymbolKey, record: &SymbolRecord) {
		if let SymbolData::InstanceVariable { object } = &record.data {
			self.by_object.entry(object.clone()).or_default().insert(key);
		}
	}

	fn unlink_object(&mut self, key: SymbolKey) {
		let Some(entry) = self.arena.get(key) else {
			return;
		};

		let SymbolData::InstanceVariable { object } = &entry.record.data else {
			return;
		};

		if let Some(keys) = self.by_object.get_mut(object) {
			keys.remove(&key);

			if keys.is_empty() {
				let object = object.clone();
				self.by_object.remove(&object);
			}
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[must_use]
	fn uri(path: &str) -> Url {
		Url::parse(&format!("file:///project/{path}")).unwrap()
	}

	#[must_use]
	fn local(name: &str) -> SymbolRecord {
		SymbolRecord {
			name: name.to_string(),
			range: Range::default(),
			data: SymbolData::LocalVariable { is_static: false },
		}
	}

	#[must_use]
	fn ivar(name: &str, object: &str) -> SymbolRecord {
		SymbolRecord {
			name: name.to_string(),
			range: Range::default(),
			data: SymbolData::InstanceVariable {
				object: object.to_string(),
			},
		}
	}

	#[test]
	fn evict_is_exact_on_uri() {
		let store = SymbolStore::new();
		let (a, b) = (uri("a.gml"), uri("b.gml"));
		store.upsert(&a, Category::LocalVariable, [local("foo")]);
		store.upsert(&b, Category::LocalVariable, [local("foo")]);

		assert_eq!(store.evict(&a, Category::LocalVariable, ["foo"]), 1);
		assert!(store.attributed_names(&a, Category::LocalVariable).is_empty());
		assert_eq!(store.lookup(Category::LocalVariable, "foo").len(), 1);
		assert_eq!(store.lookup(Category::LocalVariable, "foo")[0].0, b);
	}

	#[test]
	fn unknown_uri_is_a_no_op() {
		let store = SymbolStore::new();
		assert_eq!(store.evict(&uri("x.gml"), Category::Enum, ["Foo"]), 0);
		assert!(store.attributed_names(&uri("x.gml"), Category::Enum).is_empty());
		store.upsert(&uri("x.gml"), Category::Enum, []);
		assert!(store.is_empty());
	}

	#[test]
	fn upsert_overwrites_same_key() {
		let store = SymbolStore::new();
		let a = uri("a.gml");
		store.upsert(&a, Category::LocalVariable, [local("foo")]);

		let mut replacement = local("foo");
		replacement.data = SymbolData::LocalVariable { is_static: true };
		store.upsert(&a, Category::LocalVariable, [replacement.clone()]);

		assert_eq!(store.len(), 1);
		assert_eq!(
			store.lookup(Category::LocalVariable, "foo"),
			[(a, replacement)]
		);
	}

	#[test]
	fn object_index_follows_eviction() {
		let store = SymbolStore::new();
		let create = uri("objects/obj_player/Create_0.gml");
		let step = uri("objects/obj_player/Step_0.gml");
		store.upsert(&create, Category::InstanceVariable, [ivar("hp", "obj_player")]);
		store.upsert(&step, Category::InstanceVariable, [ivar("hp", "obj_player")]);

		store.evict(&create, Category::InstanceVariable, ["hp"]);
		assert!(store.is_provided("obj_player", "hp"));

		store.evict(&step, Category::InstanceVariable, ["hp"]);
		assert!(!store.is_provided("obj_player", "hp"));
		assert!(store.object_variables("obj_player").is_empty());
	}

	#[test]
	fn listing_by_category() {
		let store = SymbolStore::new();
		store.upsert(&uri("a.gml"), Category::LocalVariable, [local("foo")]);
		store.upsert(&uri("b.gml"), Category::LocalVariable, [local("bar")]);
		store.upsert(&uri("c.gml"), Category::InstanceVariable, [ivar("hp", "obj_c")]);

		let mut locals = store
			.all(Category::LocalVariable)
			.into_iter()
			.map(|(_, rec)| rec.name)
			.collect::<Vec<_>>();
		locals.sort();

		assert_eq!(locals, ["bar", "foo"]);
		assert!(store.all(Category::Enum).is_empty());
	}

	#[test]
	fn clear_all() {
		let store = SymbolStore::new();
		store.upsert(&uri("a.gml"), Category::LocalVariable, [local("foo")]);
		store.set_expected_instance_variables("obj_player", ["hp".to_string()]);
		store.clear_all();
		assert!(store.is_empty());
		assert!(store.expected_instance_variables("obj_player").is_empty());
	}
}
