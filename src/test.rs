//! End-to-end checks over the whole pipeline, the store, and sessions.

use std::{path::PathBuf, sync::Arc};

use indoc::indoc;
use lsp_types::{DiagnosticSeverity, TextDocumentContentChangeEvent, Url};
use rayon::prelude::*;

use crate::{
	passes::{Pass, PassContext, PassOutput, PassTable, Passes, SemanticPass},
	pipeline::Pipeline,
	session::{OpenEvent, Outcome, Sessions},
	setup,
	store::{Category, SymbolStore},
	util,
	workspace::{self, DocKind, UnitInfo},
	Error,
};

#[must_use]
fn uri(path: &str) -> Url {
	Url::parse(&format!("file:///project/{path}")).unwrap()
}

#[must_use]
fn script(name: &str) -> UnitInfo {
	UnitInfo {
		kind: DocKind::Script,
		resource: Some(name.to_string()),
	}
}

#[must_use]
fn event(object: &str) -> UnitInfo {
	UnitInfo {
		kind: DocKind::ObjectEvent,
		resource: Some(object.to_string()),
	}
}

#[must_use]
fn names(store: &SymbolStore, uri: &Url, category: Category) -> Vec<String> {
	let mut ret = store
		.attributed_names(uri, category)
		.into_iter()
		.collect::<Vec<_>>();
	ret.sort();
	ret
}

#[test]
fn removed_local_is_evicted() {
	setup::logging();

	let pipeline = Pipeline::default();
	let a = uri("scripts/scr_a/scr_a.gml");

	let _ = pipeline.run(a.clone(), script("scr_a"), "var foo = 1;".to_string(), Passes::ALL);
	assert_eq!(names(pipeline.store(), &a, Category::LocalVariable), ["foo"]);

	let _ = pipeline.run(a.clone(), script("scr_a"), "bar = 1;".to_string(), Passes::ALL);
	assert!(names(pipeline.store(), &a, Category::LocalVariable).is_empty());
}

#[test]
fn unassigned_manifest_variable() {
	let pipeline = Pipeline::default();
	let create = uri("objects/obj_player/Create_0.gml");

	pipeline
		.store()
		.set_expected_instance_variables("obj_player", ["hp".to_string(), "mp".to_string()]);

	let (_, diags) = pipeline.run(
		create.clone(),
		event("obj_player"),
		"hp = 10;\nmp = 5;".to_string(),
		Passes::ALL,
	);

	assert!(diags.is_empty(), "unexpected diagnostics: {diags:#?}");
	assert!(pipeline.store().is_provided("obj_player", "hp"));

	let (_, diags) = pipeline.run(
		create.clone(),
		event("obj_player"),
		"mp = 5;".to_string(),
		Passes::ALL,
	);

	assert!(!pipeline.store().is_provided("obj_player", "hp"));
	assert_eq!(
		names(pipeline.store(), &create, Category::InstanceVariable),
		["mp"]
	);

	assert_eq!(diags.len(), 1);
	assert_eq!(diags[0].severity, Some(DiagnosticSeverity::HINT));
	assert!(diags[0].message.contains("hp"));
	assert!(!diags[0].message.contains("mp"));
}

#[test]
fn manifest_variable_provided_by_another_event() {
	let pipeline = Pipeline::default();
	let create = uri("objects/obj_player/Create_0.gml");
	let step = uri("objects/obj_player/Step_0.gml");

	pipeline
		.store()
		.set_expected_instance_variables("obj_player", ["hp".to_string()]);

	let _ = pipeline.run(step, event("obj_player"), "hp = 1;".to_string(), Passes::ALL);

	let (_, diags) = pipeline.run(
		create.clone(),
		event("obj_player"),
		"speed = 2;".to_string(),
		Passes::ALL,
	);

	assert!(diags.is_empty(), "unexpected diagnostics: {diags:#?}");
	assert!(pipeline.store().is_provided("obj_player", "hp"));
}

#[test]
fn removed_macro_is_evicted() {
	let pipeline = Pipeline::default();
	let a = uri("scripts/scr_macros/scr_macros.gml");

	let _ = pipeline.run(
		a.clone(),
		script("scr_macros"),
		"macro FOO 1\nmacro BAR 2".to_string(),
		Passes::ALL,
	);

	assert_eq!(names(pipeline.store(), &a, Category::Macro), ["BAR", "FOO"]);

	let _ = pipeline.run(
		a.clone(),
		script("scr_macros"),
		"macro FOO 1".to_string(),
		Passes::ALL,
	);

	assert_eq!(names(pipeline.store(), &a, Category::Macro), ["FOO"]);
	assert!(pipeline.store().lookup(Category::Macro, "BAR").is_empty());
}

#[test]
fn syntax_failure_blocks_semantics() {
	let pipeline = Pipeline::default();
	let a = uri("scripts/scr_a/scr_a.gml");

	let _ = pipeline.run(a.clone(), script("scr_a"), "var foo = 1;".to_string(), Passes::ALL);
	let (unit, diags) = pipeline.run(a.clone(), script("scr_a"), "if ((".to_string(), Passes::ALL);

	assert!(!unit.matched.is_success());
	assert!(unit.sig_tokens.is_empty());
	assert_eq!(diags.len(), 1);
	assert_eq!(diags[0].range.start, lsp_types::Position::new(0, 4));
	// The last successful cycle's symbols stand.
	assert_eq!(names(pipeline.store(), &a, Category::LocalVariable), ["foo"]);
}

#[test]
fn idempotence() {
	const SOURCE: &str = indoc! {r#"
		/// @param a
		function f(a) {
			var tmp = a;
			return tmp;
		}

		function f() {}

		enum Colors { red, green }
		#macro LIMIT 10
		f(1, 2, 3);
		draw_text(0, 0);
	"#};

	let pipeline = Pipeline::default();
	let a = uri("scripts/scr_a/scr_a.gml");

	let (_, first) = pipeline.run(a.clone(), script("scr_a"), SOURCE.to_string(), Passes::ALL);

	let before = Category::ALL.map(|cat| names(pipeline.store(), &a, cat));
	let (_, second) = pipeline.run(a.clone(), script("scr_a"), SOURCE.to_string(), Passes::ALL);
	let after = Category::ALL.map(|cat| names(pipeline.store(), &a, cat));

	assert!(!first.is_empty());
	assert_eq!(first, second);
	assert_eq!(before, after);
}

#[test]
fn attributed_follows_every_edit() {
	let pipeline = Pipeline::default();
	let a = uri("scripts/scr_a/scr_a.gml");

	let edits: &[(&str, &[&str])] = &[
		("enum A {}\nenum B {}", &["A", "B"]),
		("enum B {}\nenum C {}", &["B", "C"]),
		("var nothing = 0;", &[]),
		("enum C { x }", &["C"]),
	];

	for (text, expected) in edits {
		let _ = pipeline.run(a.clone(), script("scr_a"), text.to_string(), Passes::ALL);
		assert_eq!(names(pipeline.store(), &a, Category::Enum), *expected, "after `{text}`");
	}
}

#[test]
fn same_names_in_different_uris() {
	let pipeline = Pipeline::default();
	let a = uri("scripts/scr_a/scr_a.gml");
	let b = uri("scripts/scr_b/scr_b.gml");

	let _ = pipeline.run(a.clone(), script("scr_a"), "enum Colors { red }".to_string(), Passes::ALL);
	let _ = pipeline.run(b.clone(), script("scr_b"), "enum Colors { blue }".to_string(), Passes::ALL);
	assert_eq!(pipeline.store().lookup(Category::Enum, "Colors").len(), 2);

	let _ = pipeline.run(a.clone(), script("scr_a"), String::new(), Passes::ALL);

	let remaining = pipeline.store().lookup(Category::Enum, "Colors");
	assert_eq!(remaining.len(), 1);
	assert_eq!(remaining[0].0, b);
}

struct Failing;

impl SemanticPass for Failing {
	fn run(&self, _: &PassContext) -> Result<PassOutput, Error> {
		Err(Error::pass(Pass::Variables, "unexpected tree shape"))
	}
}

#[test]
fn failing_pass_is_contained() {
	const SOURCE: &str = indoc! {r#"
		/// @description Does something.
		function documented(a) {}
		enum E { x }
		var v = 1;
	"#};

	let pipeline =
		Pipeline::default().with_passes(PassTable::standard().with(Pass::Variables, Failing));
	let a = uri("scripts/scr_a/scr_a.gml");

	let (_, diags) = pipeline.run(a.clone(), script("scr_a"), SOURCE.to_string(), Passes::ALL);

	assert!(diags.is_empty(), "unexpected diagnostics: {diags:#?}");
	assert!(names(pipeline.store(), &a, Category::LocalVariable).is_empty());
	assert_eq!(names(pipeline.store(), &a, Category::Enum), ["E"]);
	assert_eq!(names(pipeline.store(), &a, Category::Signature), ["documented"]);
}

#[test]
fn queued_open_is_analyzed_after_indexing() {
	let sessions = Sessions::new(Arc::new(Pipeline::default()));
	let a = uri("scripts/scr_a/scr_a.gml");

	let outcome = sessions.open(OpenEvent {
		uri: a.clone(),
		info: script("scr_a"),
		text: "if ((".to_string(),
		version: 4,
	});

	assert_eq!(outcome, Outcome::Queued);
	assert_eq!(sessions.analyze_latest(&a), Outcome::Dropped);

	let replayed = sessions.index_complete();
	assert_eq!(replayed.len(), 1);
	assert_eq!(replayed[0].version, 4);
	assert_eq!(replayed[0].diagnostics.len(), 1);
}

#[test]
fn parallel_uris() {
	const COUNT: usize = 64;

	let pipeline = Pipeline::default();

	(0..COUNT).into_par_iter().for_each(|i| {
		let uri = uri(&format!("scripts/scr_{i}/scr_{i}.gml"));
		let text = format!("var local_{i} = {i};\nenum Enum_{i} {{ a, b }}\nvar shared = 0;");

		for _ in 0..3 {
			let _ = pipeline.run(uri.clone(), script(&format!("scr_{i}")), text.clone(), Passes::ALL);
		}
	});

	for i in 0..COUNT {
		let uri = uri(&format!("scripts/scr_{i}/scr_{i}.gml"));

		assert_eq!(
			names(pipeline.store(), &uri, Category::LocalVariable),
			[format!("local_{i}"), "shared".to_string()]
		);
		assert_eq!(
			names(pipeline.store(), &uri, Category::Enum),
			[format!("Enum_{i}")]
		);
	}

	assert_eq!(pipeline.store().lookup(Category::LocalVariable, "shared").len(), COUNT);
	assert_eq!(pipeline.store().len(), COUNT * 3);
}

#[test]
fn same_uri_runs_never_interleave() {
	const EDITS: i32 = 200;

	let sessions = Sessions::new(Arc::new(Pipeline::default()));
	let a = uri("scripts/scr_a/scr_a.gml");
	let _ = sessions.mark_ready();

	let _ = sessions.open(OpenEvent {
		uri: a.clone(),
		info: script("scr_a"),
		text: String::new(),
		version: 0,
	});

	(1..=EDITS).into_par_iter().for_each(|i| {
		let change = TextDocumentContentChangeEvent {
			range: None,
			range_length: None,
			text: format!("var v{i} = {i};\nenum E{i} {{ a }}\nmacro M{i} {i}"),
		};

		let _ = sessions.change(&a, i, vec![change]);
		let _ = sessions.analyze_latest(&a);
	});

	let _ = sessions.analyze_latest(&a);
	let Some(last) = sessions.version(&a) else {
		panic!("document should still be open");
	};

	let store = sessions.pipeline().store();
	assert_eq!(names(store, &a, Category::LocalVariable), [format!("v{last}")]);
	assert_eq!(names(store, &a, Category::Enum), [format!("E{last}")]);
	assert_eq!(names(store, &a, Category::Macro), [format!("M{last}")]);
	assert_eq!(store.len(), 3);
}

/// Removes its directory when dropped.
struct TempProject(PathBuf);

impl TempProject {
	#[must_use]
	fn new(name: &str) -> Self {
		let root = std::env::temp_dir().join(format!("gml-ls-{name}-{}", std::process::id()));
		let _ = std::fs::remove_dir_all(&root);
		std::fs::create_dir_all(&root).unwrap();
		Self(root)
	}

	fn write(&self, rel: &str, content: &str) {
		let path = self.0.join(rel);
		std::fs::create_dir_all(path.parent().unwrap()).unwrap();
		std::fs::write(path, content).unwrap();
	}
}

impl Drop for TempProject {
	fn drop(&mut self) {
		let _ = std::fs::remove_dir_all(&self.0);
	}
}

#[test]
fn scan_builds_baseline() {
	let project = TempProject::new("scan");

	project.write(
		"objects/obj_player/obj_player.yy",
		indoc! {r#"
			{
				"name": "obj_player",
				"properties": [
					{ "varName": "max_hp", "value": "100", },
					{ "varName": "armor", "value": "0", },
				],
			}
		"#},
	);

	project.write("objects/obj_player/Create_0.gml", "hp = max_hp;\n");

	project.write(
		"scripts/scr_math/scr_math.gml",
		indoc! {r#"
			/// @param {real} value
			function double(value) { return value * 2; }
		"#},
	);

	let pipeline = Pipeline::default();
	let report = workspace::scan(&project.0, &pipeline);

	assert_eq!(report.units, 2);
	assert_eq!(report.objects, 1);
	assert_eq!(report.failed, 0);

	let store = pipeline.store();
	assert_eq!(store.expected_instance_variables("obj_player").len(), 2);
	assert!(store.is_provided("obj_player", "hp"));
	assert_eq!(store.lookup(Category::Signature, "double").len(), 1);

	// Opening the scanned file with the same text must not disturb the baseline.
	let sessions = Sessions::new(Arc::new(pipeline));
	let _ = sessions.mark_ready();
	let create = Url::from_file_path(project.0.join("objects/obj_player/Create_0.gml")).unwrap();

	let _ = sessions.open(OpenEvent {
		uri: create.clone(),
		info: workspace::classify(&project.0.join("objects/obj_player/Create_0.gml")),
		text: "hp = max_hp;\n".to_string(),
		version: 1,
	});

	let Outcome::Analyzed(analysis) = sessions.analyze_latest(&create) else {
		panic!("expected an analysis");
	};

	// Neither manifest variable is assigned by any event.
	assert_eq!(analysis.diagnostics.len(), 1);
	assert!(sessions
		.pipeline()
		.store()
		.is_provided("obj_player", "hp"));
}

#[test]
fn client_uri_spelling_matches_scan() {
	let project = TempProject::new("uris");
	project.write("scripts/scr_defs/scr_defs.gml", "enum E { a, b }\n");

	let pipeline = Pipeline::default();
	let _ = workspace::scan(&project.0, &pipeline);
	assert_eq!(pipeline.store().lookup(Category::Enum, "E").len(), 1);

	let scanned = Url::from_file_path(project.0.join("scripts/scr_defs/scr_defs.gml")).unwrap();
	let encoded = Url::parse(&scanned.as_str().replace("scr_defs.gml", "scr_def%73.gml")).unwrap();
	assert_ne!(scanned, encoded);

	let normalized = util::normalize_uri(&encoded);
	assert_eq!(normalized, scanned);

	let sessions = Sessions::new(Arc::new(pipeline));
	let _ = sessions.mark_ready();

	let _ = sessions.open(OpenEvent {
		uri: normalized.clone(),
		info: script("scr_defs"),
		text: "var unrelated = 0;\n".to_string(),
		version: 1,
	});

	let _ = sessions.analyze_latest(&normalized);
	assert!(sessions.pipeline().store().lookup(Category::Enum, "E").is_empty());
}
