//! Classification of files within a GameMaker project, object manifests,
//! and the baseline scan which runs before any document is analyzed.

use std::{path::Path, sync::OnceLock};

use rayon::prelude::*;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::{passes::Passes, pipeline::Pipeline, util, Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocKind {
	/// `objects/<object>/<Event>.gml`.
	ObjectEvent,
	/// `scripts/<script>/<script>.gml`.
	Script,
	Other,
}

impl DocKind {
	/// Can this kind of document declare signatures for other documents to call?
	#[must_use]
	pub fn is_documentable(self) -> bool {
		matches!(self, Self::Script)
	}
}

/// What the workspace knows about a document when it is opened.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnitInfo {
	pub kind: DocKind,
	/// The object or script this document belongs to, if any.
	pub resource: Option<String>,
}

impl UnitInfo {
	#[must_use]
	pub fn other() -> Self {
		Self {
			kind: DocKind::Other,
			resource: None,
		}
	}
}

/// Passes run over every unit during the baseline scan.
/// Lint output would only be discarded, so it is skipped.
pub const BASELINE_PASSES: Passes = Passes::VARIABLES
	.union(Passes::ENUMS_AND_MACROS)
	.union(Passes::SIGNATURES);

/// Decided purely by the last three path components.
#[must_use]
pub fn classify(path: &Path) -> UnitInfo {
	let is_gml = path
		.extension()
		.is_some_and(|ext| ext.eq_ignore_ascii_case("gml"));

	if !is_gml {
		return UnitInfo::other();
	}

	let mut comps = path
		.components()
		.rev()
		.skip(1)
		.filter_map(|c| c.as_os_str().to_str());

	let (Some(resource), Some(dir)) = (comps.next(), comps.next()) else {
		return UnitInfo::other();
	};

	let kind = if dir.eq_ignore_ascii_case("objects") {
		DocKind::ObjectEvent
	} else if dir.eq_ignore_ascii_case("scripts") {
		DocKind::Script
	} else {
		return UnitInfo::other();
	};

	UnitInfo {
		kind,
		resource: Some(resource.to_string()),
	}
}

#[must_use]
pub fn is_valid_resource_name(name: &str) -> bool {
	static PATTERN: OnceLock<Regex> = OnceLock::new();

	PATTERN
		.get_or_init(|| {
			// The pattern is a constant.
			Regex::new(r"(?i)^[a-z_][a-z0-9_]*$").unwrap_or_else(|_| unreachable!())
		})
		.is_match(name)
}

#[derive(Debug, Deserialize)]
struct ObjectManifest {
	#[serde(default)]
	properties: Vec<ObjectProperty>,
}

#[derive(Debug, Deserialize)]
struct ObjectProperty {
	#[serde(rename = "varName")]
	var_name: String,
}

/// Reads the variable definitions out of an object's `.yy` file.
/// Newer project formats allow trailing commas, which are stripped first.
pub fn read_object_manifest(path: &Path) -> Result<Vec<String>, Error> {
	static TRAILING_COMMA: OnceLock<Regex> = OnceLock::new();

	let text = std::fs::read_to_string(path)?;

	let trailing_comma = TRAILING_COMMA.get_or_init(|| {
		// The pattern is a constant.
		Regex::new(r",(\s*[}\]])").unwrap_or_else(|_| unreachable!())
	});

	let text = trailing_comma.replace_all(&text, "$1");

	let manifest =
		serde_json::from_str::<ObjectManifest>(&text).map_err(|source| Error::Manifest {
			path: path.to_path_buf(),
			source,
		})?;

	Ok(manifest
		.properties
		.into_iter()
		.map(|prop| prop.var_name)
		.collect())
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
	pub units: usize,
	pub objects: usize,
	/// Units which could not be read.
	pub failed: usize,
}

/// Builds the store's baseline: every object manifest, then every unit
/// analyzed in parallel. Runs before the server accepts any document.
pub fn scan(root: &Path, pipeline: &Pipeline) -> ScanReport {
	let start_time = std::time::Instant::now();
	let mut units = vec![];
	let mut manifests = vec![];

	let walker = walkdir::WalkDir::new(root)
		.follow_links(false)
		.max_depth(16)
		.same_file_system(true)
		.into_iter()
		.filter_map(|result| match result {
			Ok(d_e) => Some(d_e),
			Err(err) => {
				error!("Failed to inspect a project file: {err}");
				None
			}
		});

	for d_ent in walker {
		let path = d_ent.path();

		if !d_ent.file_type().is_file() {
			continue;
		}

		if path
			.extension()
			.is_some_and(|ext| ext.eq_ignore_ascii_case("gml"))
		{
			units.push(path.to_path_buf());
		} else if let Some(object) = object_manifest_owner(path) {
			manifests.push((object, path.to_path_buf()));
		}
	}

	let mut report = ScanReport::default();

	for (object, path) in manifests {
		if !is_valid_resource_name(&object) {
			warn!("Skipping object with invalid name: {object}");
			continue;
		}

		match read_object_manifest(&path) {
			Ok(vars) => {
				pipeline.store().set_expected_instance_variables(object, vars);
				report.objects += 1;
			}
			Err(err) => error!("{err}"),
		}
	}

	let failed = units
		.par_iter()
		.filter(|path| analyze_on_disk(pipeline, path).is_err())
		.count();

	report.units = units.len() - failed;
	report.failed = failed;

	info!(
		"Indexed {} unit(s) and {} object manifest(s) in {}ms.",
		report.units,
		report.objects,
		start_time.elapsed().as_millis()
	);

	report
}

fn analyze_on_disk(pipeline: &Pipeline, path: &Path) -> Result<(), Error> {
	let text = std::fs::read_to_string(path).map_err(|err| {
		error!("Failed to read `{}`: {err}", path.display());
		Error::from(err)
	})?;

	let uri = util::path_to_uri(path)?;
	let info = classify(path);
	debug!("Baseline analysis: {uri}");
	let _ = pipeline.run(uri, info, text, BASELINE_PASSES);
	Ok(())
}

/// `objects/<object>/<object>.yy` yields `<object>`.
#[must_use]
fn object_manifest_owner(path: &Path) -> Option<String> {
	if !path
		.extension()
		.is_some_and(|ext| ext.eq_ignore_ascii_case("yy"))
	{
		return None;
	}

	let stem = path.file_stem()?.to_str()?;
	let parent = path.parent()?;
	let dir = parent.file_name()?.to_str()?;
	let grandparent = parent.parent()?.file_name()?.to_str()?;

	(dir == stem && grandparent.eq_ignore_ascii_case("objects")).then(|| stem.to_string())
}
