//! User settings under the client's `gml-tools` section.
//!
//! Neither setting changes what the pipeline computes; both feed the
//! documentation layer, so a change only ever produces [`SettingsEffect`]s
//! for the server to act upon.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Error;

pub const SECTION: &str = "gml-tools";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
	pub number_of_documentation_sentences: u32,
	pub preferred_spellings: Spelling,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			number_of_documentation_sentences: 1,
			preferred_spellings: Spelling::default(),
		}
	}
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Spelling {
	#[default]
	American,
	British,
	NoPref,
}

/// What the server must do after settings change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsEffect {
	/// Tell the user to restart the client.
	RestartAdvised,
	/// Cached built-in documentation was generated with the old spelling.
	InvalidateDocCache,
	HoverSentences(u32),
}

impl Settings {
	/// Decodes the result of a `workspace/configuration` request for [`SECTION`].
	pub fn from_response(items: &[Value]) -> Result<Self, Error> {
		let Some(section) = items.first().filter(|v| !v.is_null()) else {
			return Ok(Self::default());
		};

		serde_json::from_value(section.clone()).map_err(|err| Error::Config {
			key: SECTION.to_string(),
			reason: err.to_string(),
		})
	}

	/// The known keys of `incoming` whose values differ from the current ones.
	pub fn changed(&self, incoming: &Value) -> Result<Map<String, Value>, Error> {
		let Some(incoming) = incoming.as_object() else {
			return Err(Error::Config {
				key: SECTION.to_string(),
				reason: format!("expected an object, found: {incoming}"),
			});
		};

		let current = serde_json::to_value(self)?;

		Ok(incoming
			.iter()
			.filter(|(key, value)| current.get(key.as_str()).is_some_and(|cur| cur != *value))
			.map(|(key, value)| (key.clone(), value.clone()))
			.collect())
	}

	/// Applies every valid value in `changed`. Invalid values leave their
	/// setting untouched and are reported without stopping the others.
	pub fn apply(&mut self, changed: Map<String, Value>) -> (Vec<SettingsEffect>, Vec<Error>) {
		let mut effects = vec![];
		let mut errors = vec![];

		for (key, value) in changed {
			match key.as_str() {
				"preferredSpellings" => match serde_json::from_value::<Spelling>(value.clone()) {
					Ok(spelling) => {
						self.preferred_spellings = spelling;
						effects.push(SettingsEffect::RestartAdvised);
						effects.push(SettingsEffect::InvalidateDocCache);
					}
					Err(_) => errors.push(Error::Config {
						key,
						reason: format!(
							"expected one of `american`, `british`, or `noPref`; found: {value}"
						),
					}),
				},
				"numberOfDocumentationSentences" => match value.as_u64().map(u32::try_from) {
					Some(Ok(n)) => {
						self.number_of_documentation_sentences = n;
						effects.push(SettingsEffect::HoverSentences(n));
					}
					_ => errors.push(Error::Config {
						key,
						reason: format!("expected a non-negative integer; found: {value}"),
					}),
				},
				_ => {}
			}
		}

		(effects, errors)
	}
}

#[cfg(test)]
mod test {
	use serde_json::json;

	use super::*;

	#[test]
	fn defaults() {
		let settings = Settings::from_response(&[json!({})]).unwrap();
		assert_eq!(settings, Settings::default());
		assert_eq!(settings.number_of_documentation_sentences, 1);
		assert_eq!(Settings::from_response(&[]).unwrap(), Settings::default());
	}

	#[test]
	fn only_differing_known_keys_change() {
		let settings = Settings::default();

		let changed = settings
			.changed(&json!({
				"numberOfDocumentationSentences": 1,
				"preferredSpellings": "british",
				"somethingElse": true,
			}))
			.unwrap();

		assert_eq!(changed.len(), 1);
		assert_eq!(changed["preferredSpellings"], json!("british"));
	}

	#[test]
	fn apply() {
		let mut settings = Settings::default();

		let changed = settings
			.changed(&json!({
				"numberOfDocumentationSentences": 3,
				"preferredSpellings": "noPref",
			}))
			.unwrap();

		let (effects, errors) = settings.apply(changed);
		assert!(errors.is_empty());
		assert!(effects.contains(&SettingsEffect::RestartAdvised));
		assert!(effects.contains(&SettingsEffect::InvalidateDocCache));
		assert!(effects.contains(&SettingsEffect::HoverSentences(3)));
		assert_eq!(settings.preferred_spellings, Spelling::NoPref);
	}

	#[test]
	fn invalid_values_are_reported() {
		let mut settings = Settings::default();

		let changed = settings
			.changed(&json!({
				"numberOfDocumentationSentences": -2,
				"preferredSpellings": "canadian",
			}))
			.unwrap();

		let (effects, errors) = settings.apply(changed);
		assert!(effects.is_empty());
		assert_eq!(errors.len(), 2);
		assert_eq!(settings, Settings::default());
		assert!(settings.changed(&json!(4)).is_err());
	}
}
