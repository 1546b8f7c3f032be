use rowan::ast::AstNode;

use crate::{
	gml::ast,
	store::{SymbolData, SymbolRecord},
	Error,
};

use super::{PassContext, PassOutput, SemanticPass};

/// Discovers enum and macro declarations anywhere in a unit. Both kinds are
/// global in GML, so nesting is irrelevant.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnumsAndMacros;

impl SemanticPass for EnumsAndMacros {
	fn run(&self, ctx: &PassContext) -> Result<PassOutput, Error> {
		let mut output = PassOutput::default();

		for node in ctx.root.descendants() {
			if let Some(enumdef) = ast::EnumDef::cast(node.clone()) {
				let Some(name) = enumdef.name() else {
					continue;
				};

				let members = enumdef
					.members()
					.filter_map(|m| m.name())
					.map(|m| m.text().to_string())
					.collect();

				output.symbols.push(SymbolRecord {
					name: name.text().to_string(),
					range: ctx.unit.lines.range(name.text_range()),
					data: SymbolData::Enum { members },
				});
			} else if let Some(mdef) = ast::MacroDef::cast(node) {
				let Some(name) = mdef.name() else {
					continue;
				};

				output.symbols.push(SymbolRecord {
					name: name.text().to_string(),
					range: ctx.unit.lines.range(name.text_range()),
					data: SymbolData::Macro {
						expansion: mdef.body().map(|b| b.expansion()).unwrap_or_default(),
						config: mdef.config().map(|c| c.text().to_string()),
					},
				});
			}
		}

		Ok(output)
	}
}

#[cfg(test)]
mod test {
	use lsp_types::Url;

	use crate::{
		passes::Passes,
		pipeline::Pipeline,
		store::{Category, SymbolData},
		workspace::{DocKind, UnitInfo},
	};

	#[test]
	fn enum_members_and_macro_expansion() {
		let pipeline = Pipeline::default();
		let uri = Url::parse("file:///project/scripts/scr_defs/scr_defs.gml").unwrap();

		let info = UnitInfo {
			kind: DocKind::Script,
			resource: Some("scr_defs".to_string()),
		};

		let _ = pipeline.run(
			uri,
			info,
			"enum State { idle, walk = 4, run }\n#macro WALK_SPEED 4 * 2\n".to_string(),
			Passes::ENUMS_AND_MACROS,
		);

		let store = pipeline.store();
		let state = store.lookup(Category::Enum, "State");
		let macros = store.lookup(Category::Macro, "WALK_SPEED");

		assert_eq!(
			state[0].1.data,
			SymbolData::Enum {
				members: vec!["idle".into(), "walk".into(), "run".into()]
			}
		);

		assert_eq!(
			macros[0].1.data,
			SymbolData::Macro {
				expansion: "4 * 2".to_string(),
				config: None
			}
		);
	}
}
