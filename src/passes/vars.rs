//! Discovers `var`/`static` locals and, in object events, instance variables.

use rowan::{ast::AstNode, WalkEvent};

use crate::{
	gml::{ast, Syn, SyntaxToken},
	store::{SymbolData, SymbolRecord},
	workspace::DocKind,
	Error, FxIndexMap, FxIndexSet,
};

use super::{
	is_builtin_global, is_builtin_instance_variable, Pass, PassContext, PassOutput, SemanticPass,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct VariableIndex;

impl SemanticPass for VariableIndex {
	fn run(&self, ctx: &PassContext) -> Result<PassOutput, Error> {
		let object = match (ctx.unit.info.kind, ctx.unit.info.resource.as_deref()) {
			(DocKind::ObjectEvent, Some(res)) => Some(res),
			(DocKind::ObjectEvent, None) => {
				return Err(Error::pass(
					Pass::Variables,
					"object event is not associated with any object resource",
				));
			}
			_ => None,
		};

		let mut locals = FxIndexMap::<String, SymbolRecord>::default();
		let mut params = FxIndexSet::<String>::default();
		let mut assigned = vec![];
		// Inside `with` blocks, constructors, and struct literals,
		// `name = ...` writes to something other than the event's instance.
		let mut shadowed = 0_u32;

		for event in ctx.root.preorder() {
			let node = match event {
				WalkEvent::Enter(node) => node,
				WalkEvent::Leave(node) => {
					if shadows_self(&node) {
						shadowed -= 1;
					}

					continue;
				}
			};

			if shadows_self(&node) {
				shadowed += 1;
			}

			match node.kind() {
				Syn::VarDecl => {
					let Some(decl) = ast::VarDecl::cast(node) else {
						continue;
					};

					let is_static = decl.is_static();

					for name in decl.declarators().filter_map(|d| d.name()) {
						locals
							.entry(name.text().to_string())
							.or_insert_with(|| SymbolRecord {
								name: name.text().to_string(),
								range: ctx.unit.lines.range(name.text_range()),
								data: SymbolData::LocalVariable { is_static },
							});
					}
				}
				Syn::Param => {
					if let Some(name) = ast::Param::cast(node).and_then(|p| p.name()) {
						params.insert(name.text().to_string());
					}
				}
				Syn::AssignExpr if shadowed == 0 && object.is_some() => {
					let Some(target) = ast::AssignExpr::cast(node).and_then(|a| a.target()) else {
						continue;
					};

					if let Some(ident) = self_target(target) {
						assigned.push(ident);
					}
				}
				_ => {}
			}
		}

		let mut output = PassOutput::default();
		let mut instance = FxIndexMap::<String, SymbolRecord>::default();

		if let Some(object) = object {
			for ident in assigned {
				let name = ident.text();

				if locals.contains_key(name)
					|| params.contains(name)
					|| is_builtin_instance_variable(name)
					|| is_builtin_global(name)
				{
					continue;
				}

				instance
					.entry(name.to_string())
					.or_insert_with(|| SymbolRecord {
						name: name.to_string(),
						range: ctx.unit.lines.range(ident.text_range()),
						data: SymbolData::InstanceVariable {
							object: object.to_string(),
						},
					});
			}
		}

		output.symbols.extend(instance.into_values());
		output.symbols.extend(locals.into_values());
		Ok(output)
	}
}

#[must_use]
fn shadows_self(node: &crate::gml::SyntaxNode) -> bool {
	match node.kind() {
		Syn::WithStat | Syn::StructLit => true,
		Syn::FuncDecl => ast::FuncDecl::cast(node.clone()).is_some_and(|f| f.is_constructor()),
		_ => false,
	}
}

/// `name = ...` or `self.name = ...`.
#[must_use]
fn self_target(target: crate::gml::SyntaxNode) -> Option<SyntaxToken> {
	match target.kind() {
		Syn::NameRef => ast::NameRef::cast(target)?.ident(),
		Syn::FieldExpr => {
			let field = ast::FieldExpr::cast(target)?;
			let lhs = ast::NameRef::cast(field.lhs()?)?.ident()?;
			(lhs.text() == "self").then(|| field.field()).flatten()
		}
		_ => None,
	}
}
