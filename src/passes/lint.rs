//! Diagnostics over function declarations and call sites. Produces no symbols.

use lsp_types::{DiagnosticSeverity, Location};
use rowan::ast::AstNode;

use crate::{
	gml::ast,
	util::DiagBuilder,
	Error, FxIndexMap,
};

use super::{BuiltinFunction, PassContext, PassOutput, SemanticPass};

#[derive(Debug, Clone, Copy, Default)]
pub struct FunctionLint;

/// How many arguments a callee takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Arity {
	min: usize,
	/// `None` if variadic.
	max: Option<usize>,
}

impl Arity {
	#[must_use]
	fn of(func: &ast::FuncDecl) -> Self {
		if func.is_variadic() {
			return Self { min: 0, max: None };
		}

		let (mut min, mut max) = (0, 0);

		for param in func.params() {
			max += 1;

			if !param.has_default() {
				min = max;
			}
		}

		Self {
			min,
			max: Some(max),
		}
	}

	#[must_use]
	fn accepts(self, count: usize) -> bool {
		count >= self.min && self.max.map_or(true, |max| count <= max)
	}

	#[must_use]
	fn describe(self) -> String {
		match self.max {
			Some(max) if max == self.min => format!("exactly {max}"),
			Some(max) => format!("between {} and {max}", self.min),
			None => format!("at least {}", self.min),
		}
	}
}

impl SemanticPass for FunctionLint {
	fn run(&self, ctx: &PassContext) -> Result<PassOutput, Error> {
		let mut output = PassOutput::default();
		let mut declared = FxIndexMap::<String, ast::FuncDecl>::default();
		let mut calls = vec![];

		for node in ctx.root.descendants() {
			if let Some(func) = ast::FuncDecl::cast(node.clone()) {
				let Some(name) = func.name() else {
					continue;
				};

				if let Some(prev) = declared.get(name.text()) {
					let prev_range = prev
						.name()
						.map_or_else(|| prev.syntax().text_range(), |n| n.text_range());

					output.diagnostics.push(
						DiagBuilder::new(
							ctx.unit.lines.range(name.text_range()),
							DiagnosticSeverity::ERROR,
							format!("function `{}` is declared more than once", name.text()),
						)
						.related(
							Location {
								uri: ctx.unit.uri.clone(),
								range: ctx.unit.lines.range(prev_range),
							},
							"first declared here",
						)
						.build(),
					);
				} else {
					declared.insert(name.text().to_string(), func);
				}
			} else if let Some(call) = ast::CallExpr::cast(node) {
				calls.push(call);
			}
		}

		for call in calls {
			let Some(callee) = call.callee_name() else {
				continue;
			};

			let Some(args) = call.arg_list() else {
				continue;
			};

			let name = callee.text();
			let count = args.count();

			let arity = if let Some(func) = declared.get(name) {
				Arity::of(func)
			} else if let Some(sig) = ctx.store.signature_excluding(name, &ctx.unit.uri) {
				Arity {
					min: sig.min_args,
					max: sig.max_args,
				}
			} else if let Some(builtin) = BuiltinFunction::find(name) {
				Arity {
					min: builtin.min_args,
					max: builtin.max_args,
				}
			} else {
				continue;
			};

			if arity.accepts(count) {
				continue;
			}

			output.diagnostics.push(
				DiagBuilder::new(
					ctx.unit.lines.range(call.syntax().text_range()),
					DiagnosticSeverity::WARNING,
					format!(
						"`{name}` takes {} argument(s) but {count} were supplied",
						arity.describe()
					),
				)
				.build(),
			);
		}

		Ok(output)
	}
}
