//! Discovers script function signatures along with their `///` documentation.
//!
//! Recognized tags: `@function`/`@func`, `@description`/`@desc`,
//! `@param`/`@arg`/`@argument` (`{type}` optional, `[name]` marks an optional
//! parameter), and `@return`/`@returns`. Untagged lines extend the description.
//! A script without any function declarations is a pre-2.3 script; its
//! leading documentation describes the script itself.

use std::sync::OnceLock;

use regex::Regex;
use rowan::ast::AstNode;

use crate::{
	gml::{ast, Syn, SyntaxElement, SyntaxNode},
	store::{SigParam, Signature, SymbolData, SymbolRecord},
	Error,
};

use super::{PassContext, PassOutput, SemanticPass};

#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureDocs;

impl SemanticPass for SignatureDocs {
	fn run(&self, ctx: &PassContext) -> Result<PassOutput, Error> {
		let mut output = PassOutput::default();
		let script = ctx.unit.info.resource.clone();

		let funcs = ctx
			.root
			.children()
			.filter_map(ast::FuncDecl::cast)
			.filter(|f| f.name().is_some())
			.collect::<Vec<_>>();

		for func in funcs.iter() {
			let Some(name) = func.name() else {
				continue;
			};

			let docs = DocBlock::parse(preceding_docs(func.syntax()));
			let mut sig = docs.signature_for(func);
			sig.script = script.clone();

			output.symbols.push(SymbolRecord {
				name: name.text().to_string(),
				range: ctx.unit.lines.range(name.text_range()),
				data: SymbolData::Signature(sig),
			});
		}

		if !funcs.is_empty() {
			return Ok(output);
		}

		let Some(script) = script else {
			return Ok(output);
		};

		let docs = DocBlock::parse(leading_docs(&ctx.root));

		if docs.is_empty() {
			return Ok(output);
		}

		let range = ctx.unit.lines.range(rowan::TextRange::empty(0.into()));
		let mut sig = docs.legacy_signature();
		sig.script = Some(script.clone());

		output.symbols.push(SymbolRecord {
			name: script,
			range,
			data: SymbolData::Signature(sig),
		});

		Ok(output)
	}
}

/// The text of each `///` line directly above `node`, in source order.
#[must_use]
fn preceding_docs(node: &SyntaxNode) -> Vec<String> {
	let mut ret = vec![];
	let mut elem = node.prev_sibling_or_token();

	while let Some(e) = elem {
		match e.kind() {
			Syn::Whitespace | Syn::Newline => {}
			Syn::DocComment => {
				if let SyntaxElement::Token(token) = &e {
					ret.push(token.text().to_string());
				}
			}
			_ => break,
		}

		elem = e.prev_sibling_or_token();
	}

	ret.reverse();
	ret
}

/// The `///` lines at the very top of a file.
#[must_use]
fn leading_docs(root: &SyntaxNode) -> Vec<String> {
	root.children_with_tokens()
		.take_while(|e| e.kind().is_trivia())
		.filter_map(|e| e.into_token())
		.filter(|t| t.kind() == Syn::DocComment)
		.map(|t| t.text().to_string())
		.collect()
}

#[derive(Debug, Default)]
struct DocBlock {
	description: Vec<String>,
	params: Vec<SigParam>,
	returns: Option<String>,
}

impl DocBlock {
	#[must_use]
	fn parse(lines: Vec<String>) -> Self {
		static TAG: OnceLock<Regex> = OnceLock::new();

		let tag = TAG.get_or_init(|| {
			// The pattern is a constant.
			Regex::new(r"^@(\w+)\s*(?:\{([^}]*)\})?\s*(.*)$").unwrap_or_else(|_| unreachable!())
		});

		let mut ret = Self::default();

		for line in lines {
			let text = line.trim_start_matches('/').trim();

			if text.is_empty() {
				continue;
			}

			let Some(caps) = tag.captures(text) else {
				ret.description.push(text.to_string());
				continue;
			};

			let type_spec = caps.get(2).map(|m| m.as_str().trim().to_string());
			let rest = caps.get(3).map_or("", |m| m.as_str()).trim();

			match &caps[1] {
				"description" | "desc" => {
					if !rest.is_empty() {
						ret.description.push(rest.to_string());
					}
				}
				"param" | "arg" | "argument" => {
					let (name, description) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
					let optional = name.starts_with('[') && name.ends_with(']');
					let name = name.trim_matches(|c| c == '[' || c == ']');

					if name.is_empty() {
						continue;
					}

					ret.params.push(SigParam {
						name: name.to_string(),
						type_spec,
						description: (!description.trim().is_empty())
							.then(|| description.trim().to_string()),
						optional,
					});
				}
				"return" | "returns" => {
					ret.returns = match (type_spec, rest.is_empty()) {
						(Some(t), true) => Some(t),
						(Some(t), false) => Some(format!("{{{t}}} {rest}")),
						(None, false) => Some(rest.to_string()),
						(None, true) => None,
					};
				}
				// `@function` only restates the declaration.
				_ => {}
			}
		}

		ret
	}

	#[must_use]
	fn is_empty(&self) -> bool {
		self.description.is_empty() && self.params.is_empty() && self.returns.is_none()
	}

	#[must_use]
	fn description(&self) -> Option<String> {
		(!self.description.is_empty()).then(|| self.description.join(" "))
	}

	/// Parameters come from the declaration; documentation only annotates them.
	#[must_use]
	fn signature_for(&self, func: &ast::FuncDecl) -> Signature {
		let mut params = vec![];
		let mut min_args = 0;

		for (i, param) in func.params().enumerate() {
			let Some(name) = param.name() else {
				continue;
			};

			// Documentation conventionally drops the leading underscore.
			let doc = self
				.params
				.iter()
				.find(|p| p.name.trim_start_matches('_') == name.text().trim_start_matches('_'));
			let optional = param.has_default() || doc.is_some_and(|d| d.optional);

			if !optional {
				min_args = i + 1;
			}

			params.push(SigParam {
				name: name.text().to_string(),
				type_spec: doc.and_then(|d| d.type_spec.clone()),
				description: doc.and_then(|d| d.description.clone()),
				optional,
			});
		}

		let max_args = (!func.is_variadic()).then_some(params.len());

		Signature {
			script: None,
			min_args: if max_args.is_some() { min_args } else { 0 },
			max_args,
			params,
			description: self.description(),
			returns: self.returns.clone(),
		}
	}

	/// Pre-2.3 scripts read `argument0...argumentN`, so the documented
	/// parameters are all there is to go on.
	#[must_use]
	fn legacy_signature(self) -> Signature {
		let min_args = self
			.params
			.iter()
			.rposition(|p| !p.optional)
			.map_or(0, |i| i + 1);

		Signature {
			script: None,
			min_args,
			max_args: Some(self.params.len()),
			description: self.description(),
			returns: self.returns,
			params: self.params,
		}
	}
}
