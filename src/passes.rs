//! The four semantic passes and the machinery for selecting and dispatching them.
//!
//! Every pass reads the same successful match and never observes another
//! pass's output from the same cycle.

mod builtins;
mod enums;
mod lint;
mod sigdoc;
mod vars;

use lsp_types::Diagnostic;

use crate::{
	gml::SyntaxNode,
	pipeline::SourceUnit,
	store::{Category, SymbolRecord, SymbolStore},
	Error,
};

pub use self::{
	builtins::{is_builtin_global, is_builtin_instance_variable, BuiltinFunction},
	enums::EnumsAndMacros,
	lint::FunctionLint,
	sigdoc::SignatureDocs,
	vars::VariableIndex,
};

bitflags::bitflags! {
	/// Which passes a pipeline invocation requests.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	pub struct Passes: u8 {
		const FUNCTION_LINT = 1 << 0;
		const VARIABLES = 1 << 1;
		const ENUMS_AND_MACROS = 1 << 2;
		const SIGNATURES = 1 << 3;
		const ALL = Self::FUNCTION_LINT.bits()
			| Self::VARIABLES.bits()
			| Self::ENUMS_AND_MACROS.bits()
			| Self::SIGNATURES.bits();
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
	FunctionLint,
	Variables,
	EnumsAndMacros,
	Signatures,
}

impl Pass {
	/// Passes always run, and their diagnostics are always concatenated, in this order.
	pub const ORDER: [Self; 4] = [
		Self::FunctionLint,
		Self::Variables,
		Self::EnumsAndMacros,
		Self::Signatures,
	];

	#[must_use]
	pub fn flag(self) -> Passes {
		match self {
			Self::FunctionLint => Passes::FUNCTION_LINT,
			Self::Variables => Passes::VARIABLES,
			Self::EnumsAndMacros => Passes::ENUMS_AND_MACROS,
			Self::Signatures => Passes::SIGNATURES,
		}
	}

	#[must_use]
	pub fn name(self) -> &'static str {
		match self {
			Self::FunctionLint => "function lint",
			Self::Variables => "variable index",
			Self::EnumsAndMacros => "enum and macro index",
			Self::Signatures => "signature documentation index",
		}
	}

	/// The store categories whose contents this pass is the sole producer of.
	#[must_use]
	pub fn categories(self) -> &'static [Category] {
		match self {
			Self::FunctionLint => &[],
			Self::Variables => &[Category::InstanceVariable, Category::LocalVariable],
			Self::EnumsAndMacros => &[Category::Enum, Category::Macro],
			Self::Signatures => &[Category::Signature],
		}
	}
}

/// Everything a pass may look at.
#[derive(Debug)]
pub struct PassContext<'c> {
	pub unit: &'c SourceUnit,
	pub root: SyntaxNode,
	/// Read-only from a pass's perspective; only the reconciler writes.
	pub store: &'c SymbolStore,
}

#[derive(Debug, Default)]
pub struct PassOutput {
	pub diagnostics: Vec<Diagnostic>,
	pub symbols: Vec<SymbolRecord>,
}

pub trait SemanticPass: Send + Sync {
	/// An `Err` means the tree had a shape this pass could not handle.
	/// The caller treats that as if nothing had been discovered.
	fn run(&self, ctx: &PassContext) -> Result<PassOutput, Error>;
}

/// The ordered `(pass, implementation)` list the orchestrator walks.
pub struct PassTable {
	entries: [(Pass, Box<dyn SemanticPass>); 4],
}

impl PassTable {
	#[must_use]
	pub fn standard() -> Self {
		Self {
			entries: [
				(Pass::FunctionLint, Box::new(FunctionLint)),
				(Pass::Variables, Box::new(VariableIndex)),
				(Pass::EnumsAndMacros, Box::new(EnumsAndMacros)),
				(Pass::Signatures, Box::new(SignatureDocs)),
			],
		}
	}

	/// Swaps out the implementation of `pass`, keeping its position.
	#[must_use]
	pub fn with(mut self, pass: Pass, implementation: impl SemanticPass + 'static) -> Self {
		if let Some((_, imp)) = self.entries.iter_mut().find(|(p, _)| *p == pass) {
			*imp = Box::new(implementation);
		}

		self
	}

	pub fn iter(&self) -> impl Iterator<Item = (Pass, &dyn SemanticPass)> {
		self.entries.iter().map(|(pass, imp)| (*pass, imp.as_ref()))
	}
}

impl Default for PassTable {
	fn default() -> Self {
		Self::standard()
	}
}

impl std::fmt::Debug for PassTable {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_list()
			.entries(self.entries.iter().map(|(pass, _)| pass))
			.finish()
	}
}
