//! Strongly-typed views over [`SyntaxNode`]s.

use rowan::ast::AstNode;

use super::{GmlLang, Syn, SyntaxNode, SyntaxToken};

macro_rules! simple_astnode {
	($($kind:ident),+ $(,)?) => {
		$(
			#[derive(Debug, Clone, PartialEq, Eq, Hash)]
			#[repr(transparent)]
			pub struct $kind(pub(super) SyntaxNode);

			impl AstNode for $kind {
				type Language = GmlLang;

				fn can_cast(kind: Syn) -> bool {
					kind == Syn::$kind
				}

				fn cast(node: SyntaxNode) -> Option<Self> {
					Self::can_cast(node.kind()).then_some(Self(node))
				}

				fn syntax(&self) -> &SyntaxNode {
					&self.0
				}
			}
		)+
	};
}

simple_astnode! {
	MacroDef,
	MacroBody,
	EnumDef,
	EnumMember,
	VarDecl,
	Declarator,
	FuncDecl,
	Param,
	AssignExpr,
	CallExpr,
	ArgList,
	FieldExpr,
	NameRef,
}

#[must_use]
fn child_tokens(node: &SyntaxNode, kind: Syn) -> impl Iterator<Item = SyntaxToken> {
	node.children_with_tokens()
		.filter_map(|elem| elem.into_token())
		.filter(move |token| token.kind() == kind)
}

// MacroDef ////////////////////////////////////////////////////////////////////

impl MacroDef {
	/// The second identifier when the form is `#macro Config:NAME`.
	#[must_use]
	pub fn name(&self) -> Option<SyntaxToken> {
		let mut idents = child_tokens(&self.0, Syn::Ident);
		let first = idents.next()?;

		if self.config().is_some() {
			idents.next()
		} else {
			Some(first)
		}
	}

	#[must_use]
	pub fn config(&self) -> Option<SyntaxToken> {
		child_tokens(&self.0, Syn::Colon).next()?;
		child_tokens(&self.0, Syn::Ident).next()
	}

	#[must_use]
	pub fn body(&self) -> Option<MacroBody> {
		self.0.children().find_map(MacroBody::cast)
	}
}

impl MacroBody {
	/// The expansion with surrounding whitespace and any trailing line comment removed.
	#[must_use]
	pub fn expansion(&self) -> String {
		let mut ret = String::new();

		for token in self
			.0
			.children_with_tokens()
			.filter_map(|elem| elem.into_token())
		{
			if matches!(token.kind(), Syn::Comment | Syn::DocComment) {
				continue;
			}

			ret.push_str(token.text());
		}

		ret.trim().to_string()
	}
}

// EnumDef /////////////////////////////////////////////////////////////////////

impl EnumDef {
	#[must_use]
	pub fn name(&self) -> Option<SyntaxToken> {
		child_tokens(&self.0, Syn::Ident).next()
	}

	pub fn members(&self) -> impl Iterator<Item = EnumMember> {
		self.0.children().filter_map(EnumMember::cast)
	}
}

impl EnumMember {
	#[must_use]
	pub fn name(&self) -> Option<SyntaxToken> {
		child_tokens(&self.0, Syn::Ident).next()
	}
}

// VarDecl /////////////////////////////////////////////////////////////////////

impl VarDecl {
	#[must_use]
	pub fn is_static(&self) -> bool {
		child_tokens(&self.0, Syn::KwStatic).next().is_some()
	}

	pub fn declarators(&self) -> impl Iterator<Item = Declarator> {
		self.0.children().filter_map(Declarator::cast)
	}
}

impl Declarator {
	#[must_use]
	pub fn name(&self) -> Option<SyntaxToken> {
		child_tokens(&self.0, Syn::Ident).next()
	}
}

// FuncDecl ////////////////////////////////////////////////////////////////////

impl FuncDecl {
	/// `None` for anonymous functions.
	#[must_use]
	pub fn name(&self) -> Option<SyntaxToken> {
		child_tokens(&self.0, Syn::Ident).next()
	}

	#[must_use]
	pub fn is_constructor(&self) -> bool {
		child_tokens(&self.0, Syn::KwConstructor).next().is_some()
	}

	pub fn params(&self) -> impl Iterator<Item = Param> {
		self.0
			.children()
			.find(|node| node.kind() == Syn::ParamList)
			.into_iter()
			.flat_map(|list| list.children().filter_map(Param::cast))
	}

	/// Does the body refer to `argument`, `argument_count`, or `argumentN`?
	/// If so, the function can take any number of arguments.
	#[must_use]
	pub fn is_variadic(&self) -> bool {
		self.0
			.descendants_with_tokens()
			.filter_map(|elem| elem.into_token())
			.filter(|token| token.kind() == Syn::Ident)
			.any(|token| {
				let text = token.text();

				text == "argument"
					|| text == "argument_count"
					|| text
						.strip_prefix("argument")
						.is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
			})
	}
}

impl Param {
	#[must_use]
	pub fn name(&self) -> Option<SyntaxToken> {
		child_tokens(&self.0, Syn::Ident).next()
	}

	/// Parameters with a default value may be omitted by callers.
	#[must_use]
	pub fn has_default(&self) -> bool {
		child_tokens(&self.0, Syn::Eq).next().is_some()
	}
}

// Expressions /////////////////////////////////////////////////////////////////

impl AssignExpr {
	/// A [`NameRef`], [`FieldExpr`], or index expression.
	#[must_use]
	pub fn target(&self) -> Option<SyntaxNode> {
		self.0.first_child()
	}
}

impl CallExpr {
	/// The called name if the callee is a plain identifier.
	#[must_use]
	pub fn callee_name(&self) -> Option<SyntaxToken> {
		NameRef::cast(self.0.first_child()?)?.ident()
	}

	#[must_use]
	pub fn arg_list(&self) -> Option<ArgList> {
		self.0.children().find_map(ArgList::cast)
	}
}

impl ArgList {
	#[must_use]
	pub fn count(&self) -> usize {
		self.0.children().count()
	}

	/// Offsets of every `,` directly inside the parentheses.
	pub fn commas(&self) -> impl Iterator<Item = SyntaxToken> {
		child_tokens(&self.0, Syn::Comma)
	}
}

impl FieldExpr {
	#[must_use]
	pub fn lhs(&self) -> Option<SyntaxNode> {
		self.0.first_child()
	}

	#[must_use]
	pub fn field(&self) -> Option<SyntaxToken> {
		child_tokens(&self.0, Syn::Ident).last()
	}
}

impl NameRef {
	#[must_use]
	pub fn ident(&self) -> Option<SyntaxToken> {
		child_tokens(&self.0, Syn::Ident).next()
	}
}
