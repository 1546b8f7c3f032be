//! A recursive-descent parser which stops at the first error.
//!
//! On success, the output is a lossless green tree; every byte of the input
//! is covered by exactly one token. On failure, the output is the offset at
//! which matching stopped and the set of kinds that would have let it continue.

use rowan::{GreenNode, GreenNodeBuilder, TextRange, TextSize};

use super::{lex, Syn};

/// Nested statements and expressions deeper than this are rejected rather
/// than risking the stack.
pub const MAX_DEPTH: u32 = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
	pub offset: TextSize,
	pub found: &'static str,
	/// Sorted and deduplicated.
	pub expected: Vec<&'static str>,
}

#[derive(Debug)]
pub struct Parsed {
	pub green: GreenNode,
}

pub fn file(text: &str) -> Result<Parsed, ParseError> {
	let mut parser = Parser {
		text,
		tokens: lex(text),
		pos: 0,
		builder: GreenNodeBuilder::new(),
		expected: vec![],
		delims: vec![],
		depth: 0,
	};

	parser.builder.start_node(Syn::Root.into());

	while parser.current() != Syn::Eof {
		parser.statement()?;
	}

	parser.eat_trivia();
	parser.builder.finish_node();

	Ok(Parsed {
		green: parser.builder.finish(),
	})
}

type PResult<T = ()> = Result<T, ParseError>;

struct Parser<'t> {
	text: &'t str,
	tokens: Vec<(Syn, TextRange)>,
	/// Index of the next raw token (trivia or not).
	pos: usize,
	builder: GreenNodeBuilder<'static>,
	/// Kinds tested for since the last token was consumed.
	expected: Vec<&'static str>,
	/// Ranges of opening delimiters not yet closed.
	delims: Vec<TextRange>,
	depth: u32,
}

// Token stream ////////////////////////////////////////////////////////////////

impl Parser<'_> {
	#[must_use]
	fn nth(&self, n: usize) -> Syn {
		self.tokens[self.pos..]
			.iter()
			.filter(|(kind, _)| !kind.is_trivia())
			.nth(n)
			.map_or(Syn::Eof, |(kind, _)| *kind)
	}

	#[must_use]
	fn current(&self) -> Syn {
		self.nth(0)
	}

	/// Is there a line break between the last consumed token and the next one?
	#[must_use]
	fn at_line_break(&self) -> bool {
		self.tokens[self.pos..]
			.iter()
			.take_while(|(kind, _)| kind.is_trivia())
			.any(|(kind, range)| {
				*kind == Syn::Newline
					|| (*kind == Syn::Comment && self.text[*range].contains('\n'))
			})
	}

	fn at(&mut self, kind: Syn) -> bool {
		if self.current() == kind {
			return true;
		}

		self.expected.push(kind.describe());
		false
	}

	fn at_any(&mut self, kinds: &[Syn]) -> bool {
		let current = self.current();

		if kinds.contains(&current) {
			return true;
		}

		self.expected.extend(kinds.iter().map(|k| k.describe()));
		false
	}

	fn eat_trivia(&mut self) {
		while let Some((kind, range)) = self.tokens.get(self.pos).copied() {
			if !kind.is_trivia() {
				break;
			}

			self.builder.token(kind.into(), &self.text[range]);
			self.pos += 1;
		}
	}

	/// Consumes the next non-trivia token along with any trivia before it.
	fn bump(&mut self) {
		self.eat_trivia();

		let Some((kind, range)) = self.tokens.get(self.pos).copied() else {
			return;
		};

		match kind {
			Syn::LBrace
			| Syn::KwBegin
			| Syn::LParen
			| Syn::LBracket
			| Syn::LBracketAccessor => self.delims.push(range),
			Syn::RBrace | Syn::KwEnd | Syn::RParen | Syn::RBracket => {
				self.delims.pop();
			}
			_ => {}
		}

		self.builder.token(kind.into(), &self.text[range]);
		self.pos += 1;
		self.expected.clear();
	}

	/// Like [`Self::bump`] but leaves trivia and delimiter tracking alone.
	fn bump_raw(&mut self) {
		let Some((kind, range)) = self.tokens.get(self.pos).copied() else {
			return;
		};

		self.builder.token(kind.into(), &self.text[range]);
		self.pos += 1;
		self.expected.clear();
	}

	fn eat(&mut self, kind: Syn) -> bool {
		if self.at(kind) {
			self.bump();
			true
		} else {
			false
		}
	}

	fn expect(&mut self, kind: Syn) -> PResult {
		if self.eat(kind) {
			Ok(())
		} else {
			Err(self.fail())
		}
	}

	fn expect_any(&mut self, kinds: &[Syn]) -> PResult {
		if self.at_any(kinds) {
			self.bump();
			Ok(())
		} else {
			Err(self.fail())
		}
	}

	#[must_use]
	fn fail(&self) -> ParseError {
		let next = self.tokens[self.pos..]
			.iter()
			.find(|(kind, _)| !kind.is_trivia())
			.copied();

		let (offset, found) = match next {
			Some((kind, range)) => (range.start(), kind.describe()),
			None => match self.delims.last() {
				// Input ran out inside a delimited construct.
				// Blame the innermost opener that was never closed.
				Some(opener) => (opener.start(), Syn::Eof.describe()),
				None => (TextSize::of(self.text), Syn::Eof.describe()),
			},
		};

		let mut expected = self.expected.clone();
		expected.sort_unstable();
		expected.dedup();

		ParseError {
			offset,
			found,
			expected,
		}
	}

	fn enter(&mut self) -> PResult {
		self.depth += 1;

		if self.depth > MAX_DEPTH {
			let mut err = self.fail();
			err.expected = vec!["less deeply nested code"];
			return Err(err);
		}

		Ok(())
	}

	fn leave(&mut self) {
		self.depth -= 1;
	}

	/// Left-nested chains (`a + b + c`, `a.b.c`) grow the tree without
	/// recursing, so each wrap counts against the depth limit. The caller
	/// gives back `wraps` once its chain ends; a failure ends the whole parse.
	fn wrap(&mut self, wraps: &mut u32) -> PResult {
		self.enter()?;
		*wraps += 1;
		Ok(())
	}
}

// Tree building ///////////////////////////////////////////////////////////////

impl Parser<'_> {
	fn start(&mut self, kind: Syn) {
		self.eat_trivia();
		self.builder.start_node(kind.into());
	}

	fn checkpoint(&mut self) -> rowan::Checkpoint {
		self.eat_trivia();
		self.builder.checkpoint()
	}

	fn start_at(&mut self, checkpoint: rowan::Checkpoint, kind: Syn) {
		self.builder.start_node_at(checkpoint, kind.into());
	}

	fn finish(&mut self) {
		self.builder.finish_node();
	}
}

// Statements //////////////////////////////////////////////////////////////////

impl Parser<'_> {
	fn statement(&mut self) -> PResult {
		self.enter()?;

		let ret = match self.current() {
			Syn::KwMacro => self.macro_def(),
			Syn::KwEnum => self.enum_def(),
			Syn::KwVar | Syn::KwStatic => self.var_decl(true),
			Syn::KwGlobalvar => self.globalvar_decl(),
			Syn::KwFunction => self.func_decl().map(|_| {
				self.eat(Syn::Semicolon);
			}),
			Syn::LBrace | Syn::KwBegin => self.block(),
			Syn::KwIf => self.if_stat(),
			Syn::KwWhile => self.keyword_cond_body(Syn::WhileStat),
			Syn::KwRepeat => self.keyword_cond_body(Syn::RepeatStat),
			Syn::KwWith => self.keyword_cond_body(Syn::WithStat),
			Syn::KwDo => self.do_stat(),
			Syn::KwFor => self.for_stat(),
			Syn::KwSwitch => self.switch_stat(),
			Syn::KwReturn => self.return_stat(),
			Syn::KwExit => self.lone_keyword(Syn::ExitStat),
			Syn::KwBreak => self.lone_keyword(Syn::BreakStat),
			Syn::KwContinue => self.lone_keyword(Syn::ContinueStat),
			Syn::KwTry => self.try_stat(),
			Syn::KwThrow => self.keyword_expr(Syn::ThrowStat),
			Syn::KwDelete => self.keyword_expr(Syn::DeleteStat),
			Syn::Semicolon => {
				self.start(Syn::EmptyStat);
				self.bump();
				self.finish();
				Ok(())
			}
			_ => self.expr_stat(true),
		};

		self.leave();
		ret
	}

	/// The body runs to the end of the line. `#macro Config:NAME body` is accepted.
	fn macro_def(&mut self) -> PResult {
		self.start(Syn::MacroDef);
		self.bump();
		self.expect(Syn::Ident)?;

		if self.current() == Syn::Colon && !self.at_line_break() {
			self.bump();
			self.expect(Syn::Ident)?;
		}

		self.builder.start_node(Syn::MacroBody.into());

		while let Some((kind, _)) = self.tokens.get(self.pos) {
			if *kind == Syn::Newline {
				break;
			}

			self.bump_raw();
		}

		self.finish();
		self.finish();
		Ok(())
	}

	fn enum_def(&mut self) -> PResult {
		self.start(Syn::EnumDef);
		self.bump();
		self.expect(Syn::Ident)?;
		self.expect(Syn::LBrace)?;

		loop {
			if self.at(Syn::RBrace) {
				break;
			}

			self.start(Syn::EnumMember);
			self.expect(Syn::Ident)?;

			if self.eat(Syn::Eq) {
				self.expr()?;
			}

			self.finish();

			if !self.eat(Syn::Comma) {
				break;
			}
		}

		self.expect(Syn::RBrace)?;
		self.finish();
		Ok(())
	}

	fn var_decl(&mut self, semicolon: bool) -> PResult {
		self.start(Syn::VarDecl);
		self.bump();

		loop {
			self.start(Syn::Declarator);
			self.expect(Syn::Ident)?;

			if self.at_any(&[Syn::Eq, Syn::ColonEq]) {
				self.bump();
				self.expr()?;
			}

			self.finish();

			if !self.eat(Syn::Comma) {
				break;
			}
		}

		if semicolon {
			self.eat(Syn::Semicolon);
		}

		self.finish();
		Ok(())
	}

	fn globalvar_decl(&mut self) -> PResult {
		self.start(Syn::GlobalVarDecl);
		self.bump();

		loop {
			self.expect(Syn::Ident)?;

			if !self.eat(Syn::Comma) {
				break;
			}
		}

		self.eat(Syn::Semicolon);
		self.finish();
		Ok(())
	}

	/// Named at statement level, anonymous as an expression.
	fn func_decl(&mut self) -> PResult<Syn> {
		self.start(Syn::FuncDecl);
		self.bump();
		self.eat(Syn::Ident);
		self.param_list()?;

		if self.at(Syn::Colon) {
			self.start(Syn::Inherit);
			self.bump();
			self.expect(Syn::Ident)?;

			if self.at(Syn::LParen) {
				self.arg_list()?;
			}

			self.finish();
		}

		self.eat(Syn::KwConstructor);

		if !self.at_any(&[Syn::LBrace, Syn::KwBegin]) {
			return Err(self.fail());
		}

		self.block()?;
		self.finish();
		Ok(Syn::FuncDecl)
	}

	fn param_list(&mut self) -> PResult {
		self.start(Syn::ParamList);
		self.expect(Syn::LParen)?;

		loop {
			if self.at(Syn::RParen) {
				break;
			}

			self.start(Syn::Param);
			self.expect(Syn::Ident)?;

			if self.eat(Syn::Eq) {
				self.expr()?;
			}

			self.finish();

			if !self.eat(Syn::Comma) {
				break;
			}
		}

		self.expect(Syn::RParen)?;
		self.finish();
		Ok(())
	}

	fn block(&mut self) -> PResult {
		self.start(Syn::Block);
		self.bump();

		while !self.at_any(&[Syn::RBrace, Syn::KwEnd]) && self.current() != Syn::Eof {
			self.statement()?;
		}

		self.expect_any(&[Syn::RBrace, Syn::KwEnd])?;
		self.finish();
		Ok(())
	}

	fn if_stat(&mut self) -> PResult {
		self.start(Syn::IfStat);
		self.bump();
		self.expr()?;
		self.eat(Syn::KwThen);
		self.statement()?;

		if self.at(Syn::KwElse) {
			self.start(Syn::ElseClause);
			self.bump();
			self.statement()?;
			self.finish();
		}

		self.finish();
		Ok(())
	}

	/// `while`, `repeat`, and `with` all share the shape `keyword expr statement`.
	fn keyword_cond_body(&mut self, node: Syn) -> PResult {
		self.start(node);
		self.bump();
		self.expr()?;

		if node == Syn::WhileStat {
			self.eat(Syn::KwDo);
		}

		self.statement()?;
		self.finish();
		Ok(())
	}

	fn do_stat(&mut self) -> PResult {
		self.start(Syn::DoStat);
		self.bump();
		self.statement()?;
		self.expect(Syn::KwUntil)?;
		self.expr()?;
		self.eat(Syn::Semicolon);
		self.finish();
		Ok(())
	}

	fn for_stat(&mut self) -> PResult {
		self.start(Syn::ForStat);
		self.bump();
		self.expect(Syn::LParen)?;

		if !self.at(Syn::Semicolon) {
			if self.at_any(&[Syn::KwVar, Syn::KwStatic]) {
				self.var_decl(false)?;
			} else {
				self.expr_stat(false)?;
			}
		}

		self.expect(Syn::Semicolon)?;

		if !self.at(Syn::Semicolon) {
			self.expr()?;
		}

		self.expect(Syn::Semicolon)?;

		if !self.at(Syn::RParen) {
			self.expr_stat(false)?;
		}

		self.expect(Syn::RParen)?;
		self.statement()?;
		self.finish();
		Ok(())
	}

	fn switch_stat(&mut self) -> PResult {
		self.start(Syn::SwitchStat);
		self.bump();
		self.expr()?;
		self.expect(Syn::LBrace)?;

		loop {
			if self.at(Syn::RBrace) || self.current() == Syn::Eof {
				break;
			}

			if self.at(Syn::KwCase) {
				self.start(Syn::CaseClause);
				self.bump();
				self.expr()?;
				self.expect(Syn::Colon)?;
				self.finish();
			} else if self.at(Syn::KwDefault) {
				self.start(Syn::DefaultClause);
				self.bump();
				self.expect(Syn::Colon)?;
				self.finish();
			} else {
				self.statement()?;
			}
		}

		self.expect(Syn::RBrace)?;
		self.finish();
		Ok(())
	}

	fn return_stat(&mut self) -> PResult {
		self.start(Syn::ReturnStat);
		self.bump();

		if !self.at_line_break() && !matches!(self.current(), Syn::Semicolon | Syn::RBrace | Syn::Eof)
		{
			self.expr()?;
		}

		self.eat(Syn::Semicolon);
		self.finish();
		Ok(())
	}

	fn lone_keyword(&mut self, node: Syn) -> PResult {
		self.start(node);
		self.bump();
		self.eat(Syn::Semicolon);
		self.finish();
		Ok(())
	}

	fn keyword_expr(&mut self, node: Syn) -> PResult {
		self.start(node);
		self.bump();
		self.expr()?;
		self.eat(Syn::Semicolon);
		self.finish();
		Ok(())
	}

	fn try_stat(&mut self) -> PResult {
		self.start(Syn::TryStat);
		self.bump();

		if !self.at(Syn::LBrace) {
			return Err(self.fail());
		}

		self.block()?;

		if self.at(Syn::KwCatch) {
			self.start(Syn::CatchClause);
			self.bump();
			self.expect(Syn::LParen)?;
			self.expect(Syn::Ident)?;
			self.expect(Syn::RParen)?;

			if !self.at(Syn::LBrace) {
				return Err(self.fail());
			}

			self.block()?;
			self.finish();
		}

		if self.at(Syn::KwFinally) {
			self.start(Syn::FinallyClause);
			self.bump();

			if !self.at(Syn::LBrace) {
				return Err(self.fail());
			}

			self.block()?;
			self.finish();
		}

		self.finish();
		Ok(())
	}

	/// Only assignments, calls, increments, and decrements stand alone.
	fn expr_stat(&mut self, semicolon: bool) -> PResult {
		let cp = self.checkpoint();

		if self.at_any(&[Syn::Plus2, Syn::Minus2]) {
			self.start(Syn::PrefixExpr);
			self.bump();
			self.postfix_expr()?;
			self.finish();
		} else if self.at(Syn::KwNew) {
			self.unary()?;
		} else {
			let kind = self.postfix_expr()?;

			if self.at_any(ASSIGN_OPS) {
				self.start_at(cp, Syn::AssignExpr);
				self.bump();
				self.expr()?;
				self.finish();
			} else if !matches!(kind, Syn::CallExpr | Syn::PostfixExpr) {
				return Err(self.fail());
			}
		}

		if semicolon {
			self.eat(Syn::Semicolon);
		}

		self.start_at(cp, Syn::ExprStat);
		self.finish();
		Ok(())
	}
}

const ASSIGN_OPS: &[Syn] = &[
	Syn::Eq,
	Syn::ColonEq,
	Syn::PlusEq,
	Syn::MinusEq,
	Syn::AsteriskEq,
	Syn::SlashEq,
	Syn::PercentEq,
	Syn::AmpersandEq,
	Syn::PipeEq,
	Syn::CaretEq,
	Syn::Question2Eq,
];

const PREFIX_OPS: &[Syn] = &[
	Syn::Bang,
	Syn::KwNot,
	Syn::Minus,
	Syn::Plus,
	Syn::Tilde,
	Syn::Plus2,
	Syn::Minus2,
	Syn::KwNew,
];

const PRIMARY_STARTS: &[Syn] = &[
	Syn::Ident,
	Syn::IntLit,
	Syn::FloatLit,
	Syn::StringLit,
	Syn::KwTrue,
	Syn::KwFalse,
	Syn::LParen,
	Syn::LBracket,
	Syn::LBrace,
	Syn::KwFunction,
];

/// Higher binds tighter. `=` compares when it appears inside an expression.
#[must_use]
fn infix_precedence(kind: Syn) -> Option<u8> {
	let ret = match kind {
		Syn::Question2 => 1,
		Syn::Pipe2 | Syn::KwOr => 2,
		Syn::Caret2 | Syn::KwXor => 3,
		Syn::Ampersand2 | Syn::KwAnd => 4,
		Syn::Eq2 | Syn::BangEq | Syn::Eq | Syn::ColonEq => 5,
		Syn::AngleL | Syn::AngleLEq | Syn::AngleR | Syn::AngleREq => 6,
		Syn::Pipe => 7,
		Syn::Caret => 8,
		Syn::Ampersand => 9,
		Syn::AngleL2 | Syn::AngleR2 => 10,
		Syn::Plus | Syn::Minus => 11,
		Syn::Asterisk | Syn::Slash | Syn::Percent | Syn::KwDiv | Syn::KwMod => 12,
		_ => return None,
	};

	Some(ret)
}

// Expressions /////////////////////////////////////////////////////////////////

impl Parser<'_> {
	fn expr(&mut self) -> PResult<Syn> {
		self.enter()?;
		let ret = self.ternary();
		self.leave();
		ret
	}

	fn ternary(&mut self) -> PResult<Syn> {
		let cp = self.checkpoint();
		let kind = self.binary(0)?;

		if self.current() != Syn::Question {
			return Ok(kind);
		}

		self.start_at(cp, Syn::TernaryExpr);
		self.bump();
		self.expr()?;
		self.expect(Syn::Colon)?;
		self.expr()?;
		self.finish();
		Ok(Syn::TernaryExpr)
	}

	fn binary(&mut self, min_prec: u8) -> PResult<Syn> {
		let cp = self.checkpoint();
		let mut kind = self.unary()?;
		let mut wraps = 0;

		loop {
			let Some(prec) = infix_precedence(self.current()) else {
				break;
			};

			if prec < min_prec {
				break;
			}

			self.wrap(&mut wraps)?;
			self.start_at(cp, Syn::BinExpr);
			self.bump();
			self.binary(prec + 1)?;
			self.finish();
			kind = Syn::BinExpr;
		}

		self.depth -= wraps;
		Ok(kind)
	}

	fn unary(&mut self) -> PResult<Syn> {
		if !self.at_any(PREFIX_OPS) {
			return self.postfix_expr();
		}

		self.enter()?;
		self.start(Syn::PrefixExpr);
		self.bump();
		let ret = self.unary();
		self.finish();
		self.leave();
		ret.map(|_| Syn::PrefixExpr)
	}

	fn postfix_expr(&mut self) -> PResult<Syn> {
		let cp = self.checkpoint();
		let mut kind = self.primary()?;
		let mut wraps = 0;

		loop {
			if matches!(
				self.current(),
				Syn::LParen | Syn::Dot | Syn::LBracket | Syn::LBracketAccessor
			) {
				self.wrap(&mut wraps)?;
			}

			if self.at(Syn::LParen) {
				self.start_at(cp, Syn::CallExpr);
				self.arg_list()?;
				self.finish();
				kind = Syn::CallExpr;
			} else if self.at(Syn::Dot) {
				self.start_at(cp, Syn::FieldExpr);
				self.bump();
				self.expect(Syn::Ident)?;
				self.finish();
				kind = Syn::FieldExpr;
			} else if self.at_any(&[Syn::LBracket, Syn::LBracketAccessor]) {
				self.start_at(cp, Syn::IndexExpr);
				self.bump();
				self.expr()?;

				while self.eat(Syn::Comma) {
					self.expr()?;
				}

				self.expect(Syn::RBracket)?;
				self.finish();
				kind = Syn::IndexExpr;
			} else if matches!(self.current(), Syn::Plus2 | Syn::Minus2) && !self.at_line_break() {
				self.start_at(cp, Syn::PostfixExpr);
				self.bump();
				self.finish();
				kind = Syn::PostfixExpr;
				break;
			} else {
				break;
			}
		}

		self.depth -= wraps;
		Ok(kind)
	}

	fn arg_list(&mut self) -> PResult {
		self.start(Syn::ArgList);
		self.bump();

		loop {
			if self.at(Syn::RParen) {
				break;
			}

			self.expr()?;

			if !self.eat(Syn::Comma) {
				break;
			}
		}

		self.expect(Syn::RParen)?;
		self.finish();
		Ok(())
	}

	fn primary(&mut self) -> PResult<Syn> {
		match self.current() {
			Syn::Ident => {
				self.start(Syn::NameRef);
				self.bump();
				self.finish();
				Ok(Syn::NameRef)
			}
			Syn::IntLit | Syn::FloatLit | Syn::StringLit | Syn::KwTrue | Syn::KwFalse => {
				self.start(Syn::Literal);
				self.bump();
				self.finish();
				Ok(Syn::Literal)
			}
			Syn::LParen => {
				self.start(Syn::ParenExpr);
				self.bump();
				self.expr()?;
				self.expect(Syn::RParen)?;
				self.finish();
				Ok(Syn::ParenExpr)
			}
			Syn::LBracket => {
				self.start(Syn::ArrayLit);
				self.bump();

				loop {
					if self.at(Syn::RBracket) {
						break;
					}

					self.expr()?;

					if !self.eat(Syn::Comma) {
						break;
					}
				}

				self.expect(Syn::RBracket)?;
				self.finish();
				Ok(Syn::ArrayLit)
			}
			Syn::LBrace => self.struct_lit(),
			Syn::KwFunction => self.func_decl(),
			_ => {
				self.expected
					.extend(PRIMARY_STARTS.iter().map(|k| k.describe()));
				Err(self.fail())
			}
		}
	}

	fn struct_lit(&mut self) -> PResult<Syn> {
		self.start(Syn::StructLit);
		self.bump();

		loop {
			if self.at(Syn::RBrace) {
				break;
			}

			self.start(Syn::StructField);
			self.expect_any(&[Syn::Ident, Syn::StringLit])?;

			if self.eat(Syn::Colon) {
				self.expr()?;
			}

			self.finish();

			if !self.eat(Syn::Comma) {
				break;
			}
		}

		self.expect(Syn::RBrace)?;
		self.finish();
		Ok(Syn::StructLit)
	}
}
