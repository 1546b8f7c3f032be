//! A matcher for the subset of GameMaker Language that the analysis pipeline
//! understands, producing a lossless [`rowan`] tree.
//!
//! The pipeline treats this as an opaque oracle behind
//! [`Grammar`](crate::pipeline::matching::Grammar); nothing outside of this
//! module subtree and the semantic passes looks at [`Syn`].

pub mod ast;
pub mod parse;

use logos::Logos;

/// Every kind of token and node in a GML syntax tree.
///
/// Token variants carry their lexing rules; node variants are never produced
/// by the lexer.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum Syn {
	// Trivia //////////////////////////////////////////////////////////////////
	#[regex(r"[ \t\r\f]+")]
	Whitespace,
	#[regex(r"\r?\n")]
	Newline,
	#[regex(r"//([^/\n][^\n]*)?")]
	#[regex(r"/\*([^*]|\*+[^*/])*\*+/")]
	Comment,
	#[regex(r"///[^\n]*")]
	DocComment,
	#[regex(r"#(end)?region[^\n]*")]
	Region,

	// Literals ////////////////////////////////////////////////////////////////
	#[regex(r"[0-9]+")]
	#[regex(r"0x[0-9a-fA-F]+")]
	#[regex(r"\$[0-9a-fA-F]+")]
	IntLit,
	#[regex(r"[0-9]+\.[0-9]*")]
	#[regex(r"\.[0-9]+")]
	FloatLit,
	#[regex(r#""([^"\\\n]|\\.)*""#)]
	#[regex(r#"'([^'\\\n]|\\.)*'"#)]
	#[regex(r#"@"[^"]*""#)]
	#[regex(r#"@'[^']*'"#)]
	StringLit,
	#[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
	Ident,

	// Keywords ////////////////////////////////////////////////////////////////
	#[token("and")]
	KwAnd,
	#[token("begin")]
	KwBegin,
	#[token("break")]
	KwBreak,
	#[token("case")]
	KwCase,
	#[token("catch")]
	KwCatch,
	#[token("constructor")]
	KwConstructor,
	#[token("continue")]
	KwContinue,
	#[token("default")]
	KwDefault,
	#[token("delete")]
	KwDelete,
	#[token("div")]
	KwDiv,
	#[token("do")]
	KwDo,
	#[token("else")]
	KwElse,
	#[token("end")]
	KwEnd,
	#[token("enum")]
	KwEnum,
	#[token("exit")]
	KwExit,
	#[token("false")]
	KwFalse,
	#[token("finally")]
	KwFinally,
	#[token("for")]
	KwFor,
	#[token("function")]
	KwFunction,
	#[token("globalvar")]
	KwGlobalvar,
	#[token("if")]
	KwIf,
	/// Both the `#macro` directive and a bare `macro` at statement position.
	#[token("#macro")]
	#[token("macro")]
	KwMacro,
	#[token("mod")]
	KwMod,
	#[token("new")]
	KwNew,
	#[token("not")]
	KwNot,
	#[token("or")]
	KwOr,
	#[token("repeat")]
	KwRepeat,
	#[token("return")]
	KwReturn,
	#[token("static")]
	KwStatic,
	#[token("switch")]
	KwSwitch,
	#[token("then")]
	KwThen,
	#[token("throw")]
	KwThrow,
	#[token("true")]
	KwTrue,
	#[token("try")]
	KwTry,
	#[token("until")]
	KwUntil,
	#[token("var")]
	KwVar,
	#[token("while")]
	KwWhile,
	#[token("with")]
	KwWith,
	#[token("xor")]
	KwXor,

	// Glyphs //////////////////////////////////////////////////////////////////
	#[token("{")]
	LBrace,
	#[token("}")]
	RBrace,
	#[token("(")]
	LParen,
	#[token(")")]
	RParen,
	#[token("[")]
	LBracket,
	/// `[@`, `[?`, `[|`, `[#`, or `[$`.
	#[regex(r"\[[@?|#$]")]
	LBracketAccessor,
	#[token("]")]
	RBracket,
	#[token(";")]
	Semicolon,
	#[token(",")]
	Comma,
	#[token(".")]
	Dot,
	#[token(":")]
	Colon,
	#[token("?")]
	Question,
	#[token("??")]
	Question2,
	#[token("??=")]
	Question2Eq,
	#[token("=")]
	Eq,
	#[token(":=")]
	ColonEq,
	#[token("==")]
	Eq2,
	#[token("!=")]
	BangEq,
	#[token("<")]
	AngleL,
	#[token("<=")]
	AngleLEq,
	#[token(">")]
	AngleR,
	#[token(">=")]
	AngleREq,
	#[token("+")]
	Plus,
	#[token("+=")]
	PlusEq,
	#[token("++")]
	Plus2,
	#[token("-")]
	Minus,
	#[token("-=")]
	MinusEq,
	#[token("--")]
	Minus2,
	#[token("*")]
	Asterisk,
	#[token("*=")]
	AsteriskEq,
	#[token("/")]
	Slash,
	#[token("/=")]
	SlashEq,
	#[token("%")]
	Percent,
	#[token("%=")]
	PercentEq,
	#[token("&")]
	Ampersand,
	#[token("&=")]
	AmpersandEq,
	#[token("&&")]
	Ampersand2,
	#[token("|")]
	Pipe,
	#[token("|=")]
	PipeEq,
	#[token("||")]
	Pipe2,
	#[token("^")]
	Caret,
	#[token("^=")]
	CaretEq,
	#[token("^^")]
	Caret2,
	#[token("!")]
	Bang,
	#[token("~")]
	Tilde,
	#[token("<<")]
	AngleL2,
	#[token(">>")]
	AngleR2,

	/// Input the lexer could not classify.
	Unknown,
	/// Never present in a tree; returned by the parser's lookahead past the last token.
	Eof,

	// Nodes ///////////////////////////////////////////////////////////////////
	Root,

	MacroDef,
	MacroBody,
	EnumDef,
	EnumMember,
	VarDecl,
	Declarator,
	GlobalVarDecl,
	FuncDecl,
	ParamList,
	Param,
	Inherit,

	Block,
	IfStat,
	ElseClause,
	WhileStat,
	RepeatStat,
	WithStat,
	DoStat,
	ForStat,
	SwitchStat,
	CaseClause,
	DefaultClause,
	ReturnStat,
	ExitStat,
	BreakStat,
	ContinueStat,
	TryStat,
	CatchClause,
	FinallyClause,
	ThrowStat,
	DeleteStat,
	ExprStat,
	EmptyStat,

	AssignExpr,
	BinExpr,
	PrefixExpr,
	PostfixExpr,
	TernaryExpr,
	CallExpr,
	ArgList,
	FieldExpr,
	IndexExpr,
	ParenExpr,
	ArrayLit,
	StructLit,
	StructField,
	NameRef,
	Literal,

	#[doc(hidden)]
	__Last,
}

impl Syn {
	#[must_use]
	pub fn is_trivia(self) -> bool {
		matches!(
			self,
			Self::Whitespace | Self::Newline | Self::Comment | Self::DocComment | Self::Region
		)
	}

	/// How this kind is named in "expected one of..." messages.
	#[must_use]
	pub fn describe(self) -> &'static str {
		match self {
			Self::Whitespace | Self::Newline => "whitespace",
			Self::Comment | Self::DocComment | Self::Region => "comment",
			Self::IntLit | Self::FloatLit => "number",
			Self::StringLit => "string",
			Self::Ident => "identifier",
			Self::KwAnd => "`and`",
			Self::KwBegin => "`begin`",
			Self::KwBreak => "`break`",
			Self::KwCase => "`case`",
			Self::KwCatch => "`catch`",
			Self::KwConstructor => "`constructor`",
			Self::KwContinue => "`continue`",
			Self::KwDefault => "`default`",
			Self::KwDelete => "`delete`",
			Self::KwDiv => "`div`",
			Self::KwDo => "`do`",
			Self::KwElse => "`else`",
			Self::KwEnd => "`end`",
			Self::KwEnum => "`enum`",
			Self::KwExit => "`exit`",
			Self::KwFalse => "`false`",
			Self::KwFinally => "`finally`",
			Self::KwFor => "`for`",
			Self::KwFunction => "`function`",
			Self::KwGlobalvar => "`globalvar`",
			Self::KwIf => "`if`",
			Self::KwMacro => "`#macro`",
			Self::KwMod => "`mod`",
			Self::KwNew => "`new`",
			Self::KwNot => "`not`",
			Self::KwOr => "`or`",
			Self::KwRepeat => "`repeat`",
			Self::KwReturn => "`return`",
			Self::KwStatic => "`static`",
			Self::KwSwitch => "`switch`",
			Self::KwThen => "`then`",
			Self::KwThrow => "`throw`",
			Self::KwTrue => "`true`",
			Self::KwTry => "`try`",
			Self::KwUntil => "`until`",
			Self::KwVar => "`var`",
			Self::KwWhile => "`while`",
			Self::KwWith => "`with`",
			Self::KwXor => "`xor`",
			Self::LBrace => "`{`",
			Self::RBrace => "`}`",
			Self::LParen => "`(`",
			Self::RParen => "`)`",
			Self::LBracket => "`[`",
			Self::LBracketAccessor => "accessor",
			Self::RBracket => "`]`",
			Self::Semicolon => "`;`",
			Self::Comma => "`,`",
			Self::Dot => "`.`",
			Self::Colon => "`:`",
			Self::Question => "`?`",
			Self::Question2 => "`??`",
			Self::Question2Eq => "`??=`",
			Self::Eq => "`=`",
			Self::ColonEq => "`:=`",
			Self::Eq2 => "`==`",
			Self::BangEq => "`!=`",
			Self::AngleL => "`<`",
			Self::AngleLEq => "`<=`",
			Self::AngleR => "`>`",
			Self::AngleREq => "`>=`",
			Self::Plus => "`+`",
			Self::PlusEq => "`+=`",
			Self::Plus2 => "`++`",
			Self::Minus => "`-`",
			Self::MinusEq => "`-=`",
			Self::Minus2 => "`--`",
			Self::Asterisk => "`*`",
			Self::AsteriskEq => "`*=`",
			Self::Slash => "`/`",
			Self::SlashEq => "`/=`",
			Self::Percent => "`%`",
			Self::PercentEq => "`%=`",
			Self::Ampersand => "`&`",
			Self::AmpersandEq => "`&=`",
			Self::Ampersand2 => "`&&`",
			Self::Pipe => "`|`",
			Self::PipeEq => "`|=`",
			Self::Pipe2 => "`||`",
			Self::Caret => "`^`",
			Self::CaretEq => "`^=`",
			Self::Caret2 => "`^^`",
			Self::Bang => "`!`",
			Self::Tilde => "`~`",
			Self::AngleL2 => "`<<`",
			Self::AngleR2 => "`>>`",
			Self::Unknown => "unknown input",
			Self::Eof => "end of input",
			_ => "syntax node",
		}
	}
}

impl From<Syn> for rowan::SyntaxKind {
	fn from(value: Syn) -> Self {
		Self(value as u16)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GmlLang {}

impl rowan::Language for GmlLang {
	type Kind = Syn;

	fn kind_from_raw(raw: rowan::SyntaxKind) -> Self::Kind {
		assert!(raw.0 < Syn::__Last as u16);
		// SAFETY: `Syn` is `repr(u16)` and the bound was checked above.
		unsafe { std::mem::transmute::<u16, Syn>(raw.0) }
	}

	fn kind_to_raw(kind: Self::Kind) -> rowan::SyntaxKind {
		kind.into()
	}
}

pub type SyntaxNode = rowan::SyntaxNode<GmlLang>;
pub type SyntaxToken = rowan::SyntaxToken<GmlLang>;
pub type SyntaxElement = rowan::SyntaxElement<GmlLang>;

/// Lexes all of `text`; input which no rule matches becomes [`Syn::Unknown`].
#[must_use]
pub fn lex(text: &str) -> Vec<(Syn, rowan::TextRange)> {
	Syn::lexer(text)
		.spanned()
		.map(|(result, span)| {
			let range = rowan::TextRange::new(
				rowan::TextSize::from(span.start as u32),
				rowan::TextSize::from(span.end as u32),
			);

			(result.unwrap_or(Syn::Unknown), range)
		})
		.collect()
}
