//! Functions and variables provided by the GameMaker runtime.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinFunction {
	pub name: &'static str,
	pub min_args: usize,
	/// `None` if the function is variadic.
	pub max_args: Option<usize>,
}

impl BuiltinFunction {
	#[must_use]
	pub fn find(name: &str) -> Option<&'static Self> {
		BUILTIN_FUNCTIONS.iter().find(|func| func.name == name)
	}
}

#[must_use]
pub fn is_builtin_instance_variable(name: &str) -> bool {
	BUILTIN_INSTANCE_VARIABLES.contains(&name)
}

#[must_use]
pub fn is_builtin_global(name: &str) -> bool {
	BUILTIN_GLOBALS.contains(&name)
}

include!(concat!(env!("OUT_DIR"), "/builtins.rs"));
