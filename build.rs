use std::{
	fs::File,
	io::{BufWriter, Write},
	path::Path,
};

fn main() -> UnitResult {
	let start_time = std::time::Instant::now();
	let manifest_dir = std::env::var("CARGO_MANIFEST_DIR")?;
	let data_file = Path::new(&manifest_dir).join("data/builtins.toml");
	println!("cargo:rerun-if-changed={}", data_file.display());

	let out_dir = std::env::var("OUT_DIR")?;
	let out_file = Path::new(&out_dir).join("builtins.rs");
	let mut bw = BufWriter::new(File::create(out_file)?);

	let top_table = {
		let text = std::fs::read_to_string(&data_file)?;
		text.parse::<toml::Table>()?
	};

	write_file_start(&mut bw)?;

	write_array_start(&mut bw, "BUILTIN_FUNCTIONS", "BuiltinFunction")?;
	functions(&mut bw, table(&top_table, "functions")?)?;
	write_array_end(&mut bw)?;

	let variables = table(&top_table, "variables")?;

	write_array_start(&mut bw, "BUILTIN_INSTANCE_VARIABLES", "&str")?;
	names(&mut bw, variables, "instance")?;
	write_array_end(&mut bw)?;

	write_array_start(&mut bw, "BUILTIN_GLOBALS", "&str")?;
	names(&mut bw, variables, "global")?;
	write_array_end(&mut bw)?;

	bw.flush()?;

	eprintln!(
		"Built-in symbol tables generated in {}ms.",
		start_time.elapsed().as_millis()
	);

	Ok(())
}

fn functions(bw: &mut BufWriter<File>, functions: &TomlTable) -> UnitResult {
	for (group_name, group) in table(functions, "groups")? {
		let Some(group) = group.as_array() else {
			return Err(format!("function group `{group_name}` is not an array").into());
		};

		for func in group {
			let Some(func) = func.as_table() else {
				return Err(format!("malformed entry in function group `{group_name}`").into());
			};

			let name = func
				.get("name")
				.and_then(|v| v.as_str())
				.ok_or_else(|| format!("unnamed function in group `{group_name}`"))?;
			let min = func.get("min").and_then(|v| v.as_integer()).unwrap_or(0);
			let max = func.get("max").and_then(|v| v.as_integer()).unwrap_or(min);

			let max = if max < 0 {
				"None".to_string()
			} else {
				format!("Some({max})")
			};

			writeln!(
				bw,
				"\tBuiltinFunction {{ name: \"{name}\", min_args: {min}, max_args: {max} }},"
			)?;
		}
	}

	Ok(())
}

fn names(bw: &mut BufWriter<File>, variables: &TomlTable, key: &str) -> UnitResult {
	let Some(array) = variables.get(key).and_then(|v| v.as_array()) else {
		return Err(format!("`variables.{key}` is missing or not an array").into());
	};

	for name in array.iter().filter_map(|v| v.as_str()) {
		writeln!(bw, "\t\"{name}\",")?;
	}

	Ok(())
}

// Details /////////////////////////////////////////////////////////////////////

type UnitResult = Result<(), Box<dyn std::error::Error>>;
type TomlTable = toml::map::Map<String, toml::Value>;

fn table<'t>(parent: &'t TomlTable, key: &str) -> Result<&'t TomlTable, Box<dyn std::error::Error>> {
	parent
		.get(key)
		.and_then(|v| v.as_table())
		.ok_or_else(|| format!("`{key}` is missing or not a table").into())
}

fn write_array_start(
	bw: &mut BufWriter<File>,
	name: &'static str,
	elem_t: &'static str,
) -> UnitResult {
	writeln!(bw, "\npub(crate) const {name}: &[{elem_t}] = &[")?;
	Ok(())
}

fn write_array_end(bw: &mut BufWriter<File>) -> UnitResult {
	writeln!(bw, "];")?;
	Ok(())
}

fn write_file_start(bw: &mut BufWriter<File>) -> UnitResult {
	writeln!(bw, r"// This file is auto-generated by a build script.")?;
	Ok(())
}
