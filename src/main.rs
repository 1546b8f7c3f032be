//! # GML-LS
//!
//! A language server for GameMaker Language.

use gml_ls::{
	server::{self, ServerOptions},
	setup, UnitResult,
};
use lsp_types::InitializeParams;
use tracing::info;

fn main() -> UnitResult {
	setup::logging();

	info!("Initializing...");
	let (conn, threads) = lsp_server::Connection::stdio();
	let params = conn.initialize(serde_json::to_value(setup::capabilities())?)?;
	let params = serde_json::from_value::<InitializeParams>(params)?;

	if let Some(info) = params.client_info.as_ref() {
		info!("Client: {} {}", info.name, info.version.as_deref().unwrap_or(""));
	}

	server::run(conn, ServerOptions::from_init(&params))?;
	threads.join()?;
	Ok(())
}
