//! The LSP front: message loop, notification handlers, and the glue between
//! the client and [`Sessions`].
//!
//! Analysis and the workspace scan run on the rayon pool. Their results come
//! back to the main loop over an internal channel, which is the only place
//! diagnostics are published from.

use std::{ops::ControlFlow, path::PathBuf, sync::Arc};

use crossbeam_channel::{Receiver, Sender};
use lsp_server::{
	Connection, ErrorCode, ExtractError, Message, Notification, Request, RequestId, Response,
	ResponseError,
};
use lsp_types::{
	notification::{
		DidChangeConfiguration, DidChangeTextDocument, DidCloseTextDocument, DidOpenTextDocument,
	},
	request::{ExecuteCommand, WorkspaceConfiguration},
	ConfigurationItem, ConfigurationParams, InitializeParams, MessageType, Url,
};
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::{
	config::{self, Settings, SettingsEffect},
	pipeline::Pipeline,
	session::{Analysis, OpenEvent, Outcome, Sessions},
	setup, util,
	workspace::{self, ScanReport, UnitInfo},
	Error, UnitResult,
};

#[derive(Debug, Default, Clone)]
pub struct ServerOptions {
	/// Without a root there is nothing to scan; the server is ready at once.
	pub root: Option<PathBuf>,
}

impl ServerOptions {
	#[must_use]
	pub fn from_init(params: &InitializeParams) -> Self {
		#[allow(deprecated)]
		let root_uri = params
			.workspace_folders
			.as_ref()
			.and_then(|folders| folders.first())
			.map(|folder| &folder.uri)
			.or(params.root_uri.as_ref());

		Self {
			root: root_uri.and_then(|uri| util::uri_to_pathbuf(uri).ok()),
		}
	}
}

/// Runs until the client asks for shutdown.
pub fn run(conn: Connection, options: ServerOptions) -> UnitResult {
	let mut core = Core::new(options);

	core.comms.send(
		&conn,
		<WorkspaceConfiguration as lsp_types::request::Request>::METHOD,
		config_params(),
		|core, conn, resp| core.on_settings(conn, resp, false),
	)?;

	core.start_index();
	core.main_loop(&conn)?;
	info!("Shutdown complete.");
	Ok(())
}

/// Messages from pool threads back to the main loop.
#[derive(Debug)]
enum Internal {
	Analyzed(Analysis),
	IndexComplete {
		report: ScanReport,
		replayed: Vec<Analysis>,
	},
}

pub(crate) struct Core {
	sessions: Arc<Sessions>,
	settings: Settings,
	comms: CommSystem,
	root: Option<PathBuf>,
	/// Normalized URI to the spelling the client last opened it with.
	client_uris: FxHashMap<Url, Url>,
	scanning: bool,
	internal_tx: Sender<Internal>,
	internal_rx: Receiver<Internal>,
}

impl Core {
	#[must_use]
	fn new(options: ServerOptions) -> Self {
		let (internal_tx, internal_rx) = crossbeam_channel::unbounded();

		Self {
			sessions: Arc::new(Sessions::new(Arc::new(Pipeline::default()))),
			settings: Settings::default(),
			comms: CommSystem::default(),
			root: options.root,
			client_uris: FxHashMap::default(),
			scanning: false,
			internal_tx,
			internal_rx,
		}
	}

	fn main_loop(&mut self, conn: &Connection) -> UnitResult {
		let internal = self.internal_rx.clone();

		loop {
			crossbeam_channel::select! {
				recv(conn.receiver) -> msg => {
					let Ok(msg) = msg else {
						return Ok(());
					};

					if self.handle_message(conn, msg)? {
						return Ok(());
					}
				}
				recv(internal) -> msg => {
					let Ok(msg) = msg else {
						continue;
					};

					self.handle_internal(conn, msg)?;
				}
			}
		}
	}

	/// Returns `true` if the server should stop.
	fn handle_message(&mut self, conn: &Connection, msg: Message) -> Result<bool, Error> {
		let result = match msg {
			Message::Request(req) => {
				if conn.handle_shutdown(&req)? {
					info!("Server shutting down...");
					return Ok(true);
				}

				match self.handle_request(conn, req) {
					ControlFlow::Break(result) => result,
					ControlFlow::Continue(req) => respond_err(
						conn,
						req.id,
						ErrorCode::MethodNotFound,
						format!("unsupported request: {}", req.method),
					),
				}
			}
			Message::Response(resp) => match self.comms.on_receive(&resp) {
				Some(callback) => callback(self, conn, resp),
				None => {
					warn!("Response to an unknown request: {:?}", resp.id);
					Ok(())
				}
			},
			Message::Notification(notif) => match self.handle_notif(conn, notif) {
				ControlFlow::Break(result) => result,
				ControlFlow::Continue(_) => Ok(()),
			},
		};

		match result {
			Err(err @ Error::Send(_)) => Err(err),
			Err(err) => {
				error!("{err}");
				Ok(false)
			}
			Ok(()) => Ok(false),
		}
	}

	fn handle_request(
		&mut self,
		conn: &Connection,
		req: Request,
	) -> ControlFlow<UnitResult, Request> {
		try_request::<ExecuteCommand, _>(req, |id, params| {
			if params.command != setup::CMD_FORCE_REINDEX {
				return respond_err(
					conn,
					id,
					ErrorCode::InvalidParams,
					format!("unknown command: {}", params.command),
				);
			}

			if self.scanning {
				conn.sender.send(Message::Notification(util::message_notif(
					MessageType::INFO,
					"Indexing is already in progress.",
				)?))?;

				return respond_null(conn, id);
			}

			conn.sender.send(Message::Notification(util::message_notif(
				MessageType::WARNING,
				"Reindexing...",
			)?))?;

			self.sessions.force_reindex();
			self.start_index();
			respond_null(conn, id)
		})
	}

	fn handle_notif(
		&mut self,
		conn: &Connection,
		mut notif: Notification,
	) -> ControlFlow<UnitResult, Notification> {
		notif = try_notif::<DidOpenTextDocument, _>(notif, |params| {
			let doc = params.text_document;
			let uri = util::normalize_uri(&doc.uri);
			self.client_uris.insert(uri.clone(), doc.uri);

			let info = match util::uri_to_pathbuf(&uri) {
				Ok(path)
					if self
						.root
						.as_deref()
						.map_or(true, |root| util::path_is_child_of(&path, root)) =>
				{
					workspace::classify(&path)
				}
				_ => UnitInfo::other(),
			};

			let outcome = self.sessions.open(OpenEvent {
				uri: uri.clone(),
				info,
				text: doc.text,
				version: doc.version,
			});

			if outcome == Outcome::Pending {
				self.spawn_analysis(uri);
			}

			Ok(())
		})?;

		notif = try_notif::<DidChangeTextDocument, _>(notif, |params| {
			let doc = params.text_document;
			let uri = util::normalize_uri(&doc.uri);

			let outcome = self
				.sessions
				.change(&uri, doc.version, params.content_changes);

			if outcome == Outcome::Pending {
				self.spawn_analysis(uri);
			}

			Ok(())
		})?;

		notif = try_notif::<DidCloseTextDocument, _>(notif, |params| {
			let uri = params.text_document.uri;
			let normalized = util::normalize_uri(&uri);
			self.sessions.close(&normalized);
			self.client_uris.remove(&normalized);
			conn.sender
				.send(Message::Notification(util::publish_diags_notif(uri, vec![], None)?))?;
			Ok(())
		})?;

		notif = try_notif::<DidChangeConfiguration, _>(notif, |_| {
			// Always re-read from the `gml-tools` section; the payload itself is ignored.
			self.comms.send(
				conn,
				<WorkspaceConfiguration as lsp_types::request::Request>::METHOD,
				config_params(),
				|core, conn, resp| core.on_settings(conn, resp, true),
			)
		})?;

		ControlFlow::Continue(notif)
	}

	fn handle_internal(&mut self, conn: &Connection, msg: Internal) -> UnitResult {
		match msg {
			Internal::Analyzed(analysis) => self.publish(conn, analysis),
			Internal::IndexComplete { report, replayed } => {
				self.scanning = false;

				if report.failed > 0 {
					warn!("{} unit(s) could not be indexed.", report.failed);
				}

				for analysis in replayed {
					self.publish(conn, analysis)?;
				}

				Ok(())
			}
		}
	}

	/// Diagnostics for anything but the document's latest version are discarded.
	fn publish(&self, conn: &Connection, analysis: Analysis) -> UnitResult {
		if self.sessions.version(&analysis.uri) != Some(analysis.version) {
			debug!(
				"Discarding diagnostics for superseded version {} of {}",
				analysis.version, analysis.uri
			);
			return Ok(());
		}

		let uri = self
			.client_uris
			.get(&analysis.uri)
			.cloned()
			.unwrap_or(analysis.uri);

		conn.sender.send(Message::Notification(util::publish_diags_notif(
			uri,
			analysis.diagnostics,
			Some(analysis.version),
		)?))?;

		Ok(())
	}

	fn spawn_analysis(&self, uri: Url) {
		let sessions = self.sessions.clone();
		let sender = self.internal_tx.clone();

		rayon::spawn(move || {
			if let Outcome::Analyzed(analysis) = sessions.analyze_latest(&uri) {
				let _ = sender.send(Internal::Analyzed(analysis));
			}
		});
	}

	/// Builds the store's baseline off the main thread, then replays queued opens.
	fn start_index(&mut self) {
		let sessions = self.sessions.clone();
		let sender = self.internal_tx.clone();
		let root = self.root.clone();
		self.scanning = true;

		rayon::spawn(move || {
			let report = match root {
				Some(root) => workspace::scan(&root, sessions.pipeline()),
				None => ScanReport::default(),
			};

			let replayed = sessions.index_complete();
			let _ = sender.send(Internal::IndexComplete { report, replayed });
		});
	}

	fn on_settings(&mut self, conn: &Connection, resp: Response, is_change: bool) -> UnitResult {
		let Some(value) = resp.result else {
			return Ok(());
		};

		let items = match serde_json::from_value::<CfgReqResult>(value) {
			Ok(items) => items,
			Err(err) => {
				error!("Failed to decode user config: {err}");
				return Err(Error::from(err));
			}
		};

		if !is_change {
			return match Settings::from_response(&items) {
				Ok(settings) => {
					self.settings = settings;
					Ok(())
				}
				Err(err) => warn_user(conn, err),
			};
		}

		let Some(incoming) = items.first() else {
			return Ok(());
		};

		let changed = match self.settings.changed(incoming) {
			Ok(c) => c,
			Err(err) => return warn_user(conn, err),
		};

		let (effects, errors) = self.settings.apply(changed);

		for effect in effects {
			match effect {
				SettingsEffect::RestartAdvised => {
					conn.sender.send(Message::Notification(util::message_notif(
						MessageType::WARNING,
						"Please restart the editor for this setting to take effect.",
					)?))?;
				}
				SettingsEffect::InvalidateDocCache => {
					info!("Spelling preference changed; documentation will be regenerated.");
				}
				SettingsEffect::HoverSentences(n) => {
					debug!("Hover documentation now shows {n} sentence(s).");
				}
			}
		}

		for err in errors {
			warn_user(conn, err)?;
		}

		Ok(())
	}
}

#[must_use]
fn config_params() -> ConfigurationParams {
	ConfigurationParams {
		items: vec![ConfigurationItem {
			scope_uri: None,
			section: Some(config::SECTION.to_string()),
		}],
	}
}

/// Configuration failures are shown to the user, never propagated.
fn warn_user(conn: &Connection, err: Error) -> UnitResult {
	warn!("{err}");

	conn.sender.send(Message::Notification(util::message_notif(
		MessageType::WARNING,
		err.to_string(),
	)?))?;

	Ok(())
}

fn respond_null(conn: &Connection, id: RequestId) -> UnitResult {
	conn.sender.send(Message::Response(Response {
		id,
		result: Some(serde_json::Value::Null),
		error: None,
	}))?;

	Ok(())
}

fn respond_err(conn: &Connection, id: RequestId, code: ErrorCode, message: String) -> UnitResult {
	conn.sender.send(Message::Response(Response {
		id,
		result: None,
		error: Some(ResponseError {
			code: code as i32,
			message,
			data: None,
		}),
	}))?;

	Ok(())
}

#[must_use]
fn try_request<R, F>(req: Request, callback: F) -> ControlFlow<UnitResult, Request>
where
	R: lsp_types::request::Request,
	F: FnOnce(RequestId, R::Params) -> UnitResult,
{
	match req.extract::<R::Params>(R::METHOD) {
		Ok((id, params)) => ControlFlow::Break(callback(id, params)),
		Err(err) => extract_error(err, R::METHOD),
	}
}

#[must_use]
fn try_notif<N, F>(notif: Notification, callback: F) -> ControlFlow<UnitResult, Notification>
where
	N: lsp_types::notification::Notification,
	F: FnOnce(N::Params) -> UnitResult,
{
	match notif.extract::<N::Params>(N::METHOD) {
		Ok(params) => ControlFlow::Break(callback(params)),
		Err(err) => extract_error(err, N::METHOD),
	}
}

#[must_use]
fn extract_error<T>(err: ExtractError<T>, method: &'static str) -> ControlFlow<UnitResult, T> {
	match err {
		ExtractError::MethodMismatch(t) => ControlFlow::Continue(t),
		ExtractError::JsonError { method: _, error } => ControlFlow::Break(Err(Error::Process {
			ctx: format!("`{method}` message"),
			source: Some(Box::new(error)),
		})),
	}
}

// CommSystem //////////////////////////////////////////////////////////////////

/// Tracks requests sent to the client and what to do with their responses.
#[derive(Debug, Default)]
struct CommSystem {
	next_id: i32,
	egress: FxHashMap<RequestId, ResponseCallback>,
}

impl CommSystem {
	fn send<T: Serialize>(
		&mut self,
		conn: &Connection,
		method: &'static str,
		params: T,
		callback: ResponseCallback,
	) -> UnitResult {
		let id = RequestId::from(self.next_id);
		self.next_id = self.next_id.checked_add(1).unwrap_or(0);

		conn.sender.send(Message::Request(Request {
			id: id.clone(),
			method: method.to_string(),
			params: serde_json::to_value(params)?,
		}))?;

		let _ = self.egress.insert(id, callback);
		Ok(())
	}

	#[must_use]
	fn on_receive(&mut self, resp: &Response) -> Option<ResponseCallback> {
		self.egress.remove(&resp.id)
	}
}

type ResponseCallback = fn(&mut Core, &Connection, Response) -> UnitResult;
type CfgReqResult = <WorkspaceConfiguration as lsp_types::request::Request>::Result;

#[cfg(test)]
mod test {
	use lsp_types::{
		notification::{Exit, Notification as _, PublishDiagnostics},
		request::{Request as _, Shutdown},
		DidOpenTextDocumentParams, PublishDiagnosticsParams, TextDocumentItem,
	};
	use serde_json::json;

	use super::*;

	#[must_use]
	fn next_diagnostics(client: &Connection) -> PublishDiagnosticsParams {
		loop {
			match client.receiver.recv().unwrap() {
				Message::Notification(notif) if notif.method == PublishDiagnostics::METHOD => {
					return serde_json::from_value(notif.params).unwrap();
				}
				Message::Request(req) if req.method == WorkspaceConfiguration::METHOD => {
					client
						.sender
						.send(Message::Response(Response::new_ok(
							req.id,
							json!([{ "numberOfDocumentationSentences": 2 }]),
						)))
						.unwrap();
				}
				_ => {}
			}
		}
	}

	#[test]
	fn open_publishes_syntax_diagnostics() {
		let (server, client) = Connection::memory();
		let handle = std::thread::spawn(move || run(server, ServerOptions::default()));
		// Published back under the client's own spelling.
		let uri = Url::parse("file:///project/scripts/scr_%61/scr_a.gml").unwrap();

		client
			.sender
			.send(Message::Notification(Notification::new(
				DidOpenTextDocument::METHOD.to_string(),
				DidOpenTextDocumentParams {
					text_document: TextDocumentItem {
						uri: uri.clone(),
						language_id: "gml".to_string(),
						version: 1,
						text: "if ((".to_string(),
					},
				},
			)))
			.unwrap();

		let published = next_diagnostics(&client);
		assert_eq!(published.uri, uri);
		assert_eq!(published.version, Some(1));
		assert_eq!(published.diagnostics.len(), 1);

		client
			.sender
			.send(Message::Request(Request::new(
				RequestId::from(1000),
				Shutdown::METHOD.to_string(),
				serde_json::Value::Null,
			)))
			.unwrap();

		loop {
			if let Message::Response(resp) = client.receiver.recv().unwrap() {
				assert_eq!(resp.id, RequestId::from(1000));
				break;
			}
		}

		client
			.sender
			.send(Message::Notification(Notification::new(
				Exit::METHOD.to_string(),
				serde_json::Value::Null,
			)))
			.unwrap();

		handle.join().unwrap().unwrap();
	}
}
