//! The document session controller.
//!
//! Each URI moves through `Unopened → Open → (Changed)* → Closed`. Until the
//! workspace's baseline index is complete, opens wait in a pending queue and
//! changes are dropped; [`Sessions::index_complete`] is the only place the
//! queue is replayed.
//!
//! Runs for one URI are serialized by that URI's run lock, which outlives
//! close and reopen. Runs for different URIs may proceed in parallel.

use std::{collections::VecDeque, sync::Arc};

use lsp_types::{Diagnostic, TextDocumentContentChangeEvent, Url};
use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info, warn};

use crate::{
	lines,
	passes::Passes,
	pipeline::{syntax::SigToken, Pipeline},
	workspace::UnitInfo,
};

/// Opens beyond this many are not held; the oldest is discarded first.
pub const MAX_PENDING: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenEvent {
	pub uri: Url,
	pub info: UnitInfo,
	pub text: String,
	pub version: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
	pub uri: Url,
	/// The client's version of the text which was analyzed.
	pub version: i32,
	pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
	/// Held until indexing completes.
	Queued,
	/// Ignored; see [`Sessions::change`].
	Dropped,
	/// Accepted. [`Sessions::analyze_latest`] must be called for the URI.
	Pending,
	/// Another run already analyzed the latest text.
	UpToDate,
	Analyzed(Analysis),
}

#[derive(Debug)]
enum Readiness {
	Indexing {
		pending: VecDeque<OpenEvent>,
		/// Queued URIs which had a change dropped since they were queued.
		desynced: FxHashSet<Url>,
	},
	Ready,
}

impl Readiness {
	#[must_use]
	fn indexing(pending: VecDeque<OpenEvent>) -> Self {
		Self::Indexing {
			pending,
			desynced: FxHashSet::default(),
		}
	}
}

#[derive(Debug)]
struct Session {
	latest: Mutex<Latest>,
	run: Mutex<RunState>,
}

#[derive(Debug)]
struct Latest {
	info: UnitInfo,
	text: String,
	version: i32,
	/// Bumped on every open and change; the client's version can repeat across reopens.
	revision: u64,
	open: bool,
	/// `false` after a change was dropped; ranged changes cannot be applied
	/// until a full-text change arrives.
	in_sync: bool,
}

#[derive(Debug, Default)]
struct RunState {
	analyzed: Option<u64>,
	sig_tokens: Vec<SigToken>,
}

#[derive(Debug)]
pub struct Sessions {
	pipeline: Arc<Pipeline>,
	state: Mutex<Readiness>,
	sessions: RwLock<FxHashMap<Url, Arc<Session>>>,
}

impl Sessions {
	/// Starts out indexing.
	#[must_use]
	pub fn new(pipeline: Arc<Pipeline>) -> Self {
		Self {
			pipeline,
			state: Mutex::new(Readiness::indexing(VecDeque::new())),
			sessions: RwLock::new(FxHashMap::default()),
		}
	}

	#[must_use]
	pub fn pipeline(&self) -> &Arc<Pipeline> {
		&self.pipeline
	}

	#[must_use]
	pub fn is_ready(&self) -> bool {
		matches!(*self.state.lock(), Readiness::Ready)
	}

	/// Returns [`Outcome::Queued`] while indexing, otherwise [`Outcome::Pending`].
	/// A newer open of the same URI replaces a queued one.
	pub fn open(&self, event: OpenEvent) -> Outcome {
		let mut state = self.state.lock();

		if let Readiness::Indexing { pending, desynced } = &mut *state {
			pending.retain(|e| e.uri != event.uri);
			desynced.remove(&event.uri);

			if pending.len() >= MAX_PENDING {
				if let Some(discarded) = pending.pop_front() {
					warn!("Too many documents opened during indexing; forgetting {}", discarded.uri);
					desynced.remove(&discarded.uri);
				}
			}

			debug!("Queued until indexing completes: {}", event.uri);
			pending.push_back(event);
			return Outcome::Queued;
		}

		drop(state);
		self.register(event, true);
		Outcome::Pending
	}

	/// Changes arriving before indexing completes, or for documents not
	/// open, are dropped rather than queued. Once a change to a queued
	/// document is dropped, its ranged changes are dropped too until one
	/// carrying the full text arrives.
	pub fn change(
		&self,
		uri: &Url,
		version: i32,
		changes: Vec<TextDocumentContentChangeEvent>,
	) -> Outcome {
		if let Readiness::Indexing { pending, desynced } = &mut *self.state.lock() {
			debug!("Dropping change to {uri} received during indexing.");

			if pending.iter().any(|e| e.uri == *uri) {
				desynced.insert(uri.clone());
			}

			return Outcome::Dropped;
		}

		let Some(session) = self.sessions.read().get(uri).cloned() else {
			return Outcome::Dropped;
		};

		let mut latest = session.latest.lock();

		if !latest.open {
			return Outcome::Dropped;
		}

		if !latest.in_sync && changes.iter().all(|c| c.range.is_some()) {
			debug!("Dropping ranged change to {uri}; its text is awaiting a full update.");
			return Outcome::Dropped;
		}

		lines::splice_changes(&mut latest.text, changes);
		latest.version = version;
		latest.revision += 1;
		latest.in_sync = true;
		Outcome::Pending
	}

	/// Ends the session. The URI's symbols stay in the store; the file
	/// still exists in the workspace.
	pub fn close(&self, uri: &Url) {
		if let Readiness::Indexing { pending, desynced } = &mut *self.state.lock() {
			pending.retain(|e| e.uri != *uri);
			desynced.remove(uri);
		}

		if let Some(session) = self.sessions.read().get(uri) {
			let mut latest = session.latest.lock();
			latest.open = false;
			latest.text = String::new();
		}
	}

	/// Runs the full pipeline over the URI's latest text, unless that text
	/// was already analyzed. Blocks while another run for the URI is in flight.
	pub fn analyze_latest(&self, uri: &Url) -> Outcome {
		let Some(session) = self.sessions.read().get(uri).cloned() else {
			return Outcome::Dropped;
		};

		let mut run = session.run.lock();

		let (info, text, version, revision) = {
			let latest = session.latest.lock();

			if !latest.open {
				return Outcome::Dropped;
			}

			(
				latest.info.clone(),
				latest.text.clone(),
				latest.version,
				latest.revision,
			)
		};

		if run.analyzed == Some(revision) {
			return Outcome::UpToDate;
		}

		let (unit, diagnostics) = self.pipeline.run(uri.clone(), info, text, Passes::ALL);
		run.analyzed = Some(revision);
		run.sig_tokens = unit.sig_tokens;

		Outcome::Analyzed(Analysis {
			uri: uri.clone(),
			version,
			diagnostics,
		})
	}

	/// Leaves the indexing state and returns the queued URIs in arrival order,
	/// each now registered and awaiting [`Self::analyze_latest`].
	pub fn mark_ready(&self) -> Vec<Url> {
		let (pending, desynced) = {
			let mut state = self.state.lock();

			match std::mem::replace(&mut *state, Readiness::Ready) {
				Readiness::Indexing { pending, desynced } => (pending, desynced),
				Readiness::Ready => (VecDeque::new(), FxHashSet::default()),
			}
		};

		info!("Indexing complete; replaying {} open(s).", pending.len());

		pending
			.into_iter()
			.map(|event| {
				let uri = event.uri.clone();
				let in_sync = !desynced.contains(&uri);
				self.register(event, in_sync);
				uri
			})
			.collect()
	}

	/// [`Self::mark_ready`], then analyzes every replayed document in order.
	pub fn index_complete(&self) -> Vec<Analysis> {
		self.mark_ready()
			.into_iter()
			.filter_map(|uri| match self.analyze_latest(&uri) {
				Outcome::Analyzed(analysis) => Some(analysis),
				_ => None,
			})
			.collect()
	}

	/// Empties the store and returns to indexing. Documents which were open
	/// are queued again with their latest text. Blocks until every run in
	/// flight has finished.
	pub fn force_reindex(&self) {
		let mut state = self.state.lock();
		let sessions = self.sessions.read();
		let mut pending = VecDeque::new();

		// Held until the store is cleared, so no run interleaves with the rescan.
		let _runs = sessions
			.values()
			.map(|session| session.run.lock())
			.collect::<Vec<_>>();

		for (uri, session) in sessions.iter() {
			let mut latest = session.latest.lock();

			if !latest.open {
				continue;
			}

			latest.open = false;

			pending.push_back(OpenEvent {
				uri: uri.clone(),
				info: latest.info.clone(),
				text: std::mem::take(&mut latest.text),
				version: latest.version,
			});
		}

		self.pipeline.store().clear_all();
		*state = Readiness::indexing(pending);
	}

	/// Call sites in the last analyzed text of `uri`.
	#[must_use]
	pub fn signature_tokens(&self, uri: &Url) -> Vec<SigToken> {
		let Some(session) = self.sessions.read().get(uri).cloned() else {
			return vec![];
		};

		let run = session.run.lock();
		run.sig_tokens.clone()
	}

	/// `None` unless the document is open.
	#[must_use]
	pub fn version(&self, uri: &Url) -> Option<i32> {
		let sessions = self.sessions.read();
		let latest = sessions.get(uri)?.latest.lock();
		latest.open.then_some(latest.version)
	}

	fn register(&self, event: OpenEvent, in_sync: bool) {
		let mut sessions = self.sessions.write();

		let session = sessions.entry(event.uri).or_insert_with(|| {
			Arc::new(Session {
				latest: Mutex::new(Latest {
					info: event.info.clone(),
					text: String::new(),
					version: 0,
					revision: 0,
					open: false,
					in_sync: true,
				}),
				run: Mutex::new(RunState::default()),
			})
		});

		let mut latest = session.latest.lock();
		latest.info = event.info;
		latest.text = event.text;
		latest.version = event.version;
		latest.revision += 1;
		latest.open = true;
		latest.in_sync = in_sync;
	}
}

#[cfg(test)]
mod test {
	use lsp_types::{Position, Range};

	use super::*;
	use crate::workspace::DocKind;

	#[must_use]
	fn open_event(uri: &Url, text: &str) -> OpenEvent {
		OpenEvent {
			uri: uri.clone(),
			info: UnitInfo {
				kind: DocKind::Script,
				resource: Some("scr_a".to_string()),
			},
			text: text.to_string(),
			version: 1,
		}
	}

	#[test]
	fn opens_queue_and_changes_drop_while_indexing() {
		let sessions = Sessions::new(Arc::new(Pipeline::default()));
		let uri = Url::parse("file:///project/scripts/scr_a/scr_a.gml").unwrap();

		assert_eq!(sessions.open(open_event(&uri, "var a = 1;")), Outcome::Queued);
		assert_eq!(sessions.change(&uri, 2, vec![]), Outcome::Dropped);
		assert_eq!(sessions.version(&uri), None);

		let replayed = sessions.index_complete();
		assert_eq!(replayed.len(), 1);
		assert_eq!(replayed[0].uri, uri);
		assert_eq!(sessions.version(&uri), Some(1));
	}

	#[test]
	fn queue_is_deduplicated_and_ordered() {
		let sessions = Sessions::new(Arc::new(Pipeline::default()));
		let a = Url::parse("file:///project/scripts/scr_a/scr_a.gml").unwrap();
		let b = Url::parse("file:///project/scripts/scr_b/scr_b.gml").unwrap();

		let _ = sessions.open(open_event(&a, "var a = 1;"));
		let _ = sessions.open(open_event(&b, "var b = 1;"));
		let _ = sessions.open(open_event(&a, "var a = 2;"));

		assert_eq!(sessions.mark_ready(), [b, a]);
	}

	#[test]
	fn latest_revision_is_analyzed_once() {
		let sessions = Sessions::new(Arc::new(Pipeline::default()));
		let uri = Url::parse("file:///project/scripts/scr_a/scr_a.gml").unwrap();
		let _ = sessions.mark_ready();

		assert_eq!(sessions.open(open_event(&uri, "var a = 1;")), Outcome::Pending);
		assert!(matches!(sessions.analyze_latest(&uri), Outcome::Analyzed(_)));
		assert_eq!(sessions.analyze_latest(&uri), Outcome::UpToDate);

		let change = TextDocumentContentChangeEvent {
			range: Some(Range::new(Position::new(0, 4), Position::new(0, 5))),
			range_length: None,
			text: "b".to_string(),
		};

		assert_eq!(sessions.change(&uri, 2, vec![change]), Outcome::Pending);

		let Outcome::Analyzed(analysis) = sessions.analyze_latest(&uri) else {
			panic!("expected a fresh analysis");
		};

		assert_eq!(analysis.version, 2);
		assert_eq!(
			sessions
				.pipeline()
				.store()
				.attributed_names(&uri, crate::store::Category::LocalVariable)
				.into_iter()
				.collect::<Vec<_>>(),
			["b"]
		);
	}

	#[test]
	fn close_keeps_symbols() {
		let sessions = Sessions::new(Arc::new(Pipeline::default()));
		let uri = Url::parse("file:///project/scripts/scr_a/scr_a.gml").unwrap();
		let _ = sessions.mark_ready();
		let _ = sessions.open(open_event(&uri, "var a = 1;"));
		let _ = sessions.analyze_latest(&uri);

		sessions.close(&uri);
		assert_eq!(sessions.analyze_latest(&uri), Outcome::Dropped);
		assert_eq!(sessions.change(&uri, 3, vec![]), Outcome::Dropped);
		assert!(!sessions.pipeline().store().is_empty());
	}

	#[test]
	fn force_reindex_requeues_open_documents() {
		let sessions = Sessions::new(Arc::new(Pipeline::default()));
		let uri = Url::parse("file:///project/scripts/scr_a/scr_a.gml").unwrap();
		let _ = sessions.mark_ready();
		let _ = sessions.open(open_event(&uri, "var a = 1;"));
		let _ = sessions.analyze_latest(&uri);

		sessions.force_reindex();
		assert!(!sessions.is_ready());
		assert!(sessions.pipeline().store().is_empty());
		assert_eq!(sessions.version(&uri), None);

		let replayed = sessions.index_complete();
		assert_eq!(replayed.len(), 1);
		assert!(!sessions.pipeline().store().is_empty());
	}

	#[must_use]
	fn full_text(text: &str) -> TextDocumentContentChangeEvent {
		TextDocumentContentChangeEvent {
			range: None,
			range_length: None,
			text: text.to_string(),
		}
	}

	#[must_use]
	fn locals(sessions: &Sessions, uri: &Url) -> Vec<String> {
		let mut ret = sessions
			.pipeline()
			.store()
			.attributed_names(uri, crate::store::Category::LocalVariable)
			.into_iter()
			.collect::<Vec<_>>();

		ret.sort_unstable();
		ret
	}

	#[test]
	fn dropped_change_waits_for_full_text() {
		let sessions = Sessions::new(Arc::new(Pipeline::default()));
		let uri = Url::parse("file:///project/scripts/scr_a/scr_a.gml").unwrap();

		let _ = sessions.open(open_event(&uri, "var a = 1;"));

		let lost = TextDocumentContentChangeEvent {
			range: Some(Range::new(Position::new(0, 10), Position::new(0, 10))),
			range_length: None,
			text: "\nvar b = 2;".to_string(),
		};

		assert_eq!(sessions.change(&uri, 2, vec![lost]), Outcome::Dropped);
		let _ = sessions.index_complete();

		// Renaming `b` to `c` only makes sense against text the server never saw.
		let rename = TextDocumentContentChangeEvent {
			range: Some(Range::new(Position::new(1, 4), Position::new(1, 5))),
			range_length: None,
			text: "c".to_string(),
		};

		assert_eq!(sessions.change(&uri, 3, vec![rename]), Outcome::Dropped);
		assert_eq!(sessions.version(&uri), Some(1));

		let healed = full_text("var a = 1;\nvar c = 2;");
		assert_eq!(sessions.change(&uri, 4, vec![healed]), Outcome::Pending);
		assert!(matches!(sessions.analyze_latest(&uri), Outcome::Analyzed(_)));
		assert_eq!(locals(&sessions, &uri), ["a", "c"]);

		let ranged = TextDocumentContentChangeEvent {
			range: Some(Range::new(Position::new(1, 4), Position::new(1, 5))),
			range_length: None,
			text: "d".to_string(),
		};

		assert_eq!(sessions.change(&uri, 5, vec![ranged]), Outcome::Pending);
		assert!(matches!(sessions.analyze_latest(&uri), Outcome::Analyzed(_)));
		assert_eq!(locals(&sessions, &uri), ["a", "d"]);
	}

	#[test]
	fn reopen_during_indexing_resyncs() {
		let sessions = Sessions::new(Arc::new(Pipeline::default()));
		let uri = Url::parse("file:///project/scripts/scr_a/scr_a.gml").unwrap();

		let _ = sessions.open(open_event(&uri, "var a = 1;"));
		assert_eq!(sessions.change(&uri, 2, vec![]), Outcome::Dropped);
		sessions.close(&uri);
		let _ = sessions.open(open_event(&uri, "var a = 1;"));
		let _ = sessions.index_complete();

		let ranged = TextDocumentContentChangeEvent {
			range: Some(Range::new(Position::new(0, 4), Position::new(0, 5))),
			range_length: None,
			text: "b".to_string(),
		};

		assert_eq!(sessions.change(&uri, 2, vec![ranged]), Outcome::Pending);
	}

	#[test]
	fn force_reindex_waits_for_runs_in_flight() {
		let sessions = Arc::new(Sessions::new(Arc::new(Pipeline::default())));
		let uri = Url::parse("file:///project/scripts/scr_a/scr_a.gml").unwrap();
		let _ = sessions.mark_ready();
		let _ = sessions.open(open_event(&uri, "var a = 1;"));
		let _ = sessions.analyze_latest(&uri);

		let session = sessions.sessions.read().get(&uri).cloned().unwrap();
		let run = session.run.lock();

		let reindex = {
			let sessions = sessions.clone();
			std::thread::spawn(move || sessions.force_reindex())
		};

		std::thread::sleep(std::time::Duration::from_millis(50));
		assert!(!reindex.is_finished());
		assert!(!sessions.pipeline().store().is_empty());

		drop(run);
		reindex.join().unwrap();
		assert!(sessions.pipeline().store().is_empty());
	}

	#[test]
	fn signature_tokens_do_not_block_opens() {
		let sessions = Arc::new(Sessions::new(Arc::new(Pipeline::default())));
		let a = Url::parse("file:///project/scripts/scr_a/scr_a.gml").unwrap();
		let b = Url::parse("file:///project/scripts/scr_b/scr_b.gml").unwrap();
		let _ = sessions.mark_ready();
		let _ = sessions.open(open_event(&a, "show_debug_message(1);"));
		let _ = sessions.analyze_latest(&a);

		let session = sessions.sessions.read().get(&a).cloned().unwrap();
		let run = session.run.lock();

		let reader = {
			let sessions = sessions.clone();
			let a = a.clone();
			std::thread::spawn(move || sessions.signature_tokens(&a))
		};

		std::thread::sleep(std::time::Duration::from_millis(50));
		assert_eq!(sessions.open(open_event(&b, "var b = 1;")), Outcome::Pending);

		drop(run);
		assert_eq!(reader.join().unwrap().len(), 1);
	}
}
