use lsp_types::{
	ExecuteCommandOptions, ServerCapabilities, TextDocumentSyncCapability, TextDocumentSyncKind,
	TextDocumentSyncOptions, WorkDoneProgressOptions,
};
use tracing_subscriber::{
	fmt::writer::BoxMakeWriter, prelude::__tracing_subscriber_SubscriberExt,
	util::SubscriberInitExt,
};

/// The one command the client can invoke.
pub const CMD_FORCE_REINDEX: &str = "gml-tools.forceReIndex";

/// Safe to call more than once; only the first call installs a subscriber.
pub fn logging() {
	/// Like [`tracing_subscriber::fmt::time::Uptime`] but with
	/// hour/minute/second formatting for better clarity.
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	struct Uptime(std::time::Instant);

	impl Default for Uptime {
		fn default() -> Self {
			Self(std::time::Instant::now())
		}
	}

	impl tracing_subscriber::fmt::time::FormatTime for Uptime {
		fn format_time(
			&self,
			w: &mut tracing_subscriber::fmt::format::Writer<'_>,
		) -> std::fmt::Result {
			let elapsed = self.0.elapsed();
			let secs = elapsed.as_secs() % 60;
			let mins = (elapsed.as_secs() / 60) % 60;
			let hours = elapsed.as_secs() / 3600;
			write!(w, "{hours:02}:{mins:02}:{secs:02}")
		}
	}

	let layer_stderr = tracing_subscriber::fmt::Layer::default()
		.with_timer(Uptime::default())
		.with_ansi(false)
		.with_writer(BoxMakeWriter::new(std::io::stderr));

	if tracing_subscriber::registry()
		.with(layer_stderr)
		.try_init()
		.is_err()
	{
		eprintln!("A log subscriber is already installed.");
	}
}

#[must_use]
pub fn capabilities() -> ServerCapabilities {
	ServerCapabilities {
		text_document_sync: Some(TextDocumentSyncCapability::Options(
			TextDocumentSyncOptions {
				open_close: Some(true),
				change: Some(TextDocumentSyncKind::FULL),
				will_save: None,
				will_save_wait_until: None,
				save: None,
			},
		)),
		execute_command_provider: Some(ExecuteCommandOptions {
			commands: vec![CMD_FORCE_REINDEX.to_string()],
			work_done_progress_options: WorkDoneProgressOptions::default(),
		}),
		..Default::default()
	}
}

#[cfg(test)]
mod test {
	use super::*;

	/// Changes dropped while indexing must heal with the next one.
	#[test]
	fn sync_sends_full_text() {
		let Some(TextDocumentSyncCapability::Options(sync)) = capabilities().text_document_sync
		else {
			panic!("expected text document sync options");
		};

		assert_eq!(sync.change, Some(TextDocumentSyncKind::FULL));
	}
}
