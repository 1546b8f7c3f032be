use std::path::{Path, PathBuf};

use lsp_server::Notification;
use lsp_types::{
	notification::{PublishDiagnostics, ShowMessage},
	Diagnostic, DiagnosticRelatedInformation, DiagnosticSeverity, Location, MessageType,
	PublishDiagnosticsParams, ShowMessageParams, Url,
};

use crate::Error;

/// Tagged onto every diagnostic not produced by the grammar.
pub const DIAG_SOURCE: &str = "gml-ls";

pub(crate) fn uri_to_pathbuf(uri: &Url) -> Result<PathBuf, Error> {
	if uri.scheme() != "file" {
		return Err(Error::Process {
			source: None,
			ctx: format!("non-file URI provided: {uri}"),
		});
	}

	uri.to_file_path().map_err(|()| Error::Process {
		source: None,
		ctx: format!("no host attached to file URI: {uri}"),
	})
}

pub(crate) fn path_to_uri(path: impl AsRef<Path>) -> Result<Url, Error> {
	let path = path.as_ref();

	Url::from_file_path(path).map_err(|()| Error::Process {
		source: None,
		ctx: format!("failed to form a file URI from path: {}", path.display()),
	})
}

/// Re-spells a file URI the way [`path_to_uri`] would, so that the client's
/// spelling and the workspace scan's key a document identically.
/// Anything which is not a local file path comes back unchanged.
#[must_use]
pub(crate) fn normalize_uri(uri: &Url) -> Url {
	uri_to_pathbuf(uri)
		.and_then(path_to_uri)
		.unwrap_or_else(|_| uri.clone())
}

/// Results are only valid for absolute paths; will always return `false` if
/// either is relative. A path can not be a child of itself.
#[must_use]
pub(crate) fn path_is_child_of(longer: &Path, shorter: &Path) -> bool {
	if longer.is_relative() | shorter.is_relative() {
		return false;
	}

	longer != shorter && longer.starts_with(shorter)
}

/// Builder over [`Diagnostic`] so that passes need not spell out every field.
#[derive(Debug)]
#[must_use]
pub(crate) struct DiagBuilder(Diagnostic);

impl DiagBuilder {
	pub(crate) fn new(
		range: lsp_types::Range,
		severity: DiagnosticSeverity,
		message: impl Into<String>,
	) -> Self {
		Self(Diagnostic {
			range,
			severity: Some(severity),
			code: None,
			code_description: None,
			source: Some(DIAG_SOURCE.to_string()),
			message: message.into(),
			related_information: None,
			tags: None,
			data: None,
		})
	}

	pub(crate) fn source(mut self, source: &str) -> Self {
		self.0.source = Some(source.to_string());
		self
	}

	pub(crate) fn related(mut self, location: Location, message: impl Into<String>) -> Self {
		self.0
			.related_information
			.get_or_insert_with(Vec::new)
			.push(DiagnosticRelatedInformation {
				location,
				message: message.into(),
			});

		self
	}

	#[must_use]
	pub(crate) fn build(self) -> Diagnostic {
		self.0
	}
}

pub(crate) fn publish_diags_notif(
	uri: Url,
	diagnostics: Vec<Diagnostic>,
	version: Option<i32>,
) -> Result<Notification, Error> {
	Ok(Notification {
		method: <PublishDiagnostics as lsp_types::notification::Notification>::METHOD.to_string(),
		params: serde_json::to_value(PublishDiagnosticsParams {
			uri,
			diagnostics,
			version,
		})?,
	})
}

pub(crate) fn message_notif(
	typ: MessageType,
	message: impl Into<String>,
) -> Result<Notification, Error> {
	Ok(Notification {
		method: <ShowMessage as lsp_types::notification::Notification>::METHOD.to_string(),
		params: serde_json::to_value(ShowMessageParams {
			typ,
			message: message.into(),
		})?,
	})
}
