use std::path::PathBuf;

use crossbeam_channel::SendError;
use lsp_server::{Message, ProtocolError};

use crate::{passes::Pass, ErrorBox};

#[derive(Debug)]
pub enum Error {
	/// Failures to send messages over the LSP connection are given a separate
	/// variant to tell top-level code not to use the channel to report the error.
	Send(SendError<Message>),
	Process {
		source: Option<ErrorBox>,
		ctx: String,
	},
	/// A semantic pass rejected a tree which the grammar accepted.
	/// Never propagated past the semantics orchestrator.
	Pass {
		pass: Pass,
		reason: String,
	},
	/// A settings payload could not be applied. Shown to the user as a warning.
	Config {
		key: String,
		reason: String,
	},
	Manifest {
		path: PathBuf,
		source: serde_json::Error,
	},
}

impl Error {
	#[must_use]
	pub(crate) fn pass(pass: Pass, reason: impl Into<String>) -> Self {
		Self::Pass {
			pass,
			reason: reason.into(),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Self::Send(err) => Some(err),
			Self::Process {
				source: Some(s), ..
			} => Some(s.as_ref()),
			Self::Manifest { source, .. } => Some(source),
			_ => None,
		}
	}
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Send(err) => write!(f, "failed to send a message: {err}"),
			Self::Process { source, ctx } => match source {
				Some(s) => {
					write!(f, "{ctx}: {s}")
				}
				None => {
					write!(f, "{ctx}")
				}
			},
			Self::Pass { pass, reason } => {
				write!(f, "{} pass failed: {reason}", pass.name())
			}
			Self::Config { key, reason } => {
				write!(f, "invalid value for setting `{key}`: {reason}")
			}
			Self::Manifest { path, source } => {
				write!(f, "malformed object manifest `{}`: {source}", path.display())
			}
		}
	}
}

impl From<SendError<Message>> for Error {
	fn from(value: SendError<Message>) -> Self {
		Self::Send(value)
	}
}

impl From<ProtocolError> for Error {
	fn from(value: ProtocolError) -> Self {
		Self::Process {
			source: Some(Box::new(value)),
			ctx: "Language Server Protocol error".to_string(),
		}
	}
}

impl From<std::io::Error> for Error {
	fn from(value: std::io::Error) -> Self {
		Self::Process {
			source: Some(Box::new(value)),
			ctx: "file I/O failure".to_string(),
		}
	}
}

impl From<serde_json::Error> for Error {
	fn from(value: serde_json::Error) -> Self {
		Self::Process {
			source: Some(Box::new(value)),
			ctx: "JSON (de)serialization failure".to_string(),
		}
	}
}
