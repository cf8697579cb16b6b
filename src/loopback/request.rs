// crates.io
use url::form_urlencoded;
// self
use crate::_prelude::*;

/// Upper bound on the request head read from the browser.
pub(crate) const MAX_HEAD_LEN: usize = 8 * 1024;

/// Query parameters carried by the single redirect the listener accepts.
///
/// Empty values are treated as absent. When a parameter repeats, the first occurrence wins.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CallbackResult {
	/// Authorization code issued by the provider.
	pub code: Option<String>,
	/// `state` echoed back by the provider.
	pub state: Option<String>,
	/// OAuth `error` code.
	pub error: Option<String>,
	/// OAuth `error_description`.
	pub error_description: Option<String>,
}
impl CallbackResult {
	/// Parses a raw (still percent-encoded) query string.
	pub fn from_query(query: &str) -> Self {
		let mut result = Self::default();

		for (key, value) in form_urlencoded::parse(query.as_bytes()) {
			if value.is_empty() {
				continue;
			}

			let slot = match key.as_ref() {
				"code" => &mut result.code,
				"state" => &mut result.state,
				"error" => &mut result.error,
				"error_description" => &mut result.error_description,
				_ => continue,
			};

			if slot.is_none() {
				*slot = Some(value.into_owned());
			}
		}

		result
	}

	/// Returns true when the redirect carries a code and no error.
	pub fn is_success(&self) -> bool {
		self.error.is_none() && self.code.is_some()
	}
}
impl Debug for CallbackResult {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CallbackResult")
			.field("code", &self.code.as_ref().map(|_| "<redacted>"))
			.field("state", &self.state.as_ref().map(|_| "<redacted>"))
			.field("error", &self.error)
			.field("error_description", &self.error_description)
			.finish()
	}
}

/// Why a request head could not be understood.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub(crate) enum MalformedRequest {
	#[error("Request head is not valid UTF-8.")]
	NotUtf8,
	#[error("Request line must have a method, a target, and a version.")]
	BadRequestLine,
	#[error("Unsupported protocol version `{0}`.")]
	UnsupportedVersion(String),
	#[error("Request target must be an absolute path.")]
	BadTarget,
	#[error("Request head exceeds the size limit.")]
	TooLarge,
}

/// Method and target of an HTTP/1.x request line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct RequestLine<'a> {
	pub(crate) method: &'a str,
	pub(crate) path: &'a str,
	pub(crate) query: &'a str,
}
impl<'a> RequestLine<'a> {
	pub(crate) fn parse(head: &'a [u8]) -> Result<Self, MalformedRequest> {
		let line_end = head.iter().position(|b| *b == b'\n').unwrap_or(head.len());
		let line = std::str::from_utf8(&head[..line_end]).map_err(|_| MalformedRequest::NotUtf8)?;
		let mut parts = line.trim_end_matches('\r').split(' ');
		let (Some(method), Some(target), Some(version), None) =
			(parts.next(), parts.next(), parts.next(), parts.next())
		else {
			return Err(MalformedRequest::BadRequestLine);
		};

		if method.is_empty() || !method.bytes().all(|b| b.is_ascii_uppercase()) {
			return Err(MalformedRequest::BadRequestLine);
		}
		if !version.starts_with("HTTP/1.") {
			return Err(MalformedRequest::UnsupportedVersion(version.to_owned()));
		}
		if !target.starts_with('/') {
			return Err(MalformedRequest::BadTarget);
		}

		let target = target.split_once('#').map_or(target, |(before, _)| before);
		let (path, query) = target.split_once('?').unwrap_or((target, ""));

		Ok(Self { method, path, query })
	}
}

/// Returns true once `buf` holds a complete request head.
pub(crate) fn head_complete(buf: &[u8]) -> bool {
	buf.windows(4).any(|w| w == b"\r\n\r\n") || buf.windows(2).any(|w| w == b"\n\n")
}
