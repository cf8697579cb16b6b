//! Static responses written back to the browser.
//!
//! Pages are constant strings; nothing from the request is ever echoed into them.

const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
	<meta charset="utf-8">
	<title>Sign-in complete</title>
	<style>
		body { font-family: system-ui, sans-serif; display: flex; justify-content: center; align-items: center; height: 100vh; margin: 0; }
		main { max-width: 28rem; text-align: center; }
		h1 { color: #15803d; }
	</style>
</head>
<body>
	<main>
		<h1>Sign-in complete</h1>
		<p>You can close this window and return to your terminal.</p>
	</main>
</body>
</html>
"#;

const FAILURE_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
	<meta charset="utf-8">
	<title>Sign-in failed</title>
	<style>
		body { font-family: system-ui, sans-serif; display: flex; justify-content: center; align-items: center; height: 100vh; margin: 0; }
		main { max-width: 28rem; text-align: center; }
		h1 { color: #b91c1c; }
	</style>
</head>
<body>
	<main>
		<h1>Sign-in failed</h1>
		<p>The identity provider did not complete the sign-in. Check your terminal for details.</p>
	</main>
</body>
</html>
"#;

/// Reply variants the listener can send.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Reply {
	Success,
	Failure,
	BadRequest,
	NotFound,
	MethodNotAllowed,
}
impl Reply {
	fn status_line(self) -> &'static str {
		match self {
			Self::Success | Self::Failure => "200 OK",
			Self::BadRequest => "400 Bad Request",
			Self::NotFound => "404 Not Found",
			Self::MethodNotAllowed => "405 Method Not Allowed",
		}
	}

	fn body(self) -> (&'static str, &'static str) {
		match self {
			Self::Success => ("text/html; charset=utf-8", SUCCESS_PAGE),
			Self::Failure => ("text/html; charset=utf-8", FAILURE_PAGE),
			Self::BadRequest => ("text/plain; charset=utf-8", "Bad request.\n"),
			Self::NotFound => ("text/plain; charset=utf-8", "Not found.\n"),
			Self::MethodNotAllowed => ("text/plain; charset=utf-8", "Method not allowed.\n"),
		}
	}

	/// Serializes the full HTTP/1.1 response.
	pub(crate) fn to_bytes(self) -> Vec<u8> {
		let (content_type, body) = self.body();
		let allow = if self == Self::MethodNotAllowed { "Allow: GET\r\n" } else { "" };

		format!(
			"HTTP/1.1 {}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nCache-Control: no-store\r\n{allow}Connection: close\r\n\r\n{body}",
			self.status_line(),
			body.len(),
		)
		.into_bytes()
	}
}
