//! One-shot loopback listener that receives the browser redirect.
//!
//! [`CallbackListener`] binds loopback addresses only, answers stray requests (`404` for other
//! paths, `405` for other methods, `400` for garbage) without ending the wait, and closes right
//! after the first `GET` on the callback path. Its lifecycle is tracked by [`ListenerStatus`]:
//!
//! ```text
//! Idle -> Listening -> { Fulfilled | TimedOut | Aborted } -> Closed
//! ```

mod page;
mod request;

pub use request::CallbackResult;

// std
use std::{
	io::ErrorKind as IoErrorKind,
	net::{Ipv4Addr, Ipv6Addr, SocketAddr},
	sync::atomic::{AtomicBool, Ordering},
};
// crates.io
use tokio::{
	io::{AsyncReadExt, AsyncWriteExt},
	net::{TcpListener, TcpStream},
	task::JoinSet,
};
// self
use crate::{
	_prelude::*,
	config::RedirectTarget,
	error::ConfigError,
	obs::{self, FlowKind, FlowOutcome, FlowSpan, flow_event},
};
use page::Reply;
use request::{MAX_HEAD_LEN, MalformedRequest, RequestLine};

/// Waits for one redirect on `127.0.0.1:<port><path>` (plus `[::1]` when available).
///
/// Resolves with the parsed query, or fails with [`Error::Timeout`] once `timeout` elapses.
pub async fn await_callback(port: u16, path: &str, timeout: StdDuration) -> Result<CallbackResult> {
	let mut listener = CallbackListener::new(RedirectTarget::new(port, path)?);

	listener.listen().await?;
	listener.wait(timeout, std::future::pending()).await
}

/// Lifecycle states of a [`CallbackListener`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ListenerState {
	/// Created, not bound yet.
	#[default]
	Idle,
	/// Bound and accepting connections.
	Listening,
	/// The callback request was received and answered.
	Fulfilled,
	/// The wait bound elapsed first.
	TimedOut,
	/// The wait was aborted or its future was dropped.
	Aborted,
	/// Sockets released.
	Closed,
}
impl ListenerState {
	/// Returns true for `Fulfilled`, `TimedOut`, and `Aborted`.
	pub fn is_outcome(self) -> bool {
		matches!(self, Self::Fulfilled | Self::TimedOut | Self::Aborted)
	}

	fn can_advance_to(self, next: Self) -> bool {
		match (self, next) {
			(Self::Closed, _) => false,
			(_, Self::Closed) => true,
			(Self::Idle, Self::Listening) => true,
			(Self::Listening, next) => next.is_outcome(),
			_ => false,
		}
	}
}

/// Shared, cloneable view of a listener's lifecycle.
#[derive(Clone, Debug, Default)]
pub struct ListenerStatus(Arc<Mutex<StatusCell>>);
#[derive(Debug, Default)]
struct StatusCell {
	state: ListenerState,
	outcome: Option<ListenerState>,
}
impl ListenerStatus {
	/// Current state.
	pub fn state(&self) -> ListenerState {
		self.0.lock().state
	}

	/// Terminal outcome once one was reached; survives the move to `Closed`.
	pub fn outcome(&self) -> Option<ListenerState> {
		self.0.lock().outcome
	}

	/// Returns true once the sockets have been released.
	pub fn is_closed(&self) -> bool {
		self.state() == ListenerState::Closed
	}

	fn advance(&self, next: ListenerState) -> bool {
		let mut cell = self.0.lock();

		if !cell.state.can_advance_to(next) {
			return false;
		}
		if next == ListenerState::Closed && cell.state == ListenerState::Listening {
			// Dropped mid-wait: the owning future was cancelled.
			cell.outcome = Some(ListenerState::Aborted);
		}
		if next.is_outcome() {
			cell.outcome = Some(next);
		}

		cell.state = next;

		true
	}
}

struct BoundSockets {
	v4: TcpListener,
	v6: Option<TcpListener>,
	port: u16,
}
impl BoundSockets {
	async fn bind(port: u16) -> Result<Self> {
		let v4_addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
		let v4 = TcpListener::bind(v4_addr)
			.await
			.map_err(|source| ConfigError::CallbackBind { addr: v4_addr.to_string(), source })?;
		let port = v4
			.local_addr()
			.map_err(|source| ConfigError::CallbackBind { addr: v4_addr.to_string(), source })?
			.port();
		let v6_addr = SocketAddr::from((Ipv6Addr::LOCALHOST, port));
		let v6 = match TcpListener::bind(v6_addr).await {
			Ok(listener) => Some(listener),
			Err(e) => {
				flow_event!(debug, error = %e, "IPv6 loopback unavailable; continuing on IPv4 only.");

				None
			},
		};

		Ok(Self { v4, v6, port })
	}

	async fn accept(&self) -> std::io::Result<TcpStream> {
		let accepted = match &self.v6 {
			Some(v6) => tokio::select! {
				accepted = self.v4.accept() => accepted,
				accepted = v6.accept() => accepted,
			},
			None => self.v4.accept().await,
		};

		accepted.map(|(stream, _)| stream)
	}
}

/// Loopback HTTP listener that accepts exactly one authorization redirect.
///
/// Dropping the listener releases its sockets, so cancelling the future that owns it frees the
/// port as well.
pub struct CallbackListener {
	target: RedirectTarget,
	read_timeout: StdDuration,
	bound: Option<BoundSockets>,
	status: ListenerStatus,
}
impl CallbackListener {
	/// Time a single connection may take to deliver its request head.
	pub const DEFAULT_READ_TIMEOUT: StdDuration = StdDuration::from_secs(10);

	/// Creates an idle listener for `target`.
	pub fn new(target: RedirectTarget) -> Self {
		Self {
			target,
			read_timeout: Self::DEFAULT_READ_TIMEOUT,
			bound: None,
			status: ListenerStatus::default(),
		}
	}

	/// Overrides the per-connection read timeout.
	pub fn with_read_timeout(mut self, read_timeout: StdDuration) -> Self {
		self.read_timeout = read_timeout;

		self
	}

	/// Binds the loopback sockets and returns the bound port.
	pub async fn listen(&mut self) -> Result<u16> {
		if self.status.state() != ListenerState::Idle {
			return Err(ConfigError::ListenerAlreadyStarted.into());
		}

		let bound = BoundSockets::bind(self.target.port).await?;
		let port = bound.port;

		flow_event!(
			info,
			port,
			path = %self.target.path,
			dual_stack = bound.v6.is_some(),
			"Callback listener bound."
		);

		self.bound = Some(bound);
		self.status.advance(ListenerState::Listening);

		Ok(port)
	}

	/// Port the listener is bound to, once listening.
	pub fn local_port(&self) -> Option<u16> {
		self.bound.as_ref().map(|bound| bound.port)
	}

	/// Redirect URI for the bound port (or the configured port before binding).
	pub fn redirect_uri(&self) -> Result<Url> {
		self.target.redirect_uri(self.local_port().unwrap_or(self.target.port))
	}

	/// Shared lifecycle handle.
	pub fn status(&self) -> ListenerStatus {
		self.status.clone()
	}

	/// Waits for the callback, racing `timeout` and `abort`, then closes the listener.
	///
	/// Binds first when [`CallbackListener::listen`] was not called.
	pub async fn wait<A>(mut self, timeout: StdDuration, abort: A) -> Result<CallbackResult>
	where
		A: Future<Output = ()>,
	{
		const KIND: FlowKind = FlowKind::Callback;

		if self.status.state() == ListenerState::Idle {
			self.listen().await?;
		}

		let span = FlowSpan::new(KIND, "wait");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let Some(bound) = self.bound.as_ref() else {
					return Err(Error::from(ConfigError::ListenerAlreadyStarted));
				};

				let claimed = Arc::new(AtomicBool::new(false));
				let mut serve = std::pin::pin!(serve_until_callback(
					bound,
					&self.target.path,
					self.read_timeout,
					claimed.clone(),
				));
				let received = tokio::select! {
					result = serve.as_mut() => Some(result),
					_ = tokio::time::sleep(timeout) =>
						settle_after_deadline(&claimed, serve.as_mut(), self.read_timeout).await,
					_ = abort => {
						self.status.advance(ListenerState::Aborted);
						flow_event!(info, "Callback wait aborted.");

						return Err(Error::Aborted);
					},
				};

				match received {
					Some(result) => {
						self.status.advance(ListenerState::Fulfilled);

						Ok(result)
					},
					None => {
						self.status.advance(ListenerState::TimedOut);
						flow_event!(
							warn,
							waited_secs = timeout.as_secs(),
							"No callback arrived in time."
						);

						Err(Error::Timeout { waited: timeout })
					},
				}
			})
			.await;

		obs::record_flow_result(KIND, &result);
		self.close();

		result
	}

	fn close(&mut self) {
		if self.bound.take().is_some() {
			flow_event!(debug, "Callback listener closed.");
		}

		self.status.advance(ListenerState::Closed);
	}
}
impl Debug for CallbackListener {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CallbackListener")
			.field("target", &self.target)
			.field("port", &self.local_port())
			.field("state", &self.status.state())
			.finish()
	}
}
impl Drop for CallbackListener {
	fn drop(&mut self) {
		self.close();
	}
}

/// Accepts connections until one delivers the callback.
///
/// Connections are served concurrently so a browser's idle preconnect cannot stall the real
/// redirect; the first matching request claims the callback.
async fn serve_until_callback(
	bound: &BoundSockets,
	path: &str,
	read_timeout: StdDuration,
	claimed: Arc<AtomicBool>,
) -> CallbackResult {
	let path: Arc<str> = Arc::from(path);
	let mut connections = JoinSet::new();

	loop {
		tokio::select! {
			accepted = bound.accept() => match accepted {
				Ok(stream) => {
					connections.spawn(serve_connection(
						stream,
						path.clone(),
						claimed.clone(),
						read_timeout,
					));
				},
				Err(e) => {
					flow_event!(warn, error = %e, "Failed to accept a callback connection.");
					tokio::time::sleep(StdDuration::from_millis(50)).await;
				},
			},
			Some(joined) = connections.join_next() => {
				if let Ok(Some(result)) = joined {
					return result;
				}
			},
		}
	}
}

/// Decides the wait once the deadline passed.
///
/// A callback claimed before the deadline still gets `grace` to finish its response, so the
/// browser never shows success for a login that reports a timeout.
async fn settle_after_deadline<F>(
	claimed: &AtomicBool,
	serve: Pin<&mut F>,
	grace: StdDuration,
) -> Option<CallbackResult>
where
	F: Future<Output = CallbackResult>,
{
	if !claimed.load(Ordering::SeqCst) {
		return None;
	}

	flow_event!(debug, "Callback claimed at the deadline; letting it finish.");

	tokio::time::timeout(grace, serve).await.ok()
}

async fn serve_connection(
	mut stream: TcpStream,
	path: Arc<str>,
	claimed: Arc<AtomicBool>,
	read_timeout: StdDuration,
) -> Option<CallbackResult> {
	let head = match tokio::time::timeout(read_timeout, read_head(&mut stream)).await {
		Ok(Ok(Some(head))) => head,
		Ok(Ok(None)) => return None,
		Ok(Err(HeadError::Malformed(e))) => {
			flow_event!(debug, error = %e, "Rejected a malformed request.");
			respond(&mut stream, Reply::BadRequest).await;

			return None;
		},
		Ok(Err(HeadError::Io(e))) => {
			flow_event!(debug, error = %e, "Callback connection failed while reading.");

			return None;
		},
		Err(_) => {
			flow_event!(debug, "Dropped a stalled callback connection.");

			return None;
		},
	};
	let (reply, result) = match RequestLine::parse(&head) {
		Err(e) => {
			flow_event!(debug, error = %e, "Rejected a malformed request.");

			(Reply::BadRequest, None)
		},
		Ok(line) if line.path != &*path => {
			flow_event!(
				debug,
				method = line.method,
				path = line.path,
				"Ignored a non-callback request."
			);

			(Reply::NotFound, None)
		},
		Ok(line) if line.method != "GET" => {
			flow_event!(debug, method = line.method, "Rejected a non-GET callback request.");

			(Reply::MethodNotAllowed, None)
		},
		Ok(_) if claimed.swap(true, Ordering::SeqCst) => (Reply::NotFound, None),
		Ok(line) => {
			let result = CallbackResult::from_query(line.query);
			let reply = if result.is_success() { Reply::Success } else { Reply::Failure };

			flow_event!(
				info,
				has_code = result.code.is_some(),
				has_error = result.error.is_some(),
				"Received the authorization callback."
			);

			(reply, Some(result))
		},
	};

	respond(&mut stream, reply).await;

	result
}

enum HeadError {
	Malformed(MalformedRequest),
	Io(std::io::Error),
}

async fn read_head(stream: &mut TcpStream) -> Result<Option<Vec<u8>>, HeadError> {
	let mut head = Vec::with_capacity(1024);
	let mut chunk = [0_u8; 1024];

	loop {
		let read = match stream.read(&mut chunk).await {
			Ok(read) => read,
			Err(e) if e.kind() == IoErrorKind::Interrupted => continue,
			Err(e) => return Err(HeadError::Io(e)),
		};

		if read == 0 {
			// Peer closed; parse whatever arrived.
			return Ok((!head.is_empty()).then_some(head));
		}

		head.extend_from_slice(&chunk[..read]);

		if request::head_complete(&head) {
			return Ok(Some(head));
		}
		if head.len() > MAX_HEAD_LEN {
			return Err(HeadError::Malformed(MalformedRequest::TooLarge));
		}
	}
}

async fn respond(stream: &mut TcpStream, reply: Reply) {
	if let Err(e) = stream.write_all(&reply.to_bytes()).await {
		flow_event!(debug, error = %e, "Browser went away before the response was written.");

		return;
	}

	let _ = stream.shutdown().await;
}
