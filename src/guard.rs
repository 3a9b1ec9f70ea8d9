//! The guarded request wrapper.
//!
//! [`Guard::request`] is the single entry point call sites use instead of the platform fetch
//! primitive: it attaches the anti-forgery header to mutating methods, delegates to the
//! transport, and converts confirmed session expiry into [`Error::SessionExpired`] while passing
//! every other response back unchanged. Each invocation is independent; the guard mutates no
//! persistent state.

// self
use crate::{
	_prelude::*,
	error::{ConfigError, SESSION_EXPIRED_MESSAGE, TransportError},
	obs::{self, GuardStage, RequestOutcome, RequestSpan},
	session::{KeepAliveAck, SessionChecker},
	token::TokenSource,
	transport::{RequestDescriptor, ResponseOutcome, Transport},
};
#[cfg(feature = "reqwest")] use crate::transport::ReqwestTransport;

/// Policy applied when a mutating request finds no obtainable token.
///
/// The two browser wrappers this crate consolidates disagreed on this point, so the choice is an
/// explicit configuration decision rather than an inherited ambiguity. Whichever variant an
/// integration picks must match what its server does with tokenless mutating requests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TokenPolicy {
	/// Reject immediately with [`Error::TokenMissing`]; the network is never touched.
	#[default]
	Conservative,
	/// Warn and proceed without the header, relying on the server to reject the request and the
	/// expiry path to classify the failure.
	Lenient,
}

/// User-visible notification hook invoked once with the fixed expiry message before rejection.
pub trait Notifier
where
	Self: Send + Sync,
{
	/// Delivers `message` to the page surface.
	fn notify(&self, message: &str);
}
impl<F> Notifier for F
where
	F: Fn(&str) + Send + Sync,
{
	fn notify(&self, message: &str) {
		self(message)
	}
}

/// Notifier that drops every message; the default when no hook is supplied.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotifier;
impl Notifier for NoopNotifier {
	fn notify(&self, _: &str) {}
}

/// Notifier that buffers messages in memory for later inspection.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
	messages: Mutex<Vec<String>>,
}
impl MemoryNotifier {
	/// Returns every message delivered so far, in order.
	pub fn messages(&self) -> Vec<String> {
		self.messages.lock().clone()
	}
}
impl Notifier for MemoryNotifier {
	fn notify(&self, message: &str) {
		self.messages.lock().push(message.to_owned());
	}
}

/// Fixed names and paths agreed with the server-side validator.
///
/// Defaults match the reference deployment; every field is an integration-time decision, not a
/// protocol constant.
#[derive(Clone, Debug)]
pub struct GuardConfig {
	/// Header carrying the token on mutating requests.
	pub token_header: HeaderName,
	/// Header carrying the token on the session validity probe.
	pub probe_header: HeaderName,
	/// Same-origin path of the session validity endpoint.
	pub session_probe_path: String,
	/// Same-origin path of the keep-alive endpoint.
	pub keep_alive_path: String,
	/// Missing-token policy for mutating requests.
	pub policy: TokenPolicy,
}
impl Default for GuardConfig {
	fn default() -> Self {
		Self {
			token_header: HeaderName::from_static("x-csrf-token"),
			probe_header: HeaderName::from_static("x-page-token"),
			session_probe_path: "/api/auth/session-valid".into(),
			keep_alive_path: "/api/auth/keep-alive".into(),
			policy: TokenPolicy::default(),
		}
	}
}
impl GuardConfig {
	/// Replaces the token header name.
	pub fn with_token_header(mut self, name: HeaderName) -> Self {
		self.token_header = name;

		self
	}

	/// Replaces the probe header name.
	pub fn with_probe_header(mut self, name: HeaderName) -> Self {
		self.probe_header = name;

		self
	}

	/// Replaces the session validity endpoint path.
	pub fn with_session_probe_path(mut self, path: impl Into<String>) -> Self {
		self.session_probe_path = path.into();

		self
	}

	/// Replaces the keep-alive endpoint path.
	pub fn with_keep_alive_path(mut self, path: impl Into<String>) -> Self {
		self.keep_alive_path = path.into();

		self
	}

	/// Replaces the missing-token policy.
	pub fn with_policy(mut self, policy: TokenPolicy) -> Self {
		self.policy = policy;

		self
	}
}

#[cfg(feature = "reqwest")]
/// Guard specialized for the crate's default reqwest transport.
pub type ReqwestGuard = Guard<ReqwestTransport>;

/// Anti-forgery request wrapper with session expiry detection.
///
/// The guard owns the transport, token source, notifier, and a [`SessionChecker`] sharing the
/// same collaborators, so call sites pass only a target and a descriptor.
pub struct Guard<T>
where
	T: ?Sized + Transport,
{
	transport: Arc<T>,
	tokens: Arc<dyn TokenSource>,
	notifier: Arc<dyn Notifier>,
	config: GuardConfig,
	checker: SessionChecker<T>,
}
impl<T> Guard<T>
where
	T: ?Sized + Transport,
{
	/// Creates a guard around the caller-provided transport with the default configuration.
	pub fn with_transport(transport: impl Into<Arc<T>>, tokens: Arc<dyn TokenSource>) -> Self
	where
		T: Sized,
	{
		Self::with_config(transport, tokens, GuardConfig::default())
	}

	/// Creates a guard around the caller-provided transport and configuration.
	pub fn with_config(
		transport: impl Into<Arc<T>>,
		tokens: Arc<dyn TokenSource>,
		config: GuardConfig,
	) -> Self
	where
		T: Sized,
	{
		let transport = transport.into();
		let checker = SessionChecker::new(
			transport.clone(),
			tokens.clone(),
			config.probe_header.clone(),
			config.session_probe_path.clone(),
		);

		Self { transport, tokens, notifier: Arc::new(NoopNotifier), config, checker }
	}

	/// Sets or replaces the user-visible notification hook.
	pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
		self.notifier = notifier;

		self
	}

	/// Returns the checker used for failed responses.
	pub fn checker(&self) -> &SessionChecker<T> {
		&self.checker
	}

	/// Executes `descriptor` against `target` with anti-forgery and expiry handling.
	///
	/// Mutating methods get the token header attached (subject to [`TokenPolicy`]); successful
	/// responses come back untouched; failing responses are classified by the session checker
	/// and either returned unchanged for the caller to handle or converted into
	/// [`Error::SessionExpired`] after notifying the page once.
	pub async fn request(
		&self,
		target: Url,
		descriptor: RequestDescriptor,
	) -> Result<ResponseOutcome> {
		let span = RequestSpan::new(GuardStage::Request, "request");

		obs::record_request_outcome(GuardStage::Request, RequestOutcome::Attempt);

		let result = span.instrument(self.request_inner(target, descriptor)).await;

		match &result {
			Ok(_) => obs::record_request_outcome(GuardStage::Request, RequestOutcome::Success),
			Err(_) => obs::record_request_outcome(GuardStage::Request, RequestOutcome::Failure),
		}

		result
	}

	async fn request_inner(
		&self,
		target: Url,
		mut descriptor: RequestDescriptor,
	) -> Result<ResponseOutcome> {
		if descriptor.is_mutating() {
			match self.tokens.token() {
				Some(token) => {
					// Insert, not append: exactly one instance of the header goes out.
					descriptor.headers.insert(self.config.token_header.clone(), token.header_value()?);
				},
				None => match self.config.policy {
					TokenPolicy::Conservative => return Err(Error::TokenMissing),
					TokenPolicy::Lenient => obs::diagnostic_warning(
						GuardStage::TokenLookup,
						"Proceeding without an anti-forgery token; the server may reject this request.",
					),
				},
			}
		}

		let outcome = self
			.transport
			.send(target.clone(), descriptor)
			.await
			.map_err(TransportError::network)?;

		if outcome.is_success() {
			return Ok(outcome);
		}
		if self.checker.is_session_invalid(&target, &outcome).await? {
			self.notifier.notify(SESSION_EXPIRED_MESSAGE);

			return Err(Error::session_expired());
		}

		// Ordinary HTTP error; the caller decides what to do with it.
		Ok(outcome)
	}

	/// Proactively extends the session via the keep-alive endpoint on `origin`.
	///
	/// Peripheral to the expiry hard path; shares the wrapper so a dead session still surfaces as
	/// [`Error::SessionExpired`].
	pub async fn keep_alive(&self, origin: &Url) -> Result<()> {
		let span = RequestSpan::new(GuardStage::KeepAlive, "keep_alive");

		obs::record_request_outcome(GuardStage::KeepAlive, RequestOutcome::Attempt);

		let result = span.instrument(self.keep_alive_inner(origin)).await;

		match &result {
			Ok(()) => obs::record_request_outcome(GuardStage::KeepAlive, RequestOutcome::Success),
			Err(_) => obs::record_request_outcome(GuardStage::KeepAlive, RequestOutcome::Failure),
		}

		result
	}

	async fn keep_alive_inner(&self, origin: &Url) -> Result<()> {
		let url = origin
			.join(&self.config.keep_alive_path)
			.map_err(|e| ConfigError::InvalidEndpointPath { source: e })?;
		let outcome = self.request(url, RequestDescriptor::get()).await?;

		if !outcome.is_success() {
			return Err(Error::KeepAlive {
				reason: format!("unexpected status {}", outcome.status),
			});
		}

		let ack: KeepAliveAck = outcome
			.json()
			.map_err(|e| Error::KeepAlive { reason: format!("malformed response body: {e}") })?;

		if !ack.success {
			return Err(Error::KeepAlive {
				reason: ack.error.unwrap_or_else(|| "unknown error".into()),
			});
		}

		Ok(())
	}
}
#[cfg(feature = "reqwest")]
impl Guard<ReqwestTransport> {
	/// Creates a guard over a fresh reqwest transport.
	///
	/// Use [`Guard::with_transport`] to supply a preconfigured [`ReqwestClient`] (custom TLS,
	/// proxies, cookie store) instead.
	pub fn new(tokens: Arc<dyn TokenSource>) -> Self {
		Self::with_transport(ReqwestTransport::default(), tokens)
	}
}
impl<T> Debug for Guard<T>
where
	T: ?Sized + Transport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Guard")
			.field("config", &self.config)
			.field("checker", &self.checker)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn config_defaults_are_the_reference_deployment() {
		let config = GuardConfig::default();

		assert_eq!(config.token_header.as_str(), "x-csrf-token");
		assert_eq!(config.probe_header.as_str(), "x-page-token");
		assert_eq!(config.session_probe_path, "/api/auth/session-valid");
		assert_eq!(config.keep_alive_path, "/api/auth/keep-alive");
		assert_eq!(config.policy, TokenPolicy::Conservative);
	}

	#[test]
	fn memory_notifier_records_in_order() {
		let notifier = MemoryNotifier::default();

		notifier.notify("first");
		notifier.notify("second");

		assert_eq!(notifier.messages(), vec!["first".to_owned(), "second".to_owned()]);
	}

	#[test]
	fn closure_notifier_satisfies_the_trait() {
		let seen = Arc::new(Mutex::new(Vec::new()));
		let sink = seen.clone();
		let notifier: Arc<dyn Notifier> =
			Arc::new(move |message: &str| sink.lock().push(message.to_owned()));

		notifier.notify(SESSION_EXPIRED_MESSAGE);

		assert_eq!(seen.lock().as_slice(), &[SESSION_EXPIRED_MESSAGE.to_owned()]);
	}
}
