//! Session validity checking for failed responses.
//!
//! A failed response means one of two things: the session died, or the server had an ordinary
//! problem. 401/403 answer the question directly; anything else non-2xx gets one secondary
//! read-only probe against the validity endpoint, which reports whether the login still holds.

// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError, ValidityCheckError},
	obs::{self, GuardStage, RequestOutcome, RequestSpan},
	token::TokenSource,
	transport::{RequestDescriptor, ResponseOutcome, Transport},
};

/// JSON shape returned by the session validity endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct SessionValidity {
	/// Whether the check itself completed; `false` means the probe failed server-side.
	pub success: bool,
	/// Whether the caller's login is still valid. Meaningful only when `success` is `true`.
	#[serde(default)]
	pub login_is_valid: bool,
	/// Server-supplied failure reason, when the check failed.
	#[serde(default)]
	pub error: Option<String>,
}

/// JSON shape returned by the keep-alive endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct KeepAliveAck {
	/// Whether the session extension was applied.
	pub success: bool,
	/// Server-supplied failure reason, when it was not.
	#[serde(default)]
	pub error: Option<String>,
}

/// Decides whether a failed response indicates an expired or invalid session.
///
/// Shares the guard's transport and token source; holds no other state. Concurrent probes are
/// serialized through an async mutex so a burst of failures does not stampede the validity
/// endpoint (each call still performs its own probe).
pub struct SessionChecker<T>
where
	T: ?Sized + Transport,
{
	transport: Arc<T>,
	tokens: Arc<dyn TokenSource>,
	probe_header: HeaderName,
	probe_path: String,
	probe_guard: AsyncMutex<()>,
}
impl<T> SessionChecker<T>
where
	T: ?Sized + Transport,
{
	/// Creates a checker probing `probe_path` on the failing request's origin, attaching the
	/// current token (when available) under `probe_header`.
	pub fn new(
		transport: Arc<T>,
		tokens: Arc<dyn TokenSource>,
		probe_header: HeaderName,
		probe_path: impl Into<String>,
	) -> Self {
		Self {
			transport,
			tokens,
			probe_header,
			probe_path: probe_path.into(),
			probe_guard: AsyncMutex::new(()),
		}
	}

	/// Returns `true` when `outcome` indicates an expired or invalid session.
	///
	/// 401/403 short-circuit to `true` without a secondary call; successful outcomes
	/// short-circuit to `false`; every other failure triggers exactly one validity probe.
	pub async fn is_session_invalid(
		&self,
		target: &Url,
		outcome: &ResponseOutcome,
	) -> Result<bool> {
		if outcome.status == StatusCode::UNAUTHORIZED || outcome.status == StatusCode::FORBIDDEN {
			return Ok(true);
		}
		if outcome.is_success() {
			return Ok(false);
		}

		Ok(!self.session_valid(target).await?)
	}

	/// Issues the secondary validity probe and returns whether the login still holds.
	pub async fn session_valid(&self, target: &Url) -> Result<bool> {
		let span = RequestSpan::new(GuardStage::SessionProbe, "session_valid");

		obs::record_request_outcome(GuardStage::SessionProbe, RequestOutcome::Attempt);

		let result = span.instrument(self.session_valid_inner(target)).await;

		match &result {
			Ok(_) =>
				obs::record_request_outcome(GuardStage::SessionProbe, RequestOutcome::Success),
			Err(_) =>
				obs::record_request_outcome(GuardStage::SessionProbe, RequestOutcome::Failure),
		}

		result
	}

	async fn session_valid_inner(&self, target: &Url) -> Result<bool> {
		let url = target
			.join(&self.probe_path)
			.map_err(|e| ConfigError::InvalidEndpointPath { source: e })?;
		let mut descriptor = RequestDescriptor::get();

		if let Some(token) = self.tokens.token() {
			descriptor.headers.insert(self.probe_header.clone(), token.header_value()?);
		}

		let _serialized = self.probe_guard.lock().await;
		let outcome = self
			.transport
			.send(url, descriptor)
			.await
			.map_err(|e| ValidityCheckError::Probe { source: TransportError::network(e) })?;
		let validity: SessionValidity =
			outcome.json().map_err(|e| ValidityCheckError::MalformedBody { source: e })?;

		if !validity.success {
			return Err(ValidityCheckError::Endpoint { reason: validity.error }.into());
		}

		Ok(validity.login_is_valid)
	}
}
impl<T> Debug for SessionChecker<T>
where
	T: ?Sized + Transport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionChecker")
			.field("probe_header", &self.probe_header)
			.field("probe_path", &self.probe_path)
			.finish()
	}
}
