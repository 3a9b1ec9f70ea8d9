//! Transport primitives for guarded requests.
//!
//! The module exposes [`Transport`] alongside [`RequestDescriptor`] and [`ResponseOutcome`] so
//! downstream crates can integrate custom HTTP clients without changing the guard's decision
//! logic. The guard only ever augments headers and inspects status/body; serialization of the
//! request itself is the transport's business.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use serde::de::DeserializeOwned;
// self
use crate::_prelude::*;

/// Methods whose semantics change server state and therefore require the anti-forgery header.
const MUTATING_METHODS: &[&str] = &["POST", "PUT", "PATCH", "DELETE"];

/// Returns `true` when `method` belongs to the fixed mutating set, case-insensitively.
pub fn is_mutating(method: &Method) -> bool {
	MUTATING_METHODS.iter().any(|candidate| method.as_str().eq_ignore_ascii_case(candidate))
}

/// Outgoing request shape handed to a [`Transport`].
///
/// Mirrors the platform request primitive: method, headers, and an optional raw body. The target
/// address travels separately so the guard can derive same-origin probe URLs from it.
#[derive(Clone, Debug, Default)]
pub struct RequestDescriptor {
	/// HTTP method; read-only unless it belongs to the mutating set.
	pub method: Method,
	/// Headers to send; the guard inserts the token header here for mutating methods.
	pub headers: HeaderMap,
	/// Optional raw request body.
	pub body: Option<Vec<u8>>,
}
impl RequestDescriptor {
	/// Creates a descriptor for `method` with empty headers and no body.
	pub fn new(method: Method) -> Self {
		Self { method, headers: HeaderMap::new(), body: None }
	}

	/// Creates a GET descriptor.
	pub fn get() -> Self {
		Self::new(Method::GET)
	}

	/// Creates a POST descriptor.
	pub fn post() -> Self {
		Self::new(Method::POST)
	}

	/// Sets a header, replacing any previous value under the same name.
	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Sets the raw request body.
	pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Returns `true` when this descriptor's method requires the anti-forgery header.
	pub fn is_mutating(&self) -> bool {
		is_mutating(&self.method)
	}
}

/// Response shape returned by a [`Transport`].
#[derive(Clone, Debug)]
pub struct ResponseOutcome {
	/// HTTP status code.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl ResponseOutcome {
	/// Creates an outcome with empty headers and body; tests and transports fill in the rest.
	pub fn new(status: StatusCode) -> Self {
		Self { status, headers: HeaderMap::new(), body: Vec::new() }
	}

	/// Replaces the body with `body`.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = body.into();

		self
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Deserializes the body as JSON, reporting the failing path on malformed input.
	pub fn json<T>(&self) -> Result<T, serde_path_to_error::Error<serde_json::Error>>
	where
		T: DeserializeOwned,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut deserializer)
	}

	/// Returns the body as UTF-8 text, lossily.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}

/// Boxed response future returned by [`Transport::send`].
pub type TransportFuture<'t, E> =
	Pin<Box<dyn Future<Output = Result<ResponseOutcome, E>> + Send + 't>>;

/// Abstraction over HTTP transports capable of executing guarded requests.
///
/// The trait acts as the guard's only dependency on an HTTP stack. Implementations must be
/// `Send + Sync + 'static` so a single guard can be shared across tasks, and the returned future
/// must be `Send` so callers can box or spawn it freely.
pub trait Transport
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// Executes `descriptor` against `target` and resolves with the raw outcome.
	fn send(
		&self,
		target: Url,
		descriptor: RequestDescriptor,
	) -> TransportFuture<'_, Self::TransportError>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Transport for ReqwestTransport {
	type TransportError = ReqwestError;

	fn send(
		&self,
		target: Url,
		descriptor: RequestDescriptor,
	) -> TransportFuture<'_, Self::TransportError> {
		let client = self.0.clone();

		Box::pin(async move {
			let mut builder =
				client.request(descriptor.method, target).headers(descriptor.headers);

			if let Some(body) = descriptor.body {
				builder = builder.body(body);
			}

			let response = builder.send().await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await?.to_vec();

			Ok(ResponseOutcome { status, headers, body })
		})
	}
}
