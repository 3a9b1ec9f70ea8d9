// std
use std::{
	collections::VecDeque,
	error::Error as StdError,
	fmt::{Display, Formatter, Result as FmtResult},
	sync::Arc,
};

// crates.io
use parking_lot::Mutex;
use serde_json::json;
// self
use csrf_guard::{
	error::{Error, ValidityCheckError},
	guard::{Guard, GuardConfig, MemoryNotifier, TokenPolicy},
	http::{Method, StatusCode},
	token::{Token, TokenSource},
	transport::{RequestDescriptor, ResponseOutcome, Transport, TransportFuture},
	url::Url,
};

const TOKEN: &str = "tok-123";

#[derive(Debug)]
struct ExhaustedTransport;
impl Display for ExhaustedTransport {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("No scripted response remains.")
	}
}
impl StdError for ExhaustedTransport {}

/// Scripted transport that replays queued outcomes and records every outgoing request.
#[derive(Default)]
struct FakeTransport {
	responses: Mutex<VecDeque<ResponseOutcome>>,
	requests: Mutex<Vec<(Url, RequestDescriptor)>>,
}
impl FakeTransport {
	fn scripted(outcomes: impl IntoIterator<Item = ResponseOutcome>) -> Self {
		Self { responses: Mutex::new(outcomes.into_iter().collect()), requests: Default::default() }
	}

	fn sent(&self) -> Vec<(Url, RequestDescriptor)> {
		self.requests.lock().clone()
	}

	fn hits(&self) -> usize {
		self.requests.lock().len()
	}
}
impl Transport for FakeTransport {
	type TransportError = ExhaustedTransport;

	fn send(
		&self,
		target: Url,
		descriptor: RequestDescriptor,
	) -> TransportFuture<'_, Self::TransportError> {
		self.requests.lock().push((target, descriptor));

		let next = self.responses.lock().pop_front();

		Box::pin(async move { next.ok_or(ExhaustedTransport) })
	}
}

struct StaticSource(Option<Token>);
impl TokenSource for StaticSource {
	fn token(&self) -> Option<Token> {
		self.0.clone()
	}
}

fn json_outcome(status: StatusCode, body: serde_json::Value) -> ResponseOutcome {
	ResponseOutcome::new(status).with_body(body.to_string())
}

fn build_guard(
	outcomes: impl IntoIterator<Item = ResponseOutcome>,
	token: Option<&str>,
	policy: TokenPolicy,
) -> (Arc<FakeTransport>, Guard<FakeTransport>, Arc<MemoryNotifier>) {
	let transport = Arc::new(FakeTransport::scripted(outcomes));
	let tokens = Arc::new(StaticSource(token.map(Token::new)));
	let notifier = Arc::new(MemoryNotifier::default());
	let guard = Guard::with_config(
		transport.clone(),
		tokens,
		GuardConfig::default().with_policy(policy),
	)
	.with_notifier(notifier.clone());

	(transport, guard, notifier)
}

fn target() -> Url {
	Url::parse("https://app.example/api/things").expect("Test target URL should parse.")
}

#[tokio::test]
async fn mutating_request_attaches_exactly_one_token_header() {
	let (transport, guard, notifier) = build_guard(
		[ResponseOutcome::new(StatusCode::OK)],
		Some(TOKEN),
		TokenPolicy::Conservative,
	);
	let outcome = guard
		.request(target(), RequestDescriptor::post().body("payload"))
		.await
		.expect("Successful mutating request should resolve.");

	assert_eq!(outcome.status, StatusCode::OK);
	assert!(notifier.messages().is_empty());

	let sent = transport.sent();

	assert_eq!(sent.len(), 1, "Success must never trigger a secondary probe.");

	let headers = &sent[0].1.headers;

	assert_eq!(headers.get_all("x-csrf-token").iter().count(), 1);
	assert_eq!(headers.get("x-csrf-token").unwrap(), TOKEN);
}

#[tokio::test]
async fn read_only_request_never_carries_token() {
	let (transport, guard, _) = build_guard(
		[ResponseOutcome::new(StatusCode::OK)],
		Some(TOKEN),
		TokenPolicy::Conservative,
	);

	guard
		.request(target(), RequestDescriptor::get())
		.await
		.expect("Read-only request should resolve.");

	assert!(transport.sent()[0].1.headers.get("x-csrf-token").is_none());
}

#[tokio::test]
async fn forbidden_response_raises_session_expired_without_probe() {
	let (transport, guard, notifier) = build_guard(
		[ResponseOutcome::new(StatusCode::FORBIDDEN)],
		Some(TOKEN),
		TokenPolicy::Conservative,
	);
	let err = guard
		.request(target(), RequestDescriptor::post())
		.await
		.expect_err("403 must reject with the session expiry signal.");

	assert!(err.is_session_expired());
	assert_eq!(
		err.to_string(),
		"Your session has expired. Please refresh the page to log in again."
	);
	assert_eq!(notifier.messages(), vec![err.to_string()]);
	assert_eq!(transport.hits(), 1, "401/403 must be classified without a secondary call.");
}

#[tokio::test]
async fn conservative_policy_rejects_before_any_network_call() {
	let (transport, guard, notifier) = build_guard(
		[ResponseOutcome::new(StatusCode::OK)],
		None,
		TokenPolicy::Conservative,
	);
	let err = guard
		.request(target(), RequestDescriptor::post())
		.await
		.expect_err("Missing token must reject under the conservative policy.");

	assert!(matches!(err, Error::TokenMissing));
	assert!(!err.is_session_expired());
	assert_eq!(transport.hits(), 0);
	assert!(notifier.messages().is_empty());
}

#[tokio::test]
async fn lenient_policy_proceeds_without_the_header() {
	let (transport, guard, _) = build_guard(
		[ResponseOutcome::new(StatusCode::OK)],
		None,
		TokenPolicy::Lenient,
	);

	guard
		.request(target(), RequestDescriptor::post())
		.await
		.expect("Lenient policy should let the request through headerless.");

	let sent = transport.sent();

	assert_eq!(sent.len(), 1);
	assert!(sent[0].1.headers.get("x-csrf-token").is_none());
}

#[tokio::test]
async fn ordinary_error_passes_through_when_login_is_valid() {
	let (transport, guard, notifier) = build_guard(
		[
			ResponseOutcome::new(StatusCode::INTERNAL_SERVER_ERROR).with_body("boom"),
			json_outcome(StatusCode::OK, json!({ "success": true, "login_is_valid": true })),
		],
		Some(TOKEN),
		TokenPolicy::Conservative,
	);
	let outcome = guard
		.request(target(), RequestDescriptor::get())
		.await
		.expect("Ordinary 500 must come back unchanged.");

	assert_eq!(outcome.status, StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(outcome.text(), "boom");
	assert!(notifier.messages().is_empty());

	let sent = transport.sent();

	assert_eq!(sent.len(), 2, "Exactly one secondary probe per failing response.");
	assert_eq!(sent[1].0.path(), "/api/auth/session-valid");
	assert_eq!(sent[1].1.method, Method::GET);
	assert_eq!(sent[1].1.headers.get("x-page-token").unwrap(), TOKEN);
}

#[tokio::test]
async fn invalid_login_probe_raises_session_expired() {
	let (transport, guard, notifier) = build_guard(
		[
			ResponseOutcome::new(StatusCode::INTERNAL_SERVER_ERROR),
			json_outcome(StatusCode::OK, json!({ "success": true, "login_is_valid": false })),
		],
		Some(TOKEN),
		TokenPolicy::Conservative,
	);
	let err = guard
		.request(target(), RequestDescriptor::post())
		.await
		.expect_err("Dead login must reject with the session expiry signal.");

	assert!(err.is_session_expired());
	assert_eq!(notifier.messages().len(), 1);
	assert_eq!(transport.hits(), 2);
}

#[tokio::test]
async fn probe_endpoint_failure_propagates_with_reason() {
	let (_, guard, notifier) = build_guard(
		[
			ResponseOutcome::new(StatusCode::INTERNAL_SERVER_ERROR),
			json_outcome(StatusCode::OK, json!({ "success": false, "error": "db down" })),
		],
		Some(TOKEN),
		TokenPolicy::Conservative,
	);
	let err = guard
		.request(target(), RequestDescriptor::post())
		.await
		.expect_err("A failed validity check must propagate out of request().");

	assert!(matches!(
		err,
		Error::ValidityCheck(ValidityCheckError::Endpoint { .. })
	));
	assert!(err.to_string().contains("db down"));
	assert!(!err.is_session_expired());
	assert!(notifier.messages().is_empty());
}

#[tokio::test]
async fn probe_malformed_body_is_a_validity_check_failure() {
	let (_, guard, _) = build_guard(
		[
			ResponseOutcome::new(StatusCode::INTERNAL_SERVER_ERROR),
			ResponseOutcome::new(StatusCode::OK).with_body("<html>not json</html>"),
		],
		Some(TOKEN),
		TokenPolicy::Conservative,
	);
	let err = guard
		.request(target(), RequestDescriptor::post())
		.await
		.expect_err("A malformed probe body must propagate out of request().");

	assert!(matches!(
		err,
		Error::ValidityCheck(ValidityCheckError::MalformedBody { .. })
	));
}

#[tokio::test]
async fn transport_failure_is_surfaced_uninterpreted() {
	let (_, guard, notifier) = build_guard([], Some(TOKEN), TokenPolicy::Conservative);
	let err = guard
		.request(target(), RequestDescriptor::post())
		.await
		.expect_err("An exhausted transport must reject.");

	assert!(matches!(err, Error::Transport(_)));
	assert!(notifier.messages().is_empty());
}

#[tokio::test]
async fn checker_short_circuits_on_status_alone() {
	let (transport, guard, _) = build_guard([], Some(TOKEN), TokenPolicy::Conservative);
	let checker = guard.checker();

	for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
		let invalid = checker
			.is_session_invalid(&target(), &ResponseOutcome::new(status))
			.await
			.expect("Auth-class statuses should classify without a probe.");

		assert!(invalid);
	}

	let invalid = checker
		.is_session_invalid(&target(), &ResponseOutcome::new(StatusCode::CREATED))
		.await
		.expect("Success outcomes should classify without a probe.");

	assert!(!invalid);
	assert_eq!(transport.hits(), 0);
}
