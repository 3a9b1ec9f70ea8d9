//! Anti-forgery token sourcing.
//!
//! Tokens are opaque, short-lived credentials delivered by the server through one of two page
//! carriers: a named cookie or a `<meta>` element. The guard never mints or rotates tokens; it
//! only reads the freshest value right before a mutating request. [`CarrierChain`] walks an
//! ordered carrier list and yields the first hit, so integrators can mirror whichever delivery
//! order their server uses.

// crates.io
use percent_encoding::percent_decode_str;
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	obs::{self, GuardStage},
};

/// Redacted anti-forgery token keeping sensitive material out of logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);
impl Token {
	/// Wraps a new token string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Encodes the token as an HTTP header value.
	pub fn header_value(&self) -> Result<HeaderValue, ConfigError> {
		HeaderValue::from_str(&self.0).map_err(|e| ConfigError::InvalidTokenValue { source: e })
	}
}
impl AsRef<str> for Token {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for Token {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("Token").field(&"<redacted>").finish()
	}
}
impl Display for Token {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Source of the current anti-forgery token.
///
/// Absence is not an error; it means "cannot attach" and the guard's [`TokenPolicy`] decides what
/// happens next.
///
/// [`TokenPolicy`]: crate::guard::TokenPolicy
pub trait TokenSource
where
	Self: Send + Sync,
{
	/// Returns the current token, or `None` when no carrier yields one.
	fn token(&self) -> Option<Token>;
}

/// Ordered chain of token carriers; the first carrier that yields a value wins.
///
/// Emits a non-fatal diagnostic warning when every carrier comes up empty, so operators can spot
/// misdelivered tokens without breaking the call.
#[derive(Default)]
pub struct CarrierChain {
	carriers: Vec<Arc<dyn TokenSource>>,
}
impl CarrierChain {
	/// Creates an empty chain.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a carrier to the end of the lookup order.
	pub fn with_carrier(mut self, carrier: impl TokenSource + 'static) -> Self {
		self.carriers.push(Arc::new(carrier));

		self
	}
}
impl TokenSource for CarrierChain {
	fn token(&self) -> Option<Token> {
		if let Some(token) = self.carriers.iter().find_map(|carrier| carrier.token()) {
			return Some(token);
		}

		obs::diagnostic_warning(GuardStage::TokenLookup, "Anti-forgery token not found.");

		None
	}
}

/// Carrier that reads a named cookie out of a raw `Cookie` header snapshot.
///
/// The `read` closure is invoked on every lookup so the token stays fresh across server-side
/// rotations; it returns the raw header line (`a=1; b=2`) or `None` when no cookies exist. Values
/// are percent-decoded.
pub struct CookieCarrier<F> {
	name: String,
	read: F,
}
impl<F> CookieCarrier<F>
where
	F: Fn() -> Option<String> + Send + Sync,
{
	/// Creates a carrier for the cookie `name` backed by `read`.
	pub fn new(name: impl Into<String>, read: F) -> Self {
		Self { name: name.into(), read }
	}
}
impl<F> TokenSource for CookieCarrier<F>
where
	F: Fn() -> Option<String> + Send + Sync,
{
	fn token(&self) -> Option<Token> {
		cookie_value(&(self.read)()?, &self.name).map(Token::new)
	}
}

/// Carrier that scans an HTML document snapshot for `<meta name="..." content="...">`.
///
/// The `read` closure returns the current document markup; the carrier yields the `content`
/// attribute of the first matching element. Both quote styles are accepted.
pub struct MetaCarrier<F> {
	name: String,
	read: F,
}
impl<F> MetaCarrier<F>
where
	F: Fn() -> Option<String> + Send + Sync,
{
	/// Creates a carrier for the meta element named `name` backed by `read`.
	pub fn new(name: impl Into<String>, read: F) -> Self {
		Self { name: name.into(), read }
	}
}
impl<F> TokenSource for MetaCarrier<F>
where
	F: Fn() -> Option<String> + Send + Sync,
{
	fn token(&self) -> Option<Token> {
		meta_content(&(self.read)()?, &self.name).map(Token::new)
	}
}

fn cookie_value(header: &str, name: &str) -> Option<String> {
	header
		.split(';')
		.filter_map(|pair| pair.trim().split_once('='))
		.find(|(key, _)| *key == name)
		.map(|(_, value)| percent_decode_str(value).decode_utf8_lossy().into_owned())
}

fn meta_content(html: &str, name: &str) -> Option<String> {
	let mut rest = html;

	while let Some(start) = rest.find("<meta") {
		let tag = &rest[start..];
		let end = tag.find('>')?;
		let tag = &tag[..end];

		if attr_value(tag, "name").is_some_and(|value| value == name) {
			return attr_value(tag, "content").map(str::to_owned);
		}

		rest = &rest[start + end..];
	}

	None
}

fn attr_value<'h>(tag: &'h str, attr: &str) -> Option<&'h str> {
	for quote in ['"', '\''] {
		let needle = format!("{attr}={quote}");

		if let Some(start) = tag.find(&needle) {
			let value = &tag[start + needle.len()..];

			return value.find(quote).map(|end| &value[..end]);
		}
	}

	None
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::*;

	const DOCUMENT: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width">
<meta name='csrf-token' content='meta-token'>
</head>
<body></body>
</html>"#;

	#[test]
	fn token_formatters_redact() {
		let token = Token::new("super-secret");

		assert_eq!(format!("{token:?}"), "Token(\"<redacted>\")");
		assert_eq!(format!("{token}"), "<redacted>");
		assert_eq!(token.expose(), "super-secret");
	}

	#[test]
	fn cookie_carrier_finds_and_decodes_named_cookie() {
		let carrier = CookieCarrier::new("csrf_access_token", || {
			Some("theme=dark; csrf_access_token=abc%2F123; lang=en".into())
		});

		assert_eq!(carrier.token().unwrap().expose(), "abc/123");

		let carrier = CookieCarrier::new("csrf_access_token", || Some("theme=dark".into()));

		assert!(carrier.token().is_none());
	}

	#[test]
	fn meta_carrier_accepts_both_quote_styles() {
		let carrier = MetaCarrier::new("csrf-token", || Some(DOCUMENT.into()));

		assert_eq!(carrier.token().unwrap().expose(), "meta-token");

		let double = r#"<meta name="csrf-token" content="double-quoted">"#;
		let carrier = MetaCarrier::new("csrf-token", || Some(double.into()));

		assert_eq!(carrier.token().unwrap().expose(), "double-quoted");

		let carrier = MetaCarrier::new("missing", || Some(DOCUMENT.into()));

		assert!(carrier.token().is_none());
	}

	#[test]
	fn chain_yields_first_hit_in_order() {
		let chain = CarrierChain::new()
			.with_carrier(StaticTokenSource::absent())
			.with_carrier(StaticTokenSource::present("from-cookie"))
			.with_carrier(StaticTokenSource::present("from-meta"));

		assert_eq!(chain.token().unwrap().expose(), "from-cookie");

		let chain = CarrierChain::new()
			.with_carrier(StaticTokenSource::absent())
			.with_carrier(StaticTokenSource::absent());

		assert!(chain.token().is_none());
		assert!(CarrierChain::new().token().is_none());
	}
}
