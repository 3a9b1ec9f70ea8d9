//! Client-side anti-forgery request guard—attach CSRF tokens to mutating calls, detect session
//! expiry, and surface typed failures in one crate built for browser-backed frontends.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod error;
pub mod guard;
pub mod obs;
pub mod session;
pub mod token;
pub mod transport;

#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for tests; enabled via `cfg(test)` or the `test` crate
	//! feature.

	pub use crate::_prelude::*;

	// self
	use crate::token::{Token, TokenSource};

	/// Token source that always yields the same fixed token, or nothing at all.
	#[derive(Clone, Debug)]
	pub struct StaticTokenSource(Option<Token>);
	impl StaticTokenSource {
		/// Builds a source that always yields `value`.
		pub fn present(value: &str) -> Self {
			Self(Some(Token::new(value)))
		}

		/// Builds a source that never yields a token.
		pub fn absent() -> Self {
			Self(None)
		}
	}
	impl TokenSource for StaticTokenSource {
		fn token(&self) -> Option<Token> {
			self.0.clone()
		}
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::Deserialize;
	pub use thiserror::Error as ThisError;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use http;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {httpmock as _, tokio as _};
