//! Typed identifiers for principals and short links.
//!
//! Issued identifiers (backend short-link ids, provider principal ids) only need to be non-empty.
//! Caller-chosen custom ids go through [`ShortId::custom`], which also rejects whitespace and
//! values longer than [`CUSTOM_ID_MAX_LEN`].

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

/// Longest custom short-link id accepted from callers, in bytes.
pub const CUSTOM_ID_MAX_LEN: usize = 128;

macro_rules! def_id {
	($name:ident, $kind:literal, $doc:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Wraps an issued identifier, rejecting only empty values.
			pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
				Self::try_from(value.into())
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				if value.is_empty() {
					Err(IdentifierError::Empty { kind: $kind })
				} else {
					Ok(Self(value))
				}
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &str {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, "{}({:?})", stringify!($name), self.0)
			}
		}
	};
}

def_id! { PrincipalId, "Principal", "Stable identifier of a signed-in principal." }
def_id! { ShortId, "Short link", "Identifier of a short link, backend-generated or custom." }

impl ShortId {
	/// Validates a caller-chosen custom id before it is submitted to the backend.
	pub fn custom(value: &str) -> Result<Self, IdentifierError> {
		const KIND: &str = "Custom short link";

		if value.chars().any(char::is_whitespace) {
			return Err(IdentifierError::ContainsWhitespace { kind: KIND });
		}
		if value.len() > CUSTOM_ID_MAX_LEN {
			return Err(IdentifierError::TooLong { kind: KIND, max: CUSTOM_ID_MAX_LEN });
		}

		Self::new(value)
	}
}

/// Rejection reasons for identifier values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// Nothing was supplied.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Identifier kind, e.g. `Short link`.
		kind: &'static str,
	},
	/// A custom id contained whitespace.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Identifier kind.
		kind: &'static str,
	},
	/// A custom id was longer than allowed.
	#[error("{kind} identifier exceeds {max} bytes.")]
	TooLong {
		/// Identifier kind.
		kind: &'static str,
		/// Inclusive byte limit.
		max: usize,
	},
}
