//! Signed-in identity snapshot.

// self
use crate::{_prelude::*, auth::PrincipalId};

/// Identity of the signed-in user as reported by the credential source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
	/// Stable identifier assigned by the identity provider.
	pub uid: PrincipalId,
	/// Contact address, when the provider exposes one.
	pub email: Option<String>,
	/// Human-readable name chosen at sign-up or in settings.
	pub display_name: Option<String>,
	/// Whether the provider verified the contact address.
	pub email_verified: bool,
}
impl Principal {
	/// Creates a principal with only its identifier populated.
	pub fn new(uid: PrincipalId) -> Self {
		Self { uid, email: None, display_name: None, email_verified: false }
	}

	/// Sets the contact address.
	pub fn with_email(mut self, email: impl Into<String>, verified: bool) -> Self {
		self.email = Some(email.into());
		self.email_verified = verified;

		self
	}

	/// Sets the display name. Empty names are ignored.
	pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
		let name = name.into();

		if !name.trim().is_empty() {
			self.display_name = Some(name);
		}

		self
	}

	/// Returns the display name, falling back to the contact address and then the identifier.
	pub fn label(&self) -> &str {
		self.display_name.as_deref().or(self.email.as_deref()).unwrap_or(self.uid.as_ref())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn label_falls_back_through_fields() {
		let uid = PrincipalId::new("uid-1").expect("Principal fixture should be valid.");
		let bare = Principal::new(uid.clone());

		assert_eq!(bare.label(), "uid-1");

		let with_email = bare.clone().with_email("ana@example.com", true);

		assert_eq!(with_email.label(), "ana@example.com");
		assert!(with_email.email_verified);

		let named = with_email.with_display_name("Ana");

		assert_eq!(named.label(), "Ana");
		assert_eq!(Principal::new(uid).with_display_name("   ").display_name, None);
	}
}
