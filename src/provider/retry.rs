//! Refresh-and-retry policy for authorized requests.

// self
use crate::_prelude::*;

/// Response statuses that trigger one refresh-and-retry in an authorized request.
///
/// Defaults to `401` only. Some providers answer `403` for an expired token; opt in with
/// [`RetryPolicy::with_forbidden`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
	statuses: Vec<u16>,
}
impl RetryPolicy {
	/// Builds a policy from an explicit status list.
	pub fn new(statuses: impl IntoIterator<Item = u16>) -> Self {
		let mut statuses = statuses.into_iter().collect::<Vec<_>>();

		statuses.sort_unstable();
		statuses.dedup();

		Self { statuses }
	}

	/// Adds `403 Forbidden` to the refresh-worthy set.
	pub fn with_forbidden(self) -> Self {
		Self::new(self.statuses.into_iter().chain([403]))
	}

	/// Returns true when `status` warrants a refresh and a single resend.
	pub fn is_refresh_worthy(&self, status: u16) -> bool {
		self.statuses.binary_search(&status).is_ok()
	}

	/// Statuses in the policy, ascending.
	pub fn statuses(&self) -> &[u16] {
		&self.statuses
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self::new([401])
	}
}
