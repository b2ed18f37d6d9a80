//! Injectable time source and the expiry arithmetic every staleness decision goes through.

// crates.io
use time::{
	PrimitiveDateTime, UtcOffset,
	format_description::well_known::Rfc3339,
	macros::format_description,
};
// self
use crate::_prelude::*;

/// Source of "now" used by credentials when deciding whether a token is stale.
pub trait Clock
where
	Self: Send + Sync,
{
	/// Current instant.
	fn now(&self) -> OffsetDateTime;
}

/// Wall-clock UTC time; the default for every credential.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// Settable clock for deterministic tests.
///
/// Clones share the same instant, so a test can keep one handle while credentials hold another.
#[derive(Clone, Debug)]
pub struct ManualClock(Arc<Mutex<OffsetDateTime>>);
impl ManualClock {
	/// Creates a clock frozen at `at`.
	pub fn new(at: OffsetDateTime) -> Self {
		Self(Arc::new(Mutex::new(at)))
	}

	/// Moves the clock to `at`.
	pub fn set(&self, at: OffsetDateTime) {
		*self.0.lock() = at;
	}

	/// Moves the clock forward by `delta`.
	pub fn advance(&self, delta: Duration) {
		let mut now = self.0.lock();

		*now += delta;
	}
}
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		*self.0.lock()
	}
}

/// Remaining lifetime of a token, negative once it has passed.
///
/// An absent expiry means the token never expires (or the lifetime is unknown) and yields
/// [`Duration::MAX`].
pub fn expires_in(now: OffsetDateTime, expiry: Option<OffsetDateTime>) -> Duration {
	match expiry {
		Some(expiry) => expiry - now,
		None => Duration::MAX,
	}
}

/// Returns `true` once no lifetime remains.
pub fn is_expired(now: OffsetDateTime, expiry: Option<OffsetDateTime>) -> bool {
	expires_in(now, expiry) <= Duration::ZERO
}

/// Absolute expiry for a token issued at `now` with a declared lifetime in seconds.
pub fn expiry_from_lifetime(now: OffsetDateTime, lifetime_secs: i64) -> Option<OffsetDateTime> {
	now.checked_add(Duration::seconds(lifetime_secs))
}

/// Formats an expiry in the persisted `YYYY-MM-DDTHH:MM:SSZ` form.
pub fn format_expiry(at: OffsetDateTime) -> Result<String, time::error::Format> {
	at.to_offset(UtcOffset::UTC)
		.format(format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z"))
}

/// Parses a persisted expiry.
///
/// Accepts the persisted form and RFC 3339; anything else is treated as "no expiry known".
pub fn parse_expiry(raw: &str) -> Option<OffsetDateTime> {
	let raw = raw.trim();

	PrimitiveDateTime::parse(
		raw,
		format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z"),
	)
	.map(PrimitiveDateTime::assume_utc)
	.or_else(|_| OffsetDateTime::parse(raw, &Rfc3339))
	.ok()
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	#[test]
	fn remaining_lifetime_goes_negative_after_expiry() {
		let now = datetime!(2026-01-01 12:00 UTC);

		assert_eq!(expires_in(now, Some(now + Duration::seconds(30))), Duration::seconds(30));
		assert_eq!(expires_in(now, Some(now - Duration::seconds(5))), Duration::seconds(-5));
		assert!(is_expired(now, Some(now)));
		assert!(!is_expired(now, Some(now + Duration::seconds(1))));
	}

	#[test]
	fn absent_expiry_never_expires() {
		let now = datetime!(2026-01-01 12:00 UTC);

		assert_eq!(expires_in(now, None), Duration::MAX);
		assert!(!is_expired(now, None));
	}

	#[test]
	fn manual_clock_is_shared_between_clones() {
		let clock = ManualClock::new(datetime!(2026-01-01 00:00 UTC));
		let other = clock.clone();

		clock.advance(Duration::minutes(90));

		assert_eq!(other.now(), datetime!(2026-01-01 01:30 UTC));

		other.set(datetime!(2030-06-01 00:00 UTC));

		assert_eq!(clock.now(), datetime!(2030-06-01 00:00 UTC));
	}

	#[test]
	fn expiry_formatting_matches_persisted_layout() {
		let at = datetime!(2026-03-04 05:06:07 +02:00);
		let formatted = format_expiry(at).expect("Expiry should format.");

		assert_eq!(formatted, "2026-03-04T03:06:07Z");
		assert_eq!(parse_expiry(&formatted), Some(datetime!(2026-03-04 03:06:07 UTC)));
	}

	#[test]
	fn expiry_parsing_is_lenient() {
		assert_eq!(
			parse_expiry("2026-03-04T03:06:07.25+00:00"),
			Some(datetime!(2026-03-04 03:06:07.25 UTC))
		);
		assert_eq!(parse_expiry("not-a-date"), None);
		assert_eq!(parse_expiry(""), None);
	}
}
