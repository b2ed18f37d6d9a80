//! Process environment as seen by discovery.

// std
use std::collections::BTreeMap;
// self
use crate::_prelude::*;

/// Read-only view of environment variables and the host platform.
pub trait Environment
where
	Self: Send + Sync,
{
	/// Value of `key`, or `None` when unset or not valid Unicode.
	fn var(&self, key: &str) -> Option<String>;

	/// Returns true on Windows hosts, which keep configuration under `%APPDATA%`.
	fn is_windows(&self) -> bool;
}

/// The real process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsEnvironment;
impl Environment for OsEnvironment {
	fn var(&self, key: &str) -> Option<String> {
		std::env::var(key).ok()
	}

	fn is_windows(&self) -> bool {
		cfg!(windows)
	}
}

/// Fixed environment for tests and sandboxed discovery.
#[derive(Clone, Debug, Default)]
pub struct StaticEnvironment {
	vars: BTreeMap<String, String>,
	windows: bool,
}
impl StaticEnvironment {
	/// Sets a variable.
	pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.vars.insert(key.into(), value.into());

		self
	}

	/// Pretends to run on Windows.
	pub fn windows(mut self) -> Self {
		self.windows = true;

		self
	}
}
impl Environment for StaticEnvironment {
	fn var(&self, key: &str) -> Option<String> {
		self.vars.get(key).cloned()
	}

	fn is_windows(&self) -> bool {
		self.windows
	}
}
