//! Registry trait for self-registering implementations.

/// Base trait for implementation registries.
///
/// Each pluggable implementation (storage backends, signing accounts) provides
/// a `Registry` struct that names itself as it appears in configuration and
/// hands out its factory function.
pub trait ImplementationRegistry {
	/// The key under `<section>.implementations` that selects this
	/// implementation, for example `"file"` or `"local"`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
