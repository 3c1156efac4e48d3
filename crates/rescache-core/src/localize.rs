//! Tooltip localization
//!
//! Resource names are turned into display tooltips by the embedding
//! application's translation layer. The cache treats the result as opaque.

/// Converts a raw resource name into a display tooltip
pub trait Localizer: Send + Sync {
    fn tooltip(&self, name: &str) -> String;
}

/// Localizer that returns the name unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Localizer for Passthrough {
    fn tooltip(&self, name: &str) -> String {
        name.to_string()
    }
}

impl<F> Localizer for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn tooltip(&self, name: &str) -> String {
        self(name)
    }
}
