//! Formatting helpers.

use std::fmt;

/// Wrapper that forwards a value's `Display` impl to `Debug`.
///
/// Useful for embedding hashes in `debug_struct` output without the
/// tuple-struct noise.
pub struct DisplayToDebug<T>(pub T);

impl<T> fmt::Debug for DisplayToDebug<T>
where
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
