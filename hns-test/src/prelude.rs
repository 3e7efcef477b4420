//! Common imports for tests.

pub use crate::init;

pub use color_eyre::eyre::{eyre, Report, Result};
pub use pretty_assertions::{assert_eq, assert_ne};
pub use spandoc::spandoc;
pub use tracing::{debug, error, info, span, trace, warn, Level};
