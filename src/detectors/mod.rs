//! Pattern detectors
//!
//! # Detectors
//!
//! - **NR7 breakout**: narrow-range consolidation bar followed by a directional close
//!   outside the consolidation range.
//! - **Swing points**: tops and bottoms feeding the Fibonacci matcher.
//! - **Fibonacci**: retracement/extension ratios of turning-point triples.

pub mod helpers;

/// Generate `with_defaults()` -> `Self::default()` for multiple detector types.
macro_rules! impl_with_defaults {
  ($($detector:ty),* $(,)?) => {
    $(impl $detector {
      pub fn with_defaults() -> Self { Self::default() }
    })*
  };
}

pub mod fibonacci;
pub mod nr7;
pub mod swing;

// Re-export all detectors for convenience
pub use fibonacci::*;
pub use helpers::*;
pub use nr7::*;
pub use swing::*;
