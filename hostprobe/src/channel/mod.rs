//! Shell command channel protocol.
//!
//! This module turns the raw byte stream of an exec channel into output
//! rows, answering or aborting on elevation prompts along the way.

mod exchange;
mod lines;
mod patterns;

pub use exchange::{CommandOutput, Exchange, ExchangeOutcome};
pub use lines::LineBuffer;
pub use patterns::{ElevationPatterns, LineClass};
