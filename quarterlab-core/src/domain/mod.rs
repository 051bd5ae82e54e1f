//! Domain types for QuarterLab

pub mod bar;
pub mod session;
pub mod signal;

pub use bar::{validate_series, Bar, BarError};
pub use session::Session;
pub use signal::{Side, Signal, TradeAction};
