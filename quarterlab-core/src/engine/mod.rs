//! Signal engine: feature computation and per-bar classification.

pub mod features;
pub mod frame;
pub mod signalize;

pub use features::{add_features, ConfluenceConfig, FeatureConfig, DEFAULT_ATR_PERIOD};
pub use frame::{
    BarRow, Column, HelperColumns, SignalFrame, ATR_COLUMN, BAR_FIELDS, HELPER_COLUMNS,
    SESSION_COLUMN,
};
pub use signalize::{confluence_signal, evaluate_condition, signalize, SignalCounts};
