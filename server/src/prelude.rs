pub use idplat_core::App;
pub use idplat_types::error::{ClResult, Error};
pub use idplat_types::types::{Client, TnId, Timestamp};

pub use tracing::{debug, debug_span, error, error_span, info, info_span, warn, warn_span};

// vim: ts=4
