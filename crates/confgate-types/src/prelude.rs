pub use crate::error::{CgResult, Error};
pub use crate::types::{Record, Tenant};

pub use tracing::{debug, error, info, trace, warn};

// vim: ts=4
