pub use confgate_types::prelude::*;

// vim: ts=4
