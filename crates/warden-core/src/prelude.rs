pub use crate::app::App;
pub use warden_types::prelude::*;

// vim: ts=4
