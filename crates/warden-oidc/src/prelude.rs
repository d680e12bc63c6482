pub use warden_core::app::App;
pub use warden_types::prelude::*;

// vim: ts=4
