//! Port traits at the boundary between the core and its collaborators.

pub mod config_port;
pub mod marker_port;
pub mod price_port;
