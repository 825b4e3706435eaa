pub mod bus;
pub mod config;
pub mod control;
pub mod diagnostics;
pub mod direction;
pub mod emergency;
pub mod error;
pub mod peripheral;
pub mod phase;
pub mod presence;
pub mod sensor;
pub mod siren;
pub mod state;
pub mod timing;
