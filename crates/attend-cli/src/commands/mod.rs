pub mod auth_cmd;
pub mod check_in;
pub mod common;
pub mod config;
pub mod queue;
pub mod status;
pub mod sync;
pub mod watch;
