// cutsync-daemon library entry point.

pub mod archiver;
pub mod config;
pub mod hub;
pub mod rpc;
pub mod runtime;
pub mod store;
pub mod watcher;
