// cutsync-common: shared types and pure sync logic for the Cutsync workspace

pub mod fingerprint;
pub mod merge;
pub mod path;
pub mod protocol;
pub mod types;
