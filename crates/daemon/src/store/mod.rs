// Durable storage: live workspace document, per-project archive, and the
// newest-wins resolver between them.

pub mod archive;
pub mod pending;
pub mod resolver;
pub mod workspace;
