/// Shared building blocks for the asset mirror: catalog model, errors,
/// per-destination admission control and the resumable checkpoint store.
pub mod checkpoint;
pub mod errors;
pub mod limiter;
pub mod models;
