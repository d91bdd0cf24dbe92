/// Asset mirror downloader.
///
/// Resolves wrapped catalog URLs, fetches each asset under per-host admission
/// control with bounded retry, stores bodies content-addressed, and records
/// every outcome in a resumable checkpoint.
pub mod config;
pub mod fetch;
pub mod flush;
pub mod orchestrator;
pub mod resolver;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;
