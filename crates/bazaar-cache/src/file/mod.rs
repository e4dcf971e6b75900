//! Local file-backed cache provider.

pub mod store;

pub use store::FileCacheProvider;
