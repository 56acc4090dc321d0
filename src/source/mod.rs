pub mod calendar;
pub mod dataset;
pub mod official;

pub use dataset::{DatasetCache, RemoteFetcher};
pub use official::{DrawSource, OfficialDrawClient};
