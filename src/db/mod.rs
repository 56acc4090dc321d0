pub mod memory;
pub mod models;
pub mod repository;
pub mod sqlite;

pub use memory::MemoryRepository;
pub use repository::DrawRepository;
pub use sqlite::SqliteRepository;
