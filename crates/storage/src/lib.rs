#![forbid(unsafe_code)]

pub mod blob;
pub mod course_repo;
pub mod repository;
pub mod sqlite;

pub use blob::{BlobRef, BlobStore, InMemoryBlobStore};
pub use course_repo::{CourseKeys, CourseRepository};
pub use repository::{InMemoryStore, KeyValueStore, Storage, StorageError};
