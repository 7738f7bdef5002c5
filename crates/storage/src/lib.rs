#![forbid(unsafe_code)]

pub mod cache;
pub mod http;
pub mod pagination;
pub mod repository;

pub use cache::{EntityCache, Keyed};
pub use http::{CredentialProvider, HttpBackend, StaticCredentials};
pub use pagination::{Page, collect_pages};
pub use repository::{
    EventRepository, GraduationRepository, InMemoryRepository, ProgressUpdate,
    RequirementRepository, Storage, StorageError, UserRepository,
};
