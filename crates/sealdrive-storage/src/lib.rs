pub mod factory;
pub mod provider;
pub mod runtime;
pub mod s3;
pub mod yandex;

pub use provider::{BlockingStorageBackend, StorageBackend};
pub use runtime::{Blocking, Offloaded};
