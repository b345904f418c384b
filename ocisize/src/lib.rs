//! ocisize
//! =======
//!
//! Report the size of every platform of a container image without pulling it.
//!
//! Only manifests are fetched from the registry. The size of a platform is the
//! sum of the config and layer sizes its manifest declares, i.e. the compressed
//! size transferred on `docker pull`.

pub mod cancel;
pub mod config;
pub mod distribution;
pub mod error;
pub mod media_types;
pub mod resolve;
pub mod size;

mod digest;
mod image_name;
mod query;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cancel::Cancellation;
pub use digest::Digest;
pub use image_name::ImageName;
pub use query::{query, query_with, QueryOptions, QueryResult};
pub use size::{human_size, PlatformSize};
