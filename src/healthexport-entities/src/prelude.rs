//! `SeaORM` Entity prelude

pub use super::blobs::Entity as Blobs;
