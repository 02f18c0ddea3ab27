//! `SeaORM` Entity definitions

pub mod prelude;

pub mod blobs;
