//! PTA content management core.
//!
//! Two loosely related capabilities for a city PTA site: restricting content
//! editing to the block (区連) a user belongs to, and generating ASCII or
//! translated URL slugs for Japanese post titles. The host integration layer
//! drives this library through the seams in [`extension`]; storage is
//! abstracted behind the traits in [`store`].

pub mod access;
pub mod app;
pub mod charset;
pub mod error;
pub mod extension;
pub mod models;
pub mod pipeline;
pub mod roles;
pub mod settings;
pub mod slug;
pub mod store;
pub mod translate;

pub use app::{App, Stores};
pub use error::{Error, Result};
