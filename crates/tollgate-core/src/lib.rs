//! # Tollgate Core
//!
//! Core types and collaborator seams for the tollgate request pipeline.
//!
//! This crate provides the foundational types used throughout tollgate:
//!
//! - [`RequestId`] - UUID v7 request identifier
//! - [`Claims`] / [`Role`] - verified caller identity extracted from a credential
//! - [`AppError`] / [`ErrCode`] - the two-tier trusted/untrusted error model
//!   with its fixed transport status table
//! - [`store`] - narrow interfaces to the external collaborators (database
//!   transactions, entity lookups)
//! - [`fixtures`] - in-memory collaborators for tests and local development

#![doc(html_root_url = "https://docs.rs/tollgate-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod claims;
mod context;
mod error;
pub mod fixtures;
pub mod store;

pub use claims::{Claims, Role, RoleParseError};
pub use context::RequestId;
pub use error::{AppError, ErrCode, Error, FieldError};

use std::future::Future;
use std::pin::Pin;

/// A boxed future, the type-erased shape of every async seam in the pipeline.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
