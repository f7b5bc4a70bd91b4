//! # warden-acl
//!
//! Object-level ACL authorization engine for the Warden platform.
//!
//! Stores, grants, revokes, and enumerates per-object, per-principal
//! permissions using the class / SID / object-identity / entry model:
//!
//! - A **class** row per protected domain type
//! - A **SID** row per principal or granted authority
//! - An **object identity** row per protected object instance
//! - An **entry** row per (identity, SID, mask) grant, ordered by `ace_order`
//!
//! Two interchangeable engine strategies implement the same
//! [`PermissionService`] contract: [`engine::repository`] is self-contained
//! over an [`store::AclStore`], while [`engine::delegating`] wraps an external
//! [`engine::delegating::AclBackend`]. The choice is a wiring decision, not a
//! behavioural one.
//!
//! Management tooling uses [`admin::AclAdministrationService`] for direct CRUD
//! over the four stores.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

pub mod admin;
pub mod engine;
pub mod error;
pub mod store;

pub use admin::{AclAdministrationService, EntryCreate, ObjectIdentityCreate};
pub use engine::delegating::{AclBackend, DelegatingPermissionService, StoreAclBackend};
pub use engine::repository::RepositoryPermissionService;
pub use engine::PermissionService;
pub use error::{Error, Result};
pub use store::memory::MemoryAclStore;
pub use store::sqlite::SqliteAclStore;
pub use store::AclStore;
