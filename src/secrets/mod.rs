//! Secret Store access.
//!
//! The bridge talks to a Vault-shaped secrets engine for three things:
//! revocation lookups on PKI mounts, provisioning of per-principal mounts,
//! policies and auth roles, and certificate issuance/revocation through a
//! principal-scoped session.
//!
//! # Architecture
//!
//! Everything goes through the [`SecretStore`] trait:
//! - **read / write / list**: generic logical-path operations
//! - **mount**: enable a secrets engine, treating an existing mount as success
//! - **login_jwt**: exchange a bearer JWT for a principal-scoped session
//! - **health**: reachability probe for `/healthz`
//!
//! [`VaultSecretStore`] is built on a `vaultrs` client;
//! [`InMemorySecretStore`] is the double used by tests.

pub mod error;
pub mod memory;
pub mod store;
pub mod types;
pub mod vault;

pub use error::{Result, SecretsError};
pub use memory::{InMemorySecretStore, StoreCall, StoreOp};
pub use store::SecretStore;
pub use types::{MountOutcome, MountRequest, SecretData, SecretString};
pub use vault::VaultSecretStore;
