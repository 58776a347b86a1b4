//! # Roster Sync Engine
//!
//! Brings a declared roster of users into the requested state on a project
//! hosted by a Directory Service, with accounts owned by an Organization
//! Provisioning Service.
//!
//! ## Architecture
//!
//! Remote systems are reached only through two capability traits, so the
//! decision logic never deals with sessions or tokens:
//!
//! - [`DirectoryService`] - project members, roles, attributes, data filters,
//!   invitations
//! - [`ProvisioningService`] - organization projects and accounts
//!
//! A run is built from these pieces:
//!
//! 1. [`preflight`] verifies the authenticating identity may administer the
//!    project.
//! 2. [`DirectorySnapshot`] and [`RoleMapping`] capture the start-of-run state.
//! 3. [`reconciler::classify`] turns each [`DesiredUserRow`] into an
//!    [`ActionPlan`].
//! 4. [`ActionExecutor`] interprets the plan step by step, compiling data
//!    filters with [`muf`] and recording every step to an [`AuditSink`].
//!
//! ## Crate Organization
//!
//! - [`model`] - roster rows, roles, actions, membership records
//! - [`services`] - capability traits and their wire-neutral types
//! - [`snapshot`] - start-of-run membership snapshot
//! - [`roles`] - platform role to directory role mapping
//! - [`reconciler`] - membership state machine
//! - [`muf`] - data filter parsing, compilation and materialization
//! - [`executor`] - plan interpreter
//! - [`audit`] - audit entries and sinks
//! - [`roster`] - roster CSV reader
//! - [`runner`] - run orchestration

pub mod audit;
pub mod error;
pub mod executor;
pub mod model;
pub mod muf;
pub mod preflight;
pub mod reconciler;
pub mod roles;
pub mod roster;
pub mod runner;
pub mod services;
pub mod snapshot;

pub use audit::{AuditEntry, AuditSink, AuditStep, CsvAuditSink, MemoryAuditSink};
pub use error::{ConfigurationError, SyncError, SyncResult};
pub use executor::{ActionExecutor, RowOutcome};
pub use model::{DesiredUserRow, MemberStatus, PlatformRole, RequestedAction, RosterRecord};
pub use muf::{AttributeCatalog, CompiledExpression, MufError, MufSpec};
pub use reconciler::{ActionPlan, EnableTarget, ReconcileContext};
pub use roles::RoleMapping;
pub use runner::{PreparedRun, RunSummary, SyncOptions, SyncRunner};
pub use services::{DirectoryService, ProvisioningService, ServiceError, ServiceResult};
pub use snapshot::DirectorySnapshot;
