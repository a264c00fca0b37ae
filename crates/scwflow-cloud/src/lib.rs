//! scwflow Cloud Harness
//!
//! This crate provides the resource reconciliation harness shared by every
//! scwflow resource: it turns a declared desired state into idempotent
//! remote operations and drives the cloud's asynchronous state machines to
//! a terminal state.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  host runtime                    │
//! │            (JSON-lines over stdio)               │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                scwflow-cloud                     │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  Provider registry / Lifecycle driver    │   │
//! │  │  trait Resource { ... }                  │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────┐ ┌──────────┐ ┌────────────────┐   │
//! │  │ Locality │ │  Waiter  │ │ Endpoint/Sets  │   │
//! │  │   & IDs  │ │  Retry   │ │  reconcilers   │   │
//! │  └──────────┘ └──────────┘ └────────────────┘   │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//!           ┌───────▼────────┐
//!           │ scwflow-cloud- │
//!           │    scaleway    │
//!           └────────────────┘
//! ```

pub mod action;
pub mod change;
pub mod context;
pub mod data_source;
pub mod diag;
pub mod endpoint;
pub mod error;
pub mod id;
pub mod lifecycle;
pub mod locality;
pub mod provider;
pub mod retry;
pub mod schema;
pub mod sets;
pub mod sweeper;
pub mod waiter;

// Re-exports
pub use action::{Action, ActionType, ApplyResult, Plan, PlanSummary};
pub use change::{ChangeSet, MutationGroup, MutationTable, PlanAdjustment, forbid_shrink};
pub use context::{Defaults, Meta, OpContext, WaitSettings};
pub use data_source::{DataSource, DataSourceHandler, Lookup, Lookups, Scope, find_exact};
pub use diag::{Diagnostic, Diagnostics, Severity};
pub use endpoint::{Endpoint, EndpointBackend, EndpointKind, EndpointSpec};
pub use error::{CloudError, ErrorKind, OptionalExt, Result};
pub use id::{LocalizedId, NestedId, RegionalId, ZonedId};
pub use lifecycle::{Lifecycle, PlanResponse, Resource, ResourceData, ResourceHandler, Response};
pub use locality::{Locality, Region, Zone};
pub use provider::{Builder, Provider, ProviderSchema, Registry, Request, RpcResponse};
pub use retry::retry_on_conflict;
pub use schema::{Attribute, AttributeType, Schema, Timeouts};
pub use sweeper::{SweepReport, sweep};
pub use waiter::{HasStatus, Status, Until, Waiter};
