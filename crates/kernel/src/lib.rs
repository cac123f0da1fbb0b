//! Core types for the provisioner: layered settings, the admin backend seam,
//! and the fail-fast step pipeline.

pub mod backend;
pub mod error;
pub mod pipeline;
pub mod settings;
pub mod step;

pub use backend::{AdminBackend, NewUser, RoleGrant};
pub use error::{EntityKind, ProvisionError};
pub use pipeline::{Pipeline, ProvisionReport};
pub use settings::{ExistingPolicy, Secret, Settings};
pub use step::{StatusSink, StdoutSink, Step, StepCtx, StepOutcome, StepSummary};
