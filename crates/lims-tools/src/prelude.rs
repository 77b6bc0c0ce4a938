//! Prelude module - common imports for lims-tools users
//!
//! ```rust
//! use lims_tools::prelude::*;
//! ```

pub use crate::{
    // Audit
    AuditTrail,
    // Host contracts
    Environment,
    FormulaCatalog,
    // Formula engine
    FormulaEngine,
    FormulaEntity,
    FormulaTemplate,
    FormulaValue,
    MemoryLogStore,
    // In-memory hosts
    MemoryRecord,
    MemorySchema,
    MemoryStore,
    ObjectStore,
    OriginRegistry,
    Record,
    RecordRef,
    Solution,
    TrackingPolicy,
    Value,
    Values,
};
