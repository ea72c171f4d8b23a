//! Convenient imports for typical `pgmodel` usage.
//!
//! ```ignore
//! use pgmodel::prelude::*;
//! ```

pub use crate::{
    Connection, Database, Direction, Entity, Fetched, Filter, Model, ModelConfig, OrderPolicy,
    OrmError, OrmResult, PostLoadFn, Record, Saved, Value,
};
