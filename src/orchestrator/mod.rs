//! Dispatch orchestration.
//!
//! Two strategies over the same queue store:
//!
//! - **Sequential ("power")**: one agent, one lead at a time, strict
//!   position order. Simple mental model, no over-dial waste.
//! - **Parallel**: a bounded batch sized by `ceil(concurrency * dial_ratio)`,
//!   trading controlled over-dial for agent utilization; answered calls wait
//!   briefly in the routing bridge for an available agent.
//!
//! Both strategies follow the claim-then-call discipline described in
//! [`core::DialerEngine`].

pub mod core;
pub mod types;

pub use core::DialerEngine;
pub use types::{DispatchedCall, ItemError, ParallelRunReport};
