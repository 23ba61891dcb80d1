//! Task function contract.
//!
//! A task function is the computation a job runs. The orchestration core
//! only sees it through [`TaskFunction`]: parameters in, structured result
//! or typed failure out.

mod context;
mod error;
mod registry;
mod traits;

pub use context::*;
pub use error::*;
pub use registry::*;
pub use traits::*;
