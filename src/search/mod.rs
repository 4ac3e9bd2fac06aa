//! Search request normalization and multi-backend dispatch.

mod dispatcher;
mod invocation;

pub use dispatcher::{DispatchError, DispatchOutcome, NO_RESULTS_ANSWER, SearchDispatcher};
pub use invocation::{AskParams, EmptyQuery, SearchInvocation, normalize};
