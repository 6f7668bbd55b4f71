//! Case review: text parsing and the per-module review session.

mod parser;
mod session;

pub use parser::{parse, ParsedCase, EXPECTED_RESULT_PLACEHOLDER};
pub use session::{
    action_for_key, CaseReviewSession, CurrentCase, ReviewAction, ReviewState,
    MODULE_FINISHED_RETURN_DELAY,
};
