//! Navigation, search and session state over a [`LogView`](crate::view_state::LogView).

pub mod call_stack;
pub mod search;
pub mod session;

pub use call_stack::{
    call_stack, end_of_method, find_caller, find_caller_by_depth, go_to_caller,
    go_to_end_of_method, NavTarget,
};
pub use search::{Direction, SearchEngine, SearchOutcome};
pub use session::{LogSession, SessionEvent, SessionOptions};
