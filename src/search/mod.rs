//! Successor generation and work scheduling for both search directions.
//!
//! - [`forward`]: crate pushes from the start layout
//! - [`reverse`]: crate pulls from the solved layout
//! - [`evaluator`]: the direction-independent expand/deduplicate/link loop
//! - [`backlog`]: the FIFO of nodes waiting to be expanded

pub mod backlog;
pub mod evaluator;
pub mod forward;
pub mod reverse;

pub use backlog::{Acquire, Backlog};
pub use evaluator::{Evaluation, Evaluator, Expander, Found, Move, MoveList, Successor};
pub use forward::ForwardExpander;
pub use reverse::ReverseExpander;
