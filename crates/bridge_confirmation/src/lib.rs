//! The confirmation pipeline: deciding which foreign transfers still need
//! this validator's confirmation, and getting those confirmations onto the
//! home chain.

pub mod sender;
pub mod task_planner;

pub use sender::{
    ConfirmationSender, ConfirmationSenderConfig, PendingTransaction, SenderError,
    TransferSanityCheck,
};
pub use task_planner::{ConfirmationTaskPlanner, PlannerError};
