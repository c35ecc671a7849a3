//! CLI commands

mod pr_or_push;
mod release;
mod session;

pub use pr_or_push::PrOrPushCommand;
pub use release::ReleaseCommand;
