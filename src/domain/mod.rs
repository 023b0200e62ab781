mod action;
mod amount;
mod integrity;
mod ledger;
mod lending;
mod member;

pub use action::*;
pub use amount::*;
pub use integrity::*;
pub use ledger::*;
pub use lending::*;
pub use member::*;
