pub mod reconcile;
pub mod set;
pub mod tx;

pub use reconcile::{ChildSync, Reconciliation, attachment_sync, diff};
pub use set::SetClause;
pub use tx::{TxScope, TxState};
