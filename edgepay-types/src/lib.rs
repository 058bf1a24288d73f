//! Shared data model: the inbound `Request`, its masked derivative, the
//! persisted `TransactionRecord`, and the fixed-point `Amount` used
//! throughout so comparisons like `amount > max_amount` are exact rather
//! than floating-point approximations.

mod amount;
mod request;
mod transaction;

pub use amount::{Amount, AmountError};
pub use request::{MaskedRequest, Request, RequestType};
pub use transaction::{TransactionRecord, TransactionStatus};
