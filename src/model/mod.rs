//! Types that represent the core data model, such as `Expense` and `CategoryMap`, together with
//! payload normalization and the aggregate queries.
mod amount;
mod category;
mod expense;
mod normalize;
mod payload;
mod snapshot;

pub use amount::{Amount, AmountError};
pub use category::{same_category, CategoryMap};
pub use expense::{resolve_timestamp_in, Expense, ExpenseDraft, NewExpense};
pub use normalize::{normalize, Normalized};
pub use payload::{CategoryEntry, ExpensesPayload, ExpensesResponse, UserResponse};
pub use snapshot::{CategorySummary, Snapshot};
