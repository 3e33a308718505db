// ============================================================================
// Transaction Management Module
// ============================================================================
//
// Buffered read-committed transactions for the in-memory backend.
//
// ============================================================================

pub mod change;
pub mod state;

pub use change::Change;
pub use state::{Transaction, TransactionId, TransactionState};
