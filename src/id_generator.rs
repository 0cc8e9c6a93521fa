use std::sync::atomic::{AtomicU64, Ordering};

// Single static counter for all commands
static NEXT_COMMAND_ID: AtomicU64 = AtomicU64::new(1);

pub fn generate_id() -> u64 {
    NEXT_COMMAND_ID.fetch_add(1, Ordering::SeqCst)
}
