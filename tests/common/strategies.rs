use proptest::prelude::*;

/// Handler names drawn from a small pool so duplicates are common
pub fn handler_name_strategy() -> impl Strategy<Value = String> {
    "[a-e]{1,2}"
}

pub fn priority_strategy() -> impl Strategy<Value = i32> {
    -5i32..=200
}

/// Sequence of (name, priority) registrations
pub fn registrations_strategy() -> impl Strategy<Value = Vec<(String, i32)>> {
    prop::collection::vec((handler_name_strategy(), priority_strategy()), 0..40)
}
