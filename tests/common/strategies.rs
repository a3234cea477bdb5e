use conduit_core::pipeline::StageKind;
use proptest::prelude::*;

/// Short keys from a small alphabet so duplicates are common
pub fn dedup_key_strategy() -> impl Strategy<Value = String> {
    "[a-e]{1,2}"
}

pub fn dedup_keys_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(dedup_key_strategy(), 0..64)
}

pub fn stage_kind_strategy() -> impl Strategy<Value = StageKind> {
    prop_oneof![
        Just(StageKind::Decompress),
        Just(StageKind::Deduplicate),
        Just(StageKind::Compress),
    ]
}

/// Stage lists in arbitrary order, possibly with repeats
pub fn stage_list_strategy() -> impl Strategy<Value = Vec<StageKind>> {
    prop::collection::vec(stage_kind_strategy(), 0..8)
}

/// (batch_size, message_count)
pub fn window_bound_strategy() -> impl Strategy<Value = (usize, usize)> {
    (1usize..16, 0usize..80)
}
