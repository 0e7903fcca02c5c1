/// Current wall-clock time in epoch milliseconds.
///
/// Every persisted mutation and every new post is stamped with this value.
pub fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
