//! The bucket script, executed atomically inside Redis.

use std::time::Duration;

use crate::storage::{BucketOutcome, StorageError};

/// How long a lock entry lives if its holder never releases it.
pub(crate) const LOCK_TTL: Duration = Duration::from_secs(1);

/// Lua source of the bucket evaluation.
///
/// `KEYS[1]` is the bucket key, `ARGV` is `capacity`, `window_secs`, `request_id`.
///
/// Replies with nil when the lock entry is held by another attempt, `0` when the
/// request is admitted, or the remaining window in milliseconds when the bucket is
/// exhausted. The lock is taken once; losing it is reported, never retried here.
pub const BUCKET_SCRIPT: &str = r#"
local key = KEYS[1]
local lock = key .. ':lock'
local capacity, window_secs, request_id = tonumber(ARGV[1]), ARGV[2], ARGV[3]

if not redis.call('SET', lock, request_id, 'NX', 'EX', 1) then
    return false
end

local wait = 0
local tokens = tonumber(redis.call('GET', key))

if tokens == nil then
    redis.call('SET', key, capacity - 1, 'NX', 'EX', window_secs)
elseif tokens > 0 then
    redis.call('DECR', key)
else
    wait = redis.call('PTTL', key)
    if wait <= 0 then
        wait = 1
    end
end

if redis.call('GET', lock) == request_id then
    redis.call('DEL', lock)
end

return wait
"#;

/// Interpret the script reply.
pub(crate) fn outcome_from_reply(reply: Option<i64>) -> Result<BucketOutcome, StorageError> {
    match reply {
        None => Ok(BucketOutcome::LockBusy),
        Some(0) => Ok(BucketOutcome::Admitted),
        Some(wait) if wait > 0 => Ok(BucketOutcome::RetryAfter(Duration::from_millis(wait.unsigned_abs()))),
        Some(other) => Err(StorageError::Protocol(format!(
            "bucket script returned negative wait hint {other}"
        ))),
    }
}
