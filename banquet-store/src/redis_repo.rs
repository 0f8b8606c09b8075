use redis::RedisResult;

/// Thin Redis client. Only the API rate limiter uses it; reservation state
/// never lives in Redis.
#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// Fixed-window counter. Returns whether the caller is still within
    /// `limit` requests for the current window.
    ///
    /// The window is armed by the first request only; later requests in the
    /// same window never push its end out.
    pub async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let script = redis::Script::new(r#"
            local count = redis.call("INCR", KEYS[1])
            if count == 1 or redis.call("TTL", KEYS[1]) == -1 then
                redis.call("EXPIRE", KEYS[1], ARGV[1])
            end
            return count
        "#);

        let count: i64 = script.key(key).arg(window_seconds).invoke_async(&mut conn).await?;

        Ok(count <= limit)
    }
}
