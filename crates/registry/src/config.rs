//! Registry connection configuration.

use engine_core::RedisConf;

/// Builds the Redis connection string from the shared `RedisConf`.
pub fn connection_string(conf: &RedisConf) -> String {
    if conf.redis_host.starts_with("redis://") {
        conf.redis_host.clone()
    } else {
        format!("redis://{}", conf.redis_host)
    }
}
