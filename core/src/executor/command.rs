//! `CommandExecutor`: the single-command path.

use std::time::Instant;

use crate::error::{categorize_redis_error, is_transport_fault};
use crate::metrics::{CommandOutcome, MetricsSink};
use crate::models::{CommandRequest, CommandResponse};
use crate::pool::BackendPool;
use crate::selector::BackendSelector;
use crate::value::RedisValue;

use super::elapsed_ms;

/// `execute(context, CommandRequest) -> (result, err)`. The "context" is
/// implicit here in the caller's cancellation: if the enclosing request future is
/// dropped mid-`.await`, the `PooledConnection` guard's `Drop` still fires and
/// closes the connection (it was never un-tainted), so pool accounting can't
/// corrupt on cancellation.
pub async fn execute_command(
    pool: &BackendPool,
    selector: &BackendSelector,
    metrics: &dyn MetricsSink,
    req: &CommandRequest,
) -> CommandResponse {
    let command = req.normalized_command();
    let backend_name = selector.select(&command);
    let backend = pool.pool(backend_name);

    let start = Instant::now();
    let mut conn = match backend.acquire().await {
        Ok(conn) => conn,
        Err(err) => {
            metrics.record_command(&command, backend.name(), CommandOutcome::Transport, start.elapsed());
            return CommandResponse::err(err.to_string(), elapsed_ms(start));
        }
    };

    let target_db = req.db as i64;
    if conn.get_mut().current_db() != target_db {
        if let Err(err) = conn.get_mut().select_db(target_db).await {
            conn.taint();
            metrics.record_command(&command, backend.name(), CommandOutcome::Transport, start.elapsed());
            return CommandResponse::err(err.to_string(), elapsed_ms(start));
        }
    }

    let reply = conn.get_mut().execute(&command, &req.args).await;
    let elapsed = start.elapsed();

    match reply {
        Ok(value) => {
            metrics.record_command(&command, backend.name(), CommandOutcome::Ok, elapsed);
            CommandResponse::ok(RedisValue::from_redis(value), elapsed_ms(start))
        }
        Err(err) if is_transport_fault(&err) => {
            conn.taint();
            metrics.record_command(&command, backend.name(), CommandOutcome::Transport, elapsed);
            CommandResponse::err(err.to_string(), elapsed_ms(start))
        }
        Err(err) => {
            let category = categorize_redis_error(&err.to_string());
            metrics.record_command(&command, backend.name(), CommandOutcome::RedisError(category), elapsed);
            CommandResponse::err(err.to_string(), elapsed_ms(start))
        }
    }
}

#[cfg(test)]
mod tests {
    // Exercising `execute_command` end-to-end requires a live Redis connection,
    // which this test suite deliberately does not depend on. Pool, selector,
    // and authority-gate layers are unit tested directly in their own modules
    // instead.
}
