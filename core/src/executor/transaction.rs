//! `TransactionExecutor`: `WATCH` / `MULTI` / queued commands / `EXEC`,
//! with discard detection when a watched key changed underneath the transaction.

use std::time::Instant;

use crate::error::{categorize_redis_error, is_transport_fault, Error};
use crate::metrics::{CommandOutcome, MetricsSink};
use crate::models::{CommandResponse, TransactionRequest, TransactionResponse};
use crate::pool::BackendPool;
use crate::selector::BackendSelector;
use crate::value::{extract_error, RedisValue};

use super::elapsed_ms;

/// Runs `WATCH`/`MULTI`/queue/`EXEC` over one pooled connection.
///
/// Anything short of a definitive `EXEC` outcome (failed acquire, `SELECT`,
/// `WATCH`, `MULTI`, or a transport fault while queueing or flushing `EXEC`
/// itself) is a genuine failure, not a transaction result, and is propagated
/// as an `Error` rather than folded into a 200-shaped envelope — this keeps
/// `TransactionResponse` honoring its own invariant: `exec: false` always
/// means "no results field", never "here's a result field you should ignore".
pub async fn execute_transaction(
    pool: &BackendPool,
    selector: &BackendSelector,
    metrics: &dyn MetricsSink,
    req: &TransactionRequest,
) -> Result<TransactionResponse, Error> {
    let start = Instant::now();
    let backend_name = selector.for_batch();
    let backend = pool.pool(backend_name);

    let mut conn = backend.acquire().await?;

    let target_db = req.db as i64;
    if conn.get_mut().current_db() != target_db {
        if let Err(err) = conn.get_mut().select_db(target_db).await {
            conn.taint();
            return Err(err.into());
        }
    }

    if !req.watch.is_empty() {
        let mut watch_cmd = redis::cmd("WATCH");
        for key in &req.watch {
            watch_cmd.arg(key);
        }
        if let Err(err) = conn.get_mut().execute_cmd(&watch_cmd).await {
            if is_transport_fault(&err) {
                conn.taint();
            }
            return Err(err.into());
        }
    }

    if let Err(err) = conn.get_mut().execute_cmd(&redis::cmd("MULTI")).await {
        if is_transport_fault(&err) {
            conn.taint();
        }
        return Err(err.into());
    }

    let mut queued = 0usize;
    for command in &req.commands {
        let mut cmd = redis::cmd(&command.normalized_command());
        for arg in &command.args {
            cmd.arg(arg);
        }
        match conn.get_mut().execute_cmd(&cmd).await {
            Ok(_) => queued += 1,
            Err(err) if is_transport_fault(&err) => {
                conn.taint();
                return Err(err.into());
            }
            // A non-transport error here (e.g. unknown command) still gets
            // queued by Redis as EXECABORT material; EXEC will report it.
            Err(_) => queued += 1,
        }
    }

    // Collected via the pipeline codec, not `execute_cmd`: a single-command
    // `query_async` extracts and errors on the first `ServerError` found
    // anywhere inside the reply, including nested inside EXEC's result array.
    // That would turn a *successfully committed* transaction containing one
    // failed command (WRONGTYPE, etc.) into a transport-looking `Err`. The
    // pipeline codec's `Vec<redis::Value>` identity conversion leaves nested
    // `ServerError` entries intact so they can be reported per-command below.
    let exec_reply = conn.get_mut().execute_single_raw(redis::cmd("EXEC")).await;
    let time_ms = elapsed_ms(start);

    match exec_reply {
        Ok(redis::Value::Nil) => {
            // A watched key changed: the transaction was discarded, not executed.
            Ok(TransactionResponse {
                queued,
                exec: false,
                results: None,
                time: time_ms,
            })
        }
        Ok(redis::Value::Array(values)) => {
            let results = values
                .into_iter()
                .zip(req.commands.iter())
                .map(|(value, command)| {
                    let name = command.normalized_command();
                    if let Some(message) = extract_error(&value) {
                        let category = categorize_redis_error(&message);
                        metrics.record_command(&name, backend.name(), CommandOutcome::RedisError(category), std::time::Duration::ZERO);
                        CommandResponse::err(message, 0.0)
                    } else {
                        metrics.record_command(&name, backend.name(), CommandOutcome::Ok, std::time::Duration::ZERO);
                        CommandResponse::ok(RedisValue::from_redis(value), 0.0)
                    }
                })
                .collect();
            Ok(TransactionResponse {
                queued,
                exec: true,
                results: Some(results),
                time: time_ms,
            })
        }
        Ok(redis::Value::ServerError(e)) => {
            // EXEC itself was refused (e.g. EXECABORT because a queued command
            // was rejected) rather than any individual queued command failing.
            // That's a discard like the watched-key case, not a transport fault.
            let message = format!("{e:?}");
            let category = categorize_redis_error(&message);
            metrics.record_command("EXEC", backend.name(), CommandOutcome::RedisError(category), std::time::Duration::ZERO);
            Ok(TransactionResponse {
                queued,
                exec: false,
                results: None,
                time: time_ms,
            })
        }
        Ok(other) => {
            // Unexpected reply shape for EXEC (neither nil, array, nor an error
            // reply): nothing here lets us claim the transaction executed.
            Err(Error::Transport(format!("unexpected EXEC reply: {other:?}")))
        }
        Err(err) => {
            if is_transport_fault(&err) {
                conn.taint();
            }
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_exec_reply_is_discard_with_no_results() {
        let resp = TransactionResponse {
            queued: 2,
            exec: false,
            results: None,
            time: 1.0,
        };
        assert!(!resp.exec);
        assert!(resp.results.is_none());
    }

    #[test]
    fn array_exec_reply_zips_one_result_per_queued_command() {
        // `extract_error`/`RedisValue::from_redis` conversion itself is covered
        // in `value.rs`; this just pins down that a committed EXEC's array is
        // zipped one-for-one against the commands that were queued, in order.
        let values = vec![redis::Value::Okay, redis::Value::Int(1)];
        let commands = [
            crate::models::CommandRequest { command: "SET".into(), args: vec!["k".into(), "v".into()], db: 0 },
            crate::models::CommandRequest { command: "INCR".into(), args: vec!["k".into()], db: 0 },
        ];

        let results: Vec<CommandResponse> = values
            .into_iter()
            .zip(commands.iter())
            .map(|(value, _command)| {
                if let Some(message) = extract_error(&value) {
                    CommandResponse::err(message, 0.0)
                } else {
                    CommandResponse::ok(RedisValue::from_redis(value), 0.0)
                }
            })
            .collect();

        assert_eq!(results.len(), commands.len());
        assert!(results.iter().all(|r| r.error.is_none()));
    }
}
