use std::time::Duration;

use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use crate::hydra::{Quote, QuoteArgs, QuoteError, SwapPair};
use crate::sync::{SyncError, SyncSummary};

use super::metrics::prometheus_enabled;

fn quote_outcome_label(outcome: &Result<Quote, QuoteError>) -> &'static str {
    match outcome {
        Ok(_) => "ok",
        Err(QuoteError::NoRoute { .. }) => "no_route",
        Err(QuoteError::QuoteCalcFailed { .. }) => "calc_failed",
        Err(QuoteError::Cancelled) => "cancelled",
        Err(QuoteError::Timeout { .. }) => "timeout",
        Err(QuoteError::Discovery(_) | QuoteError::Internal(_)) => "error",
    }
}

pub fn quote_finished(args: &QuoteArgs, outcome: &Result<Quote, QuoteError>, elapsed: Duration) {
    let result = quote_outcome_label(outcome);
    let elapsed_ms = elapsed.as_secs_f64() * 1_000.0;
    let elapsed_ms_display = format!("{elapsed_ms:.3}");

    match outcome {
        Ok(quote) => info!(
            target: "monitoring::quote",
            event = "finished",
            pair = %args.pair(),
            direction = %args.direction,
            amount = args.amount,
            quoted = quote.amount,
            elapsed_ms = %elapsed_ms_display,
            "报价完成"
        ),
        Err(err) if err.is_cancelled() => debug!(
            target: "monitoring::quote",
            event = "cancelled",
            pair = %args.pair(),
            direction = %args.direction,
            "报价已取消"
        ),
        Err(err) => warn!(
            target: "monitoring::quote",
            event = "failed",
            pair = %args.pair(),
            direction = %args.direction,
            amount = args.amount,
            result,
            error = %err,
            "报价失败"
        ),
    }

    if prometheus_enabled() {
        let direction = args.direction.as_str();
        counter!(
            "hydra_router_quote_total",
            "direction" => direction,
            "result" => result
        )
        .increment(1);
        histogram!("hydra_router_quote_latency_ms", "direction" => direction).record(elapsed_ms);
    }
}

pub fn routes_discovered(pair: SwapPair, pools: usize, routes: usize) {
    debug!(
        target: "monitoring::quote",
        event = "routes",
        pair = %pair,
        pools,
        routes,
        "候选路由统计"
    );

    if prometheus_enabled() {
        histogram!("hydra_router_routes_discovered").record(routes as f64);
    }
}

pub fn quote_discarded(token: u64, args: &QuoteArgs) {
    debug!(
        target: "monitoring::quote",
        event = "discarded",
        token,
        pair = %args.pair(),
        direction = %args.direction,
        "请求已撤销，丢弃报价结果"
    );

    if prometheus_enabled() {
        counter!("hydra_router_quote_discarded_total").increment(1);
    }
}

pub fn quotes_superseded(pair: SwapPair, count: usize) {
    if count == 0 {
        return;
    }
    info!(
        target: "monitoring::quote",
        event = "superseded",
        pair = %pair,
        count,
        "资产对切换，取消旧报价"
    );

    if prometheus_enabled() {
        counter!("hydra_router_quote_superseded_total").increment(count as u64);
    }
}

pub fn proxy_sync_finished(chain_id: &str, summary: &SyncSummary, elapsed: Duration) {
    info!(
        target: "monitoring::sync",
        event = "finished",
        chain = chain_id,
        generation = summary.generation,
        saved = summary.saved,
        removed = summary.removed,
        elapsed_ms = elapsed.as_millis() as u64,
        "代理账户同步完成"
    );

    if prometheus_enabled() {
        let chain = chain_id.to_string();
        counter!("hydra_router_proxy_sync_total", "chain" => chain.clone(), "result" => "ok")
            .increment(1);
        histogram!("hydra_router_proxy_sync_saved", "chain" => chain.clone())
            .record(summary.saved as f64);
        histogram!("hydra_router_proxy_sync_removed", "chain" => chain)
            .record(summary.removed as f64);
    }
}

pub fn proxy_sync_failed(chain_id: &str, generation: u64, err: &SyncError) {
    warn!(
        target: "monitoring::sync",
        event = "failed",
        chain = chain_id,
        generation,
        error = %err,
        "代理账户同步失败"
    );

    if prometheus_enabled() {
        counter!(
            "hydra_router_proxy_sync_total",
            "chain" => chain_id.to_string(),
            "result" => "error"
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn outcome_labels_cover_every_error() {
        let args = QuoteArgs::sell(1, 9, 10);
        let ok = Ok(Quote {
            args,
            amount: 30,
            context: "[]".to_string(),
        });
        assert_eq!(quote_outcome_label(&ok), "ok");

        let cases = [
            (QuoteError::NoRoute { pair: args.pair() }, "no_route"),
            (
                QuoteError::QuoteCalcFailed {
                    failures: vec![Arc::from("zero liquidity")],
                },
                "calc_failed",
            ),
            (QuoteError::Cancelled, "cancelled"),
            (QuoteError::Timeout { timeout_ms: 5 }, "timeout"),
            (QuoteError::Discovery("rpc".into()), "error"),
            (QuoteError::Internal("bug".into()), "error"),
        ];
        for (err, label) in cases {
            assert_eq!(quote_outcome_label(&Err(err)), label);
        }
    }

    #[test]
    fn events_log_without_exporter() {
        let args = QuoteArgs::buy(1, 9, 10);
        quote_finished(&args, &Err(QuoteError::Cancelled), Duration::from_millis(3));
        routes_discovered(args.pair(), 2, 0);
        quote_discarded(7, &args);
        quotes_superseded(args.pair(), 0);
        proxy_sync_finished(
            "hydradx",
            &SyncSummary {
                generation: 1,
                saved: 2,
                removed: 0,
            },
            Duration::from_millis(12),
        );
        proxy_sync_failed("hydradx", 2, &SyncError::Cancelled);
        assert!(!prometheus_enabled());
    }
}
