use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tracing::debug;

use super::aggregator::HydraQuoteFactory;
use super::error::QuoteError;
use super::types::{Quote, QuoteArgs, SwapPair};
use crate::graph::CancelHandle;
use crate::monitoring::{LatencyMetadata, events, guard_with_metadata};

/// 报价请求令牌，用于取消与丢弃过期结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct InFlight {
    pair: SwapPair,
    handle: CancelHandle,
}

type InFlightMap = DashMap<RequestToken, InFlight>;

/// 请求 future 持有的登记；future 未完成就被丢弃时注销令牌并取消任务图。
struct Registration {
    token: RequestToken,
    in_flight: Arc<InFlightMap>,
    settled: bool,
}

impl Registration {
    /// 取走登记；令牌已被取消或顶替时返回 `None`。
    fn settle(&mut self) -> Option<InFlight> {
        self.settled = true;
        self.in_flight.remove(&self.token).map(|(_, entry)| entry)
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Some((_, entry)) = self.in_flight.remove(&self.token) {
            entry.handle.cancel();
            debug!(
                target: "hydra::service",
                token = %self.token,
                pair = %entry.pair,
                "报价 future 未完成即被丢弃，已注销"
            );
        }
    }
}

/// 对外报价入口：每个请求一个令牌，可单独取消；换资产对时旧请求全部取消。
///
/// 结果只有在令牌仍登记时才交付，取消之后的完成一律丢弃。
pub struct QuoteService {
    factory: Arc<HydraQuoteFactory>,
    timeout: Option<Duration>,
    next_token: AtomicU64,
    in_flight: Arc<InFlightMap>,
}

impl QuoteService {
    pub fn new(factory: Arc<HydraQuoteFactory>, timeout: Option<Duration>) -> Self {
        Self {
            factory,
            timeout: timeout.filter(|limit| !limit.is_zero()),
            next_token: AtomicU64::new(1),
            in_flight: Arc::new(DashMap::new()),
        }
    }

    pub fn factory(&self) -> &Arc<HydraQuoteFactory> {
        &self.factory
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// 立即提交任务图并返回令牌；返回的 future 等待结果，被取消时得到 `Cancelled`。
    pub fn request(
        &self,
        args: QuoteArgs,
    ) -> (RequestToken, impl Future<Output = Result<Quote, QuoteError>> + Send + use<>) {
        let (token, pending) = self.start(args);
        let future = async move { pending.await.unwrap_or(Err(QuoteError::Cancelled)) };
        (token, future)
    }

    pub async fn quote(&self, args: QuoteArgs) -> Result<Quote, QuoteError> {
        self.request(args).1.await
    }

    /// 回调形式：结果在后台任务里交付，令牌被取消后回调不会被调用。
    pub fn quote_with<F>(&self, args: QuoteArgs, callback: F) -> RequestToken
    where
        F: FnOnce(RequestToken, Result<Quote, QuoteError>) + Send + 'static,
    {
        let (token, pending) = self.start(args);
        tokio::spawn(async move {
            if let Some(outcome) = pending.await {
                callback(token, outcome);
            }
        });
        token
    }

    /// 取消请求；令牌已完成或已取消时返回 `false`。
    pub fn cancel(&self, token: RequestToken) -> bool {
        match self.in_flight.remove(&token) {
            Some((_, entry)) => {
                entry.handle.cancel();
                debug!(
                    target: "hydra::service",
                    token = %token,
                    pair = %entry.pair,
                    "报价请求已取消"
                );
                true
            }
            None => false,
        }
    }

    fn start(
        &self,
        args: QuoteArgs,
    ) -> (RequestToken, impl Future<Output = Option<Result<Quote, QuoteError>>> + Send + use<>) {
        let token = RequestToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        let pair = args.pair();
        self.supersede(pair);

        let graph = self.factory.quote_graph(args);
        let run = self.factory.executor().submit(&graph);
        self.in_flight.insert(
            token,
            InFlight {
                pair,
                handle: run.cancel_handle(),
            },
        );
        debug!(
            target: "hydra::service",
            token = %token,
            pair = %pair,
            direction = %args.direction,
            "提交报价请求"
        );

        let mut registration = Registration {
            token,
            in_flight: Arc::clone(&self.in_flight),
            settled: false,
        };
        let timeout = self.timeout;
        let pending = async move {
            let latency = guard_with_metadata(
                "hydra.quote",
                LatencyMetadata::empty()
                    .with("pair", pair)
                    .with("direction", args.direction),
            );
            let outcome = match timeout {
                Some(limit) => match tokio::time::timeout(limit, run.join()).await {
                    Ok(result) => result.map_err(QuoteError::from),
                    Err(_) => {
                        run.cancel();
                        Err(QuoteError::Timeout {
                            timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                        })
                    }
                },
                None => run.join().await.map_err(QuoteError::from),
            };
            let elapsed = latency.finish();

            if registration.settle().is_none() {
                events::quote_discarded(token.get(), &args);
                return None;
            }
            events::quote_finished(&args, &outcome, elapsed);
            Some(outcome)
        };
        (token, pending)
    }

    fn supersede(&self, pair: SwapPair) {
        let stale: Vec<RequestToken> = self
            .in_flight
            .iter()
            .filter(|entry| entry.pair != pair)
            .map(|entry| *entry.key())
            .collect();
        if stale.is_empty() {
            return;
        }
        for token in &stale {
            if let Some((_, entry)) = self.in_flight.remove(token) {
                entry.handle.cancel();
            }
        }
        events::quotes_superseded(pair, stale.len());
    }
}
