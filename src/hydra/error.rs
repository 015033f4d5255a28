use std::sync::Arc;

use thiserror::Error;

use super::types::{AssetId, PoolKind, SwapPair};
use crate::graph::GraphError;

/// 链上状态读取失败。
#[derive(Debug, Clone, Error)]
pub enum ReaderError {
    #[error("链连接失败: {0}")]
    Transport(String),
    #[error("链上数据解码失败: {0}")]
    Decode(String),
    #[error("池子 {0} 不存在")]
    MissingPool(PoolKind),
}

/// 单跳报价失败；只淘汰所在路由。
#[derive(Debug, Clone, Error)]
pub enum HopError {
    #[error("读取池子 {pool} 状态失败: {source}")]
    Reader {
        pool: PoolKind,
        #[source]
        source: ReaderError,
    },
    #[error("池子 {pool} 不包含资产 {asset}")]
    UnknownAsset { pool: PoolKind, asset: AssetId },
    #[error("池子状态类型与路由组件不符: 期望 {expected}")]
    PoolMismatch { expected: PoolKind },
    #[error("池子 {pool} 流动性为零")]
    ZeroLiquidity { pool: PoolKind },
    #[error("池子 {pool} 流动性不足")]
    InsufficientLiquidity { pool: PoolKind },
    #[error("池子 {pool} 数学计算失败")]
    Math { pool: PoolKind },
}

/// 报价入口对外的错误。
#[derive(Debug, Clone, Error)]
pub enum QuoteError {
    #[error("{pair} 没有可用路由")]
    NoRoute { pair: SwapPair },
    #[error("全部 {} 条路由报价失败", .failures.len())]
    QuoteCalcFailed { failures: Vec<Arc<str>> },
    #[error("路由发现失败: {0}")]
    Discovery(String),
    #[error("报价已取消")]
    Cancelled,
    #[error("报价超时（{timeout_ms} ms）")]
    Timeout { timeout_ms: u64 },
    #[error("报价内部错误: {0}")]
    Internal(String),
}

impl QuoteError {
    /// 取消不是失败，界面不应展示。
    pub fn is_cancelled(&self) -> bool {
        matches!(self, QuoteError::Cancelled)
    }
}

impl From<GraphError> for QuoteError {
    fn from(err: GraphError) -> Self {
        if err.is_cancelled() {
            return QuoteError::Cancelled;
        }
        if let Some(quote) = err.downcast_ref::<QuoteError>() {
            return quote.clone();
        }
        if let Some(reader) = err.downcast_ref::<ReaderError>() {
            return QuoteError::Discovery(reader.to_string());
        }
        QuoteError::Internal(err.to_string())
    }
}

/// 由报价上下文构建兑换调用失败。
#[derive(Debug, Error)]
pub enum SwapBuildError {
    #[error("报价上下文无法解析: {0}")]
    Context(#[from] serde_json::Error),
    #[error("报价上下文中的路由为空或不连续")]
    MalformedRoute,
    #[error("路由 {route_in}->{route_out} 与报价资产对 {pair} 不符")]
    PairMismatch {
        pair: SwapPair,
        route_in: AssetId,
        route_out: AssetId,
    },
    #[error("滑点参数 {0} bps 超出范围")]
    Slippage(u32),
    #[error("限价计算溢出")]
    Overflow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_errors_map_to_quote_errors() {
        assert!(QuoteError::from(GraphError::Cancelled).is_cancelled());

        let no_route = GraphError::task(QuoteError::NoRoute {
            pair: SwapPair::new(1, 9),
        });
        assert!(matches!(
            QuoteError::from(no_route),
            QuoteError::NoRoute { pair } if pair == SwapPair::new(1, 9)
        ));

        let transport = GraphError::task(ReaderError::Transport("timeout".into()));
        assert!(matches!(QuoteError::from(transport), QuoteError::Discovery(_)));
    }

    #[test]
    fn hop_error_keeps_reader_cause() {
        let err = HopError::Reader {
            pool: PoolKind::Omnipool,
            source: ReaderError::Decode("bad scale".into()),
        };
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("链上数据解码失败: bad scale"));
    }
}
