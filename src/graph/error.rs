use std::fmt::{Debug, Display};
use std::sync::Arc;

use thiserror::Error;

/// 任务图节点的失败结果。
///
/// 需要 `Clone`：同一个失败会原样传递给所有下游节点。
#[derive(Debug, Clone, Error)]
pub enum GraphError {
    #[error("任务已取消")]
    Cancelled,
    #[error("节点 {label} 尚未完成，不能读取结果")]
    Unresolved { label: Arc<str> },
    #[error("{0:#}")]
    Task(Arc<anyhow::Error>),
}

pub type NodeResult<T> = Result<T, GraphError>;

impl GraphError {
    pub fn task(err: impl Into<anyhow::Error>) -> Self {
        Self::from_anyhow(err.into())
    }

    /// 节点闭包里 `?` 出来的 `GraphError` 会被还原，而不是再包一层。
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        match err.downcast::<GraphError>() {
            Ok(graph) => graph,
            Err(other) => Self::Task(Arc::new(other)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: Display + Debug + Send + Sync + 'static,
    {
        match self {
            Self::Task(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }
}
