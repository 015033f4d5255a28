use thiserror::Error;

use crate::graph::GraphError;

#[derive(Debug, Clone, Error)]
pub enum SyncError {
    #[error("账户格式错误: {0}")]
    InvalidAccount(String),
    #[error("读取链上代理列表失败: {0}")]
    ProxyList(String),
    #[error("读取链上身份失败: {0}")]
    Identity(String),
    #[error("钱包仓库操作失败: {0}")]
    Repository(String),
    #[error("同步已取消")]
    Cancelled,
    #[error("同步任务失败: {0}")]
    Task(String),
}

impl SyncError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }
}

impl From<GraphError> for SyncError {
    fn from(err: GraphError) -> Self {
        if err.is_cancelled() {
            return SyncError::Cancelled;
        }
        match err.downcast_ref::<SyncError>() {
            Some(sync) => sync.clone(),
            None => SyncError::Task(err.to_string()),
        }
    }
}
