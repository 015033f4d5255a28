use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::error::{GraphError, NodeResult};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

pub type NodeId = u64;

type Work<T> = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<T>> + Send>;

/// 节点的调度属性。
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeOptions {
    /// 依赖失败时仍然执行（fan-in 汇总节点使用）。
    pub settle_dependencies: bool,
    /// 不占用 worker 名额；只等待子图的节点必须设置，否则小线程池会互相等死。
    pub detached: bool,
}

/// 与结果类型无关的节点状态：身份、依赖边、取消与完成信号。
pub struct NodeCore {
    id: NodeId,
    label: Arc<str>,
    options: NodeOptions,
    dependencies: Mutex<Vec<Arc<dyn Schedulable>>>,
    claimed: AtomicBool,
    cancel: CancellationToken,
    done: watch::Sender<bool>,
}

impl NodeCore {
    fn new(label: Arc<str>, options: NodeOptions, cancel: CancellationToken) -> Self {
        let (done, _) = watch::channel(false);
        Self {
            id: NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed),
            label,
            options,
            dependencies: Mutex::new(Vec::new()),
            claimed: AtomicBool::new(false),
            cancel,
            done,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn label(&self) -> &Arc<str> {
        &self.label
    }

    pub fn options(&self) -> NodeOptions {
        self.options
    }

    pub fn dependencies(&self) -> Vec<Arc<dyn Schedulable>> {
        self.dependencies.lock().clone()
    }

    pub(crate) fn push_dependency(&self, dependency: Arc<dyn Schedulable>) {
        let dependency_id = dependency.core().id();
        if dependency_id == self.id {
            return;
        }
        let mut guard = self.dependencies.lock();
        if guard.iter().all(|existing| existing.core().id() != dependency_id) {
            guard.push(dependency);
        }
    }

    /// 每个节点只能被认领一次，认领者负责让它最终完成。
    pub(crate) fn try_claim(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        *self.done.borrow()
    }

    pub async fn finished(&self) {
        let mut receiver = self.done.subscribe();
        let _ = receiver.wait_for(|done| *done).await;
    }

    fn mark_finished(&self) {
        self.done.send_replace(true);
    }
}

/// 执行器看到的类型擦除节点。
pub trait Schedulable: Send + Sync {
    fn core(&self) -> &NodeCore;

    /// 已完成且失败时返回失败原因。
    fn failure(&self) -> Option<GraphError>;

    /// 不运行工作闭包，直接以失败完成。
    fn resolve_failure(&self, err: GraphError);

    /// 运行工作闭包并写入结果；闭包已被取走时什么也不做。
    fn execute(self: Arc<Self>) -> BoxFuture<'static, ()>;

    /// 取消节点；尚未被调度的节点立即以 `Cancelled` 完成。
    fn cancel(&self) {
        self.core().cancel_token().cancel();
        if self.core().try_claim() {
            self.resolve_failure(GraphError::Cancelled);
        }
    }
}

struct NodeCell<T> {
    core: NodeCore,
    work: Mutex<Option<Work<T>>>,
    result: OnceLock<NodeResult<T>>,
}

impl<T> NodeCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn resolve(&self, result: NodeResult<T>) {
        if self.result.set(result).is_ok() {
            self.core.mark_finished();
        }
    }
}

impl<T> Schedulable for NodeCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn failure(&self) -> Option<GraphError> {
        match self.result.get() {
            Some(Err(err)) => Some(err.clone()),
            _ => None,
        }
    }

    fn resolve_failure(&self, err: GraphError) {
        drop(self.work.lock().take());
        self.resolve(Err(err));
    }

    fn execute(self: Arc<Self>) -> BoxFuture<'static, ()> {
        async move {
            let work = self.work.lock().take();
            let Some(work) = work else {
                return;
            };

            let cancel = self.core.cancel.clone();
            // 取消分支胜出时工作 future 随之被丢弃
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(GraphError::Cancelled),
                result = work() => result.map_err(GraphError::from_anyhow),
            };
            self.resolve(outcome);
        }
        .boxed()
    }
}

/// 带类型结果的任务节点句柄，克隆共享同一个节点。
pub struct TaskNode<T> {
    cell: Arc<NodeCell<T>>,
}

impl<T> Clone for TaskNode<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> TaskNode<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(label: impl Into<Arc<str>>, work: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self::with_options(label, NodeOptions::default(), CancellationToken::new(), work)
    }

    /// 依赖全部完成后执行，不论成败；闭包自行读取各依赖的结果。
    pub fn settling<F, Fut>(label: impl Into<Arc<str>>, work: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let options = NodeOptions {
            settle_dependencies: true,
            ..NodeOptions::default()
        };
        Self::with_options(label, options, CancellationToken::new(), work)
    }

    pub fn with_result(label: impl Into<Arc<str>>, value: T) -> Self {
        Self::new(label, move || async move { Ok(value) })
    }

    pub(crate) fn with_options<F, Fut>(
        label: impl Into<Arc<str>>,
        options: NodeOptions,
        cancel: CancellationToken,
        work: F,
    ) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let work: Work<T> = Box::new(move || work().boxed());
        Self {
            cell: Arc::new(NodeCell {
                core: NodeCore::new(label.into(), options, cancel),
                work: Mutex::new(Some(work)),
                result: OnceLock::new(),
            }),
        }
    }

    pub fn id(&self) -> NodeId {
        self.cell.core.id()
    }

    pub fn label(&self) -> &Arc<str> {
        self.cell.core.label()
    }

    pub fn erased(&self) -> Arc<dyn Schedulable> {
        self.cell.clone()
    }

    pub fn add_dependency<U>(&self, upstream: &TaskNode<U>)
    where
        U: Clone + Send + Sync + 'static,
    {
        self.cell.core.push_dependency(upstream.erased());
    }

    pub fn add_dependency_erased(&self, upstream: Arc<dyn Schedulable>) {
        self.cell.core.push_dependency(upstream);
    }

    pub fn is_finished(&self) -> bool {
        self.cell.core.is_finished()
    }

    /// 同步读取结果；节点未完成时返回 `Unresolved`，调用方应先等待完成。
    pub fn result(&self) -> NodeResult<T> {
        match self.cell.result.get() {
            Some(result) => result.clone(),
            None => Err(GraphError::Unresolved {
                label: Arc::clone(self.label()),
            }),
        }
    }

    pub async fn wait(&self) -> NodeResult<T> {
        self.cell.core.finished().await;
        self.result()
    }

    pub fn cancel(&self) {
        Schedulable::cancel(self.cell.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_before_completion_is_unresolved() {
        let node = TaskNode::with_result("answer", 42_u32);
        match node.result() {
            Err(GraphError::Unresolved { label }) => assert_eq!(&*label, "answer"),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancel_before_schedule_resolves_immediately() {
        let node = TaskNode::with_result("never", 1_u8);
        node.cancel();
        assert!(node.is_finished());
        assert!(node.wait().await.unwrap_err().is_cancelled());
        assert!(!node.cell.core.try_claim());
    }

    #[test]
    fn duplicate_and_self_dependencies_are_ignored() {
        let upstream = TaskNode::with_result("up", 1_u8);
        let node = TaskNode::with_result("down", 2_u8);
        node.add_dependency(&upstream);
        node.add_dependency(&upstream);
        node.add_dependency(&node.clone());
        assert_eq!(node.cell.core.dependencies().len(), 1);
    }
}
