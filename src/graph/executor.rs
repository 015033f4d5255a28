use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::trace;

use super::error::{GraphError, NodeResult};
use super::node::{Schedulable, TaskNode};
use super::wrapper::TaskGraph;

/// 有界执行器：任务图的全部节点一次性提交，依赖未满足的节点挂起等待，
/// 只有真正开始执行的节点才占用 worker 名额。
#[derive(Clone)]
pub struct GraphExecutor {
    permits: Arc<Semaphore>,
    workers: usize,
}

impl GraphExecutor {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// 提交任务图。图中节点依赖的、但未列入节点集的上游也会一并调度；
    /// 已被其他提交调度过的节点不会重复执行。必须在 tokio runtime 内调用。
    pub fn submit<T>(&self, graph: &TaskGraph<T>) -> GraphRun<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let nodes = dependency_closure(graph.all_nodes());
        let mut scheduled = 0_usize;
        for node in &nodes {
            if node.core().try_claim() {
                scheduled += 1;
                tokio::spawn(drive(Arc::clone(node), Arc::clone(&self.permits)));
            }
        }

        trace!(
            target: "graph::executor",
            target_node = %graph.target().label(),
            nodes = nodes.len(),
            scheduled,
            "提交任务图"
        );

        GraphRun {
            target: graph.target().clone(),
            handle: CancelHandle {
                nodes: Arc::new(nodes),
                cancelled: Arc::new(AtomicBool::new(false)),
            },
        }
    }
}

fn dependency_closure(roots: Vec<Arc<dyn Schedulable>>) -> Vec<Arc<dyn Schedulable>> {
    let mut seen = HashSet::new();
    let mut ordered = Vec::with_capacity(roots.len());
    let mut stack = roots;
    stack.reverse();

    while let Some(node) = stack.pop() {
        if !seen.insert(node.core().id()) {
            continue;
        }
        let mut dependencies = node.core().dependencies();
        dependencies.reverse();
        stack.extend(dependencies);
        ordered.push(node);
    }

    ordered
}

async fn drive(node: Arc<dyn Schedulable>, permits: Arc<Semaphore>) {
    let core = node.core();
    let cancel = core.cancel_token().clone();
    let dependencies = core.dependencies();

    let ready = tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = join_all(dependencies.iter().map(|dependency| dependency.core().finished())) => true,
    };

    if !ready || cancel.is_cancelled() {
        node.resolve_failure(GraphError::Cancelled);
        return;
    }

    if !core.options().settle_dependencies {
        if let Some(err) = dependencies.iter().find_map(|dependency| dependency.failure()) {
            trace!(
                target: "graph::executor",
                node = %core.label(),
                error = %err,
                "上游失败，跳过节点"
            );
            node.resolve_failure(err);
            return;
        }
    }

    let permit = if core.options().detached {
        None
    } else {
        let acquired = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = Arc::clone(&permits).acquire_owned() => permit.ok(),
        };
        match acquired {
            Some(permit) => Some(permit),
            None => {
                node.resolve_failure(GraphError::Cancelled);
                return;
            }
        }
    };

    Arc::clone(&node).execute().await;
    drop(permit);
}

/// 一次提交的取消句柄，与结果类型无关。
///
/// 取消会直接丢弃正在运行的节点 future：工作闭包停在最近一个 `.await` 处，
/// 之后的代码不再执行。读取类副作用（RPC 请求、缓存写入）可能只完成一半，
/// 需要收尾的工作应放在 `Drop` 里或自行保证幂等。
#[derive(Clone)]
pub struct CancelHandle {
    nodes: Arc<Vec<Arc<dyn Schedulable>>>,
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        for node in self.nodes.iter() {
            node.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// 已提交任务图的句柄。
pub struct GraphRun<T> {
    target: TaskNode<T>,
    handle: CancelHandle,
}

impl<T> Clone for GraphRun<T> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            handle: self.handle.clone(),
        }
    }
}

impl<T> GraphRun<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn target(&self) -> &TaskNode<T> {
        &self.target
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.handle.clone()
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled()
    }

    /// 等待目标节点完成；取消之后一律返回 `Cancelled`，即使目标已经算出结果。
    pub async fn join(&self) -> NodeResult<T> {
        let result = self.target.wait().await;
        if self.is_cancelled() {
            return Err(GraphError::Cancelled);
        }
        result
    }
}
