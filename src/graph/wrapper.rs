use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::error::NodeResult;
use super::executor::GraphExecutor;
use super::node::{NodeOptions, Schedulable, TaskNode};

/// 目标节点 + 让目标可解析所需的全部节点（含目标本身）。
pub struct TaskGraph<T> {
    target: TaskNode<T>,
    dependencies: Vec<Arc<dyn Schedulable>>,
}

impl<T> Clone for TaskGraph<T> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            dependencies: self.dependencies.clone(),
        }
    }
}

impl<T> TaskGraph<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(target: TaskNode<T>, dependencies: Vec<Arc<dyn Schedulable>>) -> Self {
        Self {
            target,
            dependencies,
        }
    }

    pub fn from_node(target: TaskNode<T>) -> Self {
        Self::new(target, Vec::new())
    }

    pub fn with_result(label: impl Into<Arc<str>>, value: T) -> Self {
        Self::from_node(TaskNode::with_result(label, value))
    }

    /// 运行时才知道子图形状的节点：执行时构建子图、提交并等待其目标。
    /// 节点被取消时连带取消子图。
    pub fn deferred<F>(label: impl Into<Arc<str>>, executor: GraphExecutor, build: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<TaskGraph<T>> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let watch = cancel.clone();
        let options = NodeOptions {
            detached: true,
            ..NodeOptions::default()
        };

        let node = TaskNode::with_options(label, options, cancel, move || async move {
            let graph = build()?;
            let run = executor.submit(&graph);

            let observer = run.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = watch.cancelled() => observer.cancel(),
                    _ = observer.join() => {}
                }
            });

            run.join().await.map_err(anyhow::Error::from)
        });

        Self::from_node(node)
    }

    pub fn target(&self) -> &TaskNode<T> {
        &self.target
    }

    pub fn dependencies(&self) -> &[Arc<dyn Schedulable>] {
        &self.dependencies
    }

    pub fn all_nodes(&self) -> Vec<Arc<dyn Schedulable>> {
        let mut nodes = self.dependencies.clone();
        nodes.push(self.target.erased());
        nodes
    }

    /// 本图所有节点都在 `upstream` 的目标完成之后才开始。
    pub fn add_dependency<U>(&self, upstream: &TaskGraph<U>)
    where
        U: Clone + Send + Sync + 'static,
    {
        let upstream_target = upstream.target.erased();
        for node in self.all_nodes() {
            node.core().push_dependency(Arc::clone(&upstream_target));
        }
    }

    /// 把已构建好的节点放到节点集前面，不新增依赖边。
    pub fn inserting_head<I>(mut self, head: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Schedulable>>,
    {
        let mut nodes: Vec<Arc<dyn Schedulable>> = head.into_iter().collect();
        nodes.append(&mut self.dependencies);
        self.dependencies = nodes;
        self
    }

    /// 链接：`build` 拿到本图目标构建下一段，下一段依赖本图目标，结果取下一段目标。
    pub fn then<U, F>(self, build: F) -> TaskGraph<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(TaskNode<T>) -> TaskGraph<U>,
    {
        let next = build(self.target.clone());
        next.add_dependency(&self);

        let mut dependencies = self.all_nodes();
        dependencies.extend(next.dependencies.iter().cloned());

        TaskGraph {
            target: next.target,
            dependencies,
        }
    }

    pub fn map<U, F>(self, label: impl Into<Arc<str>>, transform: F) -> TaskGraph<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> anyhow::Result<U> + Send + 'static,
    {
        let label = label.into();
        self.then(move |upstream| {
            TaskGraph::from_node(TaskNode::new(label, move || async move {
                let value = upstream.result()?;
                transform(value)
            }))
        })
    }

    /// 提交前取消整张图。
    pub fn cancel(&self) {
        for node in self.all_nodes() {
            node.cancel();
        }
    }
}

/// Fan-out/fan-in：各子图并发执行，任一失败则汇总节点以同一错误失败。
pub fn join_all<T, U, F>(
    label: impl Into<Arc<str>>,
    graphs: Vec<TaskGraph<T>>,
    reduce: F,
) -> TaskGraph<U>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
    F: FnOnce(Vec<T>) -> anyhow::Result<U> + Send + 'static,
{
    let targets: Vec<TaskNode<T>> = graphs.iter().map(|graph| graph.target().clone()).collect();
    let combiner = TaskNode::new(label, move || async move {
        let values = targets
            .iter()
            .map(TaskNode::result)
            .collect::<NodeResult<Vec<T>>>()?;
        reduce(values)
    });
    attach_combiner(combiner, graphs)
}

/// Fan-out/fan-in：等全部子图结束（成败均可），把各自结果按输入顺序交给 `reduce`。
pub fn join_settled<T, U, F>(
    label: impl Into<Arc<str>>,
    graphs: Vec<TaskGraph<T>>,
    reduce: F,
) -> TaskGraph<U>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
    F: FnOnce(Vec<NodeResult<T>>) -> anyhow::Result<U> + Send + 'static,
{
    let targets: Vec<TaskNode<T>> = graphs.iter().map(|graph| graph.target().clone()).collect();
    let combiner = TaskNode::settling(label, move || async move {
        let results = targets.iter().map(TaskNode::result).collect();
        reduce(results)
    });
    attach_combiner(combiner, graphs)
}

fn attach_combiner<T, U>(combiner: TaskNode<U>, graphs: Vec<TaskGraph<T>>) -> TaskGraph<U>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
{
    let mut dependencies = Vec::new();
    for graph in graphs {
        combiner.add_dependency(graph.target());
        dependencies.extend(graph.all_nodes());
    }
    TaskGraph::new(combiner, dependencies)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use anyhow::anyhow;
    use parking_lot::Mutex;
    use tokio::sync::Notify;

    use super::*;

    fn recorded(
        label: &'static str,
        value: u32,
        log: &Arc<Mutex<Vec<&'static str>>>,
    ) -> TaskGraph<u32> {
        let log = Arc::clone(log);
        TaskGraph::from_node(TaskNode::new(label, move || async move {
            log.lock().push(label);
            Ok(value)
        }))
    }

    #[tokio::test]
    async fn chained_graphs_run_in_sequence() {
        let executor = GraphExecutor::new(4);
        let log = Arc::new(Mutex::new(Vec::new()));

        let graph = recorded("a", 1, &log)
            .then(|a| {
                let log = Arc::clone(&log);
                TaskGraph::from_node(TaskNode::new("b", move || async move {
                    log.lock().push("b");
                    Ok(a.result()? + 10)
                }))
            })
            .map("c", |value| Ok(value * 2));

        assert_eq!(graph.all_nodes().len(), 3);
        assert_eq!(executor.submit(&graph).join().await.unwrap(), 22);
        assert_eq!(*log.lock(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn head_nodes_are_scheduled_without_new_edges() {
        let executor = GraphExecutor::new(2);
        let log = Arc::new(Mutex::new(Vec::new()));
        let head = recorded("head", 7, &log);
        let head_target = head.target().clone();

        let body = TaskGraph::from_node(TaskNode::new("body", move || async move {
            Ok(head_target.result()? + 1)
        }));
        body.add_dependency(&head);
        let graph = body.inserting_head(head.all_nodes());

        assert_eq!(graph.dependencies().len(), 1);
        assert_eq!(executor.submit(&graph).join().await.unwrap(), 8);
    }

    #[tokio::test]
    async fn join_all_reduces_in_input_order() {
        let executor = GraphExecutor::new(3);
        let log = Arc::new(Mutex::new(Vec::new()));
        let graphs = vec![recorded("x", 3, &log), recorded("y", 9, &log), recorded("z", 5, &log)];

        let graph = join_all("max", graphs, |values| {
            assert_eq!(values, vec![3, 9, 5]);
            Ok(values.into_iter().max().unwrap_or_default())
        });

        assert_eq!(executor.submit(&graph).join().await.unwrap(), 9);
        assert_eq!(log.lock().len(), 3);
    }

    #[tokio::test]
    async fn join_all_fails_fast_on_any_failure() {
        let executor = GraphExecutor::new(3);
        let reduced = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&reduced);
        let ok = TaskGraph::with_result("ok", 1_u32);
        let bad = TaskGraph::from_node(TaskNode::<u32>::new("bad", || async {
            Err(anyhow!("zero liquidity"))
        }));

        let graph = join_all("sum", vec![ok, bad], move |values: Vec<u32>| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(values.iter().sum::<u32>())
        });

        let err = executor.submit(&graph).join().await.unwrap_err();
        assert_eq!(err.to_string(), "zero liquidity");
        assert_eq!(reduced.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn join_settled_sees_every_outcome() {
        let executor = GraphExecutor::new(3);
        let ok = TaskGraph::with_result("ok", 4_u32);
        let bad = TaskGraph::from_node(TaskNode::<u32>::new("bad", || async {
            Err(anyhow!("stale state"))
        }));

        let graph = join_settled("collect", vec![ok, bad], |results| {
            Ok(results.iter().filter(|result| result.is_ok()).count())
        });

        assert_eq!(executor.submit(&graph).join().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn deferred_graph_runs_inner_pipeline() {
        let executor = GraphExecutor::new(1);
        let inner_executor = executor.clone();
        let graph = TaskGraph::deferred("outer", inner_executor, || {
            Ok(TaskGraph::with_result("inner", 2_u32).map("double", |value| Ok(value * 2)))
        });

        assert_eq!(executor.submit(&graph).join().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn cancelling_deferred_node_cancels_inner_graph() {
        let executor = GraphExecutor::new(2);
        let gate = Arc::new(Notify::new());
        let inner_started = Arc::new(Notify::new());
        let inner_node: Arc<Mutex<Option<TaskNode<u32>>>> = Arc::new(Mutex::new(None));

        let waiter = Arc::clone(&gate);
        let started = Arc::clone(&inner_started);
        let slot = Arc::clone(&inner_node);
        let graph = TaskGraph::deferred("outer", executor.clone(), move || {
            let node = TaskNode::new("inner", move || async move {
                started.notify_one();
                waiter.notified().await;
                Ok(1_u32)
            });
            *slot.lock() = Some(node.clone());
            Ok(TaskGraph::from_node(node))
        });

        let run = executor.submit(&graph);
        inner_started.notified().await;
        run.cancel();

        assert!(run.join().await.unwrap_err().is_cancelled());
        let inner = inner_node.lock().clone().expect("inner graph built");
        let outcome = tokio::time::timeout(Duration::from_secs(1), inner.wait())
            .await
            .expect("inner node settles after cancel");
        assert!(outcome.unwrap_err().is_cancelled());
    }
}
