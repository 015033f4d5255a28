//! 异步任务依赖图：节点、组合子与有界执行器。

mod error;
mod executor;
mod node;
mod wrapper;

pub use error::{GraphError, NodeResult};
pub use executor::{CancelHandle, GraphExecutor, GraphRun};
pub use node::{NodeId, NodeOptions, Schedulable, TaskNode};
pub use wrapper::{TaskGraph, join_all, join_settled};
