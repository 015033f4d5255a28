//! HydraDX 多跳路由报价、兑换调用构建与代理账户同步，底层为异步任务依赖图。

pub mod cache;
pub mod cli;
pub mod concurrency;
pub mod config;
pub mod graph;
pub mod hydra;
pub mod monitoring;
pub mod sync;
