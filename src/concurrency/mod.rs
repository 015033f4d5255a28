use tracing::debug;

const WORKERS_ENV: &str = "HYDRA_ROUTER_WORKERS";
const DEFAULT_WORKERS: usize = 8;

fn configured_worker_count() -> Option<usize> {
    std::env::var(WORKERS_ENV).ok().and_then(|raw| parse_worker_count(&raw))
}

fn parse_worker_count(raw: &str) -> Option<usize> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<usize>().ok().filter(|value| *value > 0)
}

/// 配置值优先，其次环境变量，最后取 CPU 核数（至少 `DEFAULT_WORKERS`）。
pub fn resolve_worker_count(configured: Option<usize>) -> usize {
    let workers = configured
        .filter(|value| *value > 0)
        .or_else(configured_worker_count)
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|cores| cores.get().max(DEFAULT_WORKERS))
                .unwrap_or(DEFAULT_WORKERS)
        });
    debug!(target: "concurrency", workers, "任务图执行器 worker 数");
    workers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_count_rejects_blank_and_zero() {
        assert_eq!(parse_worker_count("  "), None);
        assert_eq!(parse_worker_count("0"), None);
        assert_eq!(parse_worker_count(" 12 "), Some(12));
        assert_eq!(parse_worker_count("many"), None);
    }

    #[test]
    fn configured_value_wins() {
        assert_eq!(resolve_worker_count(Some(3)), 3);
        assert!(resolve_worker_count(Some(0)) >= 1);
    }
}
