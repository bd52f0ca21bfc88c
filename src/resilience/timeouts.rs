//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap every network-bound future with a deadline
//! - Report an elapsed deadline as `KazeError::Timeout`, never a hang

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

use crate::types::{KazeError, KazeResult};

/// Run `fut` under `limit`. An elapsed deadline becomes `KazeError::Timeout`.
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> KazeResult<T>
where
    F: Future<Output = KazeResult<T>>,
{
    match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(KazeError::Timeout(limit.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_passes_through_result() {
        let ok = with_timeout(Duration::from_millis(100), async { Ok::<_, KazeError>(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err = with_timeout(Duration::from_millis(100), async {
            Err::<u8, _>(KazeError::Transport("refused".into()))
        })
        .await;
        assert!(matches!(err, Err(KazeError::Transport(_))));
    }

    #[tokio::test]
    async fn test_elapsed_deadline() {
        let result = with_timeout(Duration::from_millis(20), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, KazeError>(())
        })
        .await;
        assert!(matches!(result, Err(KazeError::Timeout(20))));
    }
}
