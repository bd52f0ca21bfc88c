//! First-success racing over concurrent futures.

use std::future::Future;

use futures_util::stream::{FuturesUnordered, StreamExt};

use crate::types::{KazeError, KazeResult};

/// Resolve with the first future to succeed. Returns every error, in
/// completion order, when all of them fail. Futures still pending when a
/// winner appears are dropped.
pub async fn race_to_success<T, F, I>(futures: I) -> Result<T, Vec<KazeError>>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = KazeResult<T>>,
{
    let mut pending: FuturesUnordered<F> = futures.into_iter().collect();
    let mut errors = Vec::new();
    while let Some(outcome) = pending.next().await {
        match outcome {
            Ok(value) => return Ok(value),
            Err(e) => errors.push(e),
        }
    }
    Err(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn after(ms: u64, outcome: KazeResult<&'static str>) -> KazeResult<&'static str> {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        outcome
    }

    #[tokio::test]
    async fn test_fastest_success_wins() {
        let winner = race_to_success(vec![
            Box::pin(after(80, Ok("slow"))),
            Box::pin(after(5, Err(KazeError::Timeout(5)))),
            Box::pin(after(20, Ok("fast"))),
        ])
        .await;
        assert_eq!(winner.unwrap(), "fast");
    }

    #[tokio::test]
    async fn test_all_failures_are_collected() {
        let errors = race_to_success(vec![
            Box::pin(after(1, Err(KazeError::Timeout(1)))),
            Box::pin(after(2, Err(KazeError::Transport("refused".into())))),
        ])
        .await
        .unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], KazeError::Timeout(1)));
    }

    #[tokio::test]
    async fn test_empty_input_fails() {
        let empty: Vec<std::future::Ready<KazeResult<u8>>> = Vec::new();
        assert!(race_to_success(empty).await.unwrap_err().is_empty());
    }
}
