//! Waiting for shared state to become ready.
//!
//! The state is published through a [`watch`] channel by whoever owns it (e.g.
//! the token metadata store publishing its `loading` flag). Waiting is driven
//! by change notifications, so nothing spins while the owner is busy, and a
//! dropped owner fails the wait instead of leaving it pending forever.

use {std::time::Duration, thiserror::Error, tokio::sync::watch};

#[derive(Clone, Debug, Error, PartialEq)]
pub enum GateError {
    #[error("state owner went away before the condition held")]
    Closed,
    #[error("condition did not hold within {0:?}")]
    Timeout(Duration),
}

/// Resolves the first time `predicate` holds for the current value.
pub async fn wait_until<T>(
    mut receiver: watch::Receiver<T>,
    predicate: impl FnMut(&T) -> bool,
) -> Result<(), GateError> {
    let result = receiver.wait_for(predicate).await.map(|_| ());
    result.map_err(|_| GateError::Closed)
}

/// Like [`wait_until`] but gives up after `timeout` if one is set.
pub async fn wait_until_within<T>(
    receiver: watch::Receiver<T>,
    predicate: impl FnMut(&T) -> bool,
    timeout: Option<Duration>,
) -> Result<(), GateError> {
    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, wait_until(receiver, predicate))
            .await
            .map_err(|_| GateError::Timeout(timeout))?,
        None => wait_until(receiver, predicate).await,
    }
}

#[cfg(test)]
mod tests {
    use {super::*, futures::FutureExt};

    #[tokio::test]
    async fn ready_immediately() {
        let (_sender, receiver) = watch::channel(false);
        assert_eq!(
            wait_until(receiver, |loading| !*loading)
                .now_or_never()
                .unwrap(),
            Ok(())
        );
    }

    #[tokio::test]
    async fn waits_for_state_change() {
        let (sender, receiver) = watch::channel(true);
        let wait = tokio::spawn(wait_until(receiver, |loading| !*loading));

        tokio::task::yield_now().await;
        assert!(!wait.is_finished());

        sender.send_replace(false);
        assert_eq!(wait.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn ignores_changes_that_do_not_satisfy_predicate() {
        let (sender, receiver) = watch::channel(0);
        let wait = tokio::spawn(wait_until(receiver, |value| *value >= 2));

        sender.send_replace(1);
        tokio::task::yield_now().await;
        assert!(!wait.is_finished());

        sender.send_replace(2);
        assert_eq!(wait.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn fails_when_owner_is_dropped() {
        let (sender, receiver) = watch::channel(true);
        let wait = tokio::spawn(wait_until(receiver, |loading| !*loading));
        drop(sender);
        assert_eq!(wait.await.unwrap(), Err(GateError::Closed));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out() {
        let (_sender, receiver) = watch::channel(true);
        let timeout = Duration::from_secs(5);
        assert_eq!(
            wait_until_within(receiver, |loading| !*loading, Some(timeout)).await,
            Err(GateError::Timeout(timeout))
        );
    }
}
