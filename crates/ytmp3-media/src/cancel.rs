//! Cancellation primitive shared by the child-process runners.

use tokio::sync::watch;

/// Resolve once the cancellation flag flips to true.
///
/// Intended as a `tokio::select!` arm racing a `Child::wait`: the winner
/// decides whether the child gets killed. If the sender side is dropped
/// without ever signalling, this pends forever so the sibling branch wins.
pub async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn resolves_on_signal() {
        let (tx, mut rx) = watch::channel(false);
        let waiter = tokio::spawn(async move { cancelled(&mut rx).await });
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancellation did not resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn resolves_immediately_when_already_set() {
        let (tx, mut rx) = watch::channel(true);
        drop(tx);
        tokio::time::timeout(Duration::from_millis(100), cancelled(&mut rx))
            .await
            .expect("pre-set flag should resolve at once");
    }

    #[tokio::test]
    async fn pends_after_sender_drop_without_signal() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        let res = tokio::time::timeout(Duration::from_millis(50), cancelled(&mut rx)).await;
        assert!(res.is_err(), "dropped sender must not count as cancellation");
    }
}
