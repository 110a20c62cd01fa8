use std::time::Duration;

use crate::error::{Result, RpcError};

/// The eventual result of a submitted call.
///
/// Dropping it does not cancel the call; the worker still runs it to
/// completion and discards the result.
#[derive(Debug)]
pub struct PendingReply<T> {
    rx: oneshot::Receiver<Result<T>>,
}

pub(crate) fn pending<T>() -> (oneshot::Sender<Result<T>>, PendingReply<T>) {
    let (tx, rx) = oneshot::channel();
    (tx, PendingReply { rx })
}

impl<T> PendingReply<T> {
    /// Block until the call completes.
    pub fn wait(self) -> Result<T> {
        self.rx.recv().unwrap_or(Err(RpcError::SessionClosed))
    }

    /// Block for at most `timeout`.
    ///
    /// This bounds the caller's wait only. The call itself keeps its
    /// place in the queue.
    pub fn wait_timeout(self, timeout: Duration) -> Result<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(oneshot::RecvTimeoutError::Timeout) => Err(RpcError::Timeout(timeout)),
            Err(oneshot::RecvTimeoutError::Disconnected) => Err(RpcError::SessionClosed),
        }
    }
}

#[cfg(feature = "async")]
impl<T> std::future::Future for PendingReply<T> {
    type Output = Result<T>;

    fn poll(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        use std::future::Future;
        use std::pin::Pin;
        use std::task::Poll;

        match Pin::new(&mut self.get_mut().rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(RpcError::SessionClosed)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_result() {
        let (tx, reply) = pending::<u8>();
        tx.send(Ok(7)).unwrap();
        assert_eq!(reply.wait().unwrap(), 7);
    }

    #[test]
    fn dropped_sender_is_session_closed() {
        let (tx, reply) = pending::<u8>();
        drop(tx);
        assert!(matches!(reply.wait(), Err(RpcError::SessionClosed)));
    }

    #[test]
    fn wait_timeout_expires() {
        let (_tx, reply) = pending::<u8>();
        let err = reply.wait_timeout(Duration::from_millis(20)).unwrap_err();
        assert!(err.is_timeout());
    }
}
