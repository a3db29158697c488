//! Pipeline stages and their completion slots.
//!
//! Each stage worker hands back a boxed future; the scheduler spawns it and
//! keeps only the receiving end of a one-shot channel in the stage's slot.
//! Polling the slot never blocks.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::error::{Result, SeqreadError};

/// One UTF-8 message waiting to be synthesized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingText(pub String);

/// Encoded audio produced by the synthesizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBuffer(pub Vec<u8>);

impl AudioBuffer {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub type StageFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'static>>;

/// Waits for one inbound message.
pub trait Receive: Send + Sync {
    fn receive(&self) -> StageFuture<PendingText>;
}

/// Converts one text into audio.
pub trait Synthesize: Send + Sync {
    fn synthesize(&self, text: PendingText) -> StageFuture<AudioBuffer>;
}

/// Plays one audio buffer to completion.
pub trait Play: Send + Sync {
    fn play(&self, audio: AudioBuffer) -> StageFuture<()>;
}

/// Bookkeeping for at most one in-flight operation of a stage.
#[derive(Debug)]
pub enum StageSlot<T> {
    Idle,
    Running(oneshot::Receiver<Result<T>>),
    Completed(T),
    Failed(SeqreadError),
}

impl<T> Default for StageSlot<T> {
    fn default() -> Self {
        StageSlot::Idle
    }
}

impl<T: Send + 'static> StageSlot<T> {
    /// Spawn `work` and move the slot to `Running`.
    ///
    /// Returns `false` (and drops `work` unstarted) unless the slot is idle.
    pub fn dispatch(&mut self, work: StageFuture<T>) -> bool {
        if !self.is_idle() {
            return false;
        }
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            // The scheduler never drops a running slot, so a failed send
            // only happens at shutdown.
            let _ = tx.send(work.await);
        });
        *self = StageSlot::Running(rx);
        true
    }

    /// Move a finished `Running` slot to `Completed` or `Failed`.
    pub fn poll(&mut self, stage: &'static str) {
        let StageSlot::Running(rx) = self else {
            return;
        };
        match rx.try_recv() {
            Ok(Ok(value)) => *self = StageSlot::Completed(value),
            Ok(Err(e)) => *self = StageSlot::Failed(e),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Closed) => *self = StageSlot::Failed(SeqreadError::WorkerLost { stage }),
        }
    }

    /// Take a finished result out of the slot, leaving it `Idle`.
    pub fn take_finished(&mut self) -> Option<Result<T>> {
        match std::mem::take(self) {
            StageSlot::Completed(value) => Some(Ok(value)),
            StageSlot::Failed(e) => Some(Err(e)),
            other => {
                *self = other;
                None
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, StageSlot::Idle)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, StageSlot::Running(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn settle<T: Send + 'static>(slot: &mut StageSlot<T>) {
        for _ in 0..100 {
            slot.poll("test");
            if !slot.is_running() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn completes_and_returns_to_idle() {
        let mut slot = StageSlot::<u32>::Idle;
        assert!(slot.dispatch(Box::pin(async { Ok::<u32, SeqreadError>(7) })));
        assert!(slot.is_running());

        settle(&mut slot).await;
        assert!(matches!(slot, StageSlot::Completed(7)));
        assert_eq!(slot.take_finished().unwrap().unwrap(), 7);
        assert!(slot.is_idle());
    }

    #[tokio::test]
    async fn refuses_second_dispatch_while_running() {
        let mut slot = StageSlot::<u32>::Idle;
        assert!(slot.dispatch(Box::pin(std::future::pending::<Result<u32>>())));
        assert!(!slot.dispatch(Box::pin(async { Ok::<u32, SeqreadError>(1) })));
        slot.poll("test");
        assert!(slot.is_running());
        assert!(slot.take_finished().is_none());
        assert!(slot.is_running());
    }

    #[tokio::test]
    async fn error_becomes_failed() {
        let mut slot = StageSlot::<()>::Idle;
        slot.dispatch(Box::pin(async {
            Err::<(), SeqreadError>(SeqreadError::Transport("bad".into()))
        }));
        settle(&mut slot).await;
        assert!(matches!(slot.take_finished(), Some(Err(SeqreadError::Transport(_)))));
    }

    async fn explode() -> Result<()> {
        panic!("worker blew up")
    }

    #[tokio::test]
    async fn panicking_worker_is_reported_as_lost() {
        let mut slot = StageSlot::<()>::Idle;
        slot.dispatch(Box::pin(explode()));
        settle(&mut slot).await;
        assert!(matches!(
            slot.take_finished(),
            Some(Err(SeqreadError::WorkerLost { stage: "test" }))
        ));
    }
}
