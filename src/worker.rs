// imgpress/src/worker.rs
//! Background compression. One request runs on its own thread and reports
//! exactly one outcome over a channel, so a caller with an event loop can poll
//! with [`CompressionWorker::try_recv`] instead of blocking.

use crate::core::pipeline::ImagePipeline;
use crate::core::{CompressError, CompressionRequest, CompressionResult, Result};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

pub struct CompressionWorker {
    receiver: Receiver<Result<CompressionResult>>,
    handle: Option<JoinHandle<()>>,
}

impl CompressionWorker {
    pub fn spawn(request: CompressionRequest) -> Self {
        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            log::debug!("Worker started for {}", request.input_path.display());
            let outcome = ImagePipeline::new().compress(&request);
            if let Err(e) = &outcome {
                log::debug!("Worker failed: {}", e);
            }
            // The receiver may already be gone; nothing left to report to.
            let _ = tx.send(outcome);
        });

        Self {
            receiver: rx,
            handle: Some(handle),
        }
    }

    /// Block until the outcome arrives.
    pub fn wait(mut self) -> Result<CompressionResult> {
        let outcome = self.receiver.recv().unwrap_or_else(|_| Err(worker_lost()));
        self.join();
        outcome
    }

    /// `None` while the job is still running.
    pub fn try_recv(&mut self) -> Option<Result<CompressionResult>> {
        match self.receiver.try_recv() {
            Ok(outcome) => {
                self.join();
                Some(outcome)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.join();
                Some(Err(worker_lost()))
            }
        }
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Compression worker panicked");
            }
        }
    }
}

fn worker_lost() -> CompressError {
    CompressError::ProcessingFailed("Compression worker exited without a result".to_string())
}
