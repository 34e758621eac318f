// pump.rs — §4.F Packet pump
//
// A bounded FIFO feeding a single worker thread. The worker polls with a
// 1-second timeout so that `stop()` is noticed promptly without the queue
// ever needing a wakeup signal of its own. `Processor` is the single-method
// capability an observer (key-recovery, sniffer, ACK tracker) implements.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const QUEUE_CAPACITY: usize = 256;
const POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Anything that consumes one raw MAC frame at a time.
pub trait Processor: Send {
    fn process(&mut self, data: Vec<u8>);
}

impl<F: FnMut(Vec<u8>) + Send> Processor for F {
    fn process(&mut self, data: Vec<u8>) {
        self(data)
    }
}

/// Owns the producer side of the queue plus a handle to stop and join the
/// worker. `start` takes ownership of the processor; only one worker runs
/// per pump.
pub struct PacketPump {
    sender: SyncSender<Vec<u8>>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl PacketPump {
    pub fn start(mut processor: impl Processor + 'static) -> Self {
        let (sender, receiver) = mpsc::sync_channel::<Vec<u8>>(QUEUE_CAPACITY);
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = Arc::clone(&stop);

        let worker = thread::spawn(move || {
            while !worker_stop.load(Ordering::Acquire) {
                match receiver.recv_timeout(POLL_TIMEOUT) {
                    Ok(frame) => processor.process(frame),
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        Self { sender, stop, worker: Some(worker) }
    }

    /// Enqueues a raw inbound frame. Blocks briefly if the queue is full;
    /// the radio transport thread never blocks on the observer per spec.
    pub fn feed(&self, data: Vec<u8>) {
        if self.sender.send(data).is_err() {
            log::warn!("packet pump: feed after worker stopped, dropping frame");
        }
    }

    /// Signals the worker to stop after its current 1-second poll window.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Blocks until the worker thread has exited, or `timeout` elapses.
    /// Returns `true` if the worker joined within the deadline.
    pub fn join(&mut self, timeout: Duration) -> bool {
        let Some(handle) = self.worker.take() else {
            return true;
        };
        if handle.is_finished() {
            let _ = handle.join();
            return true;
        }
        // std::thread has no timed join; approximate by polling is_finished.
        let deadline = std::time::Instant::now() + timeout;
        let mut handle = Some(handle);
        while std::time::Instant::now() < deadline {
            if handle.as_ref().unwrap().is_finished() {
                let _ = handle.take().unwrap().join();
                return true;
            }
            thread::sleep(Duration::from_millis(20));
        }
        self.worker = handle;
        false
    }
}

impl Drop for PacketPump {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

// EOF
