//! Synchronous hand-off from the game loop to the designated render thread.
//!
//! The windowing substrate requires all drawing, commits, and validity
//! checks to happen on one thread; doing them elsewhere is undefined
//! behavior at the host level, not merely a race. The game loop runs on its
//! own timing thread and submits each render as an explicit job over a
//! channel, blocking on a rendezvous reply until the frame has committed.
//! That makes rendering synchronous from the game loop's perspective while
//! keeping the host single-threaded, and it is also what guarantees that no
//! two renders ever overlap: the caller cannot submit the next tick until
//! the previous one answered.

use std::thread::{self, JoinHandle};

use crossbeam::channel::{bounded, unbounded, Sender};
use log::{error, info};

use crate::error::{RenderError, RenderResult};
use crate::gate::RenderGate;
use crate::host::{HostNotice, WindowHost};

enum Job {
    Render {
        reply: Sender<RenderResult<()>>,
    },
    Notice {
        notice: HostNotice,
        reply: Sender<RenderResult<()>>,
    },
    Shutdown,
}

/// Handle held by the game loop. Submits work to the render thread and
/// blocks until it completes.
pub struct RenderHandle {
    jobs: Sender<Job>,
    thread: Option<JoinHandle<()>>,
}

impl RenderHandle {
    /// Spawn the designated render thread.
    ///
    /// `build` runs on the new thread and constructs the host and gate
    /// there, so neither ever crosses a thread boundary; only messages do.
    pub fn spawn<H, F>(name: &str, build: F) -> RenderResult<Self>
    where
        H: WindowHost + 'static,
        F: FnOnce() -> RenderResult<(H, RenderGate)> + Send + 'static,
    {
        let (jobs, inbox) = unbounded::<Job>();
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let (mut host, mut gate) = match build() {
                    Ok(parts) => parts,
                    Err(e) => {
                        error!("render thread init failed: {}", e);
                        // Answer every caller so nobody blocks forever.
                        for job in inbox.iter() {
                            match job {
                                Job::Render { reply } | Job::Notice { reply, .. } => {
                                    let _ = reply.send(Err(e.clone()));
                                }
                                Job::Shutdown => break,
                            }
                        }
                        return;
                    }
                };

                info!("render thread up");
                for job in inbox.iter() {
                    match job {
                        Job::Render { reply } => {
                            let _ = reply.send(gate.render_now(&mut host));
                        }
                        Job::Notice { notice, reply } => {
                            let _ = reply.send(gate.notice(&mut host, notice));
                        }
                        Job::Shutdown => break,
                    }
                }
                gate.shutdown(&mut host);
                info!("render thread down");
            })
            .map_err(|e| RenderError::Host(format!("failed to spawn render thread: {}", e)))?;

        Ok(Self {
            jobs,
            thread: Some(thread),
        })
    }

    /// Render the next completed frame.
    ///
    /// Blocks until the frame has committed (or failed) on the render
    /// thread. Safe to call again immediately after return; the next call
    /// simply produces the next frame.
    pub fn render_now(&self) -> RenderResult<()> {
        self.submit(|reply| Job::Render { reply })
    }

    /// Forward a host notification, in order with submitted renders.
    pub fn notice(&self, notice: HostNotice) -> RenderResult<()> {
        self.submit(|reply| Job::Notice { notice, reply })
    }

    /// Stop the render thread and wait for it to exit.
    pub fn shutdown(mut self) {
        self.shutdown_inner();
    }

    fn submit(&self, make: impl FnOnce(Sender<RenderResult<()>>) -> Job) -> RenderResult<()> {
        let (reply_tx, reply_rx) = bounded(1);
        self.jobs
            .send(make(reply_tx))
            .map_err(|_| RenderError::Disconnected)?;
        reply_rx.recv().map_err(|_| RenderError::Disconnected)?
    }

    fn shutdown_inner(&mut self) {
        let _ = self.jobs.send(Job::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for RenderHandle {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}
