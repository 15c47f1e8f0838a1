// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


//! The stream processor thread.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use tessera_agents::StreamManager;
use tessera_core::protocol::{StreamCommand, StreamEvent};
use tessera_core::{Clock, MeshId, StreamConfig, StreamResult, SystemClock};

use crate::host::StreamHost;

/// Runs a [`StreamManager`] on a background thread.
///
/// Each loop iteration drains the pending commands, ticks every mesh once,
/// sends the resulting loans and failures, then waits for the next command
/// for at most `idle_tick_delay_ms`.
pub struct StreamService {
    config: StreamConfig,
    clock: Arc<dyn Clock>,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    channels: Option<(Receiver<StreamCommand>, Sender<StreamEvent>)>,
}

impl std::fmt::Debug for StreamService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamService")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish()
    }
}

impl StreamService {
    /// Creates a stopped service and the host handle that talks to it.
    pub fn new(config: StreamConfig) -> (Self, StreamHost) {
        let (command_tx, command_rx) = crossbeam_channel::bounded(config.command_buffer_size);
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let service = Self {
            config,
            clock: Arc::new(SystemClock),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            channels: Some((command_rx, event_tx)),
        };
        (service, StreamHost::new(command_tx, event_rx))
    }

    /// Replaces the clock used to time processing passes.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns `true` while the processor thread is alive.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starts the processor thread. A service can only be started once.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        let Some((commands, events)) = self.channels.take() else {
            log::warn!("StreamService: already ran once, not restarting.");
            return;
        };

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let manager = StreamManager::with_clock(self.config.clone(), Arc::clone(&self.clock));
        let idle_delay = self.config.idle_tick_delay();

        let handle = thread::spawn(move || {
            let mut worker = Worker { manager, events };
            log::info!("Stream service thread started.");

            'run: while running.load(Ordering::Relaxed) {
                // 1. Ingest every pending command
                loop {
                    match commands.try_recv() {
                        Ok(command) => {
                            if worker.handle(command).is_break() {
                                break 'run;
                            }
                        }
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => {
                            log::info!("Stream service: host disconnected.");
                            break 'run;
                        }
                    }
                }

                // 2. One processing pass over every mesh
                worker.tick();

                // 3. Wait for the next command or the next tick
                match commands.recv_timeout(idle_delay) {
                    Ok(command) => {
                        if worker.handle(command).is_break() {
                            break 'run;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => {
                        log::info!("Stream service: host disconnected.");
                        break 'run;
                    }
                }
            }

            running.store(false, Ordering::SeqCst);
            log::info!(
                "Stream service thread stopped with {} meshes registered.",
                worker.manager.mesh_count()
            );
        });

        self.handle = Some(handle);
    }

    /// Stops the processor thread and waits for it to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Stream service thread panicked.");
            }
        }
    }
}

impl Drop for StreamService {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State owned by the processor thread.
struct Worker {
    manager: StreamManager,
    events: Sender<StreamEvent>,
}

impl Worker {
    fn emit(&self, event: StreamEvent) {
        if self.events.send(event).is_err() {
            log::debug!("Stream service: event dropped, host receiver is gone.");
        }
    }

    fn report<T>(&self, mesh_id: MeshId, result: StreamResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                log::warn!("Mesh {mesh_id}: {error}");
                self.emit(StreamEvent::Failed { mesh_id, error });
                None
            }
        }
    }

    fn handle(&mut self, command: StreamCommand) -> ControlFlow<()> {
        match command {
            StreamCommand::Register {
                mesh_id,
                descriptor,
            } => {
                let result = self.manager.register_as(mesh_id, descriptor);
                if self.report(mesh_id, result).is_some() {
                    self.emit(StreamEvent::Registered { mesh_id });
                }
            }
            StreamCommand::UpdateVisibility { mesh_id, update } => {
                let result = self.manager.update_visibility(mesh_id, &update);
                self.report(mesh_id, result);
            }
            StreamCommand::ReturnBuffers(loan) => {
                let mesh_id = loan.mesh_id;
                let result = self.manager.return_buffers(loan);
                self.report(mesh_id, result);
            }
            StreamCommand::ChangeLod { mesh_id, ids, lods } => {
                let result = self.manager.change_lod(mesh_id, &ids, &lods);
                self.report(mesh_id, result);
            }
            StreamCommand::Deregister { mesh_id } => {
                let result = self.manager.deregister(mesh_id);
                self.report(mesh_id, result);
            }
            StreamCommand::QueryStatus { mesh_id } => {
                let result = self.manager.status(mesh_id);
                if let Some(status) = self.report(mesh_id, result) {
                    self.emit(StreamEvent::Status(status));
                }
            }
            StreamCommand::Shutdown => {
                log::info!("Stream service: shutdown requested.");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn tick(&mut self) {
        let report = self.manager.tick();
        for loan in report.loans {
            log::debug!("Mesh {}: buffers ready", loan.mesh_id);
            self.emit(StreamEvent::BufferReady(loan));
        }
        for (mesh_id, error) in report.failures {
            self.emit(StreamEvent::Failed { mesh_id, error });
        }

        if cfg!(debug_assertions) {
            if let Err((mesh_id, error)) = self.manager.check_invariants() {
                log::error!("Mesh {mesh_id}: invariant violated: {error}");
                self.emit(StreamEvent::Failed { mesh_id, error });
            }
        }
    }
}
