//! Poll loop that drives a `TurnController`
//!
//! Audio handles are not `Send`, so the controller stays on the thread that
//! calls `VoiceRuntime::run`. Other threads talk to it through a
//! `RuntimeHandle`: commands go in over a channel, snapshots come out over
//! another and through the shared session.

use crate::messages::Conversation;
use crate::turn::controller::TurnController;
use crate::turn::state::{SessionSnapshot, SharedSession};
use crate::{Result, VoiceError};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Commands accepted by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeCommand {
    /// Begin a recording turn
    Start,
    /// Finish the recording and submit it
    Stop,
    /// Release everything and go idle
    Close,
    /// Close and leave the loop
    Shutdown,
}

/// Handle for controlling the runtime from other threads
#[derive(Clone)]
pub struct RuntimeHandle {
    command_tx: Sender<RuntimeCommand>,
    update_rx: Receiver<SessionSnapshot>,
    session: SharedSession,
    conversation: Conversation,
}

impl RuntimeHandle {
    /// Send a command to the runtime
    pub fn send_command(&self, cmd: RuntimeCommand) -> Result<()> {
        self.command_tx
            .send(cmd)
            .map_err(|e| VoiceError::Channel(format!("Failed to send command: {}", e)))
    }

    pub fn start(&self) -> Result<()> {
        self.send_command(RuntimeCommand::Start)
    }

    pub fn stop(&self) -> Result<()> {
        self.send_command(RuntimeCommand::Stop)
    }

    pub fn close(&self) -> Result<()> {
        self.send_command(RuntimeCommand::Close)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send_command(RuntimeCommand::Shutdown)
    }

    /// Latest published session state
    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    /// Try to receive the next state change
    pub fn try_recv_update(&self) -> Option<SessionSnapshot> {
        self.update_rx.try_recv().ok()
    }

    /// Receiver of state changes, one snapshot per change
    pub fn update_receiver(&self) -> Receiver<SessionSnapshot> {
        self.update_rx.clone()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }
}

pub struct VoiceRuntime {
    controller: TurnController,
    command_rx: Receiver<RuntimeCommand>,
    update_tx: Sender<SessionSnapshot>,
    poll_interval: Duration,
}

impl VoiceRuntime {
    pub fn new(controller: TurnController, channel_buffer_size: usize) -> (Self, RuntimeHandle) {
        let (command_tx, command_rx) = bounded(channel_buffer_size);
        let (update_tx, update_rx) = bounded(channel_buffer_size);

        let handle = RuntimeHandle {
            command_tx,
            update_rx,
            session: controller.shared(),
            conversation: controller.conversation().clone(),
        };

        let poll_interval = controller.config().silence.poll_interval();
        let runtime = Self {
            controller,
            command_rx,
            update_tx,
            poll_interval,
        };

        (runtime, handle)
    }

    pub fn controller(&self) -> &TurnController {
        &self.controller
    }

    /// Run until `Shutdown` arrives or every handle is dropped
    ///
    /// Commands are applied as they arrive; the controller ticks once per
    /// poll interval whether or not commands keep coming. The session is
    /// closed on exit.
    pub fn run(mut self) {
        info!("Voice runtime started");

        let mut last = self.controller.snapshot();
        let mut next_tick = Instant::now() + self.poll_interval;

        loop {
            match self.command_rx.recv_deadline(next_tick) {
                Ok(RuntimeCommand::Shutdown) => {
                    info!("Runtime shutdown requested");
                    break;
                }
                Ok(cmd) => self.apply(cmd),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("Command channel disconnected");
                    break;
                }
            }

            // A steady stream of commands must not starve the tick
            let now = Instant::now();
            if now >= next_tick {
                self.controller.tick();
                next_tick += self.poll_interval;

                // Don't try to catch up after a stall
                if next_tick < now {
                    next_tick = now + self.poll_interval;
                }
            }

            last = self.emit_if_changed(last);
        }

        self.controller.close();
        self.emit_if_changed(last);
        info!("Voice runtime stopped");
    }

    fn apply(&mut self, cmd: RuntimeCommand) {
        debug!("Command: {:?}", cmd);
        match cmd {
            RuntimeCommand::Start => self.controller.start(),
            RuntimeCommand::Stop => self.controller.stop(),
            RuntimeCommand::Close => self.controller.close(),
            RuntimeCommand::Shutdown => {}
        }
    }

    fn emit_if_changed(&self, last: SessionSnapshot) -> SessionSnapshot {
        let snapshot = self.controller.snapshot();
        if snapshot == last {
            return last;
        }

        match self.update_tx.try_send(snapshot.clone()) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(_)) => debug!("Update channel full, dropping snapshot"),
        }
        snapshot
    }
}
