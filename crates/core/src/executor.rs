//! Single-threaded cooperative main loop.
use tracing::{debug, error, info};

use crate::endpoint::ServerEndpoint;
use crate::event::InputEvent;
use crate::handling::HandlingResult;
use crate::ser::{SerError, SerProtocol};

type JoinedHook = Box<dyn FnMut(u64, &str)>;
type LeftHook = Box<dyn FnMut(u64, &HandlingResult)>;

/// Drives the SER protocol from the endpoint's input events.
///
/// Each loop iteration blocks on one input event, dispatches it, drains
/// every pending service event in global emission order, arms the timers
/// services requested, then asks the endpoint to flush the per-client
/// outbound queues. Everything runs on the calling thread; handlers must not
/// block.
pub struct Executor<E: ServerEndpoint> {
    endpoint: E,
    ser_protocol: SerProtocol,
    joined_hooks: Vec<JoinedHook>,
    left_hooks: Vec<LeftHook>,
}

impl<E: ServerEndpoint> Executor<E> {
    pub fn new(endpoint: E, ser_protocol: SerProtocol) -> Self {
        Self {
            endpoint,
            ser_protocol,
            joined_hooks: Vec::new(),
            left_hooks: Vec::new(),
        }
    }

    /// Registers a hook run whenever an actor joins the server.
    pub fn on_joined(mut self, hook: impl FnMut(u64, &str) + 'static) -> Self {
        self.joined_hooks.push(Box::new(hook));
        self
    }

    /// Registers a hook run whenever an actor leaves the server.
    pub fn on_left(mut self, hook: impl FnMut(u64, &HandlingResult) + 'static) -> Self {
        self.left_hooks.push(Box::new(hook));
        self
    }

    pub fn endpoint_mut(&mut self) -> &mut E {
        &mut self.endpoint
    }

    /// Runs the main loop until the endpoint is closed.
    ///
    /// Returns `true` on clean shutdown, `false` if an error escaped the
    /// loop body.
    pub fn run(&mut self) -> bool {
        info!(target: "executor", "Starting main loop");

        match self.main_loop() {
            Ok(()) => {
                info!(target: "executor", "Stopped");
                true
            }
            Err(err) => {
                error!(target: "executor", "Runtime error: {}", err);
                false
            }
        }
    }

    fn main_loop(&mut self) -> eyre::Result<()> {
        while !self.endpoint.closed() {
            let input_event = self.endpoint.wait_for_input()?;
            self.dispatch(input_event)?;

            // Events emitted while handling this input are delivered before
            // the next input event is fetched.
            while let Some(service_event) = self.ser_protocol.poll_service_event() {
                debug!(target: "executor", "Output event: {}", service_event.command());
                self.endpoint.output_event(service_event)?;
            }

            for timer in self.ser_protocol.waiting_timers() {
                self.endpoint.begin_countdown(timer)?;
            }

            self.endpoint.synchronize()?;
        }

        Ok(())
    }

    fn dispatch(&mut self, input_event: InputEvent) -> eyre::Result<()> {
        match input_event {
            InputEvent::None => debug!(target: "executor", "Null event, skipping"),
            InputEvent::Stop { signal } => {
                info!(target: "executor", "Stopping server: caught signal {}", signal);
                self.endpoint.close();
            }
            InputEvent::ServiceRequest { uid, request } => {
                debug!(target: "executor", "Service request received from actor {}", uid);

                match self.ser_protocol.handle_service_request(uid, &request) {
                    Ok(response) => self.endpoint.reply_to(uid, &response)?,
                    Err(
                        err @ (SerError::InvalidRequestFormat(_) | SerError::ServiceNotFound(_)),
                    ) => {
                        error!(
                            target: "executor",
                            "SER protocol broken for actor {}: {}. Shutting down its connection",
                            uid, err
                        );
                        self.endpoint
                            .close_pipeline_with(uid, HandlingResult::failure(err.to_string()))?;
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            InputEvent::TimerTriggered { token } => {
                // The timer already transitioned and ran its callbacks.
                debug!(target: "executor", "Timer {} triggered", token);
            }
            InputEvent::Joined { uid, name } => {
                debug!(target: "executor", "Actor {} \"{}\" joined", uid, name);
                for hook in &mut self.joined_hooks {
                    hook(uid, &name);
                }
            }
            InputEvent::Left { uid, reason } => {
                debug!(target: "executor", "Actor {} left", uid);
                for hook in &mut self.left_hooks {
                    hook(uid, &reason);
                }
            }
        }

        Ok(())
    }
}
