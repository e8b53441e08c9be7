//! Contract between the executor and the input/output backend.
use crate::event::{InputEvent, ServiceEvent};
use crate::handling::HandlingResult;
use crate::timer::SharedTimer;

/// Backend the executor drives: the single source of input events and the
/// sink for every outbound message.
///
/// Implementations own the client sessions and the actor registry. Input
/// events are anything external to the main loop which affects its state: a
/// received service request, a timer deadline, a caught signal, an actor
/// joining or leaving. Output calls enqueue RPTL messages on per-client
/// queues which [`synchronize`](ServerEndpoint::synchronize) hands to the
/// transport.
pub trait ServerEndpoint {
    /// `true` once the endpoint stopped producing input events.
    fn closed(&self) -> bool;

    /// Asks the endpoint to stop; pending outbound queues are still flushed
    /// by the next `synchronize()` call.
    fn close(&mut self);

    /// Blocks until the next input event occurs.
    fn wait_for_input(&mut self) -> eyre::Result<InputEvent>;

    /// Sends a service request response privately to the actor which issued
    /// the request, wrapped for the wire.
    fn reply_to(&mut self, actor: u64, sr_response: &str) -> eyre::Result<()>;

    /// Sends a polled service event to its target actors, wrapped for the
    /// wire; broadcast when the event targets everyone.
    fn output_event(&mut self, event: ServiceEvent) -> eyre::Result<()>;

    /// Authoritative disconnection routine for a registered actor: emits the
    /// matching `Left` input event, unbinds the actor, notifies every client
    /// and records the disconnection reason on the dead session.
    fn close_pipeline_with(&mut self, actor: u64, reason: HandlingResult) -> eyre::Result<()>;

    /// Arms a Ready timer: transitions it to Pending and starts wall-clock
    /// measurement of its countdown. The deadline surfaces later as a
    /// [`TimerTriggered`](InputEvent::TimerTriggered) input event.
    fn begin_countdown(&mut self, timer: SharedTimer) -> eyre::Result<()>;

    /// Walks every client's outbound queue and hands buffered messages to
    /// the transport, reaping dead sessions once their queue drained.
    fn synchronize(&mut self) -> eyre::Result<()>;
}
