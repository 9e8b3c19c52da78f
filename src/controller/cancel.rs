//! Cancellation of the active stream.

use super::ChatController;

impl ChatController {
    /// Cancel the active stream, if one is running.
    ///
    /// The signal is cooperative: the stream task observes it at its next
    /// read await, publishes a `Cancelled` update, and exits. The partially
    /// built assistant message is retained.
    ///
    /// Guards:
    /// - does nothing if no stream is in flight
    /// - does nothing if a cancel was already requested
    ///
    /// Returns whether a cancel was actually issued.
    pub fn cancel_active_stream(&mut self) -> bool {
        let Some(active) = self.stream.as_mut() else {
            return false;
        };
        if active.cancel_requested {
            return false;
        }
        active.cancel_requested = true;
        let session_id = active.session_id.clone();

        // A send error means the task already finished; its terminal update
        // is on the channel and will clear the handle.
        let _ = active.cancel.send(true);
        tracing::info!(%session_id, "stream cancel requested");
        true
    }
}
