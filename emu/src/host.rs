//! Host-side completion seam.
//!
//! The driver layer attaches an event and a queued command to an ND-Range.
//! When the ND-Range is freed, the event is marked complete and the command
//! is retired from its queue.
//!
//! ```ignore
//! let queue = Arc::new(CommandList::new());
//! let event = HostEvent::new();
//! let command = queue.enqueue();
//! emu.ndrange_mut(id)?.bind_host(Some(event.clone()), Some((queue.clone(), command)));
//! // ... run ...
//! emu.free_ndrange(id)?;
//! assert!(event.is_complete());
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

/// Identifier of a command enqueued on a [`CommandQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(pub u64);

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "command#{}", self.0)
    }
}

/// Completion flag shared between the emulator and the driver.
#[derive(Debug, Clone, Default)]
pub struct HostEvent {
    complete: Arc<AtomicBool>,
}

impl HostEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    pub fn complete(&self) {
        self.complete.store(true, Ordering::Release);
    }
}

/// Driver command queue that is told when an ND-Range command retires.
pub trait CommandQueue: Send + Sync + std::fmt::Debug {
    fn complete(&self, command: CommandId);
}

/// In-order list of commands, the simplest [`CommandQueue`].
#[derive(Debug, Default)]
pub struct CommandList {
    next: AtomicU64,
    pending: Mutex<BTreeSet<CommandId>>,
    completed: Mutex<Vec<CommandId>>,
}

impl CommandList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a new command and return its id.
    pub fn enqueue(&self) -> CommandId {
        let command = CommandId(self.next.fetch_add(1, Ordering::Relaxed));
        self.pending.lock().insert(command);
        command
    }

    pub fn is_pending(&self, command: CommandId) -> bool {
        self.pending.lock().contains(&command)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Commands in completion order.
    pub fn completed(&self) -> Vec<CommandId> {
        self.completed.lock().clone()
    }
}

impl CommandQueue for CommandList {
    fn complete(&self, command: CommandId) {
        if self.pending.lock().remove(&command) {
            self.completed.lock().push(command);
        }
    }
}

/// Host objects bound to one ND-Range.
#[derive(Debug, Default)]
pub(crate) struct HostBinding {
    pub event: Option<HostEvent>,
    pub command: Option<(Arc<dyn CommandQueue>, CommandId)>,
}

impl HostBinding {
    /// Mark the event complete and retire the command. Runs at most once.
    pub fn release(&mut self) {
        if let Some(event) = self.event.take() {
            event.complete();
        }
        if let Some((queue, command)) = self.command.take() {
            queue.complete(command);
        }
    }
}
