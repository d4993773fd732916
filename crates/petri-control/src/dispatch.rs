//! Keyboard command layer.
//!
//! Key events are published on a [`KeyboardBus`]. A mounted
//! [`CommandDispatcher`] holds exactly one subscription, turns events into
//! [`Command`]s and runs them against a
//! [`RunController`](crate::controller::RunController).
//!
//! | Key                      | Command                                   |
//! |--------------------------|-------------------------------------------|
//! | space                    | toggle run                                |
//! | `n`, right arrow         | step, unless running or busy              |
//! | ctrl/meta + `r`          | local reset, if loaded and not busy       |
//! | `?`                      | toggle the help overlay                   |
//!
//! Nothing fires while focus is in a text-entry control.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;

use crate::controller::RunController;
use crate::engine::SimulationEngine;
use crate::error::ErrorKind;
use crate::prefs::PreferenceBackend;

/// Help overlay shown by `?`.
pub const HELP_TEXT: &str = "\
Keyboard shortcuts
  space        start / pause
  n, right     step (while paused)
  ctrl+r       reset
  ?            toggle this help";

/// A key as reported by the browser, normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// Space bar.
    Space,
    /// The `n` key.
    N,
    /// Right arrow.
    ArrowRight,
    /// The `r` key.
    R,
    /// The `?` key.
    Question,
    /// Anything without a binding.
    Other(String),
}

impl Key {
    /// Parse a key name, ignoring case.
    pub fn parse(raw: &str) -> Self {
        if raw == " " {
            return Self::Space;
        }
        match raw.trim().to_ascii_lowercase().as_str() {
            "space" | "spacebar" => Self::Space,
            "n" => Self::N,
            "arrowright" | "right" => Self::ArrowRight,
            "r" => Self::R,
            "?" => Self::Question,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// Where keyboard focus was when the key was pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusTarget {
    /// The page itself or a non-text control.
    #[default]
    Document,
    /// A text input, textarea or editable element.
    TextEntry,
}

/// One key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    /// Which key.
    pub key: Key,
    /// Control modifier held.
    pub ctrl: bool,
    /// Meta (command) modifier held.
    pub meta: bool,
    /// Focus at the time of the press.
    pub focus: FocusTarget,
}

impl KeyEvent {
    /// A plain press with document focus.
    pub const fn new(key: Key) -> Self {
        Self {
            key,
            ctrl: false,
            meta: false,
            focus: FocusTarget::Document,
        }
    }

    /// Hold the control modifier.
    #[must_use]
    pub const fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    /// Hold the meta modifier.
    #[must_use]
    pub const fn with_meta(mut self) -> Self {
        self.meta = true;
        self
    }

    /// Press while a text field has focus.
    #[must_use]
    pub const fn in_text_entry(mut self) -> Self {
        self.focus = FocusTarget::TextEntry;
        self
    }

    const fn has_command_modifier(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// A command produced from a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Start or stop the run.
    ToggleRun,
    /// Advance one batch.
    Step,
    /// Unload the current simulation locally.
    Reset,
    /// Show or hide the help overlay.
    ToggleHelp,
}

/// Controller state the key bindings are gated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Gates {
    /// A simulation is loaded.
    pub loaded: bool,
    /// The loaded simulation is running.
    pub running: bool,
    /// A command is in flight.
    pub busy: bool,
}

/// What a key press resolved to before anything ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// No binding for this key.
    Unbound,
    /// Focus was in a text field.
    Suppressed,
    /// Bound, but the controller state does not allow it now.
    Gated(Command),
    /// Ready to run.
    Fire(Command),
}

/// Map a key press to a command under the given gates.
pub fn resolve(event: &KeyEvent, gates: Gates) -> Resolution {
    if event.focus == FocusTarget::TextEntry {
        return Resolution::Suppressed;
    }
    let command = match (&event.key, event.has_command_modifier()) {
        (Key::Space, false) => Command::ToggleRun,
        (Key::N | Key::ArrowRight, false) => Command::Step,
        (Key::R, true) => Command::Reset,
        (Key::Question, _) => Command::ToggleHelp,
        _ => return Resolution::Unbound,
    };
    let allowed = match command {
        Command::Step => !gates.running && !gates.busy,
        Command::Reset => gates.loaded && !gates.busy,
        Command::ToggleRun | Command::ToggleHelp => true,
    };
    if allowed {
        Resolution::Fire(command)
    } else {
        Resolution::Gated(command)
    }
}

// ---------------------------------------------------------------------------
// Bus
// ---------------------------------------------------------------------------

/// Handle identifying one bus subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

#[derive(Debug, Default)]
struct BusInner {
    next_id: u64,
    listeners: BTreeMap<ListenerId, mpsc::UnboundedSender<KeyEvent>>,
}

/// Fan-out of key events to every subscribed listener.
#[derive(Debug, Default)]
pub struct KeyboardBus {
    inner: Mutex<BusInner>,
}

impl KeyboardBus {
    /// Create a bus with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a listener.
    pub fn subscribe(&self) -> (ListenerId, mpsc::UnboundedReceiver<KeyEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        let id = ListenerId(inner.next_id);
        inner.next_id = inner.next_id.wrapping_add(1);
        inner.listeners.insert(id, tx);
        (id, rx)
    }

    /// Remove a listener. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: ListenerId) {
        self.lock().listeners.remove(&id);
    }

    /// Deliver `event` to every live listener and return how many got it.
    /// Listeners whose receiver is gone are dropped.
    pub fn emit(&self, event: &KeyEvent) -> usize {
        let mut inner = self.lock();
        inner
            .listeners
            .retain(|_, tx| tx.send(event.clone()).is_ok());
        inner.listeners.len()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Result of dispatching one key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Shortcuts are disabled.
    Disabled,
    /// The key has no binding.
    Ignored,
    /// Focus was in a text field; nothing ran.
    Suppressed,
    /// Bound, but not allowed in the current state; nothing ran.
    Gated(Command),
    /// The help overlay is now visible (`true`) or hidden.
    HelpToggled(bool),
    /// The command ran.
    Ran(Command),
    /// The command ran and failed.
    Failed(Command, ErrorKind),
}

/// Keyboard listener bound to one controller.
#[derive(Debug)]
pub struct CommandDispatcher {
    bus: Arc<KeyboardBus>,
    subscription: Option<(ListenerId, mpsc::UnboundedReceiver<KeyEvent>)>,
    enabled: bool,
    help_visible: bool,
}

impl CommandDispatcher {
    /// An unmounted dispatcher on `bus`.
    pub const fn new(bus: Arc<KeyboardBus>, enabled: bool) -> Self {
        Self {
            bus,
            subscription: None,
            enabled,
            help_visible: false,
        }
    }

    /// Subscribe to the bus, replacing any existing subscription.
    pub fn mount(&mut self) {
        self.unmount();
        let (id, rx) = self.bus.subscribe();
        debug!(listener = id.0, "keyboard dispatcher mounted");
        self.subscription = Some((id, rx));
    }

    /// Drop the subscription.
    pub fn unmount(&mut self) {
        if let Some((id, _)) = self.subscription.take() {
            self.bus.unsubscribe(id);
            debug!(listener = id.0, "keyboard dispatcher unmounted");
        }
    }

    /// Whether the dispatcher is subscribed.
    pub const fn is_mounted(&self) -> bool {
        self.subscription.is_some()
    }

    /// Whether shortcuts are active.
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Turn shortcuts on or off.
    pub const fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether the help overlay is showing.
    pub const fn help_visible(&self) -> bool {
        self.help_visible
    }

    /// Next key event from the bus. `None` when unmounted.
    pub async fn recv(&mut self) -> Option<KeyEvent> {
        match &mut self.subscription {
            Some((_, rx)) => rx.recv().await,
            None => None,
        }
    }

    /// Resolve and run one key press.
    pub async fn dispatch<E, B>(
        &mut self,
        event: &KeyEvent,
        controller: &RunController<E, B>,
    ) -> Dispatch
    where
        E: SimulationEngine,
        B: PreferenceBackend,
    {
        if !self.is_enabled() {
            return Dispatch::Disabled;
        }
        let gates = Gates {
            loaded: controller.has_simulation(),
            running: controller.is_running(),
            busy: controller.is_busy(),
        };
        let command = match resolve(event, gates) {
            Resolution::Unbound => return Dispatch::Ignored,
            Resolution::Suppressed => {
                debug!(key = ?event.key, "key suppressed, text entry has focus");
                return Dispatch::Suppressed;
            }
            Resolution::Gated(command) => {
                debug!(?command, ?gates, "key gated");
                return Dispatch::Gated(command);
            }
            Resolution::Fire(command) => command,
        };

        debug!(?command, "dispatching key command");
        let outcome = match command {
            Command::ToggleHelp => {
                self.help_visible = !self.help_visible;
                return Dispatch::HelpToggled(self.help_visible);
            }
            Command::ToggleRun => controller.toggle_run().await.map(drop),
            Command::Step => controller.step().await.map(drop),
            Command::Reset => controller.reset(),
        };
        match outcome {
            Ok(()) => Dispatch::Ran(command),
            Err(err) => Dispatch::Failed(command, err.kind()),
        }
    }
}

impl Drop for CommandDispatcher {
    fn drop(&mut self) {
        self.unmount();
    }
}
