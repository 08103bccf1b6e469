use rdev::{listen, EventType, Key};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hotkey {
    pub key: Key,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Default for Hotkey {
    /// `Ctrl+Shift+X`
    fn default() -> Self {
        Self {
            key: Key::KeyX,
            ctrl: true,
            shift: true,
            alt: false,
        }
    }
}

/// Parse a hotkey string like "Ctrl+Shift+X" into a [`Hotkey`].
pub fn parse_hotkey(s: &str) -> Option<Hotkey> {
    let mut ctrl = false;
    let mut shift = false;
    let mut alt = false;
    let mut key: Option<Key> = None;

    for part in s.split('+') {
        let upper = part.trim().to_ascii_uppercase();
        match upper.as_str() {
            "CTRL" | "CONTROL" => ctrl = true,
            "SHIFT" => shift = true,
            "ALT" => alt = true,
            "" => {}
            _ => key = Some(parse_key(&upper)?),
        }
    }

    key.map(|k| Hotkey {
        key: k,
        ctrl,
        shift,
        alt,
    })
}

const LETTER_KEYS: [Key; 26] = [
    Key::KeyA, Key::KeyB, Key::KeyC, Key::KeyD, Key::KeyE, Key::KeyF, Key::KeyG,
    Key::KeyH, Key::KeyI, Key::KeyJ, Key::KeyK, Key::KeyL, Key::KeyM, Key::KeyN,
    Key::KeyO, Key::KeyP, Key::KeyQ, Key::KeyR, Key::KeyS, Key::KeyT, Key::KeyU,
    Key::KeyV, Key::KeyW, Key::KeyX, Key::KeyY, Key::KeyZ,
];

const DIGIT_KEYS: [Key; 10] = [
    Key::Num0, Key::Num1, Key::Num2, Key::Num3, Key::Num4,
    Key::Num5, Key::Num6, Key::Num7, Key::Num8, Key::Num9,
];

const FUNCTION_KEYS: [Key; 12] = [
    Key::F1, Key::F2, Key::F3, Key::F4, Key::F5, Key::F6,
    Key::F7, Key::F8, Key::F9, Key::F10, Key::F11, Key::F12,
];

fn parse_key(upper: &str) -> Option<Key> {
    match upper {
        "SPACE" => Some(Key::Space),
        "TAB" => Some(Key::Tab),
        "ENTER" | "RETURN" => Some(Key::Return),
        "ESC" | "ESCAPE" => Some(Key::Escape),
        "INSERT" => Some(Key::Insert),
        "PRINTSCREEN" => Some(Key::PrintScreen),
        _ if upper.len() > 1 && upper.starts_with('F') => {
            let n = upper[1..].parse::<usize>().ok()?;
            FUNCTION_KEYS.get(n.checked_sub(1)?).copied()
        }
        _ => {
            let mut chars = upper.chars();
            let c = chars.next()?;
            if chars.next().is_some() {
                return None;
            }
            match c {
                'A'..='Z' => Some(LETTER_KEYS[(c as u8 - b'A') as usize]),
                '0'..='9' => Some(DIGIT_KEYS[(c as u8 - b'0') as usize]),
                _ => None,
            }
        }
    }
}

/// What happens when the chord key is pressed again while the chord is
/// still held (including OS auto-repeat).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Retrigger {
    /// Fire once, then wait until the chord is released.
    #[default]
    OncePerHold,
    /// Fire on every press of the chord key while modifiers are held.
    EveryPress,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyMessage {
    Down(Key),
    Up(Key),
}

impl KeyMessage {
    pub fn from_event(event: &EventType) -> Option<Self> {
        match *event {
            EventType::KeyPress(k) => Some(KeyMessage::Down(k)),
            EventType::KeyRelease(k) => Some(KeyMessage::Up(k)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordState {
    Idle,
    Armed,
}

/// Left and right copies of one modifier.
#[derive(Debug, Clone, Copy, Default)]
struct Sides {
    left: bool,
    right: bool,
}

impl Sides {
    fn set(&mut self, left: bool, down: bool) {
        if left {
            self.left = down;
        } else {
            self.right = down;
        }
    }

    fn any(self) -> bool {
        self.left || self.right
    }
}

/// Recognizes the activation chord from discrete key messages.
///
/// Extra held keys do not prevent a match; the chord only needs its own keys
/// to be down.
pub struct ChordMachine {
    hotkey: Hotkey,
    policy: Retrigger,
    state: ChordState,
    ctrl: Sides,
    shift: Sides,
    alt: Sides,
    key: bool,
}

impl ChordMachine {
    pub fn new(hotkey: Hotkey, policy: Retrigger) -> Self {
        Self {
            hotkey,
            policy,
            state: ChordState::Idle,
            ctrl: Sides::default(),
            shift: Sides::default(),
            alt: Sides::default(),
            key: false,
        }
    }

    pub fn state(&self) -> ChordState {
        self.state
    }

    /// Feed one key message; returns `true` when an activation should fire.
    pub fn handle(&mut self, msg: KeyMessage) -> bool {
        let (k, down) = match msg {
            KeyMessage::Down(k) => (k, true),
            KeyMessage::Up(k) => (k, false),
        };
        match k {
            Key::ControlLeft => self.ctrl.set(true, down),
            Key::ControlRight => self.ctrl.set(false, down),
            Key::ShiftLeft => self.shift.set(true, down),
            Key::ShiftRight => self.shift.set(false, down),
            Key::Alt => self.alt.set(true, down),
            Key::AltGr => self.alt.set(false, down),
            _ => {}
        }
        let chord_key_press = down && k == self.hotkey.key;
        if k == self.hotkey.key {
            self.key = down;
        }

        let (ctrl, shift, alt) = (self.ctrl.any(), self.shift.any(), self.alt.any());
        let held = self.key
            && (!self.hotkey.ctrl || ctrl)
            && (!self.hotkey.shift || shift)
            && (!self.hotkey.alt || alt);
        tracing::debug!(
            "key {:?} down={} ctrl={} shift={} alt={} key={} state={:?}",
            k,
            down,
            ctrl,
            shift,
            alt,
            self.key,
            self.state
        );

        match (self.state, held) {
            (ChordState::Idle, true) => {
                self.state = ChordState::Armed;
                tracing::debug!("hotkey match -> armed");
                true
            }
            (ChordState::Armed, true) => {
                chord_key_press && self.policy == Retrigger::EveryPress
            }
            (ChordState::Armed, false) => {
                self.state = ChordState::Idle;
                tracing::debug!("combo released");
                false
            }
            (ChordState::Idle, false) => false,
        }
    }
}

/// Receives chord activations from the dispatcher thread.
pub trait ChordHandler: Send + 'static {
    fn on_chord(&self);

    /// The OS key hook could not be installed (for example missing
    /// accessibility permission).
    fn on_listener_error(&self, _error: &str) {}
}

pub enum ListenerEvent {
    Key(KeyMessage),
    Failed(String),
}

/// Drive `machine` from `rx` until every sender is gone.
pub fn run_dispatcher<H: ChordHandler>(rx: Receiver<ListenerEvent>, mut machine: ChordMachine, handler: H) {
    for event in rx {
        match event {
            ListenerEvent::Key(msg) => {
                if machine.handle(msg) {
                    tracing::info!("hotkey pressed; dispatching activation");
                    handler.on_chord();
                }
            }
            ListenerEvent::Failed(err) => handler.on_listener_error(&err),
        }
    }
    tracing::debug!("hotkey dispatcher stopped");
}

pub struct HotkeyListener {
    hotkey: Hotkey,
    policy: Retrigger,
}

impl HotkeyListener {
    pub fn new(hotkey: Hotkey, policy: Retrigger) -> Self {
        Self { hotkey, policy }
    }

    /// Start the OS key hook and the chord dispatcher on their own threads.
    pub fn start<H: ChordHandler>(&self, handler: H) -> std::io::Result<thread::JoinHandle<()>> {
        let (tx, rx) = channel();
        spawn_os_listener(tx)?;
        let machine = ChordMachine::new(self.hotkey, self.policy);
        tracing::debug!("starting hotkey listener for {:?}", self.hotkey);
        thread::Builder::new()
            .name("hotkey-dispatch".into())
            .spawn(move || run_dispatcher(rx, machine, handler))
    }
}

fn spawn_os_listener(tx: Sender<ListenerEvent>) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new().name("hotkey-listen".into()).spawn(move || {
        let mut reported = false;
        loop {
            let events = tx.clone();
            let result = listen(move |event| {
                if let Some(msg) = KeyMessage::from_event(&event.event_type) {
                    let _ = events.send(ListenerEvent::Key(msg));
                }
            });

            match result {
                Ok(()) => tracing::warn!("Hotkey listener exited unexpectedly. Restarting shortly"),
                Err(e) => {
                    tracing::warn!("Hotkey listener failed: {:?}. Retrying shortly", e);
                    if !reported {
                        reported = true;
                        if tx.send(ListenerEvent::Failed(format!("{e:?}"))).is_err() {
                            return;
                        }
                    }
                }
            }

            thread::sleep(Duration::from_millis(500));
        }
    })
}
