//! Event catalogue.
//!
//! Every state transition in the composter is announced as an [`Event`]
//! on the [`EventBus`](crate::bus::EventBus).  Topics are fixed and closed;
//! each topic carries its own discriminant enum so handlers pattern-match
//! instead of comparing ids.
//!
//! | Topic        | Discriminants                                               |
//! |--------------|-------------------------------------------------------------|
//! | Mixer        | On, Off, ManualOn, ManualOff                                |
//! | Crusher      | On, Off, ManualOn, ManualOff                                |
//! | Fan          | On, Off, ManualOn, ManualOff                                |
//! | Lock         | On, Off, ManualOnRequested, RequestCloseLid, RequestEmptyComposter |
//! | Lid          | Opened, Closed, RequestCloseLid                             |
//! | Capacity     | Empty, Partial, NotFull, Full                               |
//! | Humidity     | Stable, Unstable                                            |
//! | Temperature  | Stable, Unstable                                            |
//! | Parameters   | Stable, Unstable                                            |
//! | Connectivity | On, Off                                                     |

use core::fmt;

/// Maximum payload size carried by an event.
pub const PAYLOAD_CAP: usize = 16;

pub type Payload = heapless::Vec<u8, PAYLOAD_CAP>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Mixer,
    Crusher,
    Fan,
    Lock,
    Lid,
    Capacity,
    Humidity,
    Temperature,
    Parameters,
    Connectivity,
}

impl Topic {
    pub const ALL: [Topic; 10] = [
        Topic::Mixer,
        Topic::Crusher,
        Topic::Fan,
        Topic::Lock,
        Topic::Lid,
        Topic::Capacity,
        Topic::Humidity,
        Topic::Temperature,
        Topic::Parameters,
        Topic::Connectivity,
    ];
}

/// Discriminants shared by the three motor actuators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActuatorEvent {
    On,
    Off,
    /// A human asked for the actuator (button or cloud document).
    ManualOn,
    ManualOff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockEvent {
    On,
    Off,
    /// The crusher wants to run and needs the lid locked first.
    ManualOnRequested,
    /// Locking was refused because the lid is open.
    RequestCloseLid,
    /// Unlocking was refused because the bin is full.
    RequestEmptyComposter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LidEvent {
    Opened,
    Closed,
    RequestCloseLid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapacityEvent {
    Empty,
    Partial,
    /// Two-level mode counterpart of `Empty` + `Partial`.
    NotFull,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StabilityEvent {
    Stable,
    Unstable,
}

impl StabilityEvent {
    pub const fn from_stable(stable: bool) -> Self {
        if stable { Self::Stable } else { Self::Unstable }
    }

    pub const fn is_stable(self) -> bool {
        matches!(self, Self::Stable)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectivityEvent {
    On,
    Off,
}

/// Topic plus discriminant, as one closed tagged union.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Mixer(ActuatorEvent),
    Crusher(ActuatorEvent),
    Fan(ActuatorEvent),
    Lock(LockEvent),
    Lid(LidEvent),
    Capacity(CapacityEvent),
    Humidity(StabilityEvent),
    Temperature(StabilityEvent),
    Parameters(StabilityEvent),
    Connectivity(ConnectivityEvent),
}

impl EventKind {
    pub const fn topic(self) -> Topic {
        match self {
            Self::Mixer(_) => Topic::Mixer,
            Self::Crusher(_) => Topic::Crusher,
            Self::Fan(_) => Topic::Fan,
            Self::Lock(_) => Topic::Lock,
            Self::Lid(_) => Topic::Lid,
            Self::Capacity(_) => Topic::Capacity,
            Self::Humidity(_) => Topic::Humidity,
            Self::Temperature(_) => Topic::Temperature,
            Self::Parameters(_) => Topic::Parameters,
            Self::Connectivity(_) => Topic::Connectivity,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mixer(d) | Self::Crusher(d) | Self::Fan(d) => write!(f, "{:?}/{:?}", self.topic(), d),
            Self::Lock(d) => write!(f, "Lock/{:?}", d),
            Self::Lid(d) => write!(f, "Lid/{:?}", d),
            Self::Capacity(d) => write!(f, "Capacity/{:?}", d),
            Self::Humidity(d) | Self::Temperature(d) | Self::Parameters(d) => {
                write!(f, "{:?}/{:?}", self.topic(), d)
            }
            Self::Connectivity(d) => write!(f, "Connectivity/{:?}", d),
        }
    }
}

/// A published event.  Value type: the bus copies it to each handler and
/// keeps nothing after delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub payload: Option<Payload>,
}

impl Event {
    pub const fn new(kind: EventKind) -> Self {
        Self {
            kind,
            payload: None,
        }
    }

    /// Attach a sensor reading as a little-endian `f32` payload.
    pub fn with_reading(kind: EventKind, value: f32) -> Self {
        let mut payload = Payload::new();
        // Four bytes always fit in PAYLOAD_CAP.
        let _ = payload.extend_from_slice(&value.to_le_bytes());
        Self {
            kind,
            payload: Some(payload),
        }
    }

    pub const fn topic(&self) -> Topic {
        self.kind.topic()
    }

    /// Decode a payload written by [`Event::with_reading`].
    pub fn reading(&self) -> Option<f32> {
        let bytes: [u8; 4] = self.payload.as_ref()?.get(..4)?.try_into().ok()?;
        Some(f32::from_le_bytes(bytes))
    }
}

impl From<EventKind> for Event {
    fn from(kind: EventKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reading() {
            Some(v) => write!(f, "{} ({:.1})", self.kind, v),
            None => write!(f, "{}", self.kind),
        }
    }
}
