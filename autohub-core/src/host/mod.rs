use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

pub mod registry;

pub trait Identifiable: Sync + Send {
    fn id(&self) -> String;
}

/// A host-managed controllable entity. The host assigns the id; the on/off
/// state is the one observable the action callbacks mutate.
#[derive(Debug)]
pub struct Device {
    id: String,
    name: String,
    type_id: String,
    on_state: AtomicBool,
}

impl Device {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        type_id: impl Into<String>,
        on: bool,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            type_id: type_id.into(),
            on_state: AtomicBool::new(on),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    pub fn is_on(&self) -> bool {
        self.on_state.load(Ordering::Acquire)
    }

    pub fn set_on(&self, on: bool) {
        self.on_state.store(on, Ordering::Release);
    }

    /// Flips the on/off state, returning the new value.
    pub fn toggle(&self) -> bool {
        !self.on_state.fetch_xor(true, Ordering::AcqRel)
    }
}

impl Identifiable for Device {
    fn id(&self) -> String {
        self.id.clone()
    }
}

/// The closed set of state-change requests the host dispatches. Kinds the
/// host enumerates beyond these fail to parse; callers log and drop them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceAction {
    TurnOn,
    TurnOff,
    Toggle,
}

#[derive(Debug, thiserror::Error)]
pub enum ActionParseError {
    #[error("unknown device action kind: {0}")]
    UnknownKind(String),
}

impl TryFrom<&str> for DeviceAction {
    type Error = ActionParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "TurnOn" | "turnOn" => Ok(DeviceAction::TurnOn),
            "TurnOff" | "turnOff" => Ok(DeviceAction::TurnOff),
            "Toggle" | "toggle" => Ok(DeviceAction::Toggle),
            other => Err(ActionParseError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for DeviceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceAction::TurnOn => "turn on",
            DeviceAction::TurnOff => "turn off",
            DeviceAction::Toggle => "toggle",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_action_parse() {
        assert_eq!(DeviceAction::try_from("TurnOn").unwrap(), DeviceAction::TurnOn);
        assert_eq!(DeviceAction::try_from("turnOff").unwrap(), DeviceAction::TurnOff);
        assert_eq!(DeviceAction::try_from("Toggle").unwrap(), DeviceAction::Toggle);
        assert!(matches!(
            DeviceAction::try_from("SetBrightness"),
            Err(ActionParseError::UnknownKind(_))
        ));
    }

    #[test]
    fn test_toggle_returns_new_state() {
        let dev = Device::new("lamp-1", "Desk Lamp", "dimmer", false);
        assert!(dev.toggle());
        assert!(dev.is_on());
        assert!(!dev.toggle());
        assert!(!dev.is_on());
    }
}
