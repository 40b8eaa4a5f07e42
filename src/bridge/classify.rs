//! Subject line → command.

use crate::actuator::Action;

/// Status subjects the alarm vendor sends today, verbatim.
pub const KNOWN_SUBJECTS: [&str; 3] = [
    "SimpliSafe System Armed (home mode)",
    "SimpliSafe System Armed (away mode)",
    "SimpliSafe System Disarmed",
];

const ARMED: &str = "Armed";
const DISARMED: &str = "Disarmed";

/// What a notification asks the bridge to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Arm,
    Disarm,
    Ignore,
}

impl Command {
    /// Case-sensitive substring match. A subject carrying both markers is
    /// ambiguous and ignored.
    pub fn classify(subject: &str) -> Self {
        match (subject.contains(ARMED), subject.contains(DISARMED)) {
            (true, false) => Self::Arm,
            (false, true) => Self::Disarm,
            _ => Self::Ignore,
        }
    }

    pub fn action(&self) -> Option<Action> {
        match self {
            Self::Arm => Some(Action::Arm),
            Self::Disarm => Some(Action::Disarm),
            Self::Ignore => None,
        }
    }
}

pub fn is_known_subject(subject: &str) -> bool {
    KNOWN_SUBJECTS.contains(&subject)
}
