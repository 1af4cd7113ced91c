use std::fmt;

use library::Bus;
use tracing::error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    UserError,
    ProgrammerError,
    SystemError,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::UserError => 1,
            ExitStatus::ProgrammerError => 2,
            ExitStatus::SystemError => 3,
        }
    }
}

/// A problem the user can fix, rendered with an explanation and a remedy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserError {
    pub summary: String,
    pub why: String,
    pub what_to_do: String,
}

impl UserError {
    pub fn new(
        summary: impl Into<String>,
        why: impl Into<String>,
        what_to_do: impl Into<String>,
    ) -> Self {
        Self {
            summary: summary.into(),
            why: why.into(),
            what_to_do: what_to_do.into(),
        }
    }

    pub fn report(&self, bus: &dyn Bus) {
        bus.error_println(&self.summary);
        bus.error_println("Why?");
        bus.error_println(&self.why);
        bus.error_println("What to do:");
        bus.error_println(&self.what_to_do);
    }
}

/// An internal inconsistency, such as asking for a flag that was never defined.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgrammerError(pub String);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandError {
    User(UserError),
    Programmer(ProgrammerError),
}

impl CommandError {
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            CommandError::User(_) => ExitStatus::UserError,
            CommandError::Programmer(_) => ExitStatus::ProgrammerError,
        }
    }

    pub fn report(&self, bus: &dyn Bus) {
        match self {
            CommandError::User(err) => err.report(bus),
            CommandError::Programmer(err) => {
                error!(detail = %err.0, "programmer error");
                bus.error_println(&format!("An internal error occurred: {}.", err.0));
            }
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::User(err) => write!(f, "{}", err.summary),
            CommandError::Programmer(err) => write!(f, "internal error: {}", err.0),
        }
    }
}

impl std::error::Error for CommandError {}

impl From<UserError> for CommandError {
    fn from(err: UserError) -> Self {
        CommandError::User(err)
    }
}

impl From<ProgrammerError> for CommandError {
    fn from(err: ProgrammerError) -> Self {
        CommandError::Programmer(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use library::RecordingBus;

    #[test]
    fn user_error_renders_block() {
        let bus = RecordingBus::new();
        let err = CommandError::from(UserError::new("Nope.", "Because.", "Fix it."));
        err.report(&bus);
        assert_eq!(
            bus.error_lines(),
            vec!["Nope.", "Why?", "Because.", "What to do:", "Fix it."]
        );
        assert_eq!(err.exit_status().code(), 1);
    }

    #[test]
    fn exit_codes() {
        assert_eq!(ExitStatus::Success.code(), 0);
        assert_eq!(ExitStatus::ProgrammerError.code(), 2);
        assert_eq!(ExitStatus::SystemError.code(), 3);
        let err = CommandError::from(ProgrammerError("flag \"x\" is not defined".to_string()));
        assert_eq!(err.exit_status(), ExitStatus::ProgrammerError);
    }
}
