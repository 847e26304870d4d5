use crate::{Exit, ProcId};

#[derive(Debug, Clone, PartialEq)]
pub enum SupervisorEvent {
    /// A chunk of foreground output.
    Log { service: String, message: String },
    Started {
        service: String,
        id: ProcId,
        port: Option<u16>,
    },
    Stopped { service: String, exit: Exit },
    Error { service: String, message: String },
}
