//! Guards that discard results computed for superseded inputs.

/// Proof that a validation cycle started for a document version.
///
/// `epoch` identifies the didOpen the cycle belongs to, so a ticket from a
/// closed and reopened document never matches even when versions repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleTicket {
    epoch: u64,
    version: i32,
}

impl CycleTicket {
    pub fn version(&self) -> i32 {
        self.version
    }
}

/// Tracks the newest document version and the newest started validation cycle.
///
/// A finished cycle may publish only if it is still the newest started cycle
/// and the document has not been edited since it started.
#[derive(Debug, Clone, Default)]
pub struct VersionGate {
    epoch: u64,
    latest: i32,
    started: Option<i32>,
}

impl VersionGate {
    pub fn new(epoch: u64, version: i32) -> Self {
        Self {
            epoch,
            latest: version,
            started: None,
        }
    }

    /// Record an edit.
    pub fn observe(&mut self, version: i32) {
        self.latest = version;
    }

    pub fn latest(&self) -> i32 {
        self.latest
    }

    /// Start a cycle for `version`, superseding any cycle in flight.
    pub fn begin(&mut self, version: i32) -> CycleTicket {
        self.started = Some(version);
        CycleTicket {
            epoch: self.epoch,
            version,
        }
    }

    pub fn admits(&self, ticket: CycleTicket) -> bool {
        ticket.epoch == self.epoch
            && self.started == Some(ticket.version)
            && self.latest == ticket.version
    }
}

/// Tag handed to a peer diagnostic push on arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushTag {
    epoch: u64,
    generation: u64,
}

impl PushTag {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Monotonic tag for peer diagnostic pushes of one document.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerationCounter {
    epoch: u64,
    current: u64,
}

impl GenerationCounter {
    pub fn new(epoch: u64) -> Self {
        Self { epoch, current: 0 }
    }

    /// Tag a new arrival. Earlier tags stop being latest.
    pub fn next(&mut self) -> PushTag {
        self.current += 1;
        PushTag {
            epoch: self.epoch,
            generation: self.current,
        }
    }

    pub fn is_latest(&self, tag: PushTag) -> bool {
        tag.epoch == self.epoch && tag.generation == self.current
    }

    pub fn current(&self) -> u64 {
        self.current
    }
}
