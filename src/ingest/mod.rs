//! Ingestion drivers
//!
//! A bridge receives inbound traffic by exactly one discipline: a periodic
//! poll over its inbound links, or listeners the external client invokes on
//! delivery.

mod push;
mod scheduler;

pub use push::{PushGate, PushRegistration};
pub use scheduler::{
    ManualScheduler, PollTask, ScheduleHandle, Scheduler, TaskCanceller, TokioScheduler,
};

/// Running ingestion of an active bridge
#[derive(Debug)]
pub enum Ingestion {
    Poll(ScheduleHandle),
    Push(PushRegistration),
}

impl Ingestion {
    /// Stop delivering. Safe to call more than once.
    pub fn stop(&self) {
        match self {
            Ingestion::Poll(schedule) => schedule.cancel(),
            Ingestion::Push(registration) => {
                registration.close();
            }
        }
    }

    pub fn discipline(&self) -> &'static str {
        match self {
            Ingestion::Poll(_) => "poll",
            Ingestion::Push(_) => "push",
        }
    }
}
