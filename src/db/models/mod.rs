mod device;
mod duration_log;
mod secret;
mod sleep;
mod step;

pub use device::DeviceUsageLog;
pub use duration_log::DurationLog;
pub use secret::EncryptedSecret;
pub use sleep::{SleepQueueEntry, SleepQueueHistoryEntry};
pub use step::{LastKnownStepState, StepRecord, StepSession, StepSource};
