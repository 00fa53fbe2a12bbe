pub mod app_events;
pub mod sleep;
pub mod step_sessions;
pub mod steps;
