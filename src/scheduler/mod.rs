pub mod manager;

pub use manager::{
    ObserverScheduler, RunRecord, SchedulerConfig, SchedulerError, SchedulerHandle, SchedulerState,
};
