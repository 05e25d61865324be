pub mod scheduler;

pub use scheduler::{
    AttackModeConfig, AttackModeScheduler, AttackState, AttackStatusObserver, DEFAULT_POLL_INTERVAL,
    DEFAULT_POOL_SIZE, DEFAULT_STATUS_DEBOUNCE,
};
