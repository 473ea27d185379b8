
pub mod host;
pub mod ids;
pub mod model;
pub mod observability;
pub mod rng;
pub mod router;
pub mod runtime;
pub mod spf;
pub mod timers;
pub mod wire;
