//! Embassy async tasks

pub mod heartbeat;
pub mod irq;
pub mod receive;

pub use heartbeat::heartbeat_task;
pub use irq::irq_task;
pub use receive::receive_task;
