pub mod broker;
pub mod store;
pub mod task;

pub use broker::{TaskBroker, TaskEnvelope, TaskQueue};
pub use store::{FjallQueue, QueueError};
pub use task::{Lane, Task};
