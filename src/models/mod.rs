pub mod account;
pub mod proxy;
pub mod task;

// Re-export core models for easy access
pub use account::{Account, AccountCounters, AccountStatus, Provider};
pub use proxy::{PoolMembership, Proxy, ProxyType};
pub use task::{NewTask, Task, TaskKind, TaskPriority};
