pub mod counters;
pub mod identity;
pub mod index;
pub mod path;
pub mod task_ops;
