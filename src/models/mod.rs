pub mod task;

pub use task::{
    CreateTaskRequest, Priority, Task, TaskActivity, TaskPatch, TaskView, TimerMode,
    UpdateTaskRequest,
};
