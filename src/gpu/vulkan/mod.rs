mod error;
pub use error::*;

mod device;
pub use device::*;

mod resource;
pub use resource::*;

mod references;
pub use references::ReferenceSet;

mod hooks;
pub use hooks::{HookContainer, PreExecuteHooks};

mod queue;
pub use queue::Queue;

mod command_pool;
pub use command_pool::{CommandPool, CommandPoolInfo};

mod command_buffer;
pub use command_buffer::*;

pub mod commands;
pub use commands::{CmdArgs, Command};
