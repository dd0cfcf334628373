pub mod command;
pub mod dispatcher;
pub mod supervisor;

pub use command::{relay_args, relay_command};
pub use dispatcher::spawn_exit_dispatcher;
pub use supervisor::{RelayInfo, RelaySupervisor};
