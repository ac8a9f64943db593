pub mod cli;
pub mod core;
pub mod server;

pub use cli::Cli;
pub use core::{start_autocut, AutocutHandles};
pub use server::{create_router, AppState, Server};
