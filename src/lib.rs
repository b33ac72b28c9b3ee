pub mod cli;
pub mod dev_server;
pub mod pipeline;
pub mod relay;
pub mod settings;

pub mod relay_messages {
    pub mod display_messages;
    pub mod relay_dev_logging;
    pub mod relay_errors;
}
