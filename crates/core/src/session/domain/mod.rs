pub mod pipeline_logger;
pub mod session_error;
pub mod session_event;
pub mod session_options;
pub mod session_state;
