//! 具体渠道实现

pub mod console;
pub mod twilio;

pub use console::ConsoleNotifier;
pub use twilio::{TwilioConfig, TwilioNotifier};
