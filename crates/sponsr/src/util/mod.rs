pub mod command;
pub mod http;
pub mod path;
pub mod range;
