//! CSV batch driver: command scripts in, reports out.

pub mod command_reader;
pub mod report_writer;
pub mod script_runner;
