pub mod cli_missing;
pub mod structured_output;
