pub mod env;
pub mod init;
pub mod reqwest_helper;
pub mod settings;
