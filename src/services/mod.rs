pub mod auth;
pub mod device;
pub mod password;
pub mod session;
pub mod sweeper;
pub mod token;
