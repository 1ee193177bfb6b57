pub mod account;
pub mod leave_request;
pub mod profile;
pub mod role;
