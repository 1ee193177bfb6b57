//! Leave-request rules: what may be submitted and how status changes move
//! the owner's balance.

pub mod validator;
pub mod workflow;
