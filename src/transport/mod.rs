//! Front-ends: HTTP chat API and terminal chat

pub mod cli;
pub mod http;
