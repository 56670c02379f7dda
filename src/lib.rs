//! FutureYou: a twelve-month "gym path vs. lazy path" calendar generator.

pub mod calendar;
pub mod config;
pub mod error;
pub mod generation;
pub mod imagegen;
pub mod onboarding;
pub mod server;
pub mod storage;
