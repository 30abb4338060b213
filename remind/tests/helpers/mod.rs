#![allow(dead_code)]

pub mod daemon_guard;
pub mod polling;
