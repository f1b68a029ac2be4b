//! Commands run by the `seeder` binary.

pub mod run;
