//! Library surface of the spool binary: the run loop, exposed so
//! integration tests can drive it against mock endpoints.

pub mod runner;
