#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
pub mod application;
pub mod config;
pub mod logger;
pub mod numerical;
pub mod outcome;
pub mod pipeline;
pub mod plot;
pub mod server;
pub mod symbolic;
