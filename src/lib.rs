pub mod analyzer;
pub mod burst;
pub mod config;
pub mod direction;
pub mod error;
pub mod event;
pub mod input;
pub mod instrument;
pub mod model;
pub mod session;
pub mod source;
pub mod supervisor;
pub mod tick_store;
pub mod ui;
pub mod window;
