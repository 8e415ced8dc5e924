pub mod app;
mod draw;
mod edit;
mod panes;
