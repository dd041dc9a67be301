pub mod bootstrap;
pub mod commands;
pub mod focus_loop;
pub mod theme;
