pub mod cli;
pub mod classify;
pub mod multiscale;
pub mod util;
