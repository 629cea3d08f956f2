pub mod helpers;
mod paths;
