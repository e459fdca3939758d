mod commands;
mod transaction;
