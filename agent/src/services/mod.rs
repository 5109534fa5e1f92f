pub mod commands;
pub mod zfs;
pub mod zfs_output;
