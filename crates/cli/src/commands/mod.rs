pub mod exists;
pub mod get;
pub mod init;
pub mod put;
pub mod rm;
pub mod size;
pub mod url;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Command {
    /// Write a config file for a bucket
    Init(init::InitArgs),
    /// Upload a local file
    Put(put::PutArgs),
    /// Download an object
    Get(get::GetArgs),
    /// Delete an object
    Rm(rm::RmArgs),
    /// Check whether an object exists
    Exists(exists::ExistsArgs),
    /// Print an object's size
    Size(size::SizeArgs),
    /// Print an object's public URL
    Url(url::UrlArgs),
}
