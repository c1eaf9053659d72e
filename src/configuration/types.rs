//! Command-line surface.

use std::path::PathBuf;

use clap::Parser;

/// Raw command-line arguments, before validation.
///
/// Defaults match what most archiving runs want: gzip-compressed files of
/// about a gigabyte in a `warcs/` directory next to the process.
#[derive(Parser, Debug, Clone)]
#[command(name = "cire")]
#[command(version)]
#[command(about = "WARC-writing HTTP/S archiving proxy")]
pub struct Args {
    /// Output directory for WARC files
    #[arg(short, long, default_value = "warcs")]
    pub output: PathBuf,

    /// Compression algorithm (NONE, GZIP or ZSTD)
    #[arg(short, long, default_value = "GZIP")]
    pub compression: String,

    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    pub address: String,

    /// WARC files prefix
    #[arg(short = 'p', long = "warc-prefix", default_value = "WARC")]
    pub warc_prefix: String,

    /// Size in MB of WARC files
    #[arg(short = 's', long = "warc-size", default_value_t = 1000)]
    pub warc_size: u64,
}
