//! Validated runtime configuration.

use std::net::SocketAddr;

use clap::Parser;

use crate::error_handling::types::ConfigError;
use crate::warc::types::{Compression, RotatorSettings};

use super::types::Args;

/// Everything the process needs to run: where to listen and how the writer
/// rotates its files.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_address: SocketAddr,
    pub rotator: RotatorSettings,
}

impl Config {
    /// Parses and validates the command line. Invalid flag syntax exits via
    /// clap; semantically bad values come back as `ConfigError`.
    pub fn from_args() -> Result<Self, ConfigError> {
        Self::from_parsed(Args::parse())
    }

    fn from_parsed(args: Args) -> Result<Self, ConfigError> {
        let listen_address = args
            .address
            .parse()
            .map_err(|e| ConfigError::BadAddress(format!("{:?}: {}", args.address, e)))?;
        if args.warc_prefix.trim().is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }
        if args.warc_size == 0 {
            return Err(ConfigError::SizeNotInRange(
                "must be at least 1 MB".to_string(),
            ));
        }
        let compression: Compression = args.compression.parse()?;

        Ok(Self {
            listen_address,
            rotator: RotatorSettings {
                output_directory: args.output,
                prefix: args.warc_prefix,
                compression,
                size_threshold_bytes: args.warc_size * 1024 * 1024,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Result<Config, ConfigError> {
        let mut full = vec!["cire"];
        full.extend_from_slice(argv);
        Config::from_parsed(Args::try_parse_from(full).unwrap())
    }

    #[test]
    fn defaults_are_accepted() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.listen_address.port(), 8080);
        assert_eq!(config.rotator.prefix, "WARC");
        assert_eq!(config.rotator.compression, Compression::Gzip);
        assert_eq!(config.rotator.size_threshold_bytes, 1000 * 1024 * 1024);
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&[
            "-o", "/tmp/archives",
            "-c", "zstd",
            "-a", "127.0.0.1:9090",
            "-p", "crawl",
            "-s", "50",
        ])
        .unwrap();
        assert_eq!(config.rotator.compression, Compression::Zstd);
        assert_eq!(config.rotator.prefix, "crawl");
        assert_eq!(config.rotator.size_threshold_bytes, 50 * 1024 * 1024);
        assert_eq!(config.listen_address.to_string(), "127.0.0.1:9090");
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            parse(&["-c", "lzma"]),
            Err(ConfigError::BadCompression(_))
        ));
        assert!(matches!(
            parse(&["-a", "not-an-address"]),
            Err(ConfigError::BadAddress(_))
        ));
        assert!(matches!(parse(&["-p", " "]), Err(ConfigError::EmptyPrefix)));
        assert!(matches!(
            parse(&["-s", "0"]),
            Err(ConfigError::SizeNotInRange(_))
        ));
    }
}
