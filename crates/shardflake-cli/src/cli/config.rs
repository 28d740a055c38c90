use anyhow::bail;
use clap::{Parser, Subcommand};
use shardflake::{Config, DEFAULT_KEY_PREFIX, DEFAULT_SEQUENCE_RETENTION_MS, Layout};

/// Runtime configuration for the `shardflake` binary.
///
/// The ID layout must match every other process sharing the same Redis keys,
/// so it is usually supplied through the environment (or a `.env` file) and
/// only the subcommand is typed.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "shardflake",
    version,
    about = "Generate and decode Redis-coordinated Snowflake-style IDs"
)]
pub struct CliArgs {
    /// Zero point of every encoded timestamp, in Unix milliseconds.
    ///
    /// Environment variable: `SHARDFLAKE_CUSTOM_EPOCH`
    #[arg(long, env = "SHARDFLAKE_CUSTOM_EPOCH")]
    pub custom_epoch: u64,

    /// Width of the timestamp field.
    ///
    /// Environment variable: `SHARDFLAKE_TIMESTAMP_BITS`
    #[arg(long, env = "SHARDFLAKE_TIMESTAMP_BITS")]
    pub timestamp_bits: u8,

    /// Width of the logical shard id field.
    ///
    /// Environment variable: `SHARDFLAKE_LOGICAL_SHARD_ID_BITS`
    #[arg(long, env = "SHARDFLAKE_LOGICAL_SHARD_ID_BITS")]
    pub logical_shard_id_bits: u8,

    /// Width of the data type field.
    ///
    /// Environment variable: `SHARDFLAKE_DATA_TYPE_BITS`
    #[arg(long, env = "SHARDFLAKE_DATA_TYPE_BITS")]
    pub data_type_bits: u8,

    /// Width of the sequence field.
    ///
    /// Environment variable: `SHARDFLAKE_SEQUENCE_BITS`
    #[arg(long, env = "SHARDFLAKE_SEQUENCE_BITS")]
    pub sequence_bits: u8,

    /// Lowest logical shard id Redis may assign. Defaults to 0.
    ///
    /// Environment variable: `SHARDFLAKE_LOGICAL_SHARD_ID_RANGE_MIN`
    #[arg(long, env = "SHARDFLAKE_LOGICAL_SHARD_ID_RANGE_MIN")]
    pub logical_shard_id_range_min: Option<u64>,

    /// Highest logical shard id Redis may assign. Defaults to the largest id
    /// the field can hold.
    ///
    /// Environment variable: `SHARDFLAKE_LOGICAL_SHARD_ID_RANGE_MAX`
    #[arg(long, env = "SHARDFLAKE_LOGICAL_SHARD_ID_RANGE_MAX")]
    pub logical_shard_id_range_max: Option<u64>,

    /// How long each sequence counter outlives its millisecond. Explicit
    /// timestamps older than this are refused.
    ///
    /// Environment variable: `SHARDFLAKE_SEQUENCE_RETENTION_MS`
    #[arg(long, env = "SHARDFLAKE_SEQUENCE_RETENTION_MS", default_value_t = DEFAULT_SEQUENCE_RETENTION_MS)]
    pub sequence_retention_ms: u64,

    /// Redis connection URL.
    ///
    /// Environment variable: `SHARDFLAKE_REDIS_URL`
    #[arg(long, env = "SHARDFLAKE_REDIS_URL", default_value_t = String::from("redis://127.0.0.1:6379"))]
    pub redis_url: String,

    /// Namespace of every key the reservation script touches.
    ///
    /// Environment variable: `SHARDFLAKE_KEY_PREFIX`
    #[arg(long, env = "SHARDFLAKE_KEY_PREFIX", default_value_t = String::from(DEFAULT_KEY_PREFIX))]
    pub key_prefix: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Reserve and print new IDs, one per line.
    Generate {
        /// Data type embedded in every ID.
        #[arg(long)]
        data_type: u64,

        /// Number of IDs to generate.
        #[arg(long, default_value_t = 1)]
        count: u64,

        /// Embed this Unix millisecond instead of the Redis clock.
        #[arg(long)]
        timestamp: Option<u64>,

        /// Print a JSON array of decoded IDs.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Split raw IDs into their fields.
    Decode {
        #[arg(required = true)]
        ids: Vec<u64>,

        /// Print a JSON array instead of text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print the reservation script rendered for this configuration.
    Script,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub config: Config,
    pub redis_url: String,
    pub key_prefix: String,
    pub command: Command,
}

impl TryFrom<CliArgs> for AppConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let layout = Layout::new(
            args.timestamp_bits,
            args.logical_shard_id_bits,
            args.data_type_bits,
            args.sequence_bits,
        )?;
        let config = Config::new(args.custom_epoch, layout)?;

        let allowed = config.logical_shard_id_allowed_range();
        let min = args.logical_shard_id_range_min.unwrap_or(*allowed.start());
        let max = args.logical_shard_id_range_max.unwrap_or(*allowed.end());
        if min > max {
            bail!(
                "SHARDFLAKE_LOGICAL_SHARD_ID_RANGE_MIN ({min}) is greater than \
                 SHARDFLAKE_LOGICAL_SHARD_ID_RANGE_MAX ({max})"
            );
        }
        if max > *allowed.end() {
            bail!(
                "SHARDFLAKE_LOGICAL_SHARD_ID_RANGE_MAX ({max}) exceeds the largest logical shard \
                 id ({}) that {} bits can hold",
                allowed.end(),
                layout.logical_shard_id_bits()
            );
        }
        let config = config
            .with_logical_shard_id_range(min..=max)?
            .with_sequence_retention_ms(args.sequence_retention_ms)?;

        if args.key_prefix.is_empty() {
            bail!("SHARDFLAKE_KEY_PREFIX must not be empty");
        }

        Ok(Self {
            config,
            redis_url: args.redis_url,
            key_prefix: args.key_prefix,
            command: args.command,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYOUT: [&str; 10] = [
        "--custom-epoch",
        "1646160000000",
        "--timestamp-bits",
        "41",
        "--logical-shard-id-bits",
        "3",
        "--data-type-bits",
        "9",
        "--sequence-bits",
        "11",
    ];

    fn parse(extra: &[&str]) -> anyhow::Result<AppConfig> {
        let args = ["shardflake"]
            .iter()
            .chain(LAYOUT.iter())
            .chain(extra.iter())
            .copied();
        AppConfig::try_from(CliArgs::try_parse_from(args)?)
    }

    #[test]
    fn defaults_to_full_shard_range() {
        let config = parse(&["script"]).unwrap();
        assert_eq!(config.config.logical_shard_id_range(), &(0..=7));
        assert_eq!(config.config.custom_epoch(), 1_646_160_000_000);
        assert_eq!(config.key_prefix, DEFAULT_KEY_PREFIX);
        assert_eq!(config.command, Command::Script);
    }

    #[test]
    fn accepts_partial_shard_range() {
        let config = parse(&["--logical-shard-id-range-min", "2", "script"]).unwrap();
        assert_eq!(config.config.logical_shard_id_range(), &(2..=7));
    }

    #[test]
    fn rejects_shard_max_past_field() {
        let err = parse(&["--logical-shard-id-range-max", "8", "script"]).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("SHARDFLAKE_LOGICAL_SHARD_ID_RANGE_MAX"), "{message}");
        assert!(message.contains("(7)"), "{message}");
    }

    #[test]
    fn rejects_inverted_shard_range() {
        let err = parse(&[
            "--logical-shard-id-range-min",
            "5",
            "--logical-shard-id-range-max",
            "4",
            "script",
        ])
        .unwrap_err();
        assert!(err.to_string().contains("greater than"), "{err}");
    }

    #[test]
    fn rejects_oversized_layout() {
        let args = [
            "shardflake",
            "--custom-epoch",
            "0",
            "--timestamp-bits",
            "50",
            "--logical-shard-id-bits",
            "3",
            "--data-type-bits",
            "9",
            "--sequence-bits",
            "11",
            "script",
        ];
        let err = AppConfig::try_from(CliArgs::try_parse_from(args).unwrap()).unwrap_err();
        assert!(err.to_string().contains("73 bits"), "{err}");
    }

    #[test]
    fn reads_sequence_retention() {
        let config = parse(&["script"]).unwrap();
        assert_eq!(
            config.config.sequence_retention_ms(),
            DEFAULT_SEQUENCE_RETENTION_MS
        );

        let config = parse(&["--sequence-retention-ms", "86400000", "script"]).unwrap();
        assert_eq!(config.config.sequence_retention_ms(), 86_400_000);
        assert!(parse(&["--sequence-retention-ms", "0", "script"]).is_err());
    }

    #[test]
    fn rejects_empty_key_prefix() {
        assert!(parse(&["--key-prefix", "", "script"]).is_err());
    }

    #[test]
    fn parses_generate() {
        let config = parse(&[
            "generate",
            "--data-type",
            "7",
            "--count",
            "3",
            "--timestamp",
            "1694563200000",
        ])
        .unwrap();
        assert_eq!(
            config.command,
            Command::Generate {
                data_type: 7,
                count: 3,
                timestamp: Some(1_694_563_200_000),
                json: false,
            }
        );
    }

    #[test]
    fn decode_needs_an_id() {
        assert!(parse(&["decode"]).is_err());
        let config = parse(&["decode", "1", "2", "--json"]).unwrap();
        assert_eq!(
            config.command,
            Command::Decode {
                ids: vec![1, 2],
                json: true,
            }
        );
    }
}
