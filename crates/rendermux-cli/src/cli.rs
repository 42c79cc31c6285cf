use clap::{Parser, Subcommand, ValueEnum};
use rendermux_core::OriginHint;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rendermux")]
#[command(author, version, about = "Classify, render and stream chat message content")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "RENDERMUX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify a message and print the detection result
    Detect {
        /// Input file, or `-` for stdin
        #[arg(default_value = "-")]
        input: String,

        /// Who produced the message
        #[arg(long, value_enum)]
        origin: Option<Origin>,

        /// Print the full detection result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Classify a message and render it for the terminal
    Render {
        /// Input file, or `-` for stdin
        #[arg(default_value = "-")]
        input: String,

        /// Who produced the message
        #[arg(long, value_enum)]
        origin: Option<Origin>,
    },

    /// Replay a message as a stream of chunks through the buffer manager
    Stream {
        /// Input file, or `-` for stdin
        #[arg(default_value = "-")]
        input: String,

        /// Characters per pushed chunk
        #[arg(long, default_value = "8", value_parser = clap::value_parser!(u64).range(1..))]
        chunk_size: u64,

        /// Delay between chunks in milliseconds
        #[arg(long, default_value = "20")]
        delay_ms: u64,

        /// Override the pre-buffer size
        #[arg(long)]
        pre_buffer: Option<usize>,

        /// Override the throttle interval in milliseconds
        #[arg(long)]
        throttle_ms: Option<u64>,

        /// Who produced the message
        #[arg(long, value_enum)]
        origin: Option<Origin>,
    },
}

/// Origin of a message as given on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Origin {
    User,
    Assistant,
}

impl From<Origin> for OriginHint {
    fn from(origin: Origin) -> Self {
        match origin {
            Origin::User => OriginHint::User,
            Origin::Assistant => OriginHint::Assistant,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_detect() {
        let cli = Cli::try_parse_from(["rendermux", "detect", "msg.txt", "--origin", "assistant", "--json"])
            .unwrap();
        match cli.command {
            Commands::Detect { input, origin, json } => {
                assert_eq!(input, "msg.txt");
                assert_eq!(origin, Some(Origin::Assistant));
                assert!(json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_stdin_default_and_global_flags() {
        let cli = Cli::try_parse_from(["rendermux", "render", "--verbose", "--config", "rm.yaml"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("rm.yaml")));
        match cli.command {
            Commands::Render { input, origin } => {
                assert_eq!(input, "-");
                assert!(origin.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_stream_rejects_zero_chunk() {
        assert!(Cli::try_parse_from(["rendermux", "stream", "--chunk-size", "0"]).is_err());
    }

    #[test]
    fn test_origin_maps_to_hint() {
        assert_eq!(OriginHint::from(Origin::User), OriginHint::User);
        assert_eq!(OriginHint::from(Origin::Assistant), OriginHint::Assistant);
    }
}
