use clap::Parser;
use clap::builder::RangedU64ValueParser;
use log::Level;

use crate::zip::StreamOptions;

#[derive(Parser, Debug)]
#[command(name = "runzip")]
#[command(version)]
#[command(about = "A streaming unzip utility with HTTP URL support", long_about = None)]
#[command(after_help = "Examples:\n  \
  runzip data1.zip -x joe        extract all files except joe from data1.zip\n  \
  runzip -p foo.zip | more       send contents of foo.zip via pipe into more\n  \
  runzip -t foo.zip              check every entry's size and CRC\n  \
  runzip -l https://example.com/archive.zip   list files from remote ZIP")]
pub struct Cli {
    /// ZIP file path or HTTP URL
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Files to extract (default: all)
    #[arg(value_name = "FILES")]
    pub files: Vec<String>,

    /// List files (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely/show version info
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Test archive entries (decompress and check CRC)
    #[arg(short = 't')]
    pub test: bool,

    /// Extract files to pipe, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Extract files into exdir
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<String>,

    /// Exclude files that follow
    #[arg(short = 'x', value_name = "FILE", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Never overwrite existing files
    #[arg(short = 'n')]
    pub never_overwrite: bool,

    /// Overwrite files WITHOUT prompting
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Junk paths (do not make directories)
    #[arg(short = 'j')]
    pub junk_paths: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Print debug logging to stderr
    #[arg(long)]
    pub debug: bool,

    /// Decompression buffer size in bytes
    #[arg(
        long,
        value_name = "BYTES",
        default_value_t = StreamOptions::DEFAULT_BUFFER_CAPACITY,
        value_parser = RangedU64ValueParser::<usize>::new()
            .range(1..=StreamOptions::MAX_BUFFER_CAPACITY as u64)
    )]
    pub buffer_size: usize,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.file.starts_with("http://") || self.file.starts_with("https://")
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    /// Log level for the stderr logger
    pub fn log_level(&self) -> Level {
        if self.debug {
            Level::Debug
        } else if self.is_very_quiet() {
            Level::Error
        } else {
            Level::Warn
        }
    }

    pub fn stream_options(&self) -> StreamOptions {
        StreamOptions::new().with_buffer_capacity(self.buffer_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_test_mode_and_buffer_size() {
        let cli = Cli::parse_from(["runzip", "-t", "--buffer-size", "512", "a.zip"]);
        assert!(cli.test);
        assert_eq!(cli.file, "a.zip");
        assert_eq!(cli.stream_options().buffer_capacity(), 512);
        assert_eq!(cli.log_level(), Level::Warn);
    }

    #[test]
    fn buffer_size_is_bounded() {
        assert!(Cli::try_parse_from(["runzip", "--buffer-size", "0", "a.zip"]).is_err());
        assert!(Cli::try_parse_from(["runzip", "--buffer-size", "1000000000000", "a.zip"]).is_err());

        let max = StreamOptions::MAX_BUFFER_CAPACITY.to_string();
        let cli = Cli::parse_from(["runzip", "--buffer-size", max.as_str(), "a.zip"]);
        assert_eq!(cli.buffer_size, StreamOptions::MAX_BUFFER_CAPACITY);
    }

    #[test]
    fn quiet_levels() {
        let cli = Cli::parse_from(["runzip", "-qq", "https://example.com/a.zip"]);
        assert!(cli.is_http_url());
        assert!(cli.is_very_quiet());
        assert_eq!(cli.log_level(), Level::Error);

        let cli = Cli::parse_from(["runzip", "--debug", "-p", "a.zip", "x.txt"]);
        assert!(cli.is_quiet());
        assert_eq!(cli.files, ["x.txt"]);
        assert_eq!(cli.log_level(), Level::Debug);
        assert_eq!(cli.stream_options(), StreamOptions::default());
    }
}
