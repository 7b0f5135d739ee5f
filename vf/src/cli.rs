//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::{ExportFormat, ProcessingQuality, Theme};

/// VisionFlow - object detection client
#[derive(Parser)]
#[command(
    name = "vf",
    about = "Upload media to a detection service, track analyses and export results",
    version = env!("CARGO_PKG_VERSION"),
    after_help = "Logs are written to: ~/.local/share/visionflow/logs/visionflow.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, help = "Log level (overrides config)")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Upload one or more media files
    Upload {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Analyze an uploaded item and wait for the result (Ctrl-C aborts)
    Analyze {
        /// Item id returned by upload
        id: String,
    },

    /// Show credits, counters and items
    Status {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show one item and its detections
    Show {
        /// Item id
        id: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Download the results of an analyzed item
    Export {
        /// Item id
        id: String,

        /// Export format (defaults to the configured setting)
        #[arg(short, long)]
        format: Option<ExportFormat>,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },

    /// List past exports
    Exports {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Delete an item remotely and locally
    Delete {
        /// Item id
        id: String,
    },

    /// View or change settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },

    /// Clear all local data
    Reset {
        /// Skip the confirmation requirement
        #[arg(long)]
        yes: bool,
    },

    /// Check that the detection service is reachable
    Health,
}

/// Settings subcommands
#[derive(Subcommand)]
pub enum SettingsCommand {
    /// Print current settings
    Show,

    /// Change one or more settings
    Set {
        /// Minimum confidence (0.0 - 1.0)
        #[arg(long)]
        confidence: Option<f64>,

        /// Comma-separated class list; empty shows every class
        #[arg(long, value_delimiter = ',')]
        classes: Option<Vec<String>>,

        #[arg(long)]
        export_format: Option<ExportFormat>,

        #[arg(long)]
        theme: Option<Theme>,

        /// Upload size limit in MB
        #[arg(long)]
        max_file_size: Option<u64>,

        #[arg(long)]
        quality: Option<ProcessingQuality>,
    },

    /// Restore default settings
    Reset,
}

/// Output format for list commands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

/// Where the log file lives
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("visionflow")
        .join("logs")
        .join("visionflow.log")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_upload_multiple() {
        let cli = Cli::try_parse_from(["vf", "upload", "a.png", "b.mp4"]).unwrap();
        match cli.command {
            Command::Upload { files } => assert_eq!(files.len(), 2),
            _ => panic!("expected upload"),
        }
    }

    #[test]
    fn test_parse_export_with_format() {
        let cli = Cli::try_parse_from(["vf", "export", "file-1", "--format", "yolo", "--out", "/tmp"]).unwrap();
        match cli.command {
            Command::Export { id, format, out } => {
                assert_eq!(id, "file-1");
                assert_eq!(format, Some(ExportFormat::Yolo));
                assert_eq!(out, PathBuf::from("/tmp"));
            }
            _ => panic!("expected export"),
        }
    }

    #[test]
    fn test_parse_settings_set() {
        let cli = Cli::try_parse_from([
            "vf",
            "settings",
            "set",
            "--confidence",
            "0.7",
            "--classes",
            "car,person",
            "--theme",
            "light",
        ])
        .unwrap();
        match cli.command {
            Command::Settings {
                command: SettingsCommand::Set {
                    confidence,
                    classes,
                    theme,
                    ..
                },
            } => {
                assert_eq!(confidence, Some(0.7));
                assert_eq!(classes, Some(vec!["car".to_string(), "person".to_string()]));
                assert_eq!(theme, Some(Theme::Light));
            }
            _ => panic!("expected settings set"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["vf", "status", "--log-level", "debug", "-c", "vf.yml"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.config, Some(PathBuf::from("vf.yml")));
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
