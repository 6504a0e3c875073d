use clap::{Parser, Subcommand, ValueEnum};
use heic_ingest::codec::MagickCodec;
use heic_ingest::config::{self, CodecSettings};
use heic_ingest::format::{TargetFormat, parse_switch};
use heic_ingest::library::Library;
use heic_ingest::pipeline::Pipeline;
use heic_ingest::store::OptionStore;
use heic_ingest::types::AttachmentId;
use heic_ingest::{host, output, selftest};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "HEIC_INGEST_LOG";

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup; called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "heic-ingest")]
#[command(about = "Convert HEIC uploads into web-friendly WebP/JPEG copies")]
#[command(long_about = "\
Convert HEIC uploads into web-friendly WebP/JPEG copies

Files are uploaded into a media library. HEIC images either get a converted
copy next to them (copy mode, the default) or are converted before they are
stored (replace mode). All decoding and encoding is done by ImageMagick.

Library layout:

  media/
  ├── .library.json              # Settings + attachments
  ├── assets/image4.heic         # Self-test sample (not shipped; supply any HEIC)
  └── uploads/
      └── 2026/10/
          ├── vacation.heic      # Original
          └── vacation.webp      # Converted copy, linked to the original

Settings:
  format   webp | jpeg           (heic-ingest settings set format jpeg)
  replace  true | false          (heic-ingest settings set replace true)

Set HEIC_INGEST_LOG (e.g. 'debug') to control logging.
Run 'heic-ingest gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Directory holding config.toml
    #[arg(long = "config", default_value = ".", global = true)]
    config_dir: PathBuf,

    /// Log every pipeline decision
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload files into the library through the conversion pipeline
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Re-run copy-mode conversion for a stored attachment
    Ingest { id: AttachmentId },
    /// Fill in missing width/height for a stored attachment
    Metadata { id: AttachmentId },
    /// List attachments and their converted copies
    List,
    /// Show or change conversion settings
    Settings {
        #[command(subcommand)]
        action: SettingsCommand,
    },
    /// Convert the sample image to check HEIC support
    SelfTest,
    /// Show the codec binary, version, and HEIC support
    Diagnostics,
    /// Remove self-test output and stored settings
    Cleanup,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[derive(Subcommand)]
enum SettingsCommand {
    Show,
    Set { key: SettingKey, value: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum SettingKey {
    Format,
    Replace,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let settings = config::load_config(&cli.config_dir)?;
    let mut library = Library::open(&settings.library_root(&cli.config_dir), &settings.library)?;
    library.allow_heic_uploads();
    let codec = build_codec(&settings.codec);

    match cli.command {
        Command::Upload { files } => {
            let pipeline = Pipeline::new(&codec, library.conversion_config(), &settings.overrides);
            let mut failures = 0;
            for file in &files {
                match host::upload_file(&pipeline, &mut library, file) {
                    Ok(report) => output::print_upload_report(&report, &library),
                    Err(e) => {
                        eprintln!("{}: {}", file.display(), e);
                        failures += 1;
                    }
                }
            }
            library.save()?;
            if failures > 0 {
                return Err(format!("{failures} of {} uploads failed", files.len()).into());
            }
        }
        Command::Ingest { id } => {
            let pipeline = Pipeline::new(&codec, library.conversion_config(), &settings.overrides);
            let outcome = host::ingest_attachment(&pipeline, &mut library, id)?;
            library.save()?;
            output::print_ingest_report(id, &outcome, &library);
        }
        Command::Metadata { id } => {
            let pipeline = Pipeline::new(&codec, library.conversion_config(), &settings.overrides);
            let meta = host::refresh_metadata(&pipeline, &mut library, id)?;
            library.save()?;
            output::print_metadata(id, &meta);
        }
        Command::List => {
            output::print_attachment_list(library.attachments());
        }
        Command::Settings { action } => {
            if let SettingsCommand::Set { key, value } = action {
                match key {
                    SettingKey::Format => library.set_format(value.parse::<TargetFormat>()?),
                    SettingKey::Replace => {
                        let replace = parse_switch(&value)
                            .ok_or_else(|| format!("'{value}' is not true or false"))?;
                        library.set_replace(replace);
                    }
                }
                library.save()?;
            }
            let pipeline = Pipeline::new(&codec, library.conversion_config(), &settings.overrides);
            output::print_settings(&pipeline.config(), pipeline.resolved());
        }
        Command::SelfTest => {
            let pipeline = Pipeline::new(&codec, library.conversion_config(), &settings.overrides);
            let sample = settings.sample_path(&cli.config_dir);
            let report = selftest::run_self_test(&codec, &mut library, &sample, pipeline.resolved());
            library.save()?;
            output::print_self_test(&report);
        }
        Command::Diagnostics => {
            let diagnostics = selftest::diagnose(&codec, codec.binary());
            output::print_diagnostics(&diagnostics);
        }
        Command::Cleanup => {
            let report = selftest::cleanup(&mut library)?;
            library.save()?;
            output::print_cleanup(&report);
        }
        // Printed before the config is loaded.
        Command::GenConfig => {}
    }

    Ok(())
}

/// Log to stderr. `--verbose` wins over the environment filter.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn build_codec(settings: &CodecSettings) -> MagickCodec {
    let codec = match &settings.binary {
        Some(path) => MagickCodec::with_binary(path.clone()),
        None => MagickCodec::locate(),
    };
    codec.with_capability_probe(settings.capability_probe)
}
