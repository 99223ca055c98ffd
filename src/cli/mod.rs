//! Command-line interface for the biometric record conversion tool.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::codec::{ImageCodec, UnavailableWsqCodec};
use crate::config::{ConversionConfig, ImageType, Modality, Purpose, TargetFormat};
use crate::pipeline::{decode_record, encode_record, ConversionResult, PipelineBuilder};
use crate::record::Bdir;
use crate::validation::RecordValidator;

/// Biometric Record Conversion Tool
///
/// Converts the image embedded in ISO/IEC 19794-4/5/6 records from JPEG 2000
/// or WSQ to JPEG or PNG, and inspects or validates records.
#[derive(Parser, Debug)]
#[command(name = "bdir")]
#[command(version)]
#[command(about = "ISO/IEC 19794 biometric record conversion and validation")]
#[command(long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Records are raw binary rather than url-safe base64 text
    #[arg(long, global = true)]
    pub binary: bool,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert the embedded image of a record
    Convert {
        /// Input record file
        #[arg(short, long)]
        input: PathBuf,

        /// Output record file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Record modality (face, iris, finger)
        #[arg(short, long)]
        modality: Modality,

        /// Target image type (jpeg, png)
        #[arg(short, long, default_value = "jpeg")]
        target: ImageType,

        /// Declared purpose (auth, registration)
        #[arg(short, long, default_value = "auth")]
        purpose: Purpose,

        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// JPEG quality, overriding the configuration (1-100)
        #[arg(long)]
        jpeg_quality: Option<u8>,
    },

    /// Show the structure of a record as JSON
    Info {
        /// Input record file
        #[arg(short, long)]
        input: PathBuf,

        /// Record modality (face, iris, finger)
        #[arg(short, long)]
        modality: Modality,

        /// Dump every decoded field instead of the summary
        #[arg(long)]
        detailed: bool,
    },

    /// Validate a record for a purpose
    Validate {
        /// Input record file
        #[arg(short, long)]
        input: PathBuf,

        /// Record modality (face, iris, finger)
        #[arg(short, long)]
        modality: Modality,

        /// Declared purpose (auth, registration)
        #[arg(short, long, default_value = "registration")]
        purpose: Purpose,
    },
}

/// Run the CLI application without a WSQ decoder.
pub fn run(cli: Cli) -> anyhow::Result<()> {
    run_with_wsq_decoder(cli, Arc::new(UnavailableWsqCodec))
}

/// Run the CLI application, recognising and decoding WSQ images with
/// `wsq_decoder`.
pub fn run_with_wsq_decoder(cli: Cli, wsq_decoder: Arc<dyn ImageCodec>) -> anyhow::Result<()> {
    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
            .init();
    } else if !cli.quiet {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .init();
    }

    match cli.command {
        Commands::Convert {
            input,
            output,
            modality,
            target,
            purpose,
            config,
            jpeg_quality,
        } => {
            let mut config = match config {
                Some(path) => ConversionConfig::from_toml_file(&path)
                    .with_context(|| format!("loading configuration {}", path.display()))?,
                None => ConversionConfig::default(),
            };
            if let Some(quality) = jpeg_quality {
                config.jpeg_quality = quality;
            }
            run_convert(
                &input,
                output.as_deref(),
                modality,
                target,
                purpose,
                config,
                wsq_decoder,
                cli.binary,
                cli.quiet,
            )
        }
        Commands::Info {
            input,
            modality,
            detailed,
        } => run_info(&input, modality, detailed, cli.binary),
        Commands::Validate {
            input,
            modality,
            purpose,
        } => run_validate(&input, modality, purpose, wsq_decoder, cli.binary, cli.quiet),
    }
}

fn read_record(path: &Path, binary: bool) -> anyhow::Result<Vec<u8>> {
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    if binary {
        return Ok(data);
    }
    let text = String::from_utf8(data)
        .with_context(|| format!("{} is not base64 text", path.display()))?;
    decode_record(&text).with_context(|| format!("decoding base64 from {}", path.display()))
}

/// Run convert command.
#[allow(clippy::too_many_arguments)]
fn run_convert(
    input: &Path,
    output: Option<&Path>,
    modality: Modality,
    target: ImageType,
    purpose: Purpose,
    config: ConversionConfig,
    wsq_decoder: Arc<dyn ImageCodec>,
    binary: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    let target = TargetFormat::try_from(target)?;
    let pipeline = PipelineBuilder::new()
        .config(config)
        .wsq_decoder(wsq_decoder)
        .build()?;
    let bytes = read_record(input, binary)?;

    let start = std::time::Instant::now();
    let converted = pipeline
        .convert_bytes(modality, purpose, target, &bytes)
        .with_context(|| format!("converting {}", input.display()))?;

    let out = if binary {
        converted.bytes.clone()
    } else {
        encode_record(&converted.bytes).into_bytes()
    };
    match output {
        Some(path) => {
            std::fs::write(path, &out).with_context(|| format!("writing {}", path.display()))?
        }
        None => {
            use std::io::Write;
            std::io::stdout().write_all(&out)?;
        }
    }

    if !quiet && output.is_some() {
        print_conversion_result(&ConversionResult {
            record: String::new(),
            modality,
            transcoded: converted.transcoded,
            source_compression: converted.source_compression,
            output_compression: converted.output_compression,
            original_size: bytes.len(),
            converted_size: converted.bytes.len(),
            conversion_time_ms: start.elapsed().as_millis() as u64,
            warnings: converted.warnings,
        });
    }

    Ok(())
}

/// Run info command.
fn run_info(input: &Path, modality: Modality, detailed: bool, binary: bool) -> anyhow::Result<()> {
    let bytes = read_record(input, binary)?;
    let record = Bdir::decode(modality, &bytes)
        .with_context(|| format!("decoding {} record {}", modality, input.display()))?;

    let json = if detailed {
        serde_json::to_string_pretty(&record)?
    } else {
        serde_json::to_string_pretty(&record.summary())?
    };
    println!("{}", json);
    Ok(())
}

/// Run validate command.
fn run_validate(
    input: &Path,
    modality: Modality,
    purpose: Purpose,
    wsq_decoder: Arc<dyn ImageCodec>,
    binary: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    let bytes = read_record(input, binary)?;
    let record = Bdir::decode(modality, &bytes)
        .with_context(|| format!("decoding {} record {}", modality, input.display()))?;
    let report = RecordValidator::new()
        .with_wsq_decoder(wsq_decoder)
        .validate_record(&record, purpose);

    if !quiet {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    if !report.is_valid() {
        anyhow::bail!(
            "{} record failed {} validation with {} issue(s)",
            modality,
            purpose,
            report.issues.len()
        );
    }
    Ok(())
}

/// Print conversion result.
fn print_conversion_result(result: &ConversionResult) {
    eprintln!("Conversion Result:");
    eprintln!("  Modality: {}", result.modality);
    eprintln!(
        "  Image: {} -> {}{}",
        result.source_compression,
        result.output_compression,
        if result.transcoded { "" } else { " (untouched)" }
    );
    eprintln!("  Original Size: {} bytes", result.original_size);
    eprintln!("  Converted Size: {} bytes", result.converted_size);
    eprintln!("  Size Change: {:+.1}%", result.size_change_percent());
    eprintln!("  Time: {} ms", result.conversion_time_ms);

    if !result.warnings.is_empty() {
        eprintln!();
        eprintln!("Warnings:");
        for warning in &result.warnings {
            eprintln!("  - {}", warning);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{face_record_bytes, finger_record_bytes, FakeWsqCodec};

    #[test]
    fn test_parse_convert_args() {
        let cli = Cli::try_parse_from([
            "bdir", "convert", "-i", "in.b64", "-m", "Face", "-t", "png", "--binary",
        ])
        .unwrap();
        assert!(cli.binary);
        match cli.command {
            Commands::Convert {
                modality,
                target,
                purpose,
                ..
            } => {
                assert_eq!(modality, Modality::Face);
                assert_eq!(target, ImageType::Png);
                assert_eq!(purpose, Purpose::Auth);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_modality_rejected() {
        assert!(Cli::try_parse_from(["bdir", "info", "-i", "x", "-m", "palm"]).is_err());
    }

    #[test]
    fn test_convert_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("face.b64");
        let output = dir.path().join("face.out.b64");
        std::fs::write(&input, encode_record(&face_record_bytes())).unwrap();

        run_convert(
            &input,
            Some(&output),
            Modality::Face,
            ImageType::Png,
            Purpose::Auth,
            ConversionConfig::default(),
            Arc::new(UnavailableWsqCodec),
            false,
            true,
        )
        .unwrap();

        let converted = read_record(&output, false).unwrap();
        let record = Bdir::decode(Modality::Face, &converted).unwrap();
        assert_eq!(
            record.primary_image().unwrap().compression,
            crate::record::ImageCompression::Png
        );
    }

    #[test]
    fn test_validate_fails_on_issues() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("face.bin");
        let mut bytes = face_record_bytes();
        // capture month
        bytes[17 + 4 + 2] = 13;
        std::fs::write(&input, &bytes).unwrap();

        let no_wsq = || -> Arc<dyn ImageCodec> { Arc::new(UnavailableWsqCodec) };
        assert!(run_validate(&input, Modality::Face, Purpose::Auth, no_wsq(), true, true).is_err());
        bytes[17 + 4 + 2] = 6;
        std::fs::write(&input, &bytes).unwrap();
        assert!(run_validate(&input, Modality::Face, Purpose::Auth, no_wsq(), true, true).is_ok());
    }

    #[test]
    fn test_finger_with_wsq_decoder() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("finger.bin");
        let output = dir.path().join("finger.out.bin");
        std::fs::write(&input, finger_record_bytes()).unwrap();

        assert!(run_validate(
            &input,
            Modality::Finger,
            Purpose::Auth,
            Arc::new(FakeWsqCodec),
            true,
            true
        )
        .is_ok());
        assert!(run_validate(
            &input,
            Modality::Finger,
            Purpose::Auth,
            Arc::new(UnavailableWsqCodec),
            true,
            true
        )
        .is_err());

        run_convert(
            &input,
            Some(&output),
            Modality::Finger,
            ImageType::Png,
            Purpose::Auth,
            ConversionConfig::default(),
            Arc::new(FakeWsqCodec),
            true,
            true,
        )
        .unwrap();
        let record = Bdir::decode(Modality::Finger, &std::fs::read(&output).unwrap()).unwrap();
        assert_eq!(
            record.primary_image().unwrap().compression,
            crate::record::ImageCompression::Png
        );
    }
}
