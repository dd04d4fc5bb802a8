//! sealpack CLI - Password or key-file based encryption of files and
//! directory trees
//!
//! Directories are packed into a zip archive before encryption, so files and
//! directories share the same container format.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use sealpack::passphrase::{ConfirmingPassphraseReader, PassphraseReader, ReaderPassphraseReader};
use sealpack::{KeyGenMode, KeySource, OpenOutcome, PayloadKind, SealError, pipeline};

/// How many mismatched password/confirmation pairs to accept before giving up.
const CONFIRM_ATTEMPTS: usize = 3;

#[derive(Parser)]
#[command(name = "sealpack")]
#[command(version)]
#[command(about = "Compress and encrypt files and directories.", long_about = None)]
struct Cli {
    /// Read the password from stdin instead of from terminal
    #[arg(long, global = true)]
    passphrase_stdin: bool,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress (directories only) and encrypt a file or directory
    #[command(visible_alias = "encode", alias = "e")]
    Seal {
        /// Path to the input file or directory
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Path to write the container to
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Key file holding the key and IV, instead of a password
        #[arg(short, long, value_name = "FILE")]
        key: Option<PathBuf>,
    },

    /// Decrypt a container and extract it if it holds a directory
    #[command(visible_alias = "decode", alias = "d")]
    Open {
        /// Path to the container
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output path: a directory for sealed directories, a file or
        /// directory for sealed files
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Key file holding the key, instead of a password
        #[arg(short, long, value_name = "FILE")]
        key: Option<PathBuf>,
    },

    /// Generate a key file (JSON with base64 IV and key)
    Genkey {
        /// Path to write the key file to
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Generate a random IV and key instead of deriving the key from a password
        #[arg(long)]
        random: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Seal { input, output, key } => {
            let mut source = key_source(key, cli.passphrase_stdin);
            pipeline::seal(&input, &output, &mut source).map(|outcome| {
                let what = match outcome.payload {
                    PayloadKind::Archive => "directory",
                    PayloadKind::File => "file",
                };
                println!(
                    "Sealed {} '{}' into '{}'.",
                    what,
                    input.display(),
                    outcome.container.display()
                );
            })
        }
        Commands::Open { input, output, key } => {
            let mut source = key_source(key, cli.passphrase_stdin);
            pipeline::open(&input, &output, &mut source).map(|outcome| match outcome {
                OpenOutcome::Extracted { dest, entries } => println!(
                    "Extracted {} entries from '{}' into '{}'.",
                    entries.len(),
                    input.display(),
                    dest.display()
                ),
                OpenOutcome::Written { path } => {
                    println!("Decrypted '{}' to '{}'.", input.display(), path.display())
                }
            })
        }
        Commands::Genkey { output, random } => {
            let mode = if random {
                KeyGenMode::Random
            } else {
                KeyGenMode::Password(get_passphrase_reader(cli.passphrase_stdin))
            };
            pipeline::generate_key(&output, mode)
                .map(|()| println!("Saved IV and key to '{}'.", output.display()))
        }
    };

    if let Err(e) = result {
        report(&e);
        process::exit(1);
    }
}

fn report(err: &SealError) {
    eprintln!("Error: {}", err.chain_message());
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn key_source(key_file: Option<PathBuf>, use_stdin: bool) -> KeySource {
    match key_file {
        Some(path) => KeySource::KeyFile(path),
        None => KeySource::Password(get_passphrase_reader(use_stdin)),
    }
}

fn get_passphrase_reader(use_stdin: bool) -> Box<dyn PassphraseReader> {
    if use_stdin {
        Box::new(ReaderPassphraseReader::new(Box::new(std::io::stdin())))
    } else {
        Box::new(ConfirmingPassphraseReader::terminal(Some(CONFIRM_ATTEMPTS)))
    }
}
