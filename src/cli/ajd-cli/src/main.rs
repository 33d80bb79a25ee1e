//! AJD CLI - Command line interface to the ajd-crypto toolkit.

use std::fs::File;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use ajd_crypto::kdf::{self, DEFAULT_ITERATIONS, DEFAULT_OUTPUT_LENGTH};
use ajd_crypto::{random, Cipher, CryptoError, Hasher};
use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{Map, Value};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zeroize::Zeroizing;

/// Read size used when streaming input through a hasher or cipher.
const CHUNK_SIZE: usize = 64 * 1024;

/// Exit status reserved for failed tag verification.
const EXIT_AUTHENTICATION_FAILED: u8 = 2;

/// Upper bound for `random --bytes` and `derive --length`.
const MAX_OUTPUT_BYTES: u64 = 1 << 20;

fn output_size() -> clap::builder::RangedU64ValueParser<usize> {
    clap::builder::RangedU64ValueParser::<usize>::new().range(1..=MAX_OUTPUT_BYTES)
}

// ============================================================================
// CLI Structure
// ============================================================================

#[derive(Parser)]
#[command(name = "ajd")]
#[command(about = "AJD crypto toolkit - random bytes, PBKDF2, SHA-256/HMAC and AES-128-GCM")]
#[command(version)]
struct Cli {
    /// Encoding of binary arguments and output
    #[arg(long, value_enum, default_value_t = Encoding::Hex, env = "AJD_ENCODING", global = true)]
    encoding: Encoding,

    /// Emit a JSON object instead of plain lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the OS random generator
    Status,
    /// Print random bytes
    Random {
        /// Number of bytes
        #[arg(long, default_value = "16", value_parser = output_size())]
        bytes: usize,
    },
    /// Print a fresh random key and IV
    Keygen,
    /// Derive a key from a password with PBKDF2-HMAC-SHA256
    Derive {
        /// Password (read from stdin if not provided)
        #[arg(long, env = "AJD_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Salt
        #[arg(long)]
        salt: String,
        /// Iteration count
        #[arg(long, default_value_t = DEFAULT_ITERATIONS, env = "AJD_PBKDF2_ITERATIONS")]
        iterations: u32,
        /// Derived key length in bytes
        #[arg(long, default_value_t = DEFAULT_OUTPUT_LENGTH, value_parser = output_size())]
        length: usize,
    },
    /// SHA-256 digest, or HMAC-SHA256 when a key is given
    Hash {
        /// MAC key
        #[arg(long)]
        key: Option<String>,
        /// Input file (stdin if omitted)
        file: Option<PathBuf>,
    },
    /// Encrypt with AES-128-GCM
    Encrypt {
        /// 16-byte key
        #[arg(long)]
        key: String,
        /// 16-byte IV
        #[arg(long)]
        iv: String,
        /// Associated data (authenticated, not encrypted)
        #[arg(long)]
        aad: Option<String>,
        /// Plaintext file (stdin if omitted)
        file: Option<PathBuf>,
    },
    /// Decrypt and verify AES-128-GCM
    Decrypt {
        /// 16-byte key
        #[arg(long)]
        key: String,
        /// 16-byte IV
        #[arg(long)]
        iv: String,
        /// 16-byte authentication tag
        #[arg(long)]
        tag: String,
        /// Associated data (authenticated, not encrypted)
        #[arg(long)]
        aad: Option<String>,
        /// Encoded ciphertext file (stdin if omitted)
        file: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Encoding {
    Hex,
    Base64,
}

impl Encoding {
    fn encode(self, bytes: &[u8]) -> String {
        match self {
            Self::Hex => hex::encode(bytes),
            Self::Base64 => BASE64.encode(bytes),
        }
    }

    fn decode(self, text: &str, what: &str) -> Result<Vec<u8>> {
        let text = text.trim();
        match self {
            Self::Hex => hex::decode(text).with_context(|| format!("Invalid hex in {}", what)),
            Self::Base64 => BASE64
                .decode(text)
                .with_context(|| format!("Invalid base64 in {}", what)),
        }
    }
}

// ============================================================================
// Output
// ============================================================================

/// Ordered name/value pairs produced by a command.
#[derive(Debug, Default)]
struct Report {
    fields: Vec<(&'static str, Value)>,
}

impl Report {
    fn with(mut self, name: &'static str, value: impl Into<Value>) -> Self {
        self.fields.push((name, value.into()));
        self
    }

    fn render(&self, json: bool) -> Result<String> {
        if json {
            let map: Map<String, Value> = self
                .fields
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect();
            return serde_json::to_string_pretty(&Value::Object(map))
                .context("Failed to serialize output");
        }

        let plain = |value: &Value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        if let [(_, value)] = self.fields.as_slice() {
            return Ok(plain(value));
        }

        Ok(self
            .fields
            .iter()
            .map(|(name, value)| format!("{}: {}", name, plain(value)))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

fn open_input(file: Option<&Path>) -> Result<Box<dyn Read>> {
    match file {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(io::stdin().lock())),
    }
}

fn read_password(password: Option<String>) -> Result<Zeroizing<String>> {
    let password = match password {
        Some(p) => p,
        None => {
            eprint!("Enter password: ");
            io::stderr().flush()?;
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            line.trim_end_matches(&['\r', '\n'][..]).to_string()
        }
    };

    if password.is_empty() {
        bail!("Password cannot be empty");
    }

    Ok(Zeroizing::new(password))
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_status() -> Report {
    Report::default().with("seeded", random::is_seeded())
}

fn cmd_random(enc: Encoding, bytes: usize) -> Result<Report> {
    let bytes = random::generate_bytes(bytes)?;
    Ok(Report::default().with("random", enc.encode(&bytes)))
}

fn cmd_keygen(enc: Encoding) -> Result<Report> {
    let key = random::generate_key()?;
    let iv = random::generate_iv()?;
    Ok(Report::default()
        .with("key", enc.encode(&key[..]))
        .with("iv", enc.encode(&iv)))
}

fn cmd_derive(
    enc: Encoding,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    length: usize,
) -> Result<Report> {
    let key = kdf::derive_key(password, salt, iterations, length)?;
    Ok(Report::default().with("key", enc.encode(&key)))
}

fn cmd_hash(enc: Encoding, key: Option<&[u8]>, mut input: impl Read) -> Result<Report> {
    let mut hasher = match key {
        Some(key) => Hasher::keyed(key)?,
        None => Hasher::new(),
    };

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0usize;
    loop {
        let n = input.read(&mut buf).context("Failed to read input")?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n;
    }
    debug!(bytes = total, keyed = hasher.is_keyed(), "input hashed");

    let name = if hasher.is_keyed() { "mac" } else { "digest" };
    Ok(Report::default().with(name, enc.encode(&hasher.finalize())))
}

fn cmd_encrypt(
    enc: Encoding,
    key: &[u8],
    iv: &[u8],
    aad: &[u8],
    mut input: impl Read,
) -> Result<Report> {
    let mut cipher = Cipher::encryptor(key, iv)?;
    cipher.associate_data(aad)?;

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut ciphertext = Vec::new();
    loop {
        let n = input.read(&mut buf).context("Failed to read input")?;
        if n == 0 {
            break;
        }
        ciphertext.extend(cipher.transform(&buf[..n])?);
    }
    let tag = cipher.seal()?;
    info!(bytes = ciphertext.len(), "message encrypted");

    Ok(Report::default()
        .with("ciphertext", enc.encode(&ciphertext))
        .with("tag", enc.encode(&tag)))
}

/// Decrypts and verifies; plaintext is only returned after verification.
fn cmd_decrypt(
    key: &[u8],
    iv: &[u8],
    tag: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let mut cipher = Cipher::decryptor(key, iv, tag)?;
    cipher.associate_data(aad)?;

    let mut plaintext = Zeroizing::new(Vec::with_capacity(ciphertext.len()));
    for chunk in ciphertext.chunks(CHUNK_SIZE) {
        plaintext.extend(cipher.transform(chunk)?);
    }
    cipher.verify()?;
    info!(bytes = plaintext.len(), "message decrypted and verified");

    Ok(plaintext)
}

fn run(cli: Cli) -> Result<()> {
    let enc = cli.encoding;
    let optional = |value: Option<String>, what: &str| -> Result<Vec<u8>> {
        value.map_or(Ok(Vec::new()), |v| enc.decode(&v, what))
    };

    let report = match cli.command {
        Commands::Status => cmd_status(),
        Commands::Random { bytes } => cmd_random(enc, bytes)?,
        Commands::Keygen => cmd_keygen(enc)?,
        Commands::Derive {
            password,
            salt,
            iterations,
            length,
        } => {
            let password = read_password(password)?;
            let salt = enc.decode(&salt, "salt")?;
            cmd_derive(enc, password.as_bytes(), &salt, iterations, length)?
        }
        Commands::Hash { key, file } => {
            let key = key.map(|k| enc.decode(&k, "key")).transpose()?;
            cmd_hash(enc, key.as_deref(), open_input(file.as_deref())?)?
        }
        Commands::Encrypt { key, iv, aad, file } => {
            let key = Zeroizing::new(enc.decode(&key, "key")?);
            let iv = enc.decode(&iv, "iv")?;
            let aad = optional(aad, "aad")?;
            cmd_encrypt(enc, &key, &iv, &aad, open_input(file.as_deref())?)?
        }
        Commands::Decrypt {
            key,
            iv,
            tag,
            aad,
            file,
        } => {
            let key = Zeroizing::new(enc.decode(&key, "key")?);
            let iv = enc.decode(&iv, "iv")?;
            let tag = enc.decode(&tag, "tag")?;
            let aad = optional(aad, "aad")?;

            let mut text = String::new();
            open_input(file.as_deref())?
                .read_to_string(&mut text)
                .context("Failed to read ciphertext")?;
            let ciphertext = enc.decode(&text, "ciphertext")?;

            let plaintext = cmd_decrypt(&key, &iv, &tag, &aad, &ciphertext)?;
            if !cli.json {
                io::stdout().write_all(&plaintext)?;
                return Ok(());
            }
            Report::default().with("plaintext", enc.encode(&plaintext))
        }
    };

    println!("{}", report.render(cli.json)?);
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            let auth_failed = e
                .downcast_ref::<CryptoError>()
                .is_some_and(CryptoError::is_authentication_failure);
            if auth_failed {
                ExitCode::from(EXIT_AUTHENTICATION_FAILED)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
