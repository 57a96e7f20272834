//! heirloom — client-side custody CLI.
//!
//! Runs the secret-custody pipeline on the operator's machine: generate a
//! will key, encrypt a payload, split the key into guardian shares, commit
//! to shares, and reconstruct the payload after release. Blobs live in a
//! content-addressed directory; everything else is JSON on disk.
//!
//! Usage:
//!   heirloom keygen    [--keyfile <path>]
//!   heirloom package   --input <file> --guardians <b58,...> --threshold <k> --owner <b58>
//!   heirloom recover   --package <file> --shares <file>...
//!   heirloom split     --n <n> --threshold <k> [--keyfile <path>] --out-dir <dir>
//!   heirloom combine   --shares <file>... [--keyfile-out <path>]
//!   heirloom commit    --share <file> [--salt <hex32>]
//!   heirloom verify-commit --share <file> --salt <hex32> --digest <hex32>
//!   heirloom encrypt   --input <file> --output <file> [--keyfile <path>]
//!   heirloom decrypt   --input <file> --output <file> [--keyfile <path>]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::info;

use heirloom_core::types::{Principal, Salt};
use heirloom_custody::{
    combine_shares, commit_share, create_will_package, decrypt, encrypt, generate_key,
    recover_payload, split_key, verify_commit, EncryptedPayload, FsBlobStore, KeyShare, SecretKey,
    WillPackage,
};

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "heirloom",
    version,
    about = "Heirloom custody CLI — encrypt, split, commit, reconstruct"
)]
struct Args {
    /// Path to the will keyfile (JSON).
    #[arg(long, global = true, default_value = "~/.heirloom/key.json")]
    keyfile: PathBuf,

    /// Content-addressed blob directory.
    #[arg(long, global = true, default_value = "~/.heirloom/blobs")]
    blob_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a fresh 256-bit will key and save it to the keyfile.
    Keygen,

    /// Full pipeline: encrypt a payload, split the key across guardians,
    /// upload the ciphertext, and write the will package + per-guardian
    /// share files.
    Package {
        /// Plaintext payload file.
        #[arg(long)]
        input: PathBuf,
        /// Guardian principals (base-58, comma-separated, in will order).
        #[arg(long, value_delimiter = ',')]
        guardians: Vec<String>,
        /// Shares needed to reconstruct (k).
        #[arg(long)]
        threshold: u8,
        /// Owner principal (base-58).
        #[arg(long)]
        owner: String,
        /// Directory for package.json and the share files.
        #[arg(long, default_value = "./will-package")]
        out_dir: PathBuf,
        /// Optional metadata entries, key=value.
        #[arg(long, value_delimiter = ',')]
        meta: Vec<String>,
    },

    /// Reconstruct a released payload from a package and a quorum of shares.
    Recover {
        /// package.json written by `package`.
        #[arg(long)]
        package: PathBuf,
        /// Share files collected from guardians.
        #[arg(long, num_args = 1..)]
        shares: Vec<PathBuf>,
        /// Where to write the recovered plaintext.
        #[arg(long, default_value = "./recovered.bin")]
        output: PathBuf,
    },

    /// Split the keyfile into n shares with reconstruction threshold k.
    Split {
        #[arg(long)]
        n: u8,
        #[arg(long)]
        threshold: u8,
        #[arg(long, default_value = "./shares")]
        out_dir: PathBuf,
    },

    /// Recombine share files into a key and save it to --keyfile-out.
    Combine {
        #[arg(long, num_args = 1..)]
        shares: Vec<PathBuf>,
        #[arg(long, default_value = "~/.heirloom/recovered-key.json")]
        keyfile_out: PathBuf,
    },

    /// Compute the on-chain commitment digest for a share.
    Commit {
        #[arg(long)]
        share: PathBuf,
        /// 32-byte salt (hex). Generated and printed if omitted.
        #[arg(long)]
        salt: Option<String>,
    },

    /// Check a share against a previously published commitment.
    VerifyCommit {
        #[arg(long)]
        share: PathBuf,
        #[arg(long)]
        salt: String,
        #[arg(long)]
        digest: String,
    },

    /// Encrypt a file under the keyfile's key.
    Encrypt {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },

    /// Decrypt a payload envelope with the keyfile's key.
    Decrypt {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
}

// ── Main ─────────────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("warn,heirloom=info")
        .init();

    let args = Args::parse();
    let keyfile = expand_tilde(&args.keyfile);
    let blob_dir = expand_tilde(&args.blob_dir);
    let now = chrono::Utc::now().timestamp();

    match args.command {
        Command::Keygen => cmd_keygen(&keyfile),

        Command::Package { input, guardians, threshold, owner, out_dir, meta } => {
            let plaintext = std::fs::read(&input)
                .with_context(|| format!("reading payload {}", input.display()))?;
            let owner = parse_principal(&owner)?;
            let guardian_ids: Vec<Principal> = guardians
                .iter()
                .map(|g| parse_principal(g))
                .collect::<anyhow::Result<_>>()?;
            if guardian_ids.is_empty() {
                bail!("at least one guardian is required");
            }
            let metadata = parse_metadata(&meta)?;

            let store = FsBlobStore::open(&blob_dir)?;
            let package = create_will_package(
                &store,
                owner,
                &plaintext,
                &guardian_ids,
                threshold,
                metadata,
                now,
            )?;

            std::fs::create_dir_all(&out_dir)?;
            let package_path = out_dir.join("package.json");
            write_json(&package_path, &package)?;
            for guardian_share in &package.shares {
                let share_path =
                    out_dir.join(format!("share-{}.json", guardian_share.share.index));
                write_json(&share_path, guardian_share)?;
            }

            println!("Will package written to {}", package_path.display());
            println!("  encrypted_cid: {}", package.encrypted_cid);
            println!("  payload_hash:  {}", package.payload_hash);
            println!("  shares:        {} (threshold {})", package.shares.len(), threshold);
            println!();
            println!("Pass encrypted_cid and payload_hash to create_will.");
            println!("Deliver each share-<i>.json to its guardian over a secure channel,");
            println!("then DELETE them from this machine. Anyone holding {threshold} shares");
            println!("can reconstruct the will key.");
            Ok(())
        }

        Command::Recover { package, shares, output } => {
            let package: WillPackage = read_json(&package)?;
            let shares = read_shares(&shares)?;
            let store = FsBlobStore::open(&blob_dir)?;
            let plaintext = recover_payload(&store, &package, &shares)?;
            std::fs::write(&output, &plaintext)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("Recovered {} bytes to {}", plaintext.len(), output.display());
            Ok(())
        }

        Command::Split { n, threshold, out_dir } => {
            let key = load_key(&keyfile)?;
            let shares = split_key(&key, n, threshold, now)?;
            std::fs::create_dir_all(&out_dir)?;
            for share in &shares {
                write_json(&out_dir.join(format!("share-{}.json", share.index)), share)?;
            }
            println!(
                "Wrote {} shares (threshold {}) to {}",
                shares.len(),
                threshold,
                out_dir.display()
            );
            Ok(())
        }

        Command::Combine { shares, keyfile_out } => {
            let shares = read_shares(&shares)?;
            let key = combine_shares(&shares)?;
            let out = expand_tilde(&keyfile_out);
            write_keyfile(&out, &key)?;
            println!("Key reconstructed from {} shares.", shares.len());
            println!("Keyfile: {}", out.display());
            Ok(())
        }

        Command::Commit { share, salt } => {
            let share: KeyShare = read_share(&share)?;
            let salt = match salt {
                Some(s) => parse_salt(&s)?,
                None => {
                    let mut bytes = [0u8; 32];
                    OsRng.fill_bytes(&mut bytes);
                    Salt(bytes)
                }
            };
            let digest = commit_share(&share, &salt);
            println!("share index: {}", share.index);
            println!("salt:        {}", salt.to_hex());
            println!("commitment:  {}", hex::encode(digest));
            println!();
            println!("Publish the commitment via add_commitment; keep the salt with the share.");
            Ok(())
        }

        Command::VerifyCommit { share, salt, digest } => {
            let share: KeyShare = read_share(&share)?;
            let salt = parse_salt(&salt)?;
            let digest_bytes = parse_digest(&digest)?;
            if verify_commit(&share, &salt, &digest_bytes) {
                println!("OK — share matches the commitment.");
                Ok(())
            } else {
                bail!("commitment mismatch: share, salt, or digest is wrong");
            }
        }

        Command::Encrypt { input, output } => {
            let key = load_key(&keyfile)?;
            let plaintext = std::fs::read(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let payload = encrypt(&plaintext, &key, now);
            write_json(&output, &payload)?;
            println!("Encrypted {} bytes to {}", plaintext.len(), output.display());
            Ok(())
        }

        Command::Decrypt { input, output } => {
            let key = load_key(&keyfile)?;
            let payload: EncryptedPayload = read_json(&input)?;
            let plaintext = decrypt(&payload, &key)?;
            std::fs::write(&output, &plaintext)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("Decrypted {} bytes to {}", plaintext.len(), output.display());
            Ok(())
        }
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn cmd_keygen(keyfile: &Path) -> anyhow::Result<()> {
    if keyfile.exists() {
        bail!(
            "Keyfile {} already exists. Delete it first to generate a new key.",
            keyfile.display()
        );
    }
    let key = generate_key();
    write_keyfile(keyfile, &key)?;
    info!("generated new will key");
    println!("Generated new will key.");
    println!("Keyfile: {}", keyfile.display());
    println!();
    println!("BACK UP YOUR KEYFILE. Without it (or a quorum of shares), the");
    println!("encrypted payload is unrecoverable.");
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn load_key(keyfile: &Path) -> anyhow::Result<SecretKey> {
    let json = std::fs::read_to_string(keyfile)
        .with_context(|| format!("reading keyfile {}", keyfile.display()))?;
    serde_json::from_str(&json).context("parsing keyfile — is it a valid heirloom keyfile?")
}

fn write_keyfile(keyfile: &Path, key: &SecretKey) -> anyhow::Result<()> {
    if let Some(parent) = keyfile.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(keyfile, serde_json::to_string_pretty(key)?)
        .with_context(|| format!("writing keyfile to {}", keyfile.display()))?;
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(value)?)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Share files come in two shapes: a bare KeyShare (from `split`) or a
/// GuardianShare wrapper (from `package`). Accept both.
fn read_share(path: &Path) -> anyhow::Result<KeyShare> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading share {}", path.display()))?;
    if let Ok(share) = serde_json::from_str::<KeyShare>(&json) {
        return Ok(share);
    }
    let wrapped: heirloom_custody::GuardianShare =
        serde_json::from_str(&json).with_context(|| format!("parsing share {}", path.display()))?;
    Ok(wrapped.share)
}

fn read_shares(paths: &[PathBuf]) -> anyhow::Result<Vec<KeyShare>> {
    paths.iter().map(|p| read_share(p)).collect()
}

fn parse_principal(s: &str) -> anyhow::Result<Principal> {
    Principal::from_b58(s.trim()).map_err(|e| anyhow::anyhow!("invalid principal {s}: {e}"))
}

fn parse_salt(s: &str) -> anyhow::Result<Salt> {
    Ok(Salt(parse_digest(s)?))
}

fn parse_digest(s: &str) -> anyhow::Result<[u8; 32]> {
    let bytes = hex::decode(s.trim()).context("decoding hex")?;
    if bytes.len() != 32 {
        bail!("expected 32 bytes (64 hex chars), got {}", bytes.len());
    }
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

fn parse_metadata(entries: &[String]) -> anyhow::Result<BTreeMap<String, String>> {
    let mut metadata = BTreeMap::new();
    for entry in entries {
        let (k, v) = entry
            .split_once('=')
            .with_context(|| format!("metadata entry '{entry}' is not key=value"))?;
        metadata.insert(k.to_string(), v.to_string());
    }
    Ok(metadata)
}

fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
