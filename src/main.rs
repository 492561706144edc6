//! PKI Handshake - demo and operator binary
//!
//! ```bash
//! pki-handshake demo                       # server-authenticated handshake
//! pki-handshake mutual                     # mutual authentication, PING/PONG
//! pki-handshake issue server.example       # write root + leaf PEM files
//! pki-handshake verify root.pem leaf.pem   # verify a leaf against a root
//! pki-handshake -c other.toml demo         # explicit config file
//! ```
//!
//! Configuration is read from `config.toml` when present. Log verbosity follows
//! `RUST_LOG`, falling back to `[logging] level`.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use pki_handshake::certificate::{Certificate, TrustRoot, TrustStore};
use pki_handshake::certificate_authority::{CertificateAuthority, LeafUsage, RootCABuilder};
use pki_handshake::certificate_verifier::CertificateVerifier;
use pki_handshake::configs::AppConfig;
use pki_handshake::handshake::{
    run_handshake, ClientAuth, HandshakeConfig, Identity, Initiator, Responder,
};
use pki_handshake::key_pair::KeyPair;
use secrecy::ExposeSecret;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing_subscriber::EnvFilter;

const ROOT_CERT_FILE: &str = "root.pem";
const ROOT_KEY_FILE: &str = "root-key.pem";

/// PKI Handshake command line.
#[derive(Parser, Debug)]
#[command(name = "pki-handshake")]
#[command(about = "PKI Handshake - certificate trust chain and hybrid session setup")]
struct Cli {
    /// Configuration file (defaults to ./config.toml when present).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Server-authenticated handshake and payload exchange
    Demo,
    /// Mutual authentication with a PING/PONG exchange
    Mutual,
    /// Issue a leaf (and the root if missing) into the export directory
    Issue {
        /// Subject common name, also used as the file name stem
        subject: String,
    },
    /// Verify a leaf certificate against a root
    Verify {
        /// Root certificate (PEM)
        root: PathBuf,
        /// Leaf certificate (PEM)
        leaf: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::load()?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Command::Demo => run_demo(&config),
        Command::Mutual => run_mutual(&config),
        Command::Issue { subject } => issue(&config, &subject),
        Command::Verify { root, leaf } => verify(&root, &leaf),
    }
}

fn build_authority(config: &AppConfig) -> Result<CertificateAuthority> {
    let (root, root_keys) = RootCABuilder::new(config.root_ca.common_name.as_str())
        .organization(config.root_ca.organization.as_str())
        .validity_days(config.root_ca.validity_days)
        .key_bits(config.root_ca.key_bits)
        .build()
        .context("Failed to generate Root CA")?;
    println!("✓ Root CA '{}' generated", root.subject_name());
    Ok(CertificateAuthority::from_parts(root, root_keys)?
        .with_leaf_validity_days(config.leaf.validity_days)
        .with_leaf_key_bits(config.leaf.key_bits))
}

fn issue_identity(ca: &CertificateAuthority, subject: &str, usage: LeafUsage) -> Result<Identity> {
    let (keys, cert) = ca
        .issue_key_pair(subject, usage)
        .context(format!("Failed to issue certificate for {}", subject))?;
    println!("✓ Certificate issued for '{}' ({:?})", subject, usage);
    Ok(Identity::new(keys, cert)?)
}

fn run_demo(config: &AppConfig) -> Result<()> {
    println!("=== Server-Authenticated Handshake ===\n");
    let ca = build_authority(config)?;
    let server = issue_identity(&ca, "server.example", LeafUsage::Server)?;

    let handshake = HandshakeConfig {
        client_auth: ClientAuth::None,
        ..config.handshake.to_handshake_config()
    };
    let mut initiator = Initiator::new(ca.trust_store(), handshake);
    let mut responder = Responder::new(server, ca.trust_store(), handshake);

    let (client_session, mut server_session) = run_handshake(&mut initiator, &mut responder)?;
    println!(
        "✓ Handshake established with '{}' ({:?} key transport)",
        client_session.peer_name(),
        handshake.transport_padding
    );

    let payload = b"a small secret inside the channel";
    let record = client_session.encrypt(payload)?;
    println!("✓ Encrypted record: {} bytes", record.len());

    let decrypted = server_session.decrypt(&record)?;
    println!("✓ Server decrypted: {}", String::from_utf8_lossy(&decrypted));
    Ok(())
}

fn run_mutual(config: &AppConfig) -> Result<()> {
    println!("=== Mutual-Authentication Handshake ===\n");
    let ca = build_authority(config)?;
    let server = issue_identity(&ca, "server.example", LeafUsage::Server)?;
    let client = issue_identity(&ca, "client.example", LeafUsage::Client)?;

    let handshake = HandshakeConfig {
        client_auth: ClientAuth::Required,
        ..config.handshake.to_handshake_config()
    };
    let mut initiator = Initiator::new(ca.trust_store(), handshake).with_identity(client);
    let mut responder = Responder::new(server, ca.trust_store(), handshake);

    let (mut client_session, mut server_session) =
        run_handshake(&mut initiator, &mut responder)?;
    println!(
        "✓ Both directions verified: client sees '{}', server sees '{}'",
        client_session.peer_name(),
        server_session.peer_name()
    );

    let request = client_session.encrypt(b"PING")?;
    let command = server_session.decrypt(&request)?;
    println!("  Server received: {}", String::from_utf8_lossy(&command));

    let reply: &[u8] = match command.as_slice() {
        b"PING" => b"PONG",
        _ => b"UNKNOWN COMMAND",
    };
    let response = server_session.encrypt(reply)?;
    let answer = client_session.decrypt(&response)?;
    println!("  Client received: {}", String::from_utf8_lossy(&answer));

    client_session.close();
    server_session.close();
    println!("\n✓ Sessions closed");
    Ok(())
}

fn load_or_create_authority(config: &AppConfig, dir: &Path) -> Result<CertificateAuthority> {
    let cert_path = dir.join(ROOT_CERT_FILE);
    let key_path = dir.join(ROOT_KEY_FILE);

    let ca = if cert_path.exists() && key_path.exists() {
        let root_pem = fs::read(&cert_path)?;
        let root = TrustRoot::from_pem(&root_pem)
            .context(format!("Failed to load root from {}", cert_path.display()))?;
        let key_pem = fs::read(&key_path)?;
        let keys = KeyPair::from_private_key_pem(&key_pem)
            .context(format!("Failed to load root key from {}", key_path.display()))?;
        println!("✓ Loaded Root CA '{}'", root.subject_name());
        CertificateAuthority::from_parts(root, keys)?
            .with_leaf_validity_days(config.leaf.validity_days)
            .with_leaf_key_bits(config.leaf.key_bits)
    } else {
        let ca = build_authority(config)?;
        fs::write(&cert_path, ca.trust_root().certificate().to_pem()?)?;
        write_private(&key_path, ca.root_key_to_pem()?.expose_secret())?;
        println!("✓ Root CA exported to '{}'", cert_path.display());
        ca
    };
    Ok(ca)
}

/// Reject subjects that would escape the export directory once used as a file name
fn export_stem(subject: &str) -> Result<&str> {
    let mut components = Path::new(subject).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single_normal || subject.contains(['/', '\\']) {
        return Err(anyhow!(
            "subject '{}' cannot be used as an export file name",
            subject
        ));
    }
    Ok(subject)
}

fn issue(config: &AppConfig, subject: &str) -> Result<()> {
    let stem = export_stem(subject)?;
    let dir = &config.exports.directory;
    fs::create_dir_all(dir)
        .context(format!("Failed to create export directory {}", dir.display()))?;

    let ca = load_or_create_authority(config, dir)?;
    let (keys, cert) = ca
        .issue_key_pair(subject, LeafUsage::Server)
        .context(format!("Failed to issue certificate for {}", subject))?;

    let cert_path = dir.join(format!("{}.pem", stem));
    let key_path = dir.join(format!("{}-key.pem", stem));
    fs::write(&cert_path, cert.to_pem()?)?;
    write_private(&key_path, keys.private_key_to_pem()?.expose_secret())?;

    println!("✓ Certificate for '{}' written to '{}'", subject, cert_path.display());
    println!("  Serial: {}", cert.serial_number()?);
    println!("  Fingerprint (SHA-256): {}", cert.fingerprint()?);
    println!("  Valid until: {}", cert.not_after());
    Ok(())
}

fn verify(root_path: &Path, leaf_path: &Path) -> Result<()> {
    let root_pem =
        fs::read(root_path).context(format!("Failed to read {}", root_path.display()))?;
    let root = TrustRoot::from_pem(&root_pem)?;
    let leaf_pem =
        fs::read(leaf_path).context(format!("Failed to read {}", leaf_path.display()))?;
    let leaf = Certificate::from_pem(&leaf_pem)?;
    let store = TrustStore::new(root);

    match CertificateVerifier::new().verify(&leaf.to_der()?, &store) {
        Ok(key) => {
            println!(
                "✓ '{}' verified against '{}' ({}-bit RSA key)",
                leaf.subject_name(),
                store.root().subject_name(),
                key.bits()
            );
            Ok(())
        }
        Err(e) => {
            println!("✗ Verification of '{}' failed", leaf.subject_name());
            Err(e.into())
        }
    }
}

fn write_private(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).context(format!("Failed to write {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["pki-handshake", "demo"]).unwrap();
        assert_eq!(cli.command, Command::Demo);
        assert!(cli.config.is_none());

        let cli = Cli::try_parse_from(["pki-handshake", "-c", "other.toml", "issue", "a.example"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("other.toml")));
        assert_eq!(
            cli.command,
            Command::Issue {
                subject: "a.example".to_string()
            }
        );

        let cli = Cli::try_parse_from(["pki-handshake", "verify", "root.pem", "leaf.pem"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Verify {
                root: PathBuf::from("root.pem"),
                leaf: PathBuf::from("leaf.pem"),
            }
        );
    }

    #[test]
    fn test_cli_rejects_unknown_or_incomplete_commands() {
        assert!(Cli::try_parse_from(["pki-handshake", "launch"]).is_err());
        assert!(Cli::try_parse_from(["pki-handshake", "issue"]).is_err());
        assert!(Cli::try_parse_from(["pki-handshake", "verify", "root.pem"]).is_err());
        assert!(Cli::try_parse_from(["pki-handshake"]).is_err());
    }

    #[test]
    fn test_export_stem_rejects_path_escapes() {
        assert_eq!(export_stem("server.example").unwrap(), "server.example");
        for subject in ["../x", "..", ".", "", "/etc/passwd", "a/b", "a\\b"] {
            assert!(export_stem(subject).is_err(), "accepted {:?}", subject);
        }
    }

    #[test]
    fn test_issue_writes_inside_export_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.exports.directory = dir.path().join("exports");

        assert!(issue(&config, "../escape").is_err());
        assert!(!dir.path().join("escape.pem").exists());

        issue(&config, "server.example").unwrap();
        let exports = &config.exports.directory;
        for file in ["root.pem", "root-key.pem", "server.example.pem", "server.example-key.pem"] {
            assert!(exports.join(file).exists(), "missing {}", file);
        }
    }
}
