//! commit_recover CLI - VDF proving/verification and round simulation

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use num_bigint::{BigUint, RandBigInt};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing::info;

use commit_recover::bignum::{parse_hex, BigNumber};
use commit_recover::crypto::kmac::{kmac256_hash, kmac256_xof};
use commit_recover::modarith::mod_exp;
use commit_recover::{logging, vdf, Address, BeaconConfig, CommitRecover, ManualClock, VdfClaim};

#[derive(Parser, Debug)]
#[command(name = "commit_recover", version, author)]
#[command(about = "Commit-reveal-recover randomness beacon tools")]
struct Cli {
    /// JSON config file (defaults are used when absent)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured log level
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Evaluate x^(2^T) mod n and print a Wesolowski claim as JSON
    Prove {
        /// Modulus (hex)
        #[arg(long)]
        modulus: String,
        /// Base (hex)
        #[arg(long)]
        x: String,
        /// Number of sequential squarings
        #[arg(long, short = 't')]
        delay: u64,
        /// Write the claim here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Verify a claim file against a modulus
    Verify {
        #[arg(long)]
        modulus: String,
        #[arg(long)]
        claim: PathBuf,
    },

    /// Run a full round in memory: commit, partial reveal, finalise, pick a winner
    Simulate {
        #[arg(long, default_value_t = 4)]
        participants: u8,
        /// How many participants reveal; the rest are recovered
        #[arg(long, default_value_t = 2)]
        reveals: u8,
        /// Modulus size in bits
        #[arg(long, default_value_t = 2048)]
        bits: u64,
        #[arg(long, short = 't', default_value_t = 1000)]
        delay: u64,
        #[arg(long, default_value_t = 7)]
        seed: u64,
    },

    /// Write the default config to a file
    InitConfig {
        #[arg(long, default_value = "./beacon.json")]
        out: PathBuf,
    },
}

fn load_config(path: Option<&Path>) -> Result<BeaconConfig> {
    match path {
        Some(p) => BeaconConfig::load(p).with_context(|| format!("loading config {}", p.display())),
        None => Ok(BeaconConfig::default()),
    }
}

fn hex_arg(name: &str, s: &str) -> Result<BigUint> {
    parse_hex(s).with_context(|| format!("--{name} is not valid hex"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_deref())?;
    logging::init(&cfg, cli.log_level.as_deref())?;

    match cli.cmd {
        Cmd::Prove { modulus, x, delay, out } => {
            let n = hex_arg("modulus", &modulus)?;
            let x = hex_arg("x", &x)?;
            let claim = vdf::prove(&x, delay, &n).context("proving")?;
            let json = serde_json::to_string_pretty(&claim)?;
            match out {
                Some(path) => {
                    fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
                    println!("claim written to {}", path.display());
                }
                None => println!("{json}"),
            }
        }

        Cmd::Verify { modulus, claim } => {
            let n = hex_arg("modulus", &modulus)?;
            let raw = fs::read_to_string(&claim).with_context(|| format!("reading {}", claim.display()))?;
            let claim: VdfClaim = serde_json::from_str(&raw).context("parsing claim")?;
            match vdf::check_claim(&claim, &n) {
                Ok(()) => println!("valid: y = x^(2^{}) mod n", claim.t),
                Err(e) => bail!("invalid claim: {e}"),
            }
        }

        Cmd::Simulate { participants, reveals, bits, delay, seed } => {
            simulate(&cfg, participants, reveals, bits, delay, seed)?;
        }

        Cmd::InitConfig { out } => {
            BeaconConfig::default()
                .save(&out)
                .with_context(|| format!("writing {}", out.display()))?;
            println!("config written to {}", out.display());
        }
    }

    Ok(())
}

fn sim_address(seed: &[u8], i: u8) -> Address {
    let h = kmac256_hash(b"CR.sim.address", &[seed, &[i]]);
    let mut a = [0u8; 20];
    a.copy_from_slice(&h[..20]);
    a
}

fn simulate(cfg: &BeaconConfig, participants: u8, reveals: u8, bits: u64, delay: u64, seed: u64) -> Result<()> {
    if reveals > participants {
        bail!("--reveals ({reveals}) cannot exceed --participants ({participants})");
    }
    if bits < 64 {
        bail!("--bits must be at least 64");
    }
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    // Odd, full-width; nobody in the simulation needs the factorization.
    let n = rng.gen_biguint(bits) | (BigUint::from(1u8) << (bits - 1)) | BigUint::from(1u8);
    let g = rng.gen_biguint_below(&n);
    let seed_bytes = seed.to_be_bytes();
    let recoverer = sim_address(&seed_bytes, u8::MAX);

    let clock = ManualClock::new(0);
    let mut beacon = CommitRecover::with_clock(clock.clone());
    let setup = vdf::prove(&g, delay, &n).context("setup proof")?;
    let event = beacon
        .start(cfg.commit_duration, cfg.commit_reveal_duration, BigNumber::encode(&n, cfg.block_size)?, recoverer, &[setup])
        .context("start")?;
    info!(round = event.round, digest = %hex::encode(event.digest()), "simulation round opened");

    let n_bn: BigNumber = (&n).into();
    let g_bn = event.g.clone();
    let mut secrets = Vec::new();
    for i in 0..participants {
        let a = BigNumber::from(BigUint::from_bytes_be(&kmac256_xof(b"CR.sim.secret", &[&seed_bytes, &[i]], 32)));
        let c = mod_exp(&g_bn, &a, &n_bn)?;
        let who = sim_address(&seed_bytes, i);
        beacon.commit(c, who).with_context(|| format!("commit #{i}"))?;
        secrets.push((who, a));
    }

    clock.set(event.start_time + cfg.commit_duration);
    for (who, a) in secrets.iter().take(reveals as usize) {
        beacon.reveal(a.clone(), *who).context("reveal")?;
    }

    clock.set(event.start_time + cfg.commit_reveal_duration);
    let output = if reveals == participants {
        beacon.calculate_omega().context("calculate_omega")?
    } else {
        let state = beacon.round_state(event.round)?;
        let proofs = state
            .missing()
            .map(|p| vdf::prove(&p.commitment.decode(), event.t, &n))
            .collect::<Result<Vec<_>, _>>()
            .context("recovery proofs")?;
        beacon.recover(event.round, &proofs, recoverer).context("recover")?
    };

    println!("round:   {}", event.round);
    println!("omega:   {output}");
    match beacon.winner_at_round(event.round)? {
        Some(w) => println!("winner:  0x{}", hex::encode(w)),
        None => println!("winner:  none"),
    }
    Ok(())
}
