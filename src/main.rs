use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use refcheck::input::LineSource;
use refcheck::validator::DEFAULT_MAX_PATHS;
use refcheck::{ReferenceRule, Service, Tree, ValidatorConfig};

/// Check one pattern per line and report whether each is correct.
#[derive(Debug, Parser)]
#[command(name = "refcheck", version)]
struct Args {
    /// Pattern file, or `-` to read stdin
    #[arg(default_value = "regex.txt")]
    input: PathBuf,

    /// Give up on a pattern after this many forked paths
    #[arg(long, default_value_t = DEFAULT_MAX_PATHS)]
    max_paths: usize,

    /// Worker threads for path exploration (defaults to available cores)
    #[arg(long)]
    workers: Option<usize>,

    /// Only allow string back-references to groups outside any `|` or `*`
    #[arg(long)]
    structural: bool,

    /// Print the rejection reason, or the canonical pattern and its groups
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn config(&self) -> ValidatorConfig {
        let defaults = ValidatorConfig::default();
        ValidatorConfig {
            max_paths: self.max_paths,
            max_workers: self.workers.unwrap_or(defaults.max_workers),
            rule: if self.structural {
                ReferenceRule::Structural
            } else {
                ReferenceRule::PathSensitive
            },
        }
    }

    fn open(&self) -> Result<LineSource> {
        if self.input.as_os_str() == "-" {
            return LineSource::from_reader(io::stdin().lock()).context("reading stdin");
        }
        let file = File::open(&self.input)
            .with_context(|| format!("opening {}", self.input.display()))?;
        LineSource::from_reader(file).with_context(|| format!("reading {}", self.input.display()))
    }
}

fn describe(out: &mut impl Write, tree: &Tree) -> io::Result<()> {
    writeln!(out, "  canonical: {}", tree)?;
    for (number, id) in tree.groups() {
        writeln!(out, "  group {} at index {}", number, tree.node(*id).position)?;
    }
    Ok(())
}

// Usage: refcheck [FILE]
fn main() -> Result<()> {
    let args = Args::parse();
    let service = Service::with_config(args.config());
    let lines = args.open()?;

    let mut out = BufWriter::new(io::stdout().lock());
    for line in lines {
        match service.validate(&line) {
            Ok(tree) => {
                writeln!(out, "Correct regex: {}", line)?;
                if args.verbose {
                    describe(&mut out, &tree)?;
                }
            }
            Err(err) => {
                writeln!(out, "Incorrect regex: {}", line)?;
                if args.verbose {
                    writeln!(out, "  {}", err)?;
                }
            }
        }
    }
    out.flush()?;
    Ok(())
}
