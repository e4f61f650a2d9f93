use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use pack_brute::caesar::SHIFTS;
use pack_brute::{
    clean_wordlist, decode_all, detect, extract_dir, progress_bar, Coordinator, CrackConfig,
    CrackOutcome, DecodedVariant, SearchSpace, Wordlist, ZipUnlocker, DEFAULT_CHARSET,
    DEFAULT_LENGTH,
};

const DEFAULT_ARCHIVE: &str = "emergency_storage_key.zip";
const DEFAULT_PASSWORD_FILE: &str = "password.txt";
const DEFAULT_CIPHERTEXT: &str = "emergency_storage_key/password.txt";
const DEFAULT_DICTIONARY: &str = "dictionary.txt";
const DEFAULT_RESULT: &str = "result.txt";

/// A fast, parallel brute-force password recovery tool for ZIP archives
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the encrypted ZIP archive
    #[arg(short, long, default_value = DEFAULT_ARCHIVE)]
    archive: PathBuf,

    /// Where to write the recovered password
    #[arg(short, long, default_value = DEFAULT_PASSWORD_FILE)]
    output: PathBuf,

    /// Characters a password may contain, in enumeration order
    #[arg(short, long, default_value = DEFAULT_CHARSET)]
    charset: String,

    /// Exact password length
    #[arg(short = 'n', long, default_value_t = DEFAULT_LENGTH)]
    length: usize,

    /// Number of parallel workers (default: number of CPU cores)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Skip the first N candidates (for resuming or splitting work)
    #[arg(long)]
    offset: Option<u64>,

    /// Maximum number of candidates to try
    #[arg(short, long)]
    limit: Option<u64>,

    /// Unpack the archive after the password is found (extracts to folder named after archive)
    #[arg(long, default_value_t = false)]
    unpack: bool,

    /// Quiet mode - only output the result
    #[arg(short, long, default_value_t = false, global = true)]
    quiet: bool,

    /// Verbose mode - debug logging on stderr
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decode a Caesar-shifted file, picking the shift with a wordlist
    Decode {
        /// File holding the shifted text
        #[arg(short, long, default_value = DEFAULT_CIPHERTEXT)]
        input: PathBuf,

        /// Wordlist used to recognise the plaintext (one word per line)
        #[arg(short, long, default_value = DEFAULT_DICTIONARY)]
        dictionary: PathBuf,

        /// Where to write the decoded text
        #[arg(short, long, default_value = DEFAULT_RESULT)]
        output: PathBuf,

        /// Use this shift instead of detecting one
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..26))]
        shift: Option<u8>,
    },

    /// Normalize a wordlist: lower-case, trim, drop blanks and duplicates
    Clean {
        /// Path to the input wordlist file
        #[arg(short, long)]
        input: PathBuf,

        /// Path to the output wordlist file
        #[arg(short, long)]
        output: PathBuf,
    },
}

/// Options for the brute-force mode
#[derive(Debug, Clone)]
struct CrackOptions {
    archive: PathBuf,
    output: PathBuf,
    charset: String,
    length: usize,
    threads: usize,
    offset: u64,
    limit: Option<u64>,
    unpack: bool,
    quiet: bool,
}

/// Options for the decode mode
#[derive(Debug, Clone)]
struct DecodeOptions {
    input: PathBuf,
    dictionary: PathBuf,
    output: PathBuf,
    shift: Option<u8>,
    quiet: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "warn,pack_brute=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Write the password on its own, with no trailing newline
fn save_password(path: &Path, password: &str) -> Result<()> {
    fs::write(path, password)
        .context(format!("Failed to write password file: {}", path.display()))
}

// ============================================================================
// Brute-force mode
// ============================================================================

/// Run the brute-force search. Returns whether the password was found.
fn crack_archive(opts: &CrackOptions) -> Result<bool> {
    if opts.threads == 0 {
        bail!("Thread count must be at least 1");
    }

    let space = SearchSpace::new(&opts.charset, opts.length).context("Invalid search space")?;
    let window = space
        .window(opts.offset, opts.limit)
        .context("Invalid --offset")?;

    if !opts.archive.is_file() {
        bail!("Archive not found: {}", opts.archive.display());
    }

    if !opts.quiet {
        println!(
            "{} Archive Password Recovery Tool v{}",
            style("⚡").cyan(),
            env!("CARGO_PKG_VERSION")
        );
        println!("{}", style("─".repeat(50)).dim());
        println!("  Archive:   {}", style(opts.archive.display()).green());
        println!("  Charset:   {}", style(&opts.charset).green());
        println!("  Length:    {}", style(opts.length).yellow());
        println!(
            "  Space:     {} candidates",
            style(space.total()).yellow()
        );
        if window.start != 0 || window.end != space.total() {
            println!(
                "  Window:    {}..{} ({} candidates)",
                style(window.start).yellow(),
                style(window.end).yellow(),
                style(window.end - window.start).yellow()
            );
        }
        println!("  Threads:   {}", style(opts.threads).yellow());
        if opts.unpack {
            println!("  Unpack:    {}", style("enabled").green());
        }
        println!("{}", style("─".repeat(50)).dim());
    }

    let unlocker = ZipUnlocker::new(&opts.archive);
    let config = CrackConfig {
        workers: opts.threads,
        ..CrackConfig::default()
    };
    let coordinator = Coordinator::new(unlocker.clone(), space, config);
    let bar = progress_bar(window.end - window.start, opts.quiet);

    let report = coordinator
        .run(window, bar)
        .context(format!("Password recovery aborted for {}", opts.archive.display()))?;

    let found = matches!(report.outcome, CrackOutcome::Found(_));

    match &report.outcome {
        CrackOutcome::Found(password) => {
            save_password(&opts.output, password)?;

            if opts.quiet {
                println!("{}", password);
            } else {
                println!(
                    "  {} Password found: {}",
                    style("✓").green().bold(),
                    style(password).green().bold()
                );
                println!(
                    "  {} Saved to: {}",
                    style("💾").cyan(),
                    style(opts.output.display()).green()
                );
            }

            if opts.unpack {
                let output_dir = extract_dir(&opts.archive);
                unlocker
                    .extract(password, &output_dir)
                    .context("Extraction failed")?;
                if !opts.quiet {
                    println!(
                        "  {} Extracted to: {}",
                        style("📦").cyan(),
                        style(output_dir.display()).green()
                    );
                }
            }
        }
        CrackOutcome::Exhausted => {
            if !opts.quiet {
                println!(
                    "  {} Password not found in search space",
                    style("✗").red()
                );
            }
        }
    }

    if !opts.quiet {
        println!("{}", style("─".repeat(50)).dim());
        println!("  Attempts:  {}", style(report.attempts).yellow());
        println!(
            "  Elapsed:   {}",
            style(format!("{:.2}s", report.elapsed.as_secs_f64())).yellow()
        );
    }

    Ok(found)
}

// ============================================================================
// Decode mode
// ============================================================================

/// Ask for a shift until a number in 0..=25 is entered
fn prompt_shift<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> Result<u8> {
    loop {
        write!(out, "Which shift decodes the text? (0-25): ")?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line).context("Failed to read shift")? == 0 {
            bail!("No shift entered");
        }

        match line.trim().parse::<u8>() {
            Ok(shift) if shift < SHIFTS => return Ok(shift),
            Ok(_) => writeln!(out, "Please enter a number between 0 and 25.")?,
            Err(_) => writeln!(out, "Please enter a valid number.")?,
        }
    }
}

/// Decode the input, choose a variant and write it out.
/// `answers` feeds the manual prompt when detection fails.
fn decode_file<R: BufRead>(opts: &DecodeOptions, answers: &mut R) -> Result<DecodedVariant> {
    let ciphertext = fs::read_to_string(&opts.input)
        .context(format!("Failed to read ciphertext: {}", opts.input.display()))?;

    let variants = decode_all(&ciphertext);

    if !opts.quiet {
        for variant in &variants {
            println!("[{:2}] {}", variant.shift, variant.text);
        }
        println!("{}", style("─".repeat(50)).dim());
    }

    let chosen = match opts.shift {
        Some(shift) => variants
            .get(usize::from(shift))
            .cloned()
            .context(format!("Shift {} is out of range 0-25", shift))?,
        None => {
            let wordlist = Wordlist::load(&opts.dictionary)?;
            if !opts.quiet {
                println!(
                    "{} Loaded {} dictionary words",
                    style("📖").cyan(),
                    style(wordlist.len()).yellow()
                );
            }

            match detect(&variants, &wordlist) {
                Some(variant) => {
                    if !opts.quiet {
                        println!(
                            "  {} Auto-detected shift {}",
                            style("✓").green().bold(),
                            style(variant.shift).green().bold()
                        );
                    }
                    variant.clone()
                }
                None => {
                    if !opts.quiet {
                        println!(
                            "  {} No dictionary match, choose a shift manually",
                            style("ℹ").blue()
                        );
                    }
                    let shift = prompt_shift(answers, &mut io::stdout())?;
                    variants[usize::from(shift)].clone()
                }
            }
        }
    };

    fs::write(&opts.output, &chosen.text)
        .context(format!("Failed to write result: {}", opts.output.display()))?;

    if opts.quiet {
        println!("{}", chosen.text);
    } else {
        println!(
            "  {} Decoded text (shift {}) written to: {}",
            style("✓").green().bold(),
            style(chosen.shift).yellow(),
            style(opts.output.display()).green()
        );
    }

    Ok(chosen)
}

fn clean_command(input: &Path, output: &Path, quiet: bool) -> Result<()> {
    let stats = clean_wordlist(input, output)?;

    if quiet {
        println!(
            "{} -> {} ({} unique, {} duplicates removed)",
            input.display(),
            output.display(),
            stats.unique_words,
            stats.duplicates_removed
        );
        return Ok(());
    }

    println!("{} Wordlist Cleanup", style("🧹").cyan());
    println!("{}", style("─".repeat(50)).dim());
    println!("  Total lines read:     {}", style(stats.total_lines).yellow());
    println!("  Empty lines skipped:  {}", style(stats.empty_lines).dim());
    println!("  Duplicates removed:   {}", style(stats.duplicates_removed).red());
    println!("  Unique words:         {}", style(stats.unique_words).green().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "{} Cleaned wordlist written to: {}",
        style("✓").green().bold(),
        style(output.display()).green()
    );
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Some(Commands::Decode {
            input,
            dictionary,
            output,
            shift,
        }) => {
            let opts = DecodeOptions {
                input,
                dictionary,
                output,
                shift,
                quiet: args.quiet,
            };
            let stdin = io::stdin();
            decode_file(&opts, &mut stdin.lock())?;
            Ok(())
        }
        Some(Commands::Clean { input, output }) => clean_command(&input, &output, args.quiet),
        None => {
            let opts = CrackOptions {
                archive: args.archive,
                output: args.output,
                charset: args.charset,
                length: args.length,
                threads: args.threads.unwrap_or_else(num_cpus::get),
                offset: args.offset.unwrap_or(0),
                limit: args.limit,
                unpack: args.unpack,
                quiet: args.quiet,
            };

            // Exhaustion is a normal outcome but still a non-zero exit
            if !crack_archive(&opts)? {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
