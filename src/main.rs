//! pietts command-line front end
//!
//! Speaks Proto-Indo-European text, a random vocabulary word or one of
//! the bundled sample texts, writing the audio to a WAV file.

use anyhow::{bail, Context};
use log::{debug, error, info, warn};
use pietts::lexicon::VocabList;
use pietts::phonology::PhonologySelection;
use pietts::samples::SampleId;
use pietts::state::config::Config;
use pietts::{Action, Outcome, Session, Spectrogram};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process;

const USAGE: &str = "\
Usage: pietts [OPTIONS] [TEXT...]

Options:
  -d, --debug              Write debug log to pietts.log
      --variant ID         Phonology variant (standard, glottalic, centum, ...)
      --save               Remember --variant as the default in ~/.pietts.cfg
      --list-variants      Show available variants and exit
      --sample NAME        Speak a sample text: sheep | king
      --word [LIST]        Speak a random word, optionally from LIST
      --out FILE.wav       Output file (default: pietts.wav)
      --spectrogram FILE   Also write a spectrogram as CSV
  -h, --help               Show this help";

/// Parsed command line
#[derive(Debug, Default)]
struct Cli {
    debug: bool,
    help: bool,
    list_variants: bool,
    save: bool,
    variant: Option<String>,
    sample: Option<SampleId>,
    word: Option<VocabList>,
    out: Option<PathBuf>,
    spectrogram: Option<PathBuf>,
    text: Vec<String>,
}

impl Cli {
    fn parse(args: impl IntoIterator<Item = String>) -> anyhow::Result<Self> {
        let mut cli = Cli::default();
        let mut args = args.into_iter().peekable();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-d" | "--debug" => cli.debug = true,
                "-h" | "--help" => cli.help = true,
                "--list-variants" => cli.list_variants = true,
                "--save" => cli.save = true,
                "--variant" => cli.variant = Some(value(&mut args, &arg)?),
                "--sample" => cli.sample = Some(value(&mut args, &arg)?.parse()?),
                "--word" => {
                    // list name is optional
                    let has_list = args.peek().is_some_and(|next| !next.starts_with('-'));
                    let list = if has_list {
                        value(&mut args, &arg)?.parse()?
                    } else {
                        VocabList::Any
                    };
                    cli.word = Some(list);
                }
                "--out" => cli.out = Some(PathBuf::from(value(&mut args, &arg)?)),
                "--spectrogram" => cli.spectrogram = Some(PathBuf::from(value(&mut args, &arg)?)),
                other if other.starts_with("--") => bail!("Unknown option '{}'\n\n{}", other, USAGE),
                _ => cli.text.push(arg),
            }
        }
        Ok(cli)
    }

    fn action(&self) -> anyhow::Result<Action> {
        let chosen = [self.sample.is_some(), self.word.is_some(), !self.text.is_empty()]
            .iter()
            .filter(|&&b| b)
            .count();
        if chosen > 1 {
            bail!("Give only one of --sample, --word or TEXT");
        }

        if let Some(id) = self.sample {
            Ok(Action::Sample(id))
        } else if let Some(list) = &self.word {
            Ok(Action::NewWord(list.clone()))
        } else if !self.text.is_empty() {
            Ok(Action::FreeText(self.text.join(" ")))
        } else {
            bail!("Nothing to speak\n\n{}", USAGE)
        }
    }
}

fn value(args: &mut impl Iterator<Item = String>, flag: &str) -> anyhow::Result<String> {
    args.next()
        .with_context(|| format!("{} needs a value", flag))
}

fn main() {
    let cli = match Cli::parse(std::env::args().skip(1)) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(2);
        }
    };

    // Initialize logger
    if cli.debug {
        // Debug mode: write to pietts.log file
        use std::fs::OpenOptions;
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open("pietts.log")
        {
            Ok(log_file) => {
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Debug)
                    .target(env_logger::Target::Pipe(Box::new(log_file)))
                    .init();
            }
            Err(e) => {
                eprintln!("Warning: Failed to open pietts.log for debug logging: {}", e);
                eprintln!("Continuing without file logging...");
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Warn)
                    .init();
            }
        }

        info!(
            "pietts version {} starting (debug mode, logging to pietts.log)",
            pietts::VERSION
        );
    } else {
        // Normal mode: minimal logging to stderr, only errors
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Error)
            .init();
    }

    if cli.help {
        println!("{} {}\n\n{}", pietts::APP_NAME, pietts::VERSION, USAGE);
        return;
    }

    if let Err(e) = run(&cli) {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;
    debug!("Config loaded from {:?}", config.path());

    let session = Session::from_config(&config)?;

    if cli.list_variants {
        for (id, name) in session.registry().variants() {
            println!("{:<12} {}", id, name);
        }
        return Ok(());
    }

    if let Some(variant) = &cli.variant {
        session
            .select_phonology(PhonologySelection::new(variant))
            .with_context(|| format!("Cannot select variant '{}'", variant))?;
        if cli.save {
            config.set_phonology_selection(&session.selection());
            config.save().context("Failed to save configuration")?;
            info!("Saved variant '{}' to {:?}", variant, config.path());
        }
    } else if cli.save {
        bail!("--save needs --variant");
    }

    let action = cli.action()?;
    let presentation = match session.perform(action)? {
        Outcome::Presented(p) => p,
        Outcome::Superseded => bail!("Request was superseded"),
    };

    for unknown in &presentation.transcription.diagnostics {
        warn!("{}", unknown);
        eprintln!("Warning: {}", unknown);
    }

    println!("{}", presentation.text);
    if let Some(definition) = &presentation.definition {
        println!("  \"{}\"", definition);
    }
    println!(
        "[{}] /{}/",
        presentation.fingerprint,
        presentation.transcription.to_phonetic_string()
    );

    let rendering = &presentation.rendering;
    let out = cli.out.clone().unwrap_or_else(|| PathBuf::from("pietts.wav"));
    rendering
        .audio
        .write_wav(&out)
        .with_context(|| format!("Failed to write {}", out.display()))?;
    println!(
        "Wrote {} ({:.2}s, {} segments)",
        out.display(),
        rendering.audio.duration().as_secs_f64(),
        rendering.segment_count
    );

    if let Some(path) = &cli.spectrogram {
        let computed;
        let spectrogram = match &rendering.spectrogram {
            Some(s) => s,
            None => {
                computed = Spectrogram::compute(&rendering.audio, &session.settings().spectrogram)?;
                &computed
            }
        };
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        spectrogram.write_csv(BufWriter::new(file))?;
        println!(
            "Wrote {} ({} bins x {} frames)",
            path.display(),
            spectrogram.bins(),
            spectrogram.frames()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<Cli> {
        Cli::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_free_text() {
        let cli = parse(&["--variant", "centum", "óynos,", "dwóh₁"]).unwrap();
        assert_eq!(cli.variant.as_deref(), Some("centum"));
        assert_eq!(cli.action().unwrap(), Action::FreeText("óynos, dwóh₁".to_string()));
    }

    #[test]
    fn test_parse_word_with_and_without_list() {
        let cli = parse(&["--word", "animals"]).unwrap();
        assert_eq!(cli.action().unwrap(), Action::NewWord(VocabList::named("animals")));

        let cli = parse(&["--word", "--out", "x.wav"]).unwrap();
        assert_eq!(cli.action().unwrap(), Action::NewWord(VocabList::Any));
        assert_eq!(cli.out, Some(PathBuf::from("x.wav")));
    }

    #[test]
    fn test_parse_save_flag() {
        let cli = parse(&["--variant", "glottalic", "--save", "dwóh₁"]).unwrap();
        assert!(cli.save);
        assert_eq!(cli.variant.as_deref(), Some("glottalic"));
        assert!(!parse(&["dwóh₁"]).unwrap().save);
    }

    #[test]
    fn test_parse_sample() {
        let cli = parse(&["--sample", "king"]).unwrap();
        assert_eq!(cli.action().unwrap(), Action::Sample(SampleId::KingAndGod));
        assert!(parse(&["--sample", "queen"]).is_err());
    }

    #[test]
    fn test_conflicting_inputs() {
        let cli = parse(&["--sample", "sheep", "text"]).unwrap();
        assert!(cli.action().is_err());
        assert!(parse(&[]).unwrap().action().is_err());
        assert!(parse(&["--bogus"]).is_err());
        assert!(parse(&["--out"]).is_err());
    }
}
