use crate::config::types::ExecutorConfig;
use crate::config::validator::deadline_from_secs_f64;
use crate::exec::builtin::builtin_registry;
use crate::exec::executor::BoundedExecutor;
use crate::exec::supervisor::BoundedOutcome;
use crate::exec::work::WorkItem;
use crate::input::prompt::{TypeTag, TypedPrompt};
use crate::style::registry::{styled, styled_tokens, unstyled, StyleToken};
use crate::style::Color;
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use std::io::Read;
use std::path::PathBuf;

/// Exit code of `run` when the deadline fired
pub const EXIT_TIMED_OUT: i32 = 124;
/// Exit code of `run` when the worker ended without a value
pub const EXIT_WORKER_FAULT: i32 = 125;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Executor config file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a styled sample string
    Demo,
    /// Style text with named styles
    Style {
        text: String,
        /// Style names such as bold, red, bright_blue, bg_white, italic_unset
        #[arg(long = "with", value_name = "NAME")]
        styles: Vec<String>,
        /// 24-bit foreground color
        #[arg(long, value_name = "R,G,B")]
        rgb: Option<String>,
        /// 24-bit background color
        #[arg(long, value_name = "R,G,B")]
        rgb_bg: Option<String>,
    },
    /// Remove style sequences from text (stdin when no text is given)
    Strip { text: Option<String> },
    /// Prompt for one typed value
    Ask {
        /// bool, int, uint, float, text or char
        #[arg(long = "type", default_value = "text")]
        tag: String,
        #[arg(long, default_value = "> ")]
        prompt: String,
        /// Ask again until the answer parses
        #[arg(long)]
        retry: bool,
    },
    /// Run a built-in work under a deadline
    Run {
        work: String,
        /// Positional arguments; JSON where it parses, text otherwise
        args: Vec<String>,
        /// Named argument (format: key=value)
        #[arg(long = "kw", value_name = "KEY=VALUE")]
        kwargs: Vec<String>,
        /// Deadline in seconds
        #[arg(long)]
        deadline: Option<f64>,
        /// Print the full run record as JSON
        #[arg(long)]
        json: bool,
    },
    /// List built-in works
    Works,
}

impl Commands {
    fn command_name(&self) -> &'static str {
        match self {
            Self::Demo => "demo",
            Self::Style { .. } => "style",
            Self::Strip { .. } => "strip",
            Self::Ask { .. } => "ask",
            Self::Run { .. } => "run",
            Self::Works => "works",
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<ExecutorConfig> {
    match path {
        Some(path) => Ok(ExecutorConfig::load(path)?),
        None => Ok(ExecutorConfig::default()),
    }
}

fn parse_rgb(raw: &str) -> Result<(u8, u8, u8)> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(anyhow!("expected R,G,B, got '{}'", raw));
    }
    let component = |s: &str| {
        s.parse::<u8>()
            .with_context(|| format!("color component '{}' is not 0-255", s))
    };
    Ok((component(parts[0])?, component(parts[1])?, component(parts[2])?))
}

/// JSON where it parses, a plain string otherwise
fn parse_work_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn parse_kwargs(raw: &[String]) -> Result<Map<String, Value>> {
    let mut kwargs = Map::new();
    for pair in raw {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("named argument '{}' must be key=value", pair))?;
        if kwargs.insert(key.to_string(), parse_work_value(value)).is_some() {
            return Err(anyhow!("named argument '{}' given twice", key));
        }
    }
    Ok(kwargs)
}

fn run_work(
    config: ExecutorConfig,
    work: String,
    args: Vec<String>,
    kwargs: Vec<String>,
    deadline: Option<f64>,
    json: bool,
) -> Result<()> {
    let deadline = match (deadline, config.default_deadline()) {
        (Some(secs), _) => deadline_from_secs_f64(secs)?,
        (None, Some(default)) => default,
        (None, None) => return Err(anyhow!("--deadline is required (no default_deadline_ms in config)")),
    };

    let item = WorkItem::with_args(
        work,
        args.iter().map(|a| parse_work_value(a)).collect(),
        parse_kwargs(&kwargs)?,
    );

    let executor = BoundedExecutor::new(builtin_registry(), config)?;
    let run = executor.run(&item, deadline)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    }

    match &run.outcome {
        BoundedOutcome::Completed { value } => {
            if !json {
                println!("{}", value);
            }
            Ok(())
        }
        BoundedOutcome::TimedOut => {
            if !json {
                eprintln!("'{}' did not finish within {:?}", item.name, deadline);
            }
            std::process::exit(EXIT_TIMED_OUT);
        }
        BoundedOutcome::WorkerFault { reason } => {
            if !json {
                eprintln!("'{}' failed: {}", item.name, reason);
            }
            std::process::exit(EXIT_WORKER_FAULT);
        }
    }
}

pub fn run() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Demo);
    log::debug!("Running command '{}'", command.command_name());

    match command {
        Commands::Demo => {
            println!("{}", styled_tokens("test", &[StyleToken::Foreground(Color::Red)]));
            Ok(())
        }
        Commands::Style {
            text,
            styles,
            rgb,
            rgb_bg,
        } => {
            let mut tokens = Vec::with_capacity(styles.len() + 2);
            for name in &styles {
                let token = StyleToken::from_name(name)
                    .ok_or_else(|| anyhow!("unknown style '{}'", name))?;
                tokens.push(token.to_string());
            }
            if let Some(raw) = rgb {
                let (r, g, b) = parse_rgb(&raw)?;
                tokens.push(StyleToken::rgb(r, g, b).to_string());
            }
            if let Some(raw) = rgb_bg {
                let (r, g, b) = parse_rgb(&raw)?;
                tokens.push(StyleToken::rgb_background(r, g, b).to_string());
            }
            let refs: Vec<&str> = tokens.iter().map(String::as_str).collect();
            println!("{}", styled(&text, &refs)?);
            Ok(())
        }
        Commands::Strip { text } => {
            let text = match text {
                Some(text) => text,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            print!("{}", unstyled(&text));
            Ok(())
        }
        Commands::Ask {
            tag,
            prompt,
            retry,
        } => {
            let tag: TypeTag = tag.parse()?;
            let mut input = TypedPrompt::stdio();
            loop {
                match input.read(&prompt, tag)? {
                    Some(value) => {
                        println!("{}", serde_json::to_string(&value)?);
                        return Ok(());
                    }
                    None if retry => eprintln!("not a valid {}", tag.name()),
                    None => {
                        eprintln!("not a valid {}", tag.name());
                        std::process::exit(1);
                    }
                }
            }
        }
        Commands::Run {
            work,
            args,
            kwargs,
            deadline,
            json,
        } => run_work(load_config(cli.config.as_ref())?, work, args, kwargs, deadline, json),
        Commands::Works => {
            for name in builtin_registry().names() {
                println!("{}", name);
            }
            Ok(())
        }
    }
}
