mod config;

use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use config::{CliConfig, DEFAULT_CONFIG_PATH};
use tracing::{error, info};
use twostep_core::{HttpTransport, ProviderConfig, TwoStepOutput, TwoStepPipeline};

#[derive(Debug, Parser)]
#[command(
    name = "twostep",
    about = "Ask a model to reason first, then answer using its own reasoning",
    version
)]
struct Cli {
    /// Prompt to answer; read one line from stdin when omitted
    #[arg(short, long, value_name = "TEXT")]
    prompt: Option<String>,

    /// Path to the TOML configuration file
    #[arg(short, long, env = "TWOSTEP_CONFIG", default_value = DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: PathBuf,

    /// Model identifier, overriding config and environment
    #[arg(long, value_name = "NAME")]
    model: Option<String>,

    /// Skip the pause between the two calls
    #[arg(long)]
    no_pause: bool,

    /// Print the result as a JSON object
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so stdout carries only the result
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "warn,twostep_core=info,twostep=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("{}", error_chain(e.as_ref()));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    // Credentials first: no network activity without them
    let mut provider = ProviderConfig::from_env()?;

    let mut cfg = CliConfig::load(&cli.config);
    cfg.provider.apply(&mut provider);
    if let Some(model) = cli.model {
        cfg.pipeline.model = model;
    }
    if cli.no_pause {
        cfg.pipeline.step_pause = Duration::ZERO;
    }
    cfg.pipeline.validate()?;

    let prompt = match cli.prompt {
        Some(p) => p,
        None => read_prompt(io::stdin().lock(), io::stderr())?,
    };
    if prompt.trim().is_empty() {
        return Err("prompt must not be empty".into());
    }

    info!(target = "twostep", model = %cfg.pipeline.model, base_url = %provider.base_url, "Running two-step pipeline");
    let transport = HttpTransport::new(&provider)?;
    let pipeline = TwoStepPipeline::new(&cfg.pipeline, transport);

    let out = pipeline.run(&prompt).await.map_err(|e| {
        error!(target = "twostep", kind = ?e.kind(), error = %e, "Pipeline failed");
        e
    })?;
    let mut stdout = io::stdout().lock();
    if cli.json {
        writeln!(stdout, "{}", serde_json::to_string_pretty(&out)?)?;
    } else {
        print_blocks(&out, &mut stdout)?;
    }
    Ok(())
}

/// Read one line from `input`, showing the label on `label_out` (stderr in practice).
fn read_prompt(mut input: impl BufRead, mut label_out: impl Write) -> io::Result<String> {
    write!(label_out, "Prompt: ")?;
    label_out.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn print_blocks(out: &TwoStepOutput, mut w: impl Write) -> io::Result<()> {
    writeln!(w, "Chain of Thought:\n{}\n", out.chain_of_thought)?;
    writeln!(w, "Final Answer:\n{}", out.final_answer)?;
    Ok(())
}

/// `error: outer` followed by one `caused by:` line per source.
fn error_chain(e: &dyn Error) -> String {
    let mut msg = format!("error: {e}");
    let mut cur = e.source();
    while let Some(cause) = cur {
        msg.push_str(&format!("\n  caused by: {cause}"));
        cur = cause.source();
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use twostep_core::{ProviderError, ProviderFailure, Step, TwoStepError};

    #[test]
    fn prompt_label_goes_to_label_stream_only() {
        let mut label = Vec::new();
        let prompt = read_prompt(&b"What is 2+2?\r\nignored\n"[..], &mut label).unwrap();
        assert_eq!(prompt, "What is 2+2?");
        assert_eq!(String::from_utf8(label).unwrap(), "Prompt: ");
    }

    #[test]
    fn empty_input_reads_as_empty_prompt() {
        let prompt = read_prompt(&b""[..], io::sink()).unwrap();
        assert!(prompt.is_empty());
    }

    #[test]
    fn blocks_are_labelled_in_order() {
        let out = TwoStepOutput {
            chain_of_thought: "sum of two small integers".into(),
            final_answer: "4.".into(),
        };
        let mut buf = Vec::new();
        print_blocks(&out, &mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "Chain of Thought:\nsum of two small integers\n\nFinal Answer:\n4.\n"
        );
    }

    #[test]
    fn error_chain_lists_step_and_cause() {
        let inner: TwoStepError =
            ProviderError::new(ProviderFailure::RateLimited, "slow down").into();
        let err = TwoStepError::Step {
            step: Step::Reasoning,
            source: Box::new(inner),
        };
        let text = error_chain(&err);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("error: reasoning step failed"));
        assert_eq!(
            lines[1],
            "  caused by: Provider error (rate limited): slow down"
        );
        assert!(!text.contains("ProviderError {"));
    }
}
