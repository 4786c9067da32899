use std::io::{self, BufWriter, Read, Write};

use anyhow::Context;
use clap::{Parser, Subcommand};
use trace_report::Result;
use trace_report::report::{Analysis, ReportOptions, write_report};
use trace_report::value::Inspector;

#[derive(Parser)]
#[command(name = "trace-report")]
#[command(about = "Query trace report generator", long_about = None)]
struct Cli {
    /// Log debug details (selected node, sample attribution) to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a trace as box-drawn tables.
    Report {
        /// Trace JSON file, or `-` for stdin.
        #[arg(long)]
        trace: String,

        /// Output file (stdout when omitted).
        #[arg(short = 'o', long)]
        out: Option<String>,

        /// Emit the extracted analysis as JSON instead of tables.
        #[arg(long)]
        json: bool,

        /// Entries per top-N sample table.
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Wrap width for long text cells.
        #[arg(long, default_value_t = 60)]
        wrap: usize,
    },
}

fn read_trace(path: &str) -> Result<serde_json::Value> {
    let text = if path == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("read trace from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("read trace {path}"))?
    };
    serde_json::from_str(&text).with_context(|| format!("parse trace {path}"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.cmd {
        Commands::Report {
            trace,
            out,
            json,
            top,
            wrap,
        } => {
            let doc = read_trace(&trace)?;
            let opts = ReportOptions {
                top_n: top,
                wrap_width: wrap.max(1),
            };

            let sink: Box<dyn Write> = match &out {
                Some(path) => Box::new(
                    std::fs::File::create(path).with_context(|| format!("create {path}"))?,
                ),
                None => Box::new(io::stdout().lock()),
            };
            let mut sink = BufWriter::new(sink);

            if json {
                let analysis = Analysis::from_trace(Inspector::new(&doc))?;
                serde_json::to_writer_pretty(&mut sink, &analysis).context("write analysis")?;
                writeln!(sink).context("write analysis")?;
                sink.flush().context("flush analysis")?;
            } else {
                write_report(&doc, &opts, sink)?;
            }

            if let Some(path) = out {
                eprintln!("Wrote {path}");
            }
        }
    }

    Ok(())
}
