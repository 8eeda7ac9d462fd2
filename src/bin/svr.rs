#![deny(unsafe_code)]

//! Command-line client for the Seawolf Video Router.

use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};
use svr_client::{Comm, Source, close_server_source, open_server_source, sources_list};
use svr_core::{Frame, FrameProperties};
use svr_logging::Verbosity;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "svr", about = "Seawolf Video Router client", version)]
struct Args {
    /// Broker address to connect to.
    #[arg(long, default_value = "127.0.0.1:18333")]
    broker: String,

    /// Increase logging verbosity (repeatable).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the sources known to the broker.
    List,

    /// Publish a synthetic test pattern as a client source.
    Publish {
        /// Source name to publish under.
        name: String,

        /// Encoding descriptor, e.g. `jpeg;quality=90` (defaults are
        /// negotiated automatically).
        #[arg(long)]
        encoding: Option<String>,

        /// Number of frames to publish before closing.
        #[arg(long, default_value_t = 100)]
        frames: u32,

        /// Frame rate.
        #[arg(long, default_value_t = 10)]
        fps: u32,

        /// Frame width in pixels.
        #[arg(long, default_value_t = 320)]
        width: u32,

        /// Frame height in pixels.
        #[arg(long, default_value_t = 240)]
        height: u32,
    },

    /// Open a broker-side server source from a descriptor.
    OpenServerSource {
        /// Source name.
        name: String,
        /// Ingestion descriptor, e.g. `test;width=640;height=480;fps=10`.
        descriptor: String,
    },

    /// Close a broker-side server source.
    CloseServerSource {
        /// Source name.
        name: String,
    },
}

fn gradient_frame(properties: FrameProperties, tick: u32) -> Frame {
    let width = properties.width() as usize;
    let channels = properties.channels() as usize;
    let shift = (tick as usize) * 4;

    let mut data = Vec::with_capacity(properties.frame_size());
    for y in 0..properties.height() as usize {
        for x in 0..width {
            for channel in 0..channels {
                data.push(((x + y + shift + channel * 85) & 0xFF) as u8);
            }
        }
    }
    Frame::new(properties, data).unwrap_or_else(|_| Frame::filled(properties, 0))
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let comm = Arc::new(Comm::connect(args.broker.as_str())?);

    match args.command {
        Command::List => {
            for entry in sources_list(&comm)? {
                println!("{entry}");
            }
        }
        Command::Publish {
            name,
            encoding,
            frames,
            fps,
            width,
            height,
        } => {
            let source = Source::open(&comm, &name)?;
            if let Some(descriptor) = encoding {
                source.set_encoding(&descriptor)?;
            }
            info!(
                source = %name,
                encoding = ?source.encoding(),
                frames,
                fps,
                "publishing"
            );

            let properties = FrameProperties::new(width, height, 8, 3)?;
            let period = Duration::from_secs(1).div_f64(f64::from(fps.max(1)));
            for tick in 0..frames {
                source.send_frame(&gradient_frame(properties, tick))?;
                thread::sleep(period);
            }
            source.close()?;
        }
        Command::OpenServerSource { name, descriptor } => {
            open_server_source(&comm, &name, &descriptor)?;
            println!("opened s:{name}");
        }
        Command::CloseServerSource { name } => {
            close_server_source(&comm, &name)?;
            println!("closed s:{name}");
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    svr_logging::init(Verbosity::from_occurrences(args.verbose));

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("svr: {err}");
            ExitCode::FAILURE
        }
    }
}
