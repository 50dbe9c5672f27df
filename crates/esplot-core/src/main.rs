use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use esplot_contract::SurfaceApi;
use esplot_core::{HostConfig, HostHandle};
use esplot_model::ChannelId;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("esplot-host")
        .version(esplot_core::VERSION)
        .about("Open, cache and inspect channel files")
        .subcommand_required(true)
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Directory holding state.json and import-cache/"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML config file"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("open")
                .about("Parse and cache channel files")
                .arg(Arg::new("paths").required(true).num_args(1..)),
        )
        .subcommand(
            Command::new("series")
                .about("Print one series of an opened file")
                .arg(Arg::new("path").required(true))
                .arg(Arg::new("channel-id").required(true)),
        )
        .subcommand(
            Command::new("preview")
                .about("Print the cached preview of a file")
                .arg(Arg::new("path").required(true)),
        )
        .subcommand(Command::new("list").about("Print the opened files, most recent first"))
        .subcommand(
            Command::new("close")
                .about("Drop the cached artifacts of a file")
                .arg(Arg::new("path").required(true)),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn absolute(path: &str) -> anyhow::Result<String> {
    let path = std::path::Path::new(path);
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("cannot resolve the working directory")?
            .join(path)
    };
    Ok(path.to_string_lossy().into_owned())
}

fn required<'a>(args: &'a ArgMatches, name: &str) -> anyhow::Result<&'a str> {
    args.get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("missing <{name}>"))
}

async fn run(surface: &SurfaceApi, matches: &ArgMatches) -> anyhow::Result<()> {
    match matches.subcommand() {
        Some(("open", args)) => {
            for path in args.get_many::<String>("paths").into_iter().flatten() {
                let path = absolute(path)?;
                match surface.open_channel_file(path.as_str()).await {
                    Ok(()) => info!(path = %path, "opened"),
                    Err(e) => eprintln!("{e}"),
                }
            }
            print_json(&surface.get_opened_file_paths().await?)
        }
        Some(("series", args)) => {
            let path = absolute(required(args, "path")?)?;
            let channel_id = ChannelId::new(required(args, "channel-id")?)?;
            print_json(&surface.get_channel_file_series(path, channel_id).await?)
        }
        Some(("preview", args)) => {
            let path = absolute(required(args, "path")?)?;
            print_json(&surface.get_channel_file_preview(path).await?)
        }
        Some(("list", _)) => print_json(&surface.get_opened_channel_files().await?),
        Some(("close", args)) => {
            let path = absolute(required(args, "path")?)?;
            surface.close_channel_file(path).await?;
            Ok(())
        }
        _ => Ok(()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("json-logs"));

    let config = HostConfig::resolve(
        matches.get_one::<PathBuf>("data-dir").map(PathBuf::as_path),
        matches.get_one::<PathBuf>("config").map(PathBuf::as_path),
    )?;
    let host = HostHandle::start(&config)
        .await
        .context("cannot start host")?;

    let surface = host.connect_surface();
    let _opened = surface.on_channel_file_opened(|preview| {
        info!(event = "channelFileOpened", path = %preview.path, "event");
    });
    let _failed = surface.on_file_open_failed(|failed| {
        info!(event = "fileOpenFailed", path = %failed.path, reason = ?failed.reason, "event");
    });
    let _last = surface.on_last_opened_file_changed(|last| {
        info!(event = "lastOpenedFileChanged", path = %last.path, "event");
    });

    let result = run(&surface, &matches).await;
    host.shutdown().await;
    result
}
