use std::{
    io::{self, Write},
    path::PathBuf,
};

use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use serde::Serialize;
use tracing::{info, span, Level};

use objectfs::{
    adapters::s3::S3Client,
    config::AdapterConfig,
    fs::ObjectFS,
    model::fs::{Visibility, WriteConfig},
};

fn cli() -> Command {
    let path = || Arg::new("PATH").required(true).index(1);
    let from_to = |name: &'static str| {
        Command::new(name)
            .arg(Arg::new("FROM").required(true).index(1))
            .arg(Arg::new("TO").required(true).index(2))
    };

    Command::new("objectfs")
        .version(clap::crate_version!())
        .about("Filesystem-style access to an object storage bucket")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .env("OBJECTFS_CONFIG")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("ls")
                .arg(Arg::new("DIR").index(1).default_value(""))
                .arg(
                    Arg::new("recursive")
                        .long("recursive")
                        .short('r')
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("stat").arg(path()))
        .subcommand(Command::new("cat").arg(path()))
        .subcommand(
            Command::new("put")
                .arg(path())
                .arg(
                    Arg::new("FILE")
                        .required(true)
                        .index(2)
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("visibility")
                        .long("visibility")
                        .value_parser(["public", "private"]),
                )
                .arg(Arg::new("mimetype").long("mimetype")),
        )
        .subcommand(Command::new("mkdir").arg(Arg::new("DIR").required(true).index(1)))
        .subcommand(Command::new("rm").arg(path()))
        .subcommand(Command::new("rmdir").arg(Arg::new("DIR").required(true).index(1)))
        .subcommand(from_to("cp"))
        .subcommand(from_to("mv"))
        .subcommand(
            Command::new("visibility")
                .arg(path())
                .arg(Arg::new("VALUE").index(2).value_parser(["public", "private"])),
        )
        .subcommand(Command::new("url").arg(path()))
}

fn arg<'a>(matches: &'a ArgMatches, name: &str) -> anyhow::Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("missing argument {}", name))
}

fn visibility(value: &str) -> anyhow::Result<Visibility> {
    value.parse::<Visibility>().map_err(anyhow::Error::msg)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

fn run(fs: &ObjectFS, matches: &ArgMatches) -> anyhow::Result<()> {
    match matches.subcommand() {
        Some(("ls", sub)) => {
            let entries = fs.list_contents(arg(sub, "DIR")?, sub.get_flag("recursive"))?;
            print_json(&entries)
        }
        Some(("stat", sub)) => print_json(&fs.get_metadata(arg(sub, "PATH")?)?),
        Some(("cat", sub)) => {
            let file = fs.read(arg(sub, "PATH")?)?;
            io::stdout().lock().write_all(&file.contents)?;
            Ok(())
        }
        Some(("put", sub)) => {
            let local = sub
                .get_one::<PathBuf>("FILE")
                .context("missing argument FILE")?;
            let config = WriteConfig {
                visibility: sub
                    .get_one::<String>("visibility")
                    .map(String::as_str)
                    .map(visibility)
                    .transpose()?,
                mimetype: sub.get_one::<String>("mimetype").cloned(),
                ..Default::default()
            };
            print_json(&fs.write_file(arg(sub, "PATH")?, local, &config)?)
        }
        Some(("mkdir", sub)) => print_json(&fs.create_dir(arg(sub, "DIR")?, &WriteConfig::default())?),
        Some(("rm", sub)) => Ok(fs.delete(arg(sub, "PATH")?)?),
        Some(("rmdir", sub)) => Ok(fs.delete_dir(arg(sub, "DIR")?)?),
        Some(("cp", sub)) => Ok(fs.copy(arg(sub, "FROM")?, arg(sub, "TO")?)?),
        Some(("mv", sub)) => Ok(fs.rename(arg(sub, "FROM")?, arg(sub, "TO")?)?),
        Some(("visibility", sub)) => {
            let path = arg(sub, "PATH")?;
            match sub.get_one::<String>("VALUE") {
                Some(value) => Ok(fs.set_visibility(path, visibility(value)?)?),
                None => print_json(&fs.get_visibility(path)?),
            }
        }
        Some(("url", sub)) => {
            println!("{}", fs.get_url(arg(sub, "PATH")?)?);
            Ok(())
        }
        Some((other, _)) => anyhow::bail!("unknown command: {}", other),
        None => anyhow::bail!("no command given"),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().json().with_writer(io::stderr).init();

    let span = span!(Level::INFO, "main", context = "main");
    let _e = span.enter();
    info!("called");

    let matches = cli().get_matches();

    let config_path = matches
        .get_one::<PathBuf>("config")
        .context("missing --config")?;
    let config = AdapterConfig::load(config_path)?;

    let client = S3Client::new(&config.client)?;
    let fs = ObjectFS::new(Box::new(client), config);
    info!(bucket = fs.bucket(), "client ready");

    run(&fs, &matches)
}
