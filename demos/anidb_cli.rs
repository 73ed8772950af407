/*!
Example AniDB UDP API client: AUTH, then PING/UPTIME, optionally a
FILE lookup by size+ed2k, then LOGOUT.
 */
use anyhow::Result;
use clap::Parser;
use log::warn;

use anidb::AniDbConfig;
use anidb::cancel::CancelToken;
use anidb::client::Client;

#[derive(clap::Parser, Debug)]
#[command(version, about)]
struct Opt {
    /// AniDB username.
    #[arg(long)]
    user: String,

    /// AniDB password.
    #[arg(long)]
    password: String,

    /// `host:port` of the AniDB UDP API server.
    #[arg(long, default_value = "api.anidb.net:9000")]
    address: String,

    /// Look up a file by size and ed2k hash after authenticating.
    #[arg(long, requires = "ed2k")]
    size: Option<u64>,

    /// ed2k hash to look up, paired with `--size`.
    #[arg(long, requires = "size")]
    ed2k: Option<String>,

    /// Verbosity of debug messages.
    #[arg(short, default_value = "0")]
    verbose: usize,
}

fn main() -> Result<()> {
    let opt = Opt::parse();
    stderrlog::new()
        .module(module_path!())
        .module("anidb")
        .quiet(false)
        .verbosity(opt.verbose)
        .timestamp(stderrlog::Timestamp::Second)
        .init()?;

    let cancel = CancelToken::new();
    let ctrlc_cancel = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("Got Ctrl-C");
        ctrlc_cancel.cancel();
    })?;

    let config = AniDbConfig {
        user: opt.user,
        password: opt.password,
        address: opt.address,
        ..Default::default()
    };

    let (client, auth) = Client::connect_authenticated(config, &cancel)?;
    println!("logged in, external port {}", auth.external_port);
    if auth.new_version_available {
        warn!("server reports a newer client version is available");
    }

    let port = client.ping(&cancel, true)?;
    println!("PING: external port {port}");

    let uptime = client.uptime(&cancel)?;
    println!("UPTIME: {uptime} ms");

    if let (Some(size), Some(ed2k)) = (opt.size, opt.ed2k) {
        match client.file_by_hash(&cancel, size, &ed2k) {
            Ok(file) => println!("{file:#?}"),
            Err(e) => warn!("FILE lookup failed: {e}"),
        }
    }

    client.teardown(&cancel);
    Ok(())
}
