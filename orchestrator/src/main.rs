use {
    clap::{crate_description, crate_name, crate_version, App, Arg, ArgMatches},
    ledger_e2e_orchestrator::{
        client::DockerChainClient,
        config::{absolute_path, ImageConfig},
        runtime::DockerRuntime,
        Result, Suite, SuiteConfig,
    },
    log::{error, info},
    std::{process::exit, sync::Arc},
};

fn app<'a, 'b>() -> App<'a, 'b> {
    App::new(crate_name!())
        .about(crate_description!())
        .version(crate_version!())
        .arg(
            Arg::with_name("scripts_dir")
                .long("scripts-dir")
                .value_name("DIR")
                .takes_value(true)
                .help("Directory holding hermes_bootstrap.sh and the pool files"),
        )
        .arg(
            Arg::with_name("upgrade_name")
                .long("upgrade-name")
                .value_name("NAME")
                .takes_value(true)
                .help("Name of the software upgrade plan"),
        )
        .arg(
            Arg::with_name("skip_upgrade")
                .long("skip-upgrade")
                .help("Skip the governance upgrade"),
        )
        .arg(
            Arg::with_name("skip_ibc")
                .long("skip-ibc")
                .requires("skip_upgrade")
                .help("Run a single chain without a relayer"),
        )
        .arg(
            Arg::with_name("skip_cleanup")
                .long("skip-cleanup")
                .help("Leave containers, network and scratch directories in place"),
        )
}

/// Environment first, flags on top.
fn load_config(matches: &ArgMatches<'_>) -> Result<SuiteConfig> {
    let mut config = SuiteConfig::from_env()?;
    if let Some(dir) = matches.value_of("scripts_dir") {
        config.scripts_dir = absolute_path(dir)?;
    }
    if let Some(name) = matches.value_of("upgrade_name") {
        config.upgrade_name = name.to_string();
    }
    config.skip_ibc |= matches.is_present("skip_ibc");
    config.skip_cleanup |= matches.is_present("skip_cleanup");
    if matches.is_present("skip_upgrade") && !config.skip_upgrade {
        config.skip_upgrade = true;
        config.images = ImageConfig::new(false);
    }
    Ok(config)
}

async fn run(matches: &ArgMatches<'_>) -> Result<()> {
    let config = load_config(matches)?;
    config.validate()?;
    let runtime = DockerRuntime::connect()?;
    let client = DockerChainClient::new(runtime.client().clone())?;
    info!(
        "running suite: upgrade={} ibc={} cleanup={}",
        config.run_upgrade(),
        config.run_ibc(),
        !config.skip_cleanup
    );
    Suite::new(Arc::new(runtime), Arc::new(client), config)
        .run()
        .await
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let matches = app().get_matches();
    match run(&matches).await {
        Ok(()) => info!("suite passed"),
        Err(e) => {
            error!("suite failed: {}", e);
            exit(1);
        }
    }
}
