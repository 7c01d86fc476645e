//! `aidflow` command line

mod commands;

use aidflow_core::{
    AidflowConfig, AllocationWorkflow, BeneficiaryId, DisburserId, RegionId, RegionalGoodsId,
    SubmitAllocation,
};
use aidflow_rest::RestStore;
use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("aidflow")
        .version(aidflow_core::VERSION)
        .about("Fraud-checked aid allocation against the hosted backend")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("submit")
                .about("Submit one allocation")
                .arg(Arg::new("beneficiary").long("beneficiary").required(true))
                .arg(Arg::new("disburser").long("disburser").required(true))
                .arg(
                    Arg::new("goods")
                        .long("goods")
                        .required(true)
                        .value_delimiter(',')
                        .action(ArgAction::Append)
                        .help("Regional goods ids, comma separated"),
                )
                .arg(
                    Arg::new("lat")
                        .long("lat")
                        .value_parser(value_parser!(f64))
                        .requires("lon")
                        .allow_negative_numbers(true),
                )
                .arg(
                    Arg::new("lon")
                        .long("lon")
                        .value_parser(value_parser!(f64))
                        .requires("lat")
                        .allow_negative_numbers(true),
                ),
        )
        .subcommand(
            Command::new("stock")
                .about("List regional stock")
                .arg(Arg::new("region").long("region").required(true)),
        )
        .subcommand(
            Command::new("alerts")
                .about("List fraud alerts, newest first")
                .arg(Arg::new("beneficiary").long("beneficiary")),
        )
        .subcommand(
            Command::new("delete-beneficiary")
                .about("Delete a beneficiary with its allocations and fraud alerts")
                .arg(Arg::new("id").required(true)),
        )
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn load_config(matches: &ArgMatches) -> Result<AidflowConfig> {
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => AidflowConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => AidflowConfig::default(),
    };
    Ok(config.with_env_overrides())
}

fn parse_id<T>(args: &ArgMatches, name: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = args
        .get_one::<String>(name)
        .with_context(|| format!("--{name} is required"))?;
    raw.parse()
        .with_context(|| format!("invalid {name} id {raw:?}"))
}

fn submission(args: &ArgMatches) -> Result<SubmitAllocation> {
    let goods = args
        .get_many::<String>("goods")
        .into_iter()
        .flatten()
        .map(|raw| {
            RegionalGoodsId::from_str(raw.trim())
                .with_context(|| format!("invalid goods id {raw:?}"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(SubmitAllocation {
        beneficiary_id: Some(parse_id::<BeneficiaryId>(args, "beneficiary")?),
        disburser_id: Some(parse_id::<DisburserId>(args, "disburser")?),
        selected_goods_ids: goods,
        location: commands::location(
            args.get_one::<f64>("lat").copied(),
            args.get_one::<f64>("lon").copied(),
        )?,
    })
}

async fn run(matches: ArgMatches) -> Result<u8> {
    let config = load_config(&matches)?;
    tracing::debug!(backend = %config.backend.url, window_hours = config.workflow.recency_window_hours, "configuration loaded");
    let store = Arc::new(RestStore::new(&config.backend).context("invalid backend settings")?);
    let mut out = std::io::stdout().lock();

    match matches.subcommand() {
        Some(("submit", args)) => {
            let request = submission(args)?;
            let workflow = AllocationWorkflow::new(store, config.workflow)
                .with_catalog(config.catalog.build());
            let outcome = commands::submit(&workflow, request, &mut out).await?;
            Ok(commands::exit_status(outcome))
        }
        Some(("stock", args)) => {
            let region = parse_id::<RegionId>(args, "region")?;
            commands::stock(store, region, &mut out).await?;
            Ok(0)
        }
        Some(("alerts", args)) => {
            let beneficiary = if args.contains_id("beneficiary") {
                Some(parse_id::<BeneficiaryId>(args, "beneficiary")?)
            } else {
                None
            };
            commands::alerts(store, beneficiary, &mut out).await?;
            Ok(0)
        }
        Some(("delete-beneficiary", args)) => {
            let id = parse_id::<BeneficiaryId>(args, "id")?;
            commands::delete_beneficiary(store, id, &mut out).await?;
            Ok(0)
        }
        _ => anyhow::bail!("unknown command"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();
    init_logging(matches.get_flag("json"));

    match run(matches).await {
        Ok(status) => ExitCode::from(status),
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(1)
        }
    }
}
