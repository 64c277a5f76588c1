use std::{env, fmt, path::PathBuf, process, str::FromStr, time::Duration};

use log::{info, warn};
use tokio::runtime;

mod checksum;
mod config;
mod dns64;
mod iid;
mod logger;
mod nat64;
mod shutdown;
mod subnet;

use config::{ConfigError, ConfigSlot, Environment, LoadRequest};

const PREFIX_CHECK_INTERVAL: Duration = Duration::from_secs(10);

enum Action {
    Dump,
    Run,
}

struct Settings {
    config_file: PathBuf,
    uplink_interface: String,
    plat_prefix: Option<String>,
    net_id: Option<dns64::NetId>,
}

pub struct Args {
    log_level: log::LevelFilter,
    action: Action,
    settings: Settings,
}

const USAGE_INSTRUCTIONS: &str = "Usage: clatd [OPTIONS] <dump|run>\n\n\
Options:\
\n      --log-level=<LOG_LEVEL>          Log level [default: info]\
\n      --config=<FILENAME>              Path to configuration file [default: /etc/clatd.conf]\
\n      --interface=<IFNAME>             Uplink interface, supplies the IPv6 prefix\
\n      --plat-prefix=<PREFIX>           PLAT prefix, skips DNS64 discovery\
\n      --net-id=<NETID>                 Network ID to use for DNS64 discovery\
\n      --help                           Print help";

impl Args {
    fn parse() -> Args {
        let fail_with_error = |name: &str, value: &str, err: fmt::Arguments| {
            eprintln!(
                "Argument {} has an unsupported value {}: {}",
                name, value, err
            );
            println!("{}", USAGE_INSTRUCTIONS);
            process::exit(2);
        };

        let mut log_level = log::LevelFilter::Info;
        let mut config_file = PathBuf::from("/etc/clatd.conf");
        let mut uplink_interface = None;
        let mut plat_prefix = None;
        let mut net_id = None;

        for arg in env::args()
            .take(env::args().len().saturating_sub(1))
            .skip(1)
        {
            if arg == "--help" || arg == "help" {
                println!("{}", USAGE_INSTRUCTIONS);
                process::exit(0);
            }
            let (name, value) = if let Some(arg) = arg.split_once('=') {
                arg
            } else {
                eprintln!("Option flag {} has no value", arg);
                println!("{}", USAGE_INSTRUCTIONS);
                process::exit(2);
            };

            if name == "--log-level" {
                log_level = match value.to_uppercase().as_str() {
                    "TRACE" => log::LevelFilter::Trace,
                    "DEBUG" => log::LevelFilter::Debug,
                    "INFO" => log::LevelFilter::Info,
                    "WARN" => log::LevelFilter::Warn,
                    "ERROR" => log::LevelFilter::Error,
                    "OFF" => log::LevelFilter::Off,
                    _ => {
                        fail_with_error(name, value, format_args!("Unsupported log level"));
                        process::exit(2);
                    }
                };
            } else if name == "--config" {
                config_file = PathBuf::from(value);
            } else if name == "--interface" {
                uplink_interface = Some(value.to_string());
            } else if name == "--plat-prefix" {
                plat_prefix = Some(value.to_string());
            } else if name == "--net-id" {
                match u32::from_str(value) {
                    Ok(id) => net_id = Some(dns64::NetId(id)),
                    Err(err) => fail_with_error(
                        name,
                        value,
                        format_args!("Failed to parse network ID: {}", err),
                    ),
                };
            } else {
                eprintln!("Unsupported argument {}", arg);
            }
        }

        let action = if let Some(action) = env::args().last() {
            action
        } else {
            eprintln!("No action specified");
            println!("{}", USAGE_INSTRUCTIONS);
            process::exit(2);
        };
        let action = match action.as_str() {
            "dump" => Action::Dump,
            "run" => Action::Run,
            _ => {
                eprintln!("No action specified");
                println!("{}", USAGE_INSTRUCTIONS);
                process::exit(2);
            }
        };

        let uplink_interface = if let Some(uplink_interface) = uplink_interface {
            uplink_interface
        } else {
            eprintln!("No uplink interface specified");
            println!("{}", USAGE_INSTRUCTIONS);
            process::exit(2);
        };

        Args {
            log_level,
            action,
            settings: Settings {
                config_file,
                uplink_interface,
                plat_prefix,
                net_id,
            },
        }
    }
}

// Reloads the configuration whenever the uplink prefix changes, until interrupted.
fn watch_uplink(slot: &mut ConfigSlot, request: &LoadRequest, env: &mut Environment) {
    info!(
        "Checking {} for prefix changes every {} seconds",
        request.uplink_interface,
        PREFIX_CHECK_INTERVAL.as_secs()
    );
    loop {
        env.sleeper.sleep(PREFIX_CHECK_INTERVAL);
        if env.cancel.is_some_and(|cancel| cancel.is_cancelled()) {
            break;
        }
        let current = if let Some(current) = slot.current() {
            current
        } else {
            break;
        };
        match current.interface_prefix_changed(env.interfaces) {
            Ok(false) => continue,
            Ok(true) => info!(
                "Prefix on {} has changed, reloading configuration",
                request.uplink_interface
            ),
            Err(err) => {
                warn!(
                    "Failed to check prefix on {}: {}",
                    request.uplink_interface, err
                );
                continue;
            }
        }
        match slot.load(request, env) {
            Ok(config) => {
                info!("Reloaded configuration: {}", config);
                config::dump(&config, env.diagnostics);
            }
            Err(ConfigError::Cancelled) => break,
            Err(err) => warn!("Failed to reload configuration, keeping {}: {}", current, err),
        }
    }
}

fn main() {
    println!(
        "clatd version {}",
        option_env!("CARGO_PKG_VERSION").unwrap_or("unknown")
    );
    let args = Args::parse();

    if let Err(err) = logger::setup_logger(args.log_level) {
        eprintln!("Failed to set up logger, error is {}", err);
    }
    let rt = match runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(err) => {
            println!("Failed to start runtime, error is {}", err);
            process::exit(1);
        }
    };

    let settings = args.settings;
    let request = LoadRequest {
        config_file: &settings.config_file,
        uplink_interface: &settings.uplink_interface,
        plat_prefix: settings.plat_prefix.as_deref(),
        net_id: settings.net_id,
    };
    let cancel = shutdown::CancelToken::new();
    let mut resolver = dns64::SystemResolver::new(&rt);
    let interfaces = subnet::SystemInterfaces::new();
    let mut sleeper = shutdown::SignalSleeper::new(&rt, cancel.clone());
    let mut rng = rand::thread_rng();
    let mut env = Environment {
        resolver: &mut resolver,
        interfaces: &interfaces,
        sleeper: &mut sleeper,
        rng: &mut rng,
        cancel: Some(&cancel),
        diagnostics: logger::Diagnostics::global("clatd::config"),
    };

    let mut slot = ConfigSlot::new();
    let config = match slot.load(&request, &mut env) {
        Ok(config) => config,
        Err(err) => {
            println!("Failed to load configuration, error is {}", err);
            process::exit(1);
        }
    };
    info!("Loaded configuration: {}", config);
    config::dump(&config, env.diagnostics);

    match args.action {
        Action::Dump => {}
        Action::Run => watch_uplink(&mut slot, &request, &mut env),
    }
    slot.release();
}
