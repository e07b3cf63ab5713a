use clap::{Args as ClapArgs, Parser, Subcommand};
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use env_logger::{Env, Target};
use log::info;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;

use ipam_onboard::am::{AmClient, Count, NextAvailableQuery, SearchType, ShellRunner};
use ipam_onboard::config::Config;
use ipam_onboard::config_loader;
use ipam_onboard::orchestrator::{run_onboarding, RunOutputs};

/// Address management automation for device onboarding
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file (built-in tables when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Address management user
    #[arg(short, long, global = true, env = "IPAM_USERNAME")]
    username: Option<String>,

    /// Address management password
    #[arg(short, long, global = true, env = "IPAM_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Also append log output to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Onboard every host listed in a CSV file
    Onboard {
        /// CSV with REGION, csv-host-name and csv-deviceIP columns
        #[arg(long)]
        csv: PathBuf,

        /// Directory for the xlsx report
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// Also write a JSON summary of every host
        #[arg(long)]
        summary_json: Option<PathBuf>,
    },

    /// List free addresses of a subnet or free space in an address block
    NextAvailable(NextAvailableArgs),

    /// Find a run of consecutive free addresses in a subnet
    Range {
        #[arg(long)]
        subnet: String,

        #[arg(long, default_value_t = 5)]
        size: usize,
    },

    /// Look up an interface by host name or address
    FindInterface {
        /// Host name or IP address
        query: String,
    },
}

#[derive(ClapArgs, Debug)]
struct NextAvailableArgs {
    #[arg(long, required_unless_present = "address_block", conflicts_with = "address_block")]
    subnet: Option<String>,

    #[arg(long)]
    address_block: Option<String>,

    /// Number of results, or `all`
    #[arg(long, default_value = "1")]
    count: Count,

    /// List free subnets of this prefix length instead of addresses
    #[arg(long, requires = "address_block")]
    prefix: Option<u8>,

    /// Do not drop addresses that answer ping
    #[arg(long)]
    no_ping: bool,
}

fn init_logging(log_file: Option<&PathBuf>) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    if let Some(path) = log_file {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .wrap_err_with(|| format!("Failed to create log directory '{}'", dir.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .wrap_err_with(|| format!("Failed to open log file '{}'", path.display()))?;
        builder.target(Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn client(args: &Args, config: &Config) -> Result<AmClient<ShellRunner>> {
    let username = args
        .username
        .as_deref()
        .ok_or_else(|| eyre!("No username given (use --username or IPAM_USERNAME)"))?;
    let password = args
        .password
        .as_deref()
        .ok_or_else(|| eyre!("No password given (use --password or IPAM_PASSWORD)"))?;
    Ok(AmClient::with_shell(username, password, config))
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();

    init_logging(args.log_file.as_ref())?;

    let config = config_loader::load_or_default(args.config.as_deref())?;
    config_loader::check_region_coverage(&config);
    let am = client(&args, &config)?;

    match &args.command {
        Command::Onboard {
            csv,
            output_dir,
            summary_json,
        } => {
            info!("Host list: {:?}", csv);
            info!("Output directory: {:?}", output_dir);
            let outputs = RunOutputs {
                output_dir: output_dir.clone(),
                summary_json: summary_json.clone(),
            };
            let result = run_onboarding(&config, &am, csv, &outputs)?;
            println!(
                "{} of {} hosts onboarded, report: {}",
                result.onboarded,
                result.total,
                result.xlsx.display()
            );
        }
        Command::NextAvailable(next) => {
            let found = match (&next.subnet, &next.address_block, next.prefix) {
                (Some(subnet), _, _) => am.find_next_ip(subnet, next.count, !next.no_ping)?,
                (None, Some(block), Some(prefix)) => {
                    let query = NextAvailableQuery {
                        address_block: block.clone(),
                        prefix_length: prefix,
                        search_type: SearchType::Subnet,
                        count: next.count,
                        ..NextAvailableQuery::default()
                    };
                    am.find_next_available(&query)?
                }
                (None, Some(block), None) => {
                    am.find_list_of_next_available_ips(block, "", next.count, !next.no_ping)?
                }
                (None, None, _) => return Err(eyre!("Either --subnet or --address-block is required")),
            };
            for item in found {
                println!("{}", item);
            }
        }
        Command::Range { subnet, size } => match am.get_range(subnet, *size)? {
            Some((low, high)) => println!("{}:{}", low, high),
            None => return Err(eyre!("No {} consecutive free addresses in {}", size, subnet)),
        },
        Command::FindInterface { query } => {
            println!("{}", am.find_interface(query)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_onboard_parsing() {
        let args = Args::parse_from([
            "ipam-onboard",
            "--username", "svc-user",
            "--password", "secret",
            "onboard",
            "--csv", "hosts.csv",
        ]);

        assert_eq!(args.username.as_deref(), Some("svc-user"));
        match args.command {
            Command::Onboard { csv, output_dir, summary_json } => {
                assert_eq!(csv, PathBuf::from("hosts.csv"));
                assert_eq!(output_dir, PathBuf::from("."));
                assert_eq!(summary_json, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_next_available_parsing() {
        let args = Args::parse_from([
            "ipam-onboard",
            "next-available",
            "--subnet", "10.35.105.0/29",
            "--count", "all",
            "--no-ping",
        ]);

        match args.command {
            Command::NextAvailable(next) => {
                assert_eq!(next.subnet.as_deref(), Some("10.35.105.0/29"));
                assert_eq!(next.count, Count::All);
                assert!(next.no_ping);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_next_available_requires_one_target() {
        assert!(Args::try_parse_from(["ipam-onboard", "next-available"]).is_err());
        assert!(Args::try_parse_from([
            "ipam-onboard",
            "next-available",
            "--subnet", "10.0.0.0/29",
            "--address-block", "10.0.0.0/24",
        ])
        .is_err());
        assert!(Args::try_parse_from([
            "ipam-onboard",
            "next-available",
            "--subnet", "10.0.0.0/29",
            "--prefix", "29",
        ])
        .is_err());
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let args = Args::parse_from([
            "ipam-onboard",
            "range",
            "--subnet", "10.35.105.0/29",
            "--config", "regions.yaml",
            "--log-file", "logs/onboarding.log",
        ]);

        assert_eq!(args.config, Some(PathBuf::from("regions.yaml")));
        assert_eq!(args.log_file, Some(PathBuf::from("logs/onboarding.log")));
        match args.command {
            Command::Range { subnet, size } => {
                assert_eq!(subnet, "10.35.105.0/29");
                assert_eq!(size, 5);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
