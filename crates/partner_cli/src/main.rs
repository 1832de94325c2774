//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `partner_core` linkage (`ping`/`version` with no arguments).
//! - Render a partner's address or typed address map from a store file.
//!
//! Usage:
//! - `partner_cli`
//! - `partner_cli address <db> <partner-uuid> [--company]`
//! - `partner_cli resolve <db> <partner-uuid> [contact|invoice|delivery|other]...`

use log::info;
use partner_core::{open_db, LoggingConfig, PartnerService, PartnerType, SqlitePartnerRepository};
use std::error::Error;
use std::process::ExitCode;
use uuid::Uuid;

fn main() -> ExitCode {
    if let Some(config) = LoggingConfig::from_env() {
        if let Err(err) = config.init() {
            eprintln!("logging disabled: {err}");
        }
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<(), Box<dyn Error>> {
    let Some(command) = args.first() else {
        println!("partner_core ping={}", partner_core::ping());
        println!("partner_core version={}", partner_core::core_version());
        return Ok(());
    };

    match (command.as_str(), args.get(1), args.get(2)) {
        ("address", Some(db_path), Some(partner_id)) => {
            let include_company = args[3..].iter().any(|arg| arg == "--company");
            let conn = open_db(db_path)?;
            let service = PartnerService::new(SqlitePartnerRepository::try_new(&conn)?);
            let id = Uuid::parse_str(partner_id)?;
            info!("event=cli_command module=cli status=start command=address partner_id={id}");
            println!("{}", service.format_address(id, include_company)?);
            Ok(())
        }
        ("resolve", Some(db_path), Some(partner_id)) => {
            let roles = args[3..]
                .iter()
                .map(|role| {
                    PartnerType::parse(role).ok_or_else(|| format!("unknown address type `{role}`"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let conn = open_db(db_path)?;
            let service = PartnerService::new(SqlitePartnerRepository::try_new(&conn)?);
            let id = Uuid::parse_str(partner_id)?;
            info!("event=cli_command module=cli status=start command=resolve partner_id={id}");
            for (role, resolved) in service.address_get(&[id], &roles)? {
                println!("{role}={resolved}");
            }
            Ok(())
        }
        _ => Err("usage: partner_cli [address <db> <uuid> [--company] | resolve <db> <uuid> [type...]]".into()),
    }
}
