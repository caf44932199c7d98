//! `caltrack` - CLI for the transducer calibration register
//!
//! This binary provides the command-line interface for registering
//! transducers, reviewing their expiry status and sending alerts.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::process::ExitCode;

use anyhow::{bail, Context};
use chrono::{Local, NaiveDate};
use clap::Parser;
use serde::Serialize;

use caltrack::cli::{Cli, Command, ConfigCommand, EditCommand, OutputFormat};
use caltrack::notify::{check_for_notifications, notifier_from_config, LogNotifier, Notifier};
use caltrack::validity::{assess_all, sort_for_display, Assessed};
use caltrack::{init_logging, Config, RecordStore, Transducer};

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    if let Command::Config(config_cmd) = cli.command {
        handle_config(&config, config_cmd)?;
        return Ok(ExitCode::SUCCESS);
    }

    let data_file = config.data_file();
    let store = RecordStore::open(&data_file)
        .with_context(|| format!("opening data file {}", data_file.display()))?;
    // Expiry is judged against the local calendar day.
    let today = Local::now().date_naive();

    match cli.command {
        Command::List(list_cmd) => handle_list(&store, today, list_cmd.format)?,
        Command::Add(add_cmd) => {
            let record = store.create(add_cmd.fields())?;
            println!("Transducer #{} registered.", record.id);
        }
        Command::Edit(edit_cmd) => handle_edit(&store, &edit_cmd)?,
        Command::Calibrate(id_cmd) => {
            let record = store.set_calibrating(id_cmd.id)?;
            println!("Transducer #{} marked as in calibration.", record.id);
        }
        Command::Delete(id_cmd) => {
            if !store.delete(id_cmd.id)? {
                bail!("transducer #{} not found", id_cmd.id);
            }
            println!("Transducer #{} deleted.", id_cmd.id);
        }
        Command::Check(check_cmd) => {
            let notifier: Box<dyn Notifier> = if check_cmd.dry_run {
                Box::new(LogNotifier)
            } else {
                notifier_from_config(&config)
            };
            let outcome = check_for_notifications(
                &store,
                notifier.as_ref(),
                &config.notify.recipients,
                today,
            )?;
            println!("{outcome}");
            if outcome.is_failure() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Config(_) => unreachable!("handled above"),
    }

    Ok(ExitCode::SUCCESS)
}

/// One row of `list --format json`.
#[derive(Debug, Serialize)]
struct ListEntry<'a> {
    #[serde(flatten)]
    assessed: &'a Assessed,
    formatted_expiry: String,
}

fn handle_list(store: &RecordStore, today: NaiveDate, format: OutputFormat) -> anyhow::Result<()> {
    let mut assessed = assess_all(store.list()?, today);
    sort_for_display(&mut assessed);

    match format {
        OutputFormat::Json => {
            let entries: Vec<ListEntry<'_>> = assessed
                .iter()
                .map(|a| ListEntry {
                    assessed: a,
                    formatted_expiry: a.formatted_expiry(),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Table => print_table(&assessed),
    }
    Ok(())
}

fn print_table(assessed: &[Assessed]) {
    if assessed.is_empty() {
        println!("No transducers registered.");
        return;
    }

    let headers = [
        "ID",
        "Description",
        "Serial No.",
        "Location",
        "PSI",
        "Expiry",
        "Days",
        "Status",
    ];
    let rows: Vec<[String; 8]> = assessed
        .iter()
        .map(|a| {
            let r: &Transducer = &a.record;
            [
                r.id.to_string(),
                r.description.clone(),
                r.serial_number.clone(),
                r.location.clone(),
                r.psi.clone(),
                a.formatted_expiry(),
                a.validity.days_remaining.to_string(),
                format!("{} [{}]", a.validity.status_text, a.validity.status_class),
            ]
        })
        .collect();

    let mut widths = headers.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: &[&str]| {
        cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    println!("{}", line(&headers));
    for row in &rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        println!("{}", line(&cells));
    }
}

fn handle_edit(store: &RecordStore, cmd: &EditCommand) -> anyhow::Result<()> {
    let Some(stored) = store.get(cmd.id)? else {
        bail!("transducer #{} not found", cmd.id);
    };
    let was_calibrating = stored.is_calibrating();

    let updated = store.update(cmd.id, cmd.merge(stored.fields()))?;
    println!("Transducer #{} updated.", updated.id);
    if was_calibrating && !updated.is_calibrating() {
        println!("New expiry recorded; transducer is back in service.");
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Store]");
                println!("  Data file:          {}", config.data_file().display());
                println!();
                println!("[Notify]");
                println!("  Transport:          {}", config.notify.transport);
                println!("  Sender:             {}", config.notify.sender);
                println!(
                    "  Recipients:         {}",
                    if config.notify.recipients.is_empty() {
                        "(none)".to_string()
                    } else {
                        config.notify.recipients.join(", ")
                    }
                );
                println!(
                    "  Sendmail command:   {} {}",
                    config.notify.sendmail_program,
                    config.notify.sendmail_args.join(" ")
                );
                println!("  Outbox directory:   {}", config.outbox_dir().display());
                println!(
                    "  SMTP relay:         {}:{}",
                    config.notify.smtp_server.as_deref().unwrap_or("(none)"),
                    config.notify.smtp_port
                );
                println!(
                    "  SMTP login:         {}",
                    match (&config.notify.smtp_user, &config.notify.smtp_password) {
                        (Some(user), Some(_)) => format!("{user} (password set)"),
                        (Some(user), None) => format!("{user} (no password)"),
                        (None, _) => "(none)".to_string(),
                    }
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}
