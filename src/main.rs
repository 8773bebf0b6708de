use clap::Parser;
use std::io::{self, BufRead, Write};

use vaultkeep::actions::{Action, ActionOutcome, Assistant};
use vaultkeep::cli::{Cli, Command, ListArgs, LocatorArgs};
use vaultkeep::config::Config;
use vaultkeep::delete::{AutoConfirm, Confirmer, DeletionOutcome, FsDeletionRequester, StdinConfirmer};
use vaultkeep::error::{Error, Result};
use vaultkeep::inventory::{Inventory, TrackedFile};
use vaultkeep::logging;
use vaultkeep::notify::{Fanout, FileNotifier, LogNotifier, Notifier};
use vaultkeep::report;
use vaultkeep::scan::{self, fs::FsIndex, Scanner};
use vaultkeep::util::{self, format_bytes};
use vaultkeep::vault::Vault;

/// Keeps the on-disk alert in step with the pending count after actions.
fn refresh_notification(config: &Config, inventory: &Inventory) {
    let notifier = FileNotifier::new(&config.notify_dir, config.threshold);
    match inventory.counts() {
        Ok(counts) if counts.pending == 0 => {
            if let Err(e) = notifier.clear() {
                tracing::warn!("failed to clear notification: {e}");
            }
        }
        Ok(counts) => notifier.notify(counts.pending),
        Err(e) => tracing::warn!("failed to count pending files: {e}"),
    }
}

fn describe(outcome: &ActionOutcome) -> String {
    let deletion = match outcome.deletion {
        Some(DeletionOutcome::Granted) => "original deleted",
        Some(DeletionOutcome::Denied) => "deletion declined, original kept",
        Some(DeletionOutcome::Unsupported) => "deletion not available here, original kept",
        None => "",
    };

    match (outcome.action, &outcome.archived_to) {
        (Action::Archive, Some(dest)) => format!("archived to {} ({deletion})", dest.display()),
        (Action::Delete, _) => deletion.to_string(),
        (Action::Ignore, _) => "ignored".to_string(),
        (Action::Archive, None) => "archive failed".to_string(),
    }
}

fn run_actions<C: Confirmer>(
    config: &Config,
    inventory: &Inventory,
    locators: &[String],
    action: Action,
    confirmer: C,
) -> Result<()> {
    let vault = Vault::from_config(config);
    let assistant = Assistant::new(inventory, &vault, FsDeletionRequester::from_config(config, confirmer));

    let mut failed = 0;
    for locator in locators {
        match assistant.handle_locator(locator, action) {
            Ok(outcome) => {
                println!("{}: {}", outcome.locator, describe(&outcome));
                for error in &outcome.errors {
                    eprintln!("  {error}");
                }
            }
            Err(e) => {
                eprintln!("{locator}: {e}");
                failed += 1;
            }
        }
    }

    refresh_notification(config, inventory);
    if failed > 0 {
        return Err(Error::ActionsFailed {
            failed,
            total: locators.len(),
        });
    }
    Ok(())
}

fn print_card(index: usize, total: usize, file: &TrackedFile, now_ms: i64) {
    println!("\n[{}/{}] {}", index + 1, total, file.name);
    println!("  size:  {}", format_bytes(file.size));
    println!("  added: {} ({})", util::format_date(file.added_date), util::format_age(file.added_date, now_ms));
    println!("  type:  {}", file.mime_type);
    println!("  path:  {}", file.locator);
}

/// `None` to stop reviewing, `Some(None)` to skip this file.
fn prompt_action() -> io::Result<Option<Option<Action>>> {
    loop {
        print!("[a]rchive, [d]elete, [i]gnore, [s]kip, [q]uit? ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }

        match line.trim().to_ascii_lowercase().as_str() {
            "a" | "archive" => return Ok(Some(Some(Action::Archive))),
            "d" | "delete" => return Ok(Some(Some(Action::Delete))),
            "i" | "ignore" => return Ok(Some(Some(Action::Ignore))),
            "s" | "skip" | "" => return Ok(Some(None)),
            "q" | "quit" => return Ok(None),
            other => println!("unknown choice '{other}'"),
        }
    }
}

fn review<C: Confirmer>(config: &Config, inventory: &Inventory, confirmer: C) -> Result<()> {
    let pending = inventory.list_pending()?;

    if pending.is_empty() {
        println!("Nothing to review. Run 'vaultkeep scan' to look for stale files.");
        return Ok(());
    }

    let vault = Vault::from_config(config);
    let assistant = Assistant::new(inventory, &vault, FsDeletionRequester::from_config(config, confirmer));
    let now_ms = util::now_millis();

    for (i, file) in pending.iter().enumerate() {
        print_card(i, pending.len(), file, now_ms);

        let Some(choice) = prompt_action()? else { break };
        let Some(action) = choice else { continue };

        match assistant.handle(file, action) {
            Ok(outcome) => {
                println!("  {}", describe(&outcome));
                for error in &outcome.errors {
                    eprintln!("  {error}");
                }
            }
            Err(e) => eprintln!("  failed: {e}"),
        }
    }

    refresh_notification(config, inventory);
    Ok(())
}

fn list(inventory: &Inventory, args: &ListArgs) -> Result<()> {
    if args.summary {
        let counts = inventory.counts()?;
        if args.json {
            println!("{}", report::json::render(&counts));
        } else {
            print!("{}", report::table::render_counts(&counts));
        }
        return Ok(());
    }

    let files = inventory.list(args.status.status())?;
    if args.json {
        println!("{}", report::json::render(&files));
    } else {
        print!("{}", report::table::render(&files, util::now_millis()));
    }
    Ok(())
}

fn actions_with_confirm(config: &Config, inventory: &Inventory, args: &LocatorArgs, action: Action) -> Result<()> {
    if args.yes {
        run_actions(config, inventory, &args.locators, action, AutoConfirm(true))
    } else {
        run_actions(config, inventory, &args.locators, action, StdinConfirmer)
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = Config::from_cli(cli)?;
    let inventory = Inventory::open(&config.db_path)?;

    match &cli.command {
        Command::Scan(_) => {
            let scanner = Scanner::new(FsIndex::from_config(&config));

            let notifier = Fanout(vec![
                Box::new(LogNotifier::new(config.threshold)),
                Box::new(FileNotifier::new(&config.notify_dir, config.threshold)),
            ]);
            let notifier: Option<&dyn Notifier> = if config.notify { Some(&notifier) } else { None };

            let summary = scan::track(&scanner, &inventory, notifier, config.threshold)?;
            report::print_scan(&summary, &config);
            Ok(())
        }
        Command::List(args) => list(&inventory, args),
        Command::Review(args) => {
            if args.yes {
                review(&config, &inventory, AutoConfirm(true))
            } else {
                review(&config, &inventory, StdinConfirmer)
            }
        }
        Command::Archive(args) => actions_with_confirm(&config, &inventory, args, Action::Archive),
        Command::Delete(args) => actions_with_confirm(&config, &inventory, args, Action::Delete),
        Command::Ignore(args) => {
            run_actions(&config, &inventory, &args.locators, Action::Ignore, AutoConfirm(false))
        }
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.global.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
