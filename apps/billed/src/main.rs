use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use client_core::{
    form::{BillForm, ChangeEvent, SelectedFile, SubmitEvent},
    FileChangeOutcome, HttpStore, InMemoryStore, LocalStorage, Navigator, NewBill, Store,
    SubmitOutcome,
};
use shared::{
    domain::{Bill, CurrentUser, UserType},
    routes::Route,
};
use tracing::info;

mod config;

use config::{load_settings, Settings};

#[derive(Parser, Debug)]
#[command(name = "billed", about = "Submit expense bills")]
struct Cli {
    /// Store API base url; overrides the configured one.
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a receipt and submit the bill it belongs to.
    Submit(SubmitArgs),
}

#[derive(Args, Debug)]
struct SubmitArgs {
    #[arg(long)]
    file: PathBuf,
    #[arg(long = "type")]
    expense_type: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    amount: String,
    #[arg(long)]
    date: String,
    #[arg(long)]
    vat: String,
    #[arg(long, default_value = "")]
    pct: String,
    #[arg(long, default_value = "")]
    commentary: String,
    /// Log in as this employee before submitting.
    #[arg(long)]
    email: Option<String>,
    /// Keep everything in memory instead of calling the store API.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = load_settings()?;
    tracing_subscriber::fmt()
        .with_env_filter(settings.log_filter.as_str())
        .init();

    let cli = Cli::parse();
    let api_url = cli.api_url.unwrap_or_else(|| settings.api_url.clone());
    match cli.command {
        Command::Submit(args) => submit(&settings, &api_url, args).await,
    }
}

async fn submit(settings: &Settings, api_url: &str, args: SubmitArgs) -> Result<()> {
    let storage = Arc::new(
        LocalStorage::open(&settings.local_storage_path).with_context(|| {
            format!(
                "failed to open local storage '{}'",
                settings.local_storage_path
            )
        })?,
    );
    if let Some(email) = args.email {
        storage
            .set_user(&CurrentUser {
                user_type: Some(UserType::Employee),
                email: Some(email),
            })
            .context("failed to record current user")?;
    }

    let store: Arc<dyn Store> = if args.dry_run {
        info!("dry run: bills are kept in memory");
        Arc::new(InMemoryStore::new())
    } else {
        Arc::new(HttpStore::from_local_storage(api_url, &storage)?)
    };

    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("failed to read receipt '{}'", args.file.display()))?;
    let mime_type = mime_guess::from_path(&args.file)
        .first()
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_default();
    let receipt = SelectedFile::new(args.file.display().to_string(), mime_type, bytes);

    let form = BillForm {
        expense_type: args.expense_type,
        expense_name: args.name,
        amount: args.amount,
        date: args.date,
        vat: args.vat,
        pct: args.pct,
        commentary: args.commentary,
        ..BillForm::default()
    };

    let landed_on = Arc::new(Mutex::new(None::<Route>));
    let navigator: Arc<dyn Navigator> = {
        let landed_on = landed_on.clone();
        Arc::new(move |route: Route| {
            info!(route = %route, "navigating");
            if let Ok(mut slot) = landed_on.lock() {
                *slot = Some(route);
            }
        })
    };

    let mut new_bill = NewBill::new(form, navigator, store.clone(), storage);
    match new_bill
        .handle_change_file(ChangeEvent::single(receipt))
        .await
    {
        FileChangeOutcome::Staged => {}
        FileChangeOutcome::Rejected(err) => bail!("receipt rejected: {err}"),
        other => bail!("receipt upload did not complete ({other:?})"),
    }

    let bill = match new_bill.handle_submit(&mut SubmitEvent::new()).await {
        SubmitOutcome::Submitted(bill) => bill,
        other => bail!("bill was not submitted ({other:?})"),
    };
    println!("Submitted bill {} ({})", bill.id, bill.file_name.as_deref().unwrap_or("-"));

    let route = landed_on.lock().ok().and_then(|slot| *slot);
    if route == Some(Route::Bills) {
        let bills = store.bills().list().await?;
        print_listing(&bills);
    }
    Ok(())
}

fn print_listing(bills: &[Bill]) {
    println!("{:<12} {:<24} {:<24} {:>10}  status", "date", "type", "name", "amount");
    for bill in bills {
        let amount = bill
            .amount
            .map(|amount| format!("{amount} €"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<12} {:<24} {:<24} {:>10}  {:?}",
            bill.date, bill.expense_type, bill.name, amount, bill.status
        );
    }
}
