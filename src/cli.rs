//! CLI definition and dispatch.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use crate::adapters::bounded_quote_adapter::BoundedQuoteAdapter;
use crate::adapters::csv_adapter::CsvQuoteAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::sqlite_adapter::SqliteAdapter;
use crate::domain::account::ActivityEntry;
use crate::domain::account_service::AccountService;
use crate::domain::config_validation::{
    quote_timeout, sell_policy_kind, validate_store_config, validate_trading_config,
};
use crate::domain::error::PapertraderError;
use crate::domain::iso::{IsoCurrency, IsoRegistry};
use crate::domain::order::{OrderExecutor, SellRequest, TradeReceipt};
use crate::domain::outcome::Outcome;
use crate::domain::portfolio::{LinkTarget, NewPortfolio, Portfolio};
use crate::domain::portfolio_manager::PortfolioManager;
use crate::domain::position::PositionTracker;
use crate::domain::pricing::{estimate_cost, CostEstimate, Deed};
use crate::domain::reset::ResetEngine;
use crate::ports::config_port::ConfigPort;
use crate::ports::quote_port::QuotePort;

#[derive(Parser, Debug)]
#[command(name = "papertrader", about = "Paper-trading ledger")]
pub struct Cli {
    #[arg(short, long, default_value = "papertrader.ini")]
    pub config: PathBuf,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the database schema
    Init,
    /// Manage the ISO currency registry
    Iso {
        #[command(subcommand)]
        action: IsoCommand,
    },
    /// Deposit funds into the non-trading balance
    Deposit {
        #[arg(long)]
        trader: String,
        currency: String,
        amount: Decimal,
    },
    /// Manage bank accounts
    Bank {
        #[command(subcommand)]
        action: BankCommand,
    },
    /// Transfer funds from the non-trading balance to a bank account
    Transfer {
        #[arg(long)]
        trader: String,
        currency: String,
        bank_account: i64,
        amount: Decimal,
    },
    /// Show account balances
    Balances {
        #[arg(long)]
        trader: String,
    },
    /// Show the account (or bank) activity log
    Activity {
        #[arg(long)]
        trader: String,
        #[arg(long)]
        currency: Option<String>,
        #[arg(long)]
        bank: bool,
    },
    /// Search quotes by symbol or name
    Search { term: String },
    /// Cost an order at a given price
    Estimate {
        deed: Deed,
        price: Decimal,
        quantity: u64,
    },
    /// Cost an order at the current quote
    Preview {
        #[arg(long)]
        trader: String,
        deed: Deed,
        symbol: String,
        quantity: u64,
    },
    /// Buy shares at the current quote
    Buy {
        #[arg(long)]
        trader: String,
        symbol: String,
        quantity: u64,
    },
    /// Sell shares at the current quote
    Sell {
        #[arg(long)]
        trader: String,
        symbol: String,
        quantity: u64,
        /// Route the proceeds to this bank account
        #[arg(long)]
        transfer_to: Option<i64>,
    },
    /// Show the outstanding quantity of one symbol
    Outstanding {
        #[arg(long)]
        trader: String,
        symbol: String,
    },
    /// List held symbols with their market value
    Holdings {
        #[arg(long)]
        trader: String,
        #[arg(long)]
        currency: Option<String>,
    },
    /// Manage portfolios
    Portfolio {
        #[command(subcommand)]
        action: PortfolioCommand,
    },
    /// Remove portfolios in one currency, or in all currencies
    Reset {
        #[arg(long)]
        trader: String,
        #[arg(long)]
        all: bool,
        #[arg(long)]
        currency: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum IsoCommand {
    /// Register or replace a country/currency record
    Add {
        country: String,
        country_name: String,
        currency: String,
        currency_name: String,
        #[arg(long, default_value_t = 2)]
        minor_units: u32,
        #[arg(long)]
        active: bool,
    },
    Activate { country: String, currency: String },
    Deactivate { country: String, currency: String },
    List {
        #[arg(long)]
        active_only: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum BankCommand {
    Add {
        #[arg(long)]
        trader: String,
        currency: String,
        bank_name: String,
        account_number: String,
    },
    List {
        #[arg(long)]
        trader: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum PortfolioCommand {
    Create {
        #[arg(long)]
        trader: String,
        name: String,
        currency: String,
    },
    /// Link transactions to a portfolio, or to a new one with --name/--currency
    Link {
        #[arg(long)]
        trader: String,
        #[arg(long, conflicts_with_all = ["name", "currency"])]
        portfolio: Option<i64>,
        #[arg(long, requires = "currency")]
        name: Option<String>,
        #[arg(long, requires = "name")]
        currency: Option<String>,
        #[arg(required = true)]
        transactions: Vec<i64>,
    },
    Unlink {
        #[arg(long)]
        trader: String,
        #[arg(long)]
        portfolio: i64,
        #[arg(required = true)]
        transactions: Vec<i64>,
    },
    List {
        #[arg(long)]
        trader: String,
        #[arg(long)]
        currency: Option<String>,
    },
    Show {
        #[arg(long)]
        trader: String,
        portfolio: i64,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn execute(cli: Cli) -> Result<(), PapertraderError> {
    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Init => {
            open_store(&config)?;
            eprintln!("Schema ready");
            Ok(())
        }
        Command::Iso { action } => run_iso(&config, action),
        Command::Deposit {
            trader,
            currency,
            amount,
        } => {
            let store = open_store(&config)?;
            let balance = AccountService::new(&store, &store).deposit(&trader, &currency, amount)?;
            println!(
                "{} non-trading {} trading {}",
                balance.currency,
                balance.display_non_trading(),
                balance.display_trading()
            );
            Ok(())
        }
        Command::Bank { action } => run_bank(&config, action),
        Command::Transfer {
            trader,
            currency,
            bank_account,
            amount,
        } => {
            let store = open_store(&config)?;
            let balance = AccountService::new(&store, &store).transfer_to_bank(
                &trader,
                &currency,
                bank_account,
                amount,
            )?;
            println!(
                "{} non-trading {} trading {}",
                balance.currency,
                balance.display_non_trading(),
                balance.display_trading()
            );
            Ok(())
        }
        Command::Balances { trader } => {
            let store = open_store(&config)?;
            for b in AccountService::new(&store, &store).balances(&trader)? {
                println!(
                    "{}\tnon-trading {}\ttrading {}",
                    b.currency,
                    b.display_non_trading(),
                    b.display_trading()
                );
            }
            Ok(())
        }
        Command::Activity {
            trader,
            currency,
            bank,
        } => {
            let store = open_store(&config)?;
            let service = AccountService::new(&store, &store);
            let entries = if bank {
                service.bank_activity(&trader)?
            } else {
                service.activity(&trader, currency.as_deref())?
            };
            print_activity(&entries);
            Ok(())
        }
        Command::Search { term } => {
            let quotes = open_quotes(&config)?;
            for q in quotes.search(&term)? {
                println!(
                    "{}\t{}\t{} {}{}",
                    q.symbol,
                    q.name,
                    q.currency,
                    q.price,
                    if q.is_index { "\t(index)" } else { "" }
                );
            }
            Ok(())
        }
        Command::Estimate {
            deed,
            price,
            quantity,
        } => {
            if price.is_sign_negative() {
                return Err(PapertraderError::validation("price", "must not be negative"));
            }
            if quantity == 0 {
                return Err(PapertraderError::validation("quantity", "must be positive"));
            }
            print_estimate(&estimate_cost(deed, price, quantity)?);
            Ok(())
        }
        Command::Preview {
            trader,
            deed,
            symbol,
            quantity,
        } => {
            let store = open_store(&config)?;
            let quotes = open_quotes(&config)?;
            let policy = sell_policy_kind(&config)?.build();
            let executor = OrderExecutor::new(&quotes, &store, &store, policy.as_ref());
            let preview = executor.preview(&trader, deed, &symbol, quantity)?;
            println!(
                "{} {} at {} {}",
                preview.quote.symbol, preview.quote.name, preview.quote.currency, preview.quote.price
            );
            print_estimate(&preview.estimate);
            if let Some(held) = preview.outstanding {
                if preview.nothing_to_sell() {
                    println!("nothing to sell");
                } else {
                    println!("outstanding {held}");
                }
            }
            if let Some(name) = preview.refused_by {
                println!("selling refused by {name} policy");
            }
            Ok(())
        }
        Command::Buy {
            trader,
            symbol,
            quantity,
        } => {
            let store = open_store(&config)?;
            let quotes = open_quotes(&config)?;
            let policy = sell_policy_kind(&config)?.build();
            let executor = OrderExecutor::new(&quotes, &store, &store, policy.as_ref());
            print_receipt(&executor.buy(&trader, &symbol, quantity)?);
            Ok(())
        }
        Command::Sell {
            trader,
            symbol,
            quantity,
            transfer_to,
        } => {
            let store = open_store(&config)?;
            let quotes = open_quotes(&config)?;
            let policy = sell_policy_kind(&config)?.build();
            let executor = OrderExecutor::new(&quotes, &store, &store, policy.as_ref());
            let receipt = executor.sell(&SellRequest {
                trader_id: trader,
                symbol,
                quantity,
                auto_transfer_to_bank: transfer_to.is_some(),
                bank_account_id: transfer_to,
            })?;
            print_receipt(&receipt);
            Ok(())
        }
        Command::Outstanding { trader, symbol } => {
            let store = open_store(&config)?;
            let quotes = open_quotes(&config)?;
            let held = PositionTracker::new(&store, &quotes).outstanding_quantity(&trader, &symbol)?;
            println!("{symbol}\t{held}");
            Ok(())
        }
        Command::Holdings { trader, currency } => {
            let store = open_store(&config)?;
            let quotes = open_quotes(&config)?;
            let currency = currency.map(|c| c.to_ascii_uppercase());
            let holdings = PositionTracker::new(&store, &quotes)
                .outstanding_holdings(&trader, currency.as_deref())?;
            for h in holdings {
                println!(
                    "{}\t{}\t{}\t{} {}\t{}",
                    h.symbol, h.symbol_name, h.quantity, h.currency, h.current_price, h.current_amount
                );
            }
            Ok(())
        }
        Command::Portfolio { action } => run_portfolio(&config, action),
        Command::Reset {
            trader,
            all,
            currency,
        } => {
            let store = open_store(&config)?;
            match ResetEngine::new(&store, &store).reset_portfolios(
                &trader,
                all,
                currency.as_deref(),
            )? {
                Outcome::Changed(summary) => println!(
                    "removed {} portfolio(s), unlinked {} transaction(s)",
                    summary.portfolios_removed, summary.transactions_unlinked
                ),
                Outcome::Unchanged => println!("nothing to reset"),
            }
            Ok(())
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, PapertraderError> {
    FileConfigAdapter::from_file(path).map_err(|e| PapertraderError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Open the store and make sure its schema exists.
pub fn open_store(config: &dyn ConfigPort) -> Result<SqliteAdapter, PapertraderError> {
    validate_store_config(config)?;
    let store = SqliteAdapter::from_config(config)?;
    store.initialize_schema()?;
    Ok(store)
}

pub fn open_quotes(
    config: &dyn ConfigPort,
) -> Result<BoundedQuoteAdapter<CsvQuoteAdapter>, PapertraderError> {
    validate_trading_config(config)?;
    let path = config
        .get_string("quotes", "path")
        .ok_or_else(|| PapertraderError::ConfigMissing {
            section: "quotes".into(),
            key: "path".into(),
        })?;
    Ok(BoundedQuoteAdapter::new(
        CsvQuoteAdapter::new(PathBuf::from(path)),
        quote_timeout(config)?,
    ))
}

fn run_iso(config: &dyn ConfigPort, action: IsoCommand) -> Result<(), PapertraderError> {
    let store = open_store(config)?;
    let registry = IsoRegistry::new(&store);
    match action {
        IsoCommand::Add {
            country,
            country_name,
            currency,
            currency_name,
            minor_units,
            active,
        } => {
            let record = registry.register(IsoCurrency {
                country_code: country,
                country_name,
                currency_code: currency,
                currency_name,
                minor_units,
                active,
            })?;
            print_iso(&record);
        }
        IsoCommand::Activate { country, currency } => {
            print_iso_outcome(registry.activate(&country, &currency)?)
        }
        IsoCommand::Deactivate { country, currency } => {
            print_iso_outcome(registry.deactivate(&country, &currency)?)
        }
        IsoCommand::List { active_only } => {
            for record in registry.list(active_only)? {
                print_iso(&record);
            }
        }
    }
    Ok(())
}

fn run_bank(config: &dyn ConfigPort, action: BankCommand) -> Result<(), PapertraderError> {
    let store = open_store(config)?;
    let service = AccountService::new(&store, &store);
    match action {
        BankCommand::Add {
            trader,
            currency,
            bank_name,
            account_number,
        } => {
            let account = service.add_bank_account(&trader, &currency, &bank_name, &account_number)?;
            println!("bank account {} registered", account.id);
        }
        BankCommand::List { trader } => {
            for a in service.bank_accounts(&trader)? {
                println!(
                    "{}\t{}\t{}\t{}{}",
                    a.id,
                    a.currency,
                    a.bank_name,
                    a.account_number,
                    if a.in_use { "" } else { "\t(not in use)" }
                );
            }
        }
    }
    Ok(())
}

fn run_portfolio(config: &dyn ConfigPort, action: PortfolioCommand) -> Result<(), PapertraderError> {
    let store = open_store(config)?;
    let quotes = open_quotes(config)?;
    let manager = PortfolioManager::new(&store, &store, &quotes, &store);
    match action {
        PortfolioCommand::Create {
            trader,
            name,
            currency,
        } => print_portfolio(&manager.create_portfolio(&trader, &name, &currency)?),
        PortfolioCommand::Link {
            trader,
            portfolio,
            name,
            currency,
            transactions,
        } => {
            let target = match (portfolio, name, currency) {
                (Some(id), _, _) => LinkTarget::Existing(id),
                (None, Some(name), Some(currency)) => LinkTarget::New(NewPortfolio {
                    trader_id: trader.clone(),
                    name,
                    currency,
                }),
                _ => {
                    return Err(PapertraderError::validation(
                        "portfolio",
                        "give --portfolio or both --name and --currency",
                    ));
                }
            };
            match manager.link_transactions(&trader, target, &transactions)? {
                Outcome::Changed(p) => print_portfolio(&p),
                Outcome::Unchanged => println!("nothing to link"),
            }
        }
        PortfolioCommand::Unlink {
            trader,
            portfolio,
            transactions,
        } => match manager.unlink_transactions(&trader, portfolio, &transactions)? {
            Outcome::Changed(p) => print_portfolio(&p),
            Outcome::Unchanged => println!("nothing to unlink"),
        },
        PortfolioCommand::List { trader, currency } => {
            for p in manager.list_portfolios(&trader, currency.as_deref())? {
                print_portfolio(&p);
            }
        }
        PortfolioCommand::Show { trader, portfolio } => {
            let details = manager.portfolio_details(&trader, portfolio)?;
            print_portfolio(&details.portfolio);
            for t in &details.transactions {
                println!(
                    "  #{}\t{}\t{}\t{} {}\t{}\t{}",
                    t.id, t.transaction_date, t.deed, t.quantity, t.symbol, t.price, t.cost
                );
            }
        }
    }
    Ok(())
}

fn print_estimate(estimate: &CostEstimate) {
    println!("notional {}", estimate.notional);
    println!("fees     {}", estimate.fees);
    println!(
        "{} {}{}",
        match estimate.deed {
            Deed::Buy => "cost    ",
            Deed::Sell => "proceeds",
        },
        estimate.total,
        if estimate.clamped {
            " (fees exceed notional)"
        } else {
            ""
        }
    );
}

fn print_receipt(receipt: &TradeReceipt) {
    let t = &receipt.transaction;
    println!(
        "#{} {} {} {} at {} {}, total {}",
        t.id, t.deed, t.quantity, t.symbol, t.currency, t.price, t.cost
    );
    println!(
        "{} non-trading {} trading {}",
        receipt.balance.currency,
        receipt.balance.display_non_trading(),
        receipt.balance.display_trading()
    );
    if let Some(bank) = &receipt.transferred_to {
        println!("proceeds sent to bank account {}", bank.id);
    }
}

fn print_portfolio(p: &Portfolio) {
    println!(
        "{}\t{}\t{}\tinvested {}\tcurrent {}\tp/l {}",
        p.id, p.name, p.currency, p.invested_amount, p.current_amount, p.profit_loss_amount
    );
}

fn print_iso(record: &IsoCurrency) {
    println!(
        "{}\t{}\t{}\t{}\t{}\t{}",
        record.country_code,
        record.country_name,
        record.currency_code,
        record.currency_name,
        record.minor_units,
        if record.active { "active" } else { "inactive" }
    );
}

fn print_iso_outcome(outcome: Outcome<IsoCurrency>) {
    match outcome {
        Outcome::Changed(record) => print_iso(&record),
        Outcome::Unchanged => println!("no change"),
    }
}

fn print_activity(entries: &[ActivityEntry]) {
    for e in entries {
        println!(
            "{}\t{}\t{}",
            e.created_at.format("%Y-%m-%d %H:%M:%S"),
            e.currency,
            e.description
        );
    }
}
