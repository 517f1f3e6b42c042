use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tally_core::money::format_amount;
use tally_core::{
    category_totals, compute_shares, confirm_all, expense_balances, fallback_balances,
    impact_breakdown, reconcile, BalanceSource, BudgetSummary, CategorySource, Draft, DraftSource,
    Member, MemberId, ModeInputs, ParticipantShare, PeriodKey, ServiceError, SplitMode,
};
use tally_finance::{normalize_merchant_key, ImportReview, MatchSource, MerchantRule, RuleBook};
use tally_ingest::{
    extract_receipt, extract_statement_rows, normalize_row, normalize_rows, parse_voice_text,
    ColumnMapping, CsvSource,
};

mod config;
mod ocr;
mod state;
mod transcribe;

use config::Config;
use ocr::{DocumentKind, OcrClient};
use transcribe::Transcriber;

#[derive(Parser, Debug)]
#[command(
    name = "tally",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("TALLY_BUILD_SHA"), ")"),
    about = "Shared expenses, splits and monthly budgets"
)]
struct Cli {
    /// -v for debug logs, -vv for trace
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split a total between members and print the shares
    Split {
        #[arg(long)]
        total: f64,

        #[arg(long)]
        payer: String,

        /// Comma-separated member ids
        #[arg(long, value_delimiter = ',', required = true)]
        members: Vec<String>,

        /// equal | exact-amount | percent | shares | adjustment
        #[arg(long, default_value = "equal")]
        mode: SplitMode,

        /// Per-member input for non-equal modes, e.g. --input alice=60
        #[arg(long = "input", value_parser = parse_input)]
        inputs: Vec<(MemberId, f64)>,
    },

    /// Member balances from a ledger export
    Balances {
        #[arg(long)]
        ledger: PathBuf,

        /// Only count expenses of this month (YYYY-MM)
        #[arg(long)]
        period: Option<PeriodKey>,

        #[arg(long)]
        json: bool,
    },

    /// Budget wallet, top categories and impact breakdown for one month
    Summary {
        #[arg(long)]
        ledger: PathBuf,

        #[arg(long)]
        budget: f64,

        #[arg(long)]
        period: PeriodKey,

        #[arg(long, default_value_t = 5)]
        top: usize,
    },

    /// Show which category a merchant lands in
    Categorize {
        merchant: String,

        #[arg(long)]
        user: Option<String>,
    },

    /// Manage remembered merchant rules
    Rules {
        #[command(subcommand)]
        command: RulesCommand,

        #[arg(long, global = true)]
        user: Option<String>,
    },

    /// Import a bank CSV into expense drafts
    Import {
        #[arg(long)]
        csv: PathBuf,

        #[arg(long)]
        user: Option<String>,

        #[arg(long)]
        group: Option<String>,

        #[arg(long)]
        date_column: Option<String>,

        #[arg(long)]
        amount_column: Option<String>,

        #[arg(long)]
        merchant_column: Option<String>,

        #[arg(long)]
        category_column: Option<String>,

        /// Save every row's merchant → category as a rule
        #[arg(long)]
        remember: bool,

        /// Drafts do not count against the budget
        #[arg(long)]
        split_only: bool,

        /// Write drafts here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Confirm every open draft in a drafts file
    Confirm {
        #[arg(long)]
        drafts: PathBuf,
    },

    /// OCR a receipt into a draft
    Receipt {
        file: PathBuf,

        #[arg(long)]
        user: Option<String>,

        #[arg(long)]
        group: Option<String>,

        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// OCR a statement PDF into drafts
    Statement {
        file: PathBuf,

        #[arg(long)]
        user: Option<String>,

        #[arg(long)]
        group: Option<String>,

        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Record a spoken expense (audio file or already transcribed text)
    Voice {
        #[arg(required_unless_present = "text")]
        audio: Option<PathBuf>,

        #[arg(long, conflicts_with = "audio")]
        text: Option<String>,

        #[arg(long)]
        user: Option<String>,

        #[arg(long)]
        group: Option<String>,
    },

    /// Config file helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum RulesCommand {
    List,

    /// Add or replace a rule
    Add {
        match_text: String,
        category: String,

        #[arg(long)]
        regex: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write ~/.tally/config.toml with defaults
    Init,

    /// Print the effective config
    Show,
}

fn parse_input(s: &str) -> std::result::Result<(MemberId, f64), String> {
    let (member, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected member=value, got '{s}'"))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{value}' is not a number"))?;
    Ok((MemberId::from(member.trim()), value))
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let default = ["tally", "tally_core", "tally_ingest", "tally_finance"]
        .map(|t| format!("{t}={level}"))
        .join(",");
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let home = state::ensure_tally_home()?;
    let cfg = config::load_config(&home)?.with_env();

    match cli.command {
        Command::Split {
            total,
            payer,
            members,
            mode,
            inputs,
        } => {
            let members: BTreeSet<MemberId> = members.into_iter().map(MemberId::from).collect();
            let inputs: ModeInputs = inputs.into_iter().collect();
            let shares = compute_shares(total, &MemberId::from(payer), &members, mode, &inputs)?;
            print_json(&shares)?;
        }

        Command::Balances {
            ledger,
            period,
            json,
        } => show_balances(&ledger, period, json)?,

        Command::Summary {
            ledger,
            budget,
            period,
            top,
        } => show_summary(&ledger, budget, period, top)?,

        Command::Categorize { merchant, user } => {
            let book = state::read_rules(&home, &user_id(&cfg, user))?;
            let res = book.categorize(&merchant);
            println!("{} ({})", res.category, source_label(res.source));
        }

        Command::Rules { command, user } => {
            let owner = user_id(&cfg, user);
            let mut book = state::read_rules(&home, &owner)?;
            match command {
                RulesCommand::List => {
                    if book.rules().is_empty() {
                        println!("No rules for {owner}.");
                    }
                    for r in book.rules() {
                        let kind = if r.is_regex { "regex" } else { "text" };
                        println!("{kind:<5} {} → {}", r.match_text, r.category);
                    }
                }
                RulesCommand::Add {
                    match_text,
                    category,
                    regex,
                } => {
                    let rule = if regex {
                        MerchantRule::regex(match_text, category)
                    } else {
                        MerchantRule::literal(normalize_merchant_key(&match_text), category)
                    };
                    if rule.match_text.is_empty() {
                        bail!("Rule text is empty after normalization");
                    }
                    rule.validate()
                        .with_context(|| format!("invalid regex '{}'", rule.match_text))?;
                    book.upsert(rule);
                    state::write_rules(&home, &book)?;
                    println!("Saved {} rules for {owner}.", book.rules().len());
                }
            }
        }

        Command::Import {
            csv,
            user,
            group,
            date_column,
            amount_column,
            merchant_column,
            category_column,
            remember,
            split_only,
            out,
        } => {
            let source = CsvSource::from_path(&csv)?;
            let mut mapping = source.guess_mapping();
            if let Some(c) = date_column {
                mapping = mapping.with_date(c);
            }
            if let Some(c) = amount_column {
                mapping = mapping.with_amount(c);
            }
            if let Some(c) = merchant_column {
                mapping = mapping.with_merchant(c);
            }
            if let Some(c) = category_column {
                mapping = mapping.with_category(c);
            }
            tracing::debug!(?mapping, "column mapping");

            let rows = source.read_rows()?;
            let batch = normalize_rows(rows, mapping).collect_batch()?;
            if batch.skipped > 0 {
                tracing::info!(skipped = batch.skipped, "rows without a usable date, amount or merchant");
            }

            let owner = user_id(&cfg, user);
            let mut book = state::read_rules(&home, &owner)?;
            let mut review = ImportReview::new(group_id(&cfg, group), owner, batch.rows, &book)
                .with_budget_impact(!split_only);
            if remember {
                review.remember_all();
                let saved = review.save_rules(&mut book);
                state::write_rules(&home, &book)?;
                tracing::info!(saved, "remembered merchant rules");
            }

            let drafts = review.into_drafts(&draft_prefix("import"))?;
            eprintln!("Imported {} drafts. Review them before confirming.", drafts.len());
            emit(out.as_deref(), &drafts)?;
        }

        Command::Confirm { drafts: path } => {
            let mut drafts: Vec<Draft> = state::read_json(&path)?;
            let outcome = confirm_all(&mut drafts);
            state::write_json(&path, &drafts)?;
            print_json(&outcome.confirmed)?;

            if let Some((id, err)) = outcome.failure {
                bail!(
                    "Confirmed {} drafts, stopped at {id}: {err} ({} not attempted)",
                    outcome.confirmed.len(),
                    outcome.untouched
                );
            }
            eprintln!("Confirmed {} drafts.", outcome.confirmed.len());
        }

        Command::Receipt {
            file,
            user,
            group,
            out,
        } => {
            let doc = OcrClient::new(&cfg.ocr)?
                .parse(DocumentKind::Receipt, &file)
                .await?;
            let receipt = extract_receipt(&doc);
            if receipt.is_empty() {
                return Err(ServiceError::NothingDetected("No receipt fields detected.").into());
            }
            let raw = receipt.into_raw_row(today());
            let row = normalize_row(&raw, &ColumnMapping::canonical())
                .context("receipt has no usable total")?;

            let owner = user_id(&cfg, user);
            let book = state::read_rules(&home, &owner)?;
            let drafts: Vec<Draft> = ImportReview::new(group_id(&cfg, group), owner, [row], &book)
                .into_drafts(&draft_prefix("receipt"))?
                .into_iter()
                .map(|d| d.with_source(DraftSource::Receipt).with_receipt_url(file.display().to_string()))
                .collect();
            emit(out.as_deref(), &drafts)?;
        }

        Command::Statement {
            file,
            user,
            group,
            out,
        } => {
            let doc = OcrClient::new(&cfg.ocr)?
                .parse(DocumentKind::Statement, &file)
                .await?;
            let rows = extract_statement_rows(&doc);
            if rows.is_empty() {
                return Err(
                    ServiceError::NothingDetected("No transactions found in this statement.").into(),
                );
            }
            let batch = normalize_rows(rows, ColumnMapping::canonical()).collect_batch()?;

            let owner = user_id(&cfg, user);
            let book = state::read_rules(&home, &owner)?;
            let drafts = ImportReview::new(group_id(&cfg, group), owner, batch.rows, &book)
                .into_drafts(&draft_prefix("statement"))?;
            eprintln!("Parsed {} drafts ({} rows skipped).", drafts.len(), batch.skipped);
            emit(out.as_deref(), &drafts)?;
        }

        Command::Voice {
            audio,
            text,
            user,
            group,
        } => {
            let text = match (text, audio) {
                (Some(t), _) => t,
                (None, Some(path)) => Transcriber::new(&cfg.transcription).transcribe(&path).await?,
                (None, None) => bail!("Pass an audio file or --text"),
            };
            let owner = user_id(&cfg, user);
            let book = state::read_rules(&home, &owner)?;
            let mut draft = voice_draft(&text, &book, group_id(&cfg, group), owner, today())?;
            let expense = draft.confirm()?;
            print_json(&expense)?;
        }

        Command::Config { command } => match command {
            ConfigCommand::Init => {
                let (path, written) = config::init_config(&home)?;
                if written {
                    println!("Wrote {}", path.display());
                } else {
                    println!("Config already exists: {}", path.display());
                }
            }
            ConfigCommand::Show => {
                print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
            }
        },
    }

    Ok(())
}

fn user_id(cfg: &Config, user: Option<String>) -> MemberId {
    MemberId::from(user.unwrap_or_else(|| cfg.profile.user.clone()))
}

fn group_id(cfg: &Config, group: Option<String>) -> String {
    group.unwrap_or_else(|| cfg.profile.group.clone())
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn draft_prefix(kind: &str) -> String {
    format!("{kind}-{}", Local::now().format("%Y%m%d%H%M%S"))
}

fn source_label(source: MatchSource) -> &'static str {
    match source {
        MatchSource::Rule => "your rule",
        MatchSource::Heuristic => "keyword match",
        MatchSource::None => "no match",
    }
}

/// Solo, budget-impacting draft from a spoken sentence.
fn voice_draft(
    text: &str,
    book: &RuleBook,
    group: String,
    owner: MemberId,
    date: NaiveDate,
) -> Result<Draft> {
    let parsed = parse_voice_text(text);
    let Some(amount) = parsed.amount.filter(|a| *a > 0.0) else {
        bail!("Could not find an amount in \"{text}\"");
    };
    let merchant = parsed.merchant.unwrap_or_else(|| text.to_string());
    let res = book.categorize(&merchant);
    let source = match res.source {
        MatchSource::Rule => CategorySource::Rule,
        MatchSource::Heuristic | MatchSource::None => CategorySource::User,
    };

    let draft = Draft::new(
        draft_prefix("voice"),
        group,
        owner.clone(),
        amount,
        date,
        vec![ParticipantShare::solo(owner, amount)],
    )?
    .with_merchant(merchant)
    .with_category(res.category, source)
    .with_budget_impact(true)
    .with_source(DraftSource::Voice)
    .with_notes(text);
    Ok(draft)
}

fn show_balances(path: &Path, period: Option<PeriodKey>, json: bool) -> Result<()> {
    let ledger = state::read_ledger(path)?;
    let expenses: Vec<_> = ledger
        .expenses
        .into_iter()
        .filter(|e| period.is_none_or(|p| e.period_key == p))
        .collect();

    let primary = ledger
        .balances
        .unwrap_or_else(|| expense_balances(&expenses, &ledger.members));
    let reconciled = reconcile(primary, expenses.len(), || {
        fallback_balances(&expenses, &ledger.drafts, &ledger.members)
    });

    if json {
        return print_json(&reconciled.balances);
    }
    if reconciled.source == BalanceSource::Fallback {
        eprintln!("(rebuilt from draft participants)");
    }
    for b in &reconciled.balances {
        let label = Member {
            member_id: b.member_id.clone(),
            display_name: b.display_name.clone(),
        }
        .label();
        println!(
            "{label:<20} paid {:>10}  owes {:>10}  net {:>10}",
            format_amount(b.paid_total),
            format_amount(b.owed_total),
            format_amount(b.net_balance)
        );
    }
    Ok(())
}

fn show_summary(path: &Path, budget: f64, period: PeriodKey, top: usize) -> Result<()> {
    let ledger = state::read_ledger(path)?;
    let in_period: Vec<_> = ledger
        .expenses
        .into_iter()
        .filter(|e| e.period_key == period)
        .collect();

    let s = BudgetSummary::compute(period, budget, &in_period);
    println!("{period}  {}", s.status.label());
    println!(
        "spent {} of {} ({:.0}%), {} left",
        format_amount(s.spent),
        format_amount(s.budget),
        s.percent_used,
        format_amount(s.remaining)
    );

    let impact = impact_breakdown(&in_period);
    println!(
        "budget impact {}, split only {}",
        format_amount(impact.budget_impact),
        format_amount(impact.split_only)
    );

    for c in category_totals(&in_period, top) {
        println!("  {:<16} {:>10}", c.name, format_amount(c.spent));
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn emit<T: Serialize + ?Sized>(out: Option<&Path>, value: &T) -> Result<()> {
    match out {
        Some(p) => state::write_json(p, value),
        None => print_json(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_version_carries_build_sha() {
        let version = Cli::command().render_version();
        let sha = env!("TALLY_BUILD_SHA");
        assert!(!sha.is_empty());
        assert!(version.contains(&format!("({sha})")), "{version}");
    }

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("alice=60"), Ok((MemberId::from("alice"), 60.0)));
        assert_eq!(parse_input(" bob = -5 "), Ok((MemberId::from("bob"), -5.0)));
        assert!(parse_input("carol").is_err());
        assert!(parse_input("carol=lots").is_err());
    }

    #[test]
    fn test_voice_draft_uses_rules_and_confirms() {
        let mut book = RuleBook::new("u-1");
        book.remember("Blue Bottle", "Coffee Budget");
        let date = NaiveDate::from_ymd_opt(2026, 5, 2).unwrap();

        let mut draft = voice_draft("spent 6.25 at Blue Bottle", &book, "g".into(), "u-1".into(), date).unwrap();
        assert_eq!(draft.source, DraftSource::Voice);
        assert!(draft.budget_impact);
        assert_eq!(draft.category.as_deref(), Some("Coffee Budget"));
        assert_eq!(draft.category_source, Some(CategorySource::Rule));

        let expense = draft.confirm().unwrap();
        assert_eq!(expense.amount, 6.25);
        assert_eq!(expense.shares, vec![ParticipantShare::solo("u-1", 6.25)]);
    }

    #[test]
    fn test_voice_draft_needs_an_amount() {
        let date = NaiveDate::from_ymd_opt(2026, 5, 2).unwrap();
        let err = voice_draft("lunch at the diner", &RuleBook::default(), "g".into(), "u-1".into(), date)
            .unwrap_err();
        assert!(err.to_string().contains("Could not find an amount"));
    }

    #[test]
    fn test_cli_parses_split_command() {
        let cli = Cli::try_parse_from([
            "tally", "split", "--total", "90", "--payer", "a", "--members", "a,b,c", "--mode",
            "percent", "--input", "a=50", "--input", "b=25", "--input", "c=25",
        ])
        .unwrap();
        match cli.command {
            Command::Split { members, mode, inputs, .. } => {
                assert_eq!(members, ["a", "b", "c"]);
                assert_eq!(mode, SplitMode::Percent);
                assert_eq!(inputs.len(), 3);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
