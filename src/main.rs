use anyhow::{anyhow, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::sync::Mutex;
use tracing::{info, warn};

use passiify_admin::api::routing::classify;
use passiify_admin::api::ApiClient;
use passiify_admin::config;
use passiify_admin::credentials::CredentialStore;
use passiify_admin::db::SqliteCredentialStore;
use passiify_admin::model::{PayoutTarget, Role, Tab};
use passiify_admin::settlement::{format_inr, Page, SettlementRow};
use passiify_admin::view::{
    AutoConfirm, Confirmation, FetchOutcome, MarkPaidOutcome, PayoutConfirmation, PayoutPrompt,
    SettlementView,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Passiify settlement console")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Store a bearer token for a role
    Login {
        #[arg(long, value_parser = parse_role)]
        role: Role,
        #[arg(long)]
        token: String,
    },
    /// Forget the bearer token of a role
    Logout {
        #[arg(long, value_parser = parse_role)]
        role: Role,
    },
    /// Show which credential a request path would carry
    Route { path: String },
    /// Fetch the settlement overview and print one page
    Overview {
        #[arg(long, default_value = "gyms", value_parser = parse_tab)]
        tab: Tab,
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long)]
        min_net: Option<f64>,
        #[arg(long, default_value = "1")]
        page: usize,
    },
    /// Record a payout to a gym or event host
    MarkPaid {
        #[arg(long, value_parser = parse_target)]
        target: PayoutTarget,
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        amount: f64,
        /// Free-text note stored with the payout
        #[arg(long)]
        note: Option<String>,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

fn parse_role(s: &str) -> Result<Role, String> {
    Role::parse_role(s).ok_or_else(|| format!("unknown role '{}'", s))
}

fn parse_tab(s: &str) -> Result<Tab, String> {
    Tab::parse_tab(s).ok_or_else(|| format!("unknown tab '{}'", s))
}

fn parse_target(s: &str) -> Result<PayoutTarget, String> {
    PayoutTarget::parse_target(s).ok_or_else(|| format!("unknown payout target '{}'", s))
}

/// Asks on a line-oriented reader (stdin in the binary). One reader serves
/// both questions so piped answers are not lost between them. An optional
/// note is read when no `--note` was given.
struct PromptConfirm<R> {
    note: Option<String>,
    lines: Mutex<Lines<R>>,
}

impl<R: AsyncBufRead + Unpin> PromptConfirm<R> {
    fn new(reader: R, note: Option<String>) -> Self {
        Self {
            note,
            lines: Mutex::new(reader.lines()),
        }
    }

    async fn ask(&self, prompt: &str) -> Option<String> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(prompt.as_bytes()).await.ok()?;
        stdout.flush().await.ok()?;
        self.lines.lock().await.next_line().await.ok().flatten()
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> PayoutConfirmation for PromptConfirm<R> {
    async fn confirm(&self, prompt: &PayoutPrompt) -> Confirmation {
        let answer = self.ask(&format!("{} [y/N] ", prompt.message())).await;
        let approved = answer
            .map(|a| matches!(a.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
            .unwrap_or(false);
        if !approved {
            return Confirmation::Declined;
        }
        let note = match &self.note {
            Some(note) => note.clone(),
            None => self.ask("Note (optional): ").await.unwrap_or_default(),
        };
        Confirmation::Approved { note }
    }
}

fn print_page<R: SettlementRow>(page: &Page<R>, describe: impl Fn(&R) -> String) {
    if page.is_empty_result() {
        println!("No partners match the current filters. Clear the search or threshold to see all rows.");
        return;
    }
    for row in &page.rows {
        println!(
            "  {:<28} {:>16}  {}",
            row.display_name(),
            format_inr(row.net_payable()),
            describe(row)
        );
    }
    println!(
        "page {}/{} ({} rows)",
        page.page, page.total_pages, page.total_rows
    );
}

fn report_login(role: Role) {
    warn!(%role, "credential rejected by backend");
    println!(
        "Session expired. Log in again at {} (passiify-admin login --role {}).",
        role.login_path(),
        role
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let store = Arc::new(SqliteCredentialStore::open(&cfg.credentials_database_url()).await?);

    match args.command {
        Command::Login { role, token } => {
            store.set(role, &token).await?;
            println!("Stored {} credential.", role);
        }
        Command::Logout { role } => {
            store.clear(role).await?;
            println!("Cleared {} credential.", role);
        }
        Command::Route { path } => {
            let client = ApiClient::from_config(&cfg, store.clone())?;
            let rule = classify(&path);
            let selected = client.select_credential(&path).await;
            println!("url:   {}", client.endpoint(&path)?);
            println!("class: {}", rule.class);
            match selected {
                Some((role, _)) => println!("token: {}", role),
                None => println!("token: none"),
            }
        }
        Command::Overview {
            tab,
            search,
            min_net,
            page,
        } => {
            let client = Arc::new(ApiClient::from_config(&cfg, store.clone())?);
            let view = SettlementView::with_page_size(client, store, cfg.settlement.page_size);
            view.set_tab(tab);
            view.set_search(&search);
            view.set_min_net(min_net);
            view.set_page(page);

            match view.fetch_overview().await {
                FetchOutcome::Loaded => {}
                FetchOutcome::LoginRequired(role) => {
                    report_login(role);
                    return Ok(());
                }
                FetchOutcome::Failed(message) => return Err(anyhow!(message)),
                FetchOutcome::Discarded => return Ok(()),
            }

            if let Some(m) = view.metrics() {
                println!("Gross collected:  {}", format_inr(m.total_gross));
                println!(
                    "Fees retained:    {} ({}% take rate)",
                    format_inr(m.total_fees),
                    m.effective_take_rate
                );
                println!("Net payable:      {}", format_inr(m.total_net_payable));
                println!("Partners:         {}", m.total_partners);
                println!();
            }

            match tab {
                Tab::Gyms => {
                    if let Some(p) = view.gym_page() {
                        print_page(&p, |g| {
                            format!(
                                "{} · {} bookings · id {}",
                                g.city.as_deref().unwrap_or("-"),
                                g.total_bookings,
                                g.gym_id
                            )
                        });
                    }
                }
                Tab::Events => {
                    if let Some(p) = view.event_page() {
                        print_page(&p, |e| {
                            format!(
                                "{} · {} · {} tickets · id {}",
                                e.organizer.as_deref().unwrap_or("-"),
                                e.event_day()
                                    .map(|d| d.format("%d %b %Y").to_string())
                                    .unwrap_or_else(|| "-".into()),
                                e.tickets_sold,
                                e.event_id
                            )
                        });
                    }
                }
            }
        }
        Command::MarkPaid {
            target,
            id,
            name,
            amount,
            note,
            yes,
        } => {
            let client = Arc::new(ApiClient::from_config(&cfg, store.clone())?);
            let view = SettlementView::with_page_size(client, store, cfg.settlement.page_size);
            let confirmation: Box<dyn PayoutConfirmation> = if yes {
                Box::new(AutoConfirm {
                    note: note.unwrap_or_default(),
                })
            } else {
                Box::new(PromptConfirm::new(BufReader::new(tokio::io::stdin()), note))
            };

            match view
                .mark_as_paid(target, &id, &name, amount, confirmation.as_ref())
                .await
            {
                MarkPaidOutcome::Paid { message, refresh } => {
                    info!(?refresh, "settlement refreshed after payout");
                    println!(
                        "{}",
                        message.unwrap_or_else(|| format!("Marked {} as paid.", name))
                    );
                    if let FetchOutcome::Failed(msg) = refresh {
                        println!("Refresh failed: {}", msg);
                    }
                }
                MarkPaidOutcome::Invalid(message) => return Err(anyhow!(message)),
                MarkPaidOutcome::Declined => println!("Cancelled."),
                MarkPaidOutcome::InFlight => println!("A payout for this partner is already in progress."),
                MarkPaidOutcome::Failed(message) => return Err(anyhow!(message)),
                MarkPaidOutcome::LoginRequired(role) => report_login(role),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt() -> PayoutPrompt {
        PayoutPrompt {
            target: PayoutTarget::Gym,
            id: "g1".into(),
            display_name: "Iron Gym".into(),
            amount: 2400.0,
        }
    }

    #[tokio::test]
    async fn piped_answer_and_note_are_both_read() {
        let confirm = PromptConfirm::new(&b"y\nUTR 12\n"[..], None);
        assert_eq!(
            confirm.confirm(&prompt()).await,
            Confirmation::Approved {
                note: "UTR 12".into()
            }
        );
    }

    #[tokio::test]
    async fn note_flag_skips_second_question() {
        let confirm = PromptConfirm::new(&b"yes\nignored\n"[..], Some("from flag".into()));
        assert_eq!(
            confirm.confirm(&prompt()).await,
            Confirmation::Approved {
                note: "from flag".into()
            }
        );
    }

    #[tokio::test]
    async fn anything_but_yes_declines() {
        let confirm = PromptConfirm::new(&b"n\n"[..], None);
        assert_eq!(confirm.confirm(&prompt()).await, Confirmation::Declined);

        let confirm = PromptConfirm::new(&b""[..], None);
        assert_eq!(confirm.confirm(&prompt()).await, Confirmation::Declined);
    }
}
