//! Leadboard CLI
//!
//! Command-line front end for the outreach dashboard:
//! - Log in and out
//! - Browse and export leads
//! - Run map scrapes and bulk sends with live progress
//! - Manage templates and sender accounts
//! - Review analytics and unread replies

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use leadboard::config::{generate_default_config, Config};
use leadboard::display;
use leadboard::job::JobProgress;
use leadboard::notify::{ConsoleNotifier, Notifier};
use leadboard::outreach::{
    ApiClient, ClientError, NewEmailAccount, NewLead, RephraseRequest, Session, TokenStore,
};
use leadboard::workflows::{
    load_attachment, parse_split, BulkSender, MapsProvider, ScrapeRunner, SendContext,
};

#[derive(Parser)]
#[command(name = "leadboard")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Terminal dashboard for lead generation and email outreach")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the usual locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Outreach API URL, overriding the config
    #[arg(long, global = true)]
    pub base_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and store the access token
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
    },

    /// Forget the stored access token
    Logout,

    /// Print a default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List recent unsent leads
    Leads {
        #[arg(short, long, default_value_t = 10)]
        limit: u32,
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Add a lead by hand
    AddLead {
        #[arg(long, default_value = "")]
        company: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, default_value = "")]
        owner: String,
    },

    /// Scrape businesses from Google or Bing maps
    Scrape {
        /// google or bing
        provider: MapsProvider,
        /// Search query, e.g. "bakeries in Leeds"
        query: String,
        /// Number of businesses to collect (1-100)
        #[arg(short, long, default_value_t = 10)]
        max: u32,
    },

    /// Send emails to unsent leads
    Send {
        /// TEMPLATE_ID=COUNT, repeatable; the first split's template is used
        #[arg(short, long, required = true)]
        split: Vec<String>,
        /// PDF to attach, repeatable
        #[arg(short, long)]
        attach: Vec<PathBuf>,
        /// Sender account id, repeatable (default: all accounts)
        #[arg(long)]
        account: Vec<String>,
    },

    /// Manage email templates
    Templates {
        #[command(subcommand)]
        command: TemplateCommand,
    },

    /// Manage sender accounts
    Accounts {
        #[command(subcommand)]
        command: AccountCommand,
    },

    /// Show unread replies
    Unread,

    /// Show lead and email statistics
    Analytics {
        /// 7, 30 or 90
        #[arg(short, long, default_value_t = 30, value_parser = parse_days)]
        days: u32,
    },
}

#[derive(Subcommand)]
pub enum TemplateCommand {
    List,
    /// Draft a template from a description
    Create { prompt: String },
    /// Rewrite a template body
    Rephrase {
        template_id: String,
        /// Text to rewrite (default: the template's content)
        #[arg(long)]
        content: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AccountCommand {
    List,
    Add {
        #[arg(long)]
        email: String,
        /// App password for the mailbox
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "")]
        sender_name: String,
        #[arg(long, default_value_t = 0)]
        daily_limit: u32,
    },
    /// Reset an account's daily counter
    Reset { id: String },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Table,
    Csv,
    Json,
}

fn parse_days(raw: &str) -> Result<u32, String> {
    match raw.parse::<u32>() {
        Ok(days @ (7 | 30 | 90)) => Ok(days),
        _ => Err("expected 7, 30 or 90".to_string()),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match Config::load_with_env(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(2);
            }
        },
        None => Config::load_default(),
    };
    if let Some(url) = &cli.base_url {
        config.api.base_url = url.clone();
    }

    leadboard::logging::init(&config.logging);
    tracing::debug!(base_url = %config.api.base_url, "Leadboard v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(cli.command, config).await {
        let client_error = match e.downcast_ref::<Reported>() {
            Some(Reported(inner)) => Some(inner),
            None => {
                eprintln!("Error: {:#}", e);
                e.downcast_ref::<ClientError>()
            }
        };
        if client_error.is_some_and(ClientError::is_auth) {
            eprintln!("Run `leadboard login` to sign in.");
        }
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: Config) -> anyhow::Result<()> {
    let notifier: Arc<dyn Notifier> = Arc::new(ConsoleNotifier);

    match command {
        Commands::Login { username, password } => {
            let login = ApiClient::login(
                &config.api.base_url,
                config.api.request_timeout(),
                &username,
                &password,
            )
            .await?;
            let store = TokenStore::new(&config.auth.token_file);
            store.save(&login.access_token, &login.token_type)?;
            notifier.success("Logged in");
            tracing::info!(path = ?store.path(), "Token saved");
        }

        Commands::Logout => {
            let store = TokenStore::new(&config.auth.token_file);
            if store.clear()? {
                notifier.success("Logged out");
            } else {
                notifier.info("No stored token");
            }
        }

        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &content)
                        .with_context(|| format!("writing {:?}", path))?;
                    println!("Config written to {:?}", path);
                }
                None => print!("{}", content),
            }
        }

        Commands::Leads { limit, format } => {
            let client = connect(&config)?;
            let leads = client.unsent_leads(limit).await?;
            match format {
                OutputFormat::Table => print!("{}", display::leads_table(&leads)),
                OutputFormat::Csv => print!("{}", display::leads_csv(&leads)?),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&leads)?),
            }
        }

        Commands::AddLead {
            company,
            phone,
            email,
            owner,
        } => {
            let client = connect(&config)?;
            let lead = NewLead {
                company_name: company,
                contact_number: phone,
                email,
                owner_name: owner,
            };
            let saved = client.add_lead(&lead).await.map_err(|e| report(&*notifier, e))?;
            notifier.success("Lead added successfully!");
            tracing::debug!(id = %saved.id, "Lead created");
        }

        Commands::Scrape {
            provider,
            query,
            max,
        } => {
            let client = match connect(&config) {
                Ok(client) => client,
                Err(ClientError::MissingAuthToken) => {
                    bail!("Please log in to start scraping")
                }
                Err(e) => return Err(e.into()),
            };

            let runner = ScrapeRunner::new(client, notifier.clone(), config.polling.scrape_interval());
            let follower = follow(runner.subscribe(), display::scrape_status_message);

            let result = match runner.start(provider, &query, max).await {
                Ok(job) => job.finish().await,
                Err(e) => Err(e),
            };
            drop(runner);
            if let Err(e) = follower.await {
                tracing::warn!(error = %e, "Progress display task failed");
            }

            let report = result.map_err(Reported)?;
            if !report.leads.is_empty() {
                print!("{}", display::leads_table(&report.leads));
            }
        }

        Commands::Send {
            split,
            attach,
            account,
        } => {
            let client = connect(&config)?;
            let mut ctx = SendContext::load(&client)
                .await
                .map_err(|e| report(&*notifier, e))?;

            for (i, raw) in split.iter().enumerate() {
                let (template_id, count) = parse_split(raw)?;
                if ctx.template(&template_id).is_none() {
                    bail!("Unknown template: {}", template_id);
                }
                if i > 0 {
                    ctx.distribution
                        .add(ctx.templates.first().map(|t| t.id.as_str()))?;
                }
                ctx.distribution.set_template(i, &template_id)?;
                let stored = ctx.distribution.set_count(i, count)?;
                if stored < count {
                    notifier.info(&format!(
                        "Only {} unsent leads available; {} gets {}",
                        ctx.total_leads, template_id, stored
                    ));
                }
            }

            if !account.is_empty() {
                ctx.select_accounts(&account)?;
            }

            let mut attachments = Vec::with_capacity(attach.len());
            for path in &attach {
                attachments.push(load_attachment(path).await.map_err(|e| report(&*notifier, e))?);
            }

            print!("{}", display::accounts_summary(&ctx.accounts));

            let sender = BulkSender::new(
                client,
                notifier.clone(),
                config.polling.send_interval(),
                config.polling.send_max_attempts,
            );
            let follower = follow(sender.subscribe(), display::send_status_message);
            let result = sender.send(&mut ctx, attachments).await;
            drop(sender);
            if let Err(e) = follower.await {
                tracing::warn!(error = %e, "Progress display task failed");
            }

            let sent = result.map_err(Reported)?;
            println!(
                "{} emails queued; {} unsent leads left",
                sent.requested, ctx.total_leads
            );
        }

        Commands::Templates { command } => {
            let client = connect(&config)?;
            match command {
                TemplateCommand::List => {
                    let templates = client.templates().await?;
                    print!("{}", display::templates_table(&templates));
                }
                TemplateCommand::Create { prompt } => {
                    let mut ctx = SendContext::load(&client).await?;
                    let saved = ctx
                        .create_template(&client, &prompt)
                        .await
                        .map_err(|e| report(&*notifier, e))?;
                    notifier.success("Template created!");
                    println!("{}  {}", saved.id, saved.name);
                }
                TemplateCommand::Rephrase {
                    template_id,
                    content,
                } => {
                    let content = match content {
                        Some(content) => content,
                        None => client
                            .templates()
                            .await?
                            .into_iter()
                            .find(|t| t.id == template_id)
                            .map(|t| t.content)
                            .with_context(|| format!("Unknown template: {}", template_id))?,
                    };
                    let request = RephraseRequest {
                        template_id,
                        content,
                    };
                    let rewritten = client
                        .rephrase_email(&request)
                        .await
                        .map_err(|e| report(&*notifier, e))?;
                    println!("{}", rewritten);
                }
            }
        }

        Commands::Accounts { command } => {
            let client = connect(&config)?;
            let mut ctx = SendContext::load(&client).await?;
            match command {
                AccountCommand::List => {}
                AccountCommand::Add {
                    email,
                    password,
                    sender_name,
                    daily_limit,
                } => {
                    let account = NewEmailAccount {
                        email,
                        password,
                        sender_name,
                        daily_limit,
                    };
                    ctx.add_account(&client, &account)
                        .await
                        .map_err(|e| report(&*notifier, e))?;
                    notifier.success("Email account added!");
                }
                AccountCommand::Reset { id } => {
                    ctx.reset_account(&client, &id)
                        .await
                        .map_err(|e| report(&*notifier, e))?;
                    notifier.success("Account reset successfully!");
                }
            }
            print!(
                "{}",
                display::accounts_table(&ctx.accounts, &ctx.selected_accounts)
            );
        }

        Commands::Unread => {
            let client = connect(&config)?;
            let emails = client.unread_emails().await?;
            print!("{}", display::unread_list(&emails));
        }

        Commands::Analytics { days } => {
            let client = connect(&config)?;
            let (summary, stats) =
                futures_util::future::try_join(client.analytics_summary(), client.daily_stats(days))
                    .await?;
            print!("{}", display::analytics_report(&summary, &stats, days));
        }
    }

    Ok(())
}

fn connect(config: &Config) -> Result<ApiClient, ClientError> {
    let session = Session::from_config(config)?;
    ApiClient::new(session, config.api.request_timeout())
}

/// An error the notifier has already shown
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct Reported(ClientError);

/// Surface an error as a notification
fn report(notifier: &dyn Notifier, error: ClientError) -> Reported {
    notifier.error(&error.to_string());
    Reported(error)
}

/// Draw a progress bar that follows a job until it ends or its sender
/// goes away
fn follow(
    mut progress: watch::Receiver<JobProgress>,
    status: fn(&JobProgress) -> String,
) -> JoinHandle<()> {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    tokio::spawn(async move {
        loop {
            let current = *progress.borrow_and_update();
            bar.set_position(u64::from(current.rounded_percentage()));
            bar.set_message(status(&current));
            if current.status.is_terminal() {
                break;
            }
            if progress.changed().await.is_err() {
                break;
            }
        }
        bar.finish();
    })
}
