use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use formsync::prelude::*;

#[derive(Parser)]
#[command(name = "formsync")]
#[command(about = "Offline-first form submission store with background sync")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the local store
    Init {
        /// Store path
        #[arg(long, default_value = ".formsync", env = "FORMSYNC_PATH")]
        path: PathBuf,
    },

    /// Print the anonymous identifier for this device
    UserId {
        #[arg(long, default_value = ".formsync", env = "FORMSYNC_PATH")]
        path: PathBuf,
    },

    /// Create a submission from a schema file and field values
    Submit {
        /// Path to the form schema JSON file
        #[arg(long)]
        schema: PathBuf,

        /// Field values as key=value pairs
        #[arg(value_name = "KEY=VALUE", required = true)]
        fields: Vec<String>,

        #[arg(long, default_value = ".formsync", env = "FORMSYNC_PATH")]
        path: PathBuf,
    },

    /// List submissions for this device, newest first
    List {
        #[arg(long, default_value = ".formsync", env = "FORMSYNC_PATH")]
        path: PathBuf,
    },

    /// Run one manual sync against the remote sink
    Sync {
        /// Base URL of the remote sink
        #[arg(long, env = "FORMSYNC_API_URL")]
        api_url: Option<String>,

        /// Optional TOML config file
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, default_value = ".formsync", env = "FORMSYNC_PATH")]
        path: PathBuf,
    },

    /// Delete a submission
    Delete {
        /// Submission id
        id: String,

        #[arg(long, default_value = ".formsync", env = "FORMSYNC_PATH")]
        path: PathBuf,
    },

    /// Show or clear the saved draft for a form
    Draft {
        /// Form id
        form_id: String,

        /// Delete the draft instead of showing it
        #[arg(long)]
        clear: bool,

        #[arg(long, default_value = ".formsync", env = "FORMSYNC_PATH")]
        path: PathBuf,
    },
}

struct Stack {
    drafts: Arc<DraftManager>,
    repo: Arc<SubmissionRepository>,
    identity: Arc<IdentityProvider>,
}

fn open_stack(path: &PathBuf, config: &SyncConfig) -> anyhow::Result<Stack> {
    let store = Arc::new(LocalStore::open(path).context("opening local store")?);
    let identity = Arc::new(IdentityProvider::new(Arc::clone(&store)));
    let drafts = Arc::new(DraftManager::new(
        Arc::clone(&store),
        config.draft_debounce(),
    ));
    let repo = Arc::new(SubmissionRepository::new(
        store,
        Arc::clone(&identity),
        Arc::clone(&drafts),
    ));
    Ok(Stack {
        drafts,
        repo,
        identity,
    })
}

fn parse_fields(pairs: &[String]) -> anyhow::Result<indexmap::IndexMap<String, String>> {
    let mut fields = indexmap::IndexMap::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("field '{}' is not in key=value form", pair);
        };
        fields.insert(key.to_string(), value.to_string());
    }
    Ok(fields)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = SyncConfig::default();

    match cli.command {
        Commands::Init { path } => {
            LocalStore::open(&path).context("initializing local store")?;
            println!("Initialized store at {}", path.display());
            Ok(())
        }
        Commands::UserId { path } => {
            let stack = open_stack(&path, &config)?;
            println!("{}", stack.identity.user_id()?);
            Ok(())
        }
        Commands::Submit {
            schema,
            fields,
            path,
        } => {
            let stack = open_stack(&path, &config)?;
            let raw = std::fs::read_to_string(&schema)
                .with_context(|| format!("reading schema file {}", schema.display()))?;
            let schema = FormSchema::parse(serde_json::from_str(&raw)?)?;
            let form_data = parse_fields(&fields)?;

            let id = stack.repo.create(&schema, form_data)?;
            println!("Saved submission {} (pending sync)", id);
            Ok(())
        }
        Commands::List { path } => {
            let stack = open_stack(&path, &config)?;
            let submissions = stack.repo.get_all()?;
            if submissions.is_empty() {
                println!("No submissions.");
                return Ok(());
            }
            for sub in submissions {
                let state = match sub.synced {
                    SyncState::Pending => "pending".to_string(),
                    SyncState::Synced => "synced".to_string(),
                    SyncState::Failed => {
                        format!("failed ({} retries)", sub.retry_count)
                    }
                };
                println!(
                    "{}  {}  {}  [{}]",
                    sub.submitted_at.format("%Y-%m-%d %H:%M"),
                    sub.id,
                    sub.form_title,
                    state
                );
            }
            Ok(())
        }
        Commands::Sync {
            api_url,
            config: config_path,
            path,
        } => {
            let mut config = match config_path {
                Some(p) => SyncConfig::from_file(p)?,
                None => config,
            };
            if let Some(url) = api_url {
                config.api_url = url;
            }

            let stack = open_stack(&path, &config)?;
            let connectivity = Connectivity::new(true);
            let sink = Arc::new(HttpSink::new(&config.api_url, config.request_timeout())?);
            let engine = SyncEngine::new(
                Arc::clone(&stack.repo),
                sink,
                connectivity,
                config.retry_policy(),
            );

            match engine.sync_once(SyncTrigger::Manual).await {
                SyncOutcome::Completed {
                    synced_count,
                    failed_count,
                    ..
                } => {
                    println!("Synced {} submission(s), {} rejected", synced_count, failed_count);
                    Ok(())
                }
                SyncOutcome::Skipped(reason) => {
                    println!("Sync skipped: {:?}", reason);
                    Ok(())
                }
                SyncOutcome::TransportFailed(e) => {
                    bail!("sink unreachable: {} (submissions remain pending)", e)
                }
                SyncOutcome::StoreFailed(e) => bail!("local store error: {}", e),
            }
        }
        Commands::Delete { id, path } => {
            let stack = open_stack(&path, &config)?;
            stack.repo.delete(&id)?;
            println!("Deleted {}", id);
            Ok(())
        }
        Commands::Draft {
            form_id,
            clear,
            path,
        } => {
            let stack = open_stack(&path, &config)?;
            if clear {
                stack.drafts.clear(&form_id)?;
                println!("Cleared draft for {}", form_id);
                return Ok(());
            }
            match stack.drafts.load(&form_id)? {
                Some(draft) => {
                    println!("Draft for {} saved at {}:", form_id, draft.saved_at);
                    for (key, value) in &draft.form_data {
                        println!("  {} = {}", key, value);
                    }
                }
                None => println!("No draft for {}", form_id),
            }
            Ok(())
        }
    }
}
