use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{
    config::load_settings_from, format_file_size, load_settings, ArtifactClient, ClientSettings,
    Navigator, SortDirection, SortField, SortState, UploadFile, UploadStatus, View, ViewQuery,
};
use shared::domain::{Artifact, ArtifactId};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "artifact-cli", about = "Browse and manage artifacts on the catalog backend")]
struct Cli {
    /// Settings file; defaults to client.toml in the working directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[arg(long, global = true)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        username: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    Whoami,
    List {
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, value_enum, default_value_t = SortArg::Uploaded)]
        sort: SortArg,
        #[arg(long, value_enum)]
        order: Option<OrderArg>,
        #[arg(long)]
        json: bool,
    },
    Show {
        id: String,
        #[arg(long)]
        json: bool,
    },
    Upload {
        path: PathBuf,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
    },
    Download {
        id: String,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    Delete {
        id: String,
    },
    /// Prints the direct download link without contacting the backend.
    Url {
        id: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SortArg {
    Name,
    Size,
    Uploaded,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OrderArg {
    Asc,
    Desc,
}

/// Upload time defaults to newest first; every other field to ascending.
fn sort_state(sort: SortArg, order: Option<OrderArg>) -> SortState {
    let field = match sort {
        SortArg::Name => SortField::Name,
        SortArg::Size => SortField::FileSize,
        SortArg::Uploaded => SortField::UploadTime,
    };
    let direction = match (order, field) {
        (Some(OrderArg::Asc), _) => SortDirection::Ascending,
        (Some(OrderArg::Desc), _) => SortDirection::Descending,
        (None, SortField::UploadTime) => SortDirection::Descending,
        (None, _) => SortDirection::Ascending,
    };
    SortState::new(field, direction)
}

fn resolve_settings(cli: &Cli) -> ClientSettings {
    let mut settings = match &cli.config {
        Some(path) => load_settings_from(path),
        None => load_settings(),
    };
    if let Some(api_url) = &cli.api_url {
        settings.api_base_url = api_url.clone();
    }
    if let Some(database_url) = &cli.database_url {
        settings.database_url = database_url.clone();
    }
    settings
}

/// Terminal stand-in for view navigation: a redirect to the login view is
/// reported to the user.
struct ConsoleNavigator {
    current: Mutex<View>,
}

impl ConsoleNavigator {
    fn new() -> Self {
        Self {
            current: Mutex::new(View::Dashboard),
        }
    }
}

impl Navigator for ConsoleNavigator {
    fn current(&self) -> View {
        self.current
            .lock()
            .map(|view| view.clone())
            .unwrap_or(View::Login)
    }

    fn navigate(&self, view: View) {
        if view == View::Login {
            eprintln!("session expired; run `artifact-cli login` to sign in again");
        }
        if let Ok(mut current) = self.current.lock() {
            *current = view;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = resolve_settings(&cli);
    let client = ArtifactClient::open(&settings, Arc::new(ConsoleNavigator::new())).await?;

    match cli.command {
        Command::Login { username, password } => {
            let user = client.session().login(&username, &password).await?;
            println!("signed in as {} ({:?})", user.username, user.role);
        }
        Command::Logout => {
            client.session().initialize().await;
            client.session().logout().await;
            println!("signed out");
        }
        Command::Url { id } => {
            println!("{}", client.download_url(&ArtifactId::new(id)));
        }
        command => {
            require_session(&client).await?;
            run_authenticated(&client, command).await?;
        }
    }

    Ok(())
}

async fn require_session(client: &ArtifactClient) -> Result<()> {
    client.session().initialize().await;
    if client.session().guard(View::Dashboard) == View::Login {
        bail!("not signed in; run `artifact-cli login <username> --password <password>`");
    }
    Ok(())
}

async fn run_authenticated(client: &ArtifactClient, command: Command) -> Result<()> {
    match command {
        Command::Whoami => {
            let user = client
                .session()
                .current_user()
                .context("session has no user")?;
            println!("{} ({}) role={:?}", user.username, user.id, user.role);
        }
        Command::List {
            search,
            sort,
            order,
            json,
        } => {
            client.catalog().refresh().await;
            let snapshot = client.catalog().snapshot();
            if let Some(error) = snapshot.error {
                bail!(error);
            }
            let query = ViewQuery {
                search_term: search,
                sort: sort_state(sort, order),
            };
            let view = snapshot.view(&query);
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_table(&view);
            }
        }
        Command::Show { id, json } => {
            let artifact = client.catalog().load_detail(&ArtifactId::new(id)).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&artifact)?);
            } else {
                print_detail(client, &artifact);
            }
        }
        Command::Upload {
            path,
            name,
            description,
        } => {
            let file = UploadFile::from_path(&path).await?;
            let mut flow = client.upload_flow();
            flow.select_file(file);
            if let Some(name) = name {
                flow.set_name(name);
            }
            flow.set_description(description);

            let mut progress = flow.subscribe();
            let reporter = tokio::spawn(async move {
                while progress.changed().await.is_ok() {
                    let snapshot = progress.borrow_and_update().clone();
                    if snapshot.status == UploadStatus::InFlight {
                        eprint!("\ruploading... {:>3}%", snapshot.progress_percent);
                    }
                }
            });
            let result = flow.submit().await;
            reporter.abort();
            eprintln!();

            let artifact = result?;
            println!("uploaded {} as {}", artifact.name, artifact.id);
        }
        Command::Download { id, output } => {
            let id = ArtifactId::new(id);
            let bytes = client.gateway().download_artifact(&id).await?;
            let output = output.unwrap_or_else(|| PathBuf::from(id.as_str()));
            tokio::fs::write(&output, &bytes)
                .await
                .with_context(|| format!("failed to write '{}'", output.display()))?;
            println!(
                "saved {} to {}",
                format_file_size(bytes.len() as u64),
                output.display()
            );
        }
        Command::Delete { id } => {
            let id = ArtifactId::new(id);
            client.catalog().remove(&id).await?;
            println!("deleted {id}");
        }
        Command::Login { .. } | Command::Logout | Command::Url { .. } => {
            bail!("command does not run inside a recovered session")
        }
    }
    Ok(())
}

fn print_table(artifacts: &[Artifact]) {
    if artifacts.is_empty() {
        println!("no artifacts");
        return;
    }
    println!("{:<24} {:<32} {:>10}  {}", "ID", "NAME", "SIZE", "UPLOADED");
    for artifact in artifacts {
        println!(
            "{:<24} {:<32} {:>10}  {}",
            artifact.id,
            artifact.name,
            format_file_size(artifact.file_size),
            artifact.upload_time.format("%Y-%m-%d %H:%M")
        );
    }
}

fn print_detail(client: &ArtifactClient, artifact: &Artifact) {
    println!("id:          {}", artifact.id);
    println!("name:        {}", artifact.name);
    if !artifact.description.is_empty() {
        println!("description: {}", artifact.description);
    }
    println!("size:        {}", format_file_size(artifact.file_size));
    if let Some(sha256) = &artifact.sha256 {
        println!("sha256:      {sha256}");
    }
    println!("uploaded:    {}", artifact.upload_time.to_rfc3339());
    println!("owner:       {}", artifact.owner_id);
    println!("download:    {}", client.download_url(&artifact.id));
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
