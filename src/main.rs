use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use cma_autofill_lib::api::{ApiClient, ApiError, ErrorPresentation};
use cma_autofill_lib::config::{self, ApiConfig, DEFAULT_API_URL, ENV_ACCESS_TOKEN, ENV_API_URL};
use cma_autofill_lib::models::{
    categories_in_group, find_category, BulkResolvePayload, ClientListParams, EntityType, LoanType,
    PipelineAck, PipelineStatus, ProjectListParams, ReviewListParams, ReviewResolvePayload,
    ReviewStatus,
};
use cma_autofill_lib::pipeline::{render_stepper, PollEvent};
use cma_autofill_lib::query_cache::QueryCache;
use cma_autofill_lib::service::DashboardService;
use cma_autofill_lib::session::{Session, SessionStore};
use cma_autofill_lib::validation::{self, ClientDraft, ProjectDraft};
use cma_autofill_lib::views::{self, NoticeLevel, TabNavigator};

#[derive(Parser)]
#[command(name = "cma-autofill", version, about = "CMA AutoFill dashboard client")]
struct Cli {
    /// Backend base URL
    #[arg(long, global = true, env = ENV_API_URL, default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Bearer token from the identity provider
    #[arg(long, global = true, env = ENV_ACCESS_TOKEN, hide_env_values = true)]
    token: Option<String>,

    /// Print raw JSON instead of formatted output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Dashboard stat tiles and status breakdown
    Stats,
    /// Signed-in user
    Me,
    #[command(subcommand)]
    Clients(ClientCommand),
    #[command(subcommand)]
    Projects(ProjectCommand),
    /// Start the pipeline for a project
    Process { project: String },
    /// Retry a failed pipeline
    Retry { project: String },
    /// Resume a pipeline paused for review
    Resume { project: String },
    /// Follow pipeline progress until it stops
    Watch { project: String },
    #[command(subcommand)]
    Files(FileCommand),
    #[command(subcommand)]
    Review(ReviewCommand),
}

#[derive(Subcommand)]
enum ClientCommand {
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        entity_type: Option<EntityType>,
        #[arg(long)]
        page: Option<u32>,
    },
    Show { id: String },
    Create(ClientArgs),
    Delete { id: String },
}

#[derive(Args)]
struct ClientArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    entity_type: Option<EntityType>,
    #[arg(long, default_value = "")]
    pan: String,
    #[arg(long, default_value = "")]
    gst: String,
    #[arg(long, default_value = "")]
    contact_person: String,
    #[arg(long, default_value = "")]
    email: String,
    #[arg(long, default_value = "")]
    phone: String,
    #[arg(long, default_value = "")]
    address: String,
}

#[derive(Subcommand)]
enum ProjectCommand {
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        status: Option<PipelineStatus>,
        #[arg(long)]
        client: Option<String>,
        #[arg(long)]
        page: Option<u32>,
    },
    Show { id: String },
    Create {
        #[arg(long)]
        client: String,
        /// Financial year, e.g. 2024-25. Defaults to the current one.
        #[arg(long)]
        financial_year: Option<String>,
        #[arg(long, default_value = "")]
        bank: String,
        #[arg(long)]
        loan_type: Option<LoanType>,
        #[arg(long)]
        loan_amount: Option<f64>,
    },
    Delete { id: String },
}

#[derive(Subcommand)]
enum FileCommand {
    List { project: String },
    Upload {
        project: String,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    Delete { project: String, file: String },
    Download {
        project: String,
        /// Target directory (defaults to the user's download folder)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ReviewCommand {
    List {
        #[arg(long)]
        project: Option<String>,
        #[arg(long, default_value = "pending")]
        status: ReviewStatus,
    },
    Resolve {
        id: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        subcategory: Option<String>,
    },
    BulkResolve {
        #[arg(long)]
        category: String,
        #[arg(long)]
        subcategory: Option<String>,
        #[arg(required = true)]
        ids: Vec<String>,
    },
    ApproveAll,
    /// Categories a classification can be corrected to
    Categories,
    CmaRows {
        #[arg(long)]
        entity_type: Option<EntityType>,
    },
}

#[tokio::main]
async fn main() {
    cma_autofill_lib::init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        report(&e);
        std::process::exit(1);
    }
}

fn report(err: &anyhow::Error) {
    match err.downcast_ref::<ApiError>().map(ApiError::presentation) {
        Some(ErrorPresentation::RedirectToLogin) => {
            eprintln!("Not signed in or session expired. Sign in and pass --token or set {ENV_ACCESS_TOKEN}.");
        }
        Some(ErrorPresentation::NotFoundPanel { message, .. }) => eprintln!("Not found: {message}"),
        Some(ErrorPresentation::FailurePanel { message, .. }) => {
            eprintln!("{message}. Please try again.");
        }
        Some(ErrorPresentation::Inline { message }) => eprintln!("{message}"),
        None => eprintln!("Error: {err:#}"),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let api_config = ApiConfig {
        deployment: ApiConfig::from_env().deployment,
        ..ApiConfig::new(&cli.api_url)
    };

    let store = match cli.token.as_deref() {
        Some(token) => SessionStore::with_session(Session::from_token(token)),
        None => SessionStore::new(),
    };
    let api = ApiClient::new(api_config, Arc::new(store)).context("Failed to build HTTP client")?;
    let service = DashboardService::new(Arc::new(api), Arc::new(QueryCache::default()));
    let json = cli.json;

    tracing::debug!(api_url = %service.api().config().base_url, "CLI starting");

    match cli.command {
        Command::Stats => {
            let stats = service.dashboard_stats().await?;
            if json {
                return print_json(&stats);
            }
            for tile in views::stat_tiles(&stats) {
                println!("{:<16} {}", tile.title, tile.value);
            }
            let slices = views::status_breakdown(&stats.projects_by_status);
            println!("\nProjects by Status");
            if slices.is_empty() {
                println!("  No projects yet");
            }
            for slice in slices {
                println!("  {:<12} {:>4}  {:>5.1}%", slice.label, slice.count, slice.percentage);
            }
            if !stats.recent_projects.is_empty() {
                println!("\nRecent Projects");
                for p in &stats.recent_projects {
                    println!(
                        "  {:<38} {:<24} {:<8} {:<12} {:>3}%",
                        p.id,
                        p.client_name.as_deref().unwrap_or("-"),
                        p.financial_year.as_deref().unwrap_or("-"),
                        p.status.label(),
                        p.pipeline_progress
                    );
                }
            }
        }
        Command::Me => {
            let me = service.me().await?;
            if json {
                return print_json(&me);
            }
            println!("{} <{}>", me.full_name, me.email);
            println!("{} at {}", me.role, me.firm_name);
        }
        Command::Clients(cmd) => clients(&service, cmd, json).await?,
        Command::Projects(cmd) => projects(&service, cmd, json).await?,
        Command::Process { project } => {
            let ack = service.start_pipeline(&project).await?;
            let notice = TabNavigator::new().pipeline_started();
            print_ack(&notice.message, &ack);
        }
        Command::Retry { project } => {
            let ack = service.retry_pipeline(&project).await?;
            let notice = TabNavigator::new().pipeline_retrying();
            print_ack(&notice.message, &ack);
        }
        Command::Resume { project } => {
            let ack = service.resume_pipeline(&project).await?;
            print_ack("Pipeline resumed", &ack);
        }
        Command::Watch { project } => watch(&service, &project).await?,
        Command::Files(cmd) => files(&service, cmd, json).await?,
        Command::Review(cmd) => review(&service, cmd, json).await?,
    }
    Ok(())
}

fn print_ack(headline: &str, ack: &PipelineAck) {
    println!("{headline} ({})", ack.status);
    if let Some(message) = &ack.message {
        println!("{message}");
    }
}

fn canonical_category(label: &str) -> Result<String> {
    match find_category(label) {
        Some(c) => Ok(c.label.to_string()),
        None => bail!("Unknown CMA category {label:?}; see `cma-autofill review categories`"),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn clients(service: &DashboardService, cmd: ClientCommand, json: bool) -> Result<()> {
    match cmd {
        ClientCommand::List {
            search,
            entity_type,
            page,
        } => {
            let params = ClientListParams {
                search,
                entity_type,
                page,
                per_page: None,
            };
            let list = service.clients(&params).await?;
            if json {
                return print_json(&list);
            }
            for c in &list.clients {
                println!(
                    "{:<38} {:<30} {:<15} {}",
                    c.id,
                    c.name,
                    c.entity_type.label(),
                    c.pan.as_deref().unwrap_or("-")
                );
            }
            println!("{} of {} clients", list.clients.len(), list.total);
        }
        ClientCommand::Show { id } => print_json(&service.client(&id).await?)?,
        ClientCommand::Create(args) => {
            let draft = ClientDraft {
                name: args.name,
                entity_type: args.entity_type,
                pan: args.pan,
                gst: args.gst,
                contact_person: args.contact_person,
                email: args.email,
                phone: args.phone,
                address: args.address,
            };
            let payload = validation::validate_client(&draft)?;
            let client = service.create_client(&payload).await?;
            println!("Created client {} ({})", client.name, client.id);
        }
        ClientCommand::Delete { id } => {
            service.delete_client(&id).await?;
            println!("Deleted client {id}");
        }
    }
    Ok(())
}

async fn projects(service: &DashboardService, cmd: ProjectCommand, json: bool) -> Result<()> {
    match cmd {
        ProjectCommand::List {
            search,
            status,
            client,
            page,
        } => {
            let params = ProjectListParams {
                search,
                status,
                client_id: client,
                page,
                per_page: None,
            };
            let list = service.projects(&params).await?;
            if json {
                return print_json(&list);
            }
            for p in &list.projects {
                println!(
                    "{:<38} {:<8} {:<12} {:>3}%",
                    p.id,
                    p.financial_year,
                    p.status.label(),
                    p.pipeline_progress
                );
            }
            println!("{} of {} projects", list.projects.len(), list.total);
        }
        ProjectCommand::Show { id } => {
            let project = service.project(&id).await?;
            if json {
                return print_json(&project);
            }
            let files = service.project_files(&id).await?;
            println!("Project {} (FY {})", project.id, project.financial_year);
            println!("Status: {} {}%", project.status.label(), project.pipeline_progress);
            println!("Files: {}", files.len());
            let action = views::primary_action(project.status, files.len());
            println!("Next: {action:?}");
            if !views::uploads_allowed(project.status) {
                println!("Uploads are locked while the pipeline is {}", project.status.label());
            }
        }
        ProjectCommand::Create {
            client,
            financial_year,
            bank,
            loan_type,
            loan_amount,
        } => {
            let today = chrono::Local::now().date_naive();
            let financial_year = match financial_year {
                Some(fy) => fy,
                None => validation::financial_years(today)[0].clone(),
            };
            let draft = ProjectDraft {
                client_id: client,
                financial_year,
                bank_name: bank,
                loan_type,
                loan_amount,
            };
            let payload = validation::validate_project(&draft)?;
            let project = service.create_project(&payload).await?;
            println!("Created project {} for FY {}", project.id, project.financial_year);
        }
        ProjectCommand::Delete { id } => {
            service.delete_project(&id).await?;
            println!("Deleted project {id}");
        }
    }
    Ok(())
}

async fn watch(service: &DashboardService, project_id: &str) -> Result<()> {
    let mut nav = TabNavigator::new();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let poller = service.watch_progress(project_id, move |event| {
        let _ = tx.send(event);
    });

    loop {
        let event = tokio::select! {
            event = rx.recv() => event,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(event) = event else { break };

        match event {
            PollEvent::FetchFailed(e) => eprintln!("Progress unavailable: {}", e.message()),
            PollEvent::Progress { progress, steps } => {
                println!(
                    "{:>3}% {:<12} {}",
                    progress.pipeline_progress,
                    progress.status.label(),
                    render_stepper(&steps)
                );
                let pending = if progress.status == PipelineStatus::Reviewing {
                    service
                        .review_queue(&ReviewListParams::pending_for(project_id))
                        .await
                        .map(|r| r.total)
                        .unwrap_or(0)
                } else {
                    0
                };
                let notice =
                    nav.observe(progress.status, pending, progress.error_message.as_deref());
                if let Some(notice) = &notice {
                    let prefix = match notice.level {
                        NoticeLevel::Success => "✓",
                        NoticeLevel::Warning => "!",
                        NoticeLevel::Error => "✗",
                    };
                    println!("{prefix} {}", notice.message);
                }
                if progress.status == PipelineStatus::Draft {
                    println!("Pipeline has not been started. Run `cma-autofill process {project_id}`.");
                    break;
                }
                if progress.status.is_terminal() {
                    if notice.is_none() {
                        println!("Pipeline is {}; see the {} tab", progress.status.label(), nav.active().as_str());
                    }
                    break;
                }
            }
        }
    }
    poller.stop().await;
    Ok(())
}

async fn files(service: &DashboardService, cmd: FileCommand, json: bool) -> Result<()> {
    match cmd {
        FileCommand::List { project } => {
            let files = service.project_files(&project).await?;
            if json {
                return print_json(&files);
            }
            for f in &files {
                println!("{:<38} {:<40} {:>10} bytes", f.id, f.filename, f.file_size);
            }
        }
        FileCommand::Upload { project, paths } => {
            let status = service.project(&project).await?.status;
            if !views::uploads_allowed(status) {
                bail!("Files can't be changed while the pipeline is {}", status.label());
            }
            let uploaded = service.upload_files(&project, &paths).await?;
            println!("Uploaded {} file(s)", uploaded.len());
        }
        FileCommand::Delete { project, file } => {
            service.delete_file(&project, &file).await?;
            println!("Deleted file {file}");
        }
        FileCommand::Download { project, out } => {
            let dir = out.unwrap_or_else(config::download_dir);
            let saved = service.download_workbook(&project, &dir).await?;
            println!("Saved {}", saved.display());
        }
    }
    Ok(())
}

async fn review(service: &DashboardService, cmd: ReviewCommand, json: bool) -> Result<()> {
    match cmd {
        ReviewCommand::List { project, status } => {
            let params = ReviewListParams {
                project_id: project,
                status: Some(status),
                ..Default::default()
            };
            let page = service.review_queue(&params).await?;
            if json {
                return print_json(&page);
            }
            for item in &page.items {
                println!(
                    "{:<38} {:<40} → {:<30} {:>3}% {:<6} ({})",
                    item.id,
                    item.source_item_name,
                    item.suggested_category,
                    views::confidence_percent(item.confidence),
                    views::confidence_level(item.confidence).as_str(),
                    item.classification_source
                );
            }
            println!("{} item(s)", page.total);
        }
        ReviewCommand::Resolve {
            id,
            category,
            subcategory,
        } => {
            let payload = ReviewResolvePayload {
                resolved_category: canonical_category(&category)?,
                resolved_subcategory: subcategory,
            };
            let item = service.resolve_review(&id, &payload).await?;
            println!("Resolved {} as {}", item.source_item_name, payload.resolved_category);
        }
        ReviewCommand::BulkResolve {
            category,
            subcategory,
            ids,
        } => {
            let payload = BulkResolvePayload {
                review_ids: ids,
                resolved_category: canonical_category(&category)?,
                resolved_subcategory: subcategory,
            };
            let result = service.bulk_resolve_reviews(&payload).await?;
            println!("Resolved {} item(s)", result.resolved_count);
        }
        ReviewCommand::ApproveAll => {
            let result = service.approve_all_reviews().await?;
            println!("Approved {} item(s)", result.approved_count);
        }
        ReviewCommand::Categories => {
            for group in ["Income", "Expenses", "Assets", "Liabilities", "Other"] {
                println!("{group}");
                for c in categories_in_group(group) {
                    println!("  {:>4}  {}", c.row, c.label);
                }
            }
        }
        ReviewCommand::CmaRows { entity_type } => {
            let rows = service.cma_rows(entity_type).await?;
            if json {
                return print_json(&rows);
            }
            for (sheet, rows) in &rows {
                println!("{sheet}");
                for row in rows {
                    println!("  {:>4}  {}", row.row, row.label);
                }
            }
        }
    }
    Ok(())
}
