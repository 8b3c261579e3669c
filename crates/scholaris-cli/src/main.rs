//! Scholaris CLI - tutoring knowledge base and campaign targeting

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use scholaris_core::config::Config;
use scholaris_core::domain::campaign::{CampaignStore, PopupService, Visitor, is_eligible};
use scholaris_core::domain::knowledge::{
    KnowledgeCategory, KnowledgeFilter, KnowledgeIndexer, KnowledgeOrder, KnowledgeRetriever,
    KnowledgeStore, KnowledgeUpdate, NewKnowledgeEntry, RetrievalScope,
};
use scholaris_core::domain::student::{StudentContext, StudentContextAssembler};
use scholaris_core::domain::tutor::{
    ChatRepository, GenerationSettings, Intent, ResponseGenerator, TutorReply, TutorService,
};
use scholaris_core::infrastructure::{Dataset, InMemoryStore};
use scholaris_core::llm::LlmClient;
use scholaris_core::storage::{Database, DatabaseConfig};
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Parser)]
#[command(name = "scholaris")]
#[command(author, version, about = "Tutoring knowledge base and campaign targeting", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Knowledge base and chat history database (defaults to the config directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// JSON dataset with students, courses, grades and campaigns
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Retrieve the knowledge most relevant to a query
    Search {
        query: String,
        /// Restrict to a course (global entries are always included)
        #[arg(short, long)]
        course: Option<String>,
        /// Restrict to a category
        #[arg(long, value_parser = parse_category)]
        category: Option<KnowledgeCategory>,
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },

    /// Show the context the tutor assembles for a student
    Context {
        student: String,
        #[arg(short, long)]
        course: Option<String>,
    },

    /// Ask the tutor a question on behalf of a student
    Ask {
        student: String,
        message: String,
        #[arg(short, long)]
        course: Option<String>,
        /// general, exam_prep, homework, study_plan, progress or motivation
        #[arg(short, long, value_parser = parse_intent, default_value = "general")]
        intent: Intent,
    },

    /// Show a student's conversation with the tutor
    History {
        student: String,
        #[arg(short, long)]
        course: Option<String>,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Check whether a visitor matches a campaign's targeting rules
    Eligible {
        campaign: String,
        #[command(flatten)]
        visitor: VisitorArgs,
    },

    /// Decide whether a visitor sees a campaign popup
    Popup {
        campaign: String,
        #[command(flatten)]
        visitor: VisitorArgs,
    },

    /// Manage the knowledge base
    Knowledge {
        #[command(subcommand)]
        action: KnowledgeAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run health check
    Doctor,
}

#[derive(clap::Args)]
struct VisitorArgs {
    #[arg(long)]
    customer: Option<String>,
    #[arg(long)]
    lead: Option<String>,
    /// Site domain the visitor is browsing
    #[arg(long)]
    domain: Option<String>,
}

impl VisitorArgs {
    fn into_visitor(self) -> Visitor {
        Visitor {
            customer_id: self.customer,
            lead_id: self.lead,
            domain: self.domain,
        }
    }
}

#[derive(Subcommand)]
enum KnowledgeAction {
    /// Import entries from a JSON array file
    Import { file: PathBuf },
    /// List entries, most used first
    List {
        #[arg(short, long)]
        course: Option<String>,
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
        /// Include deactivated entries
        #[arg(long)]
        all: bool,
    },
    /// Edit an entry; its embedding is recomputed when the text changes
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        relevance: Option<f32>,
        #[arg(long, conflicts_with = "activate")]
        deactivate: bool,
        #[arg(long)]
        activate: bool,
    },
    /// Compute embeddings for entries that have none
    Reindex,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

fn parse_intent(s: &str) -> Result<Intent, String> {
    Intent::parse(s).ok_or_else(|| format!("unknown intent '{}'", s))
}

fn parse_category(s: &str) -> Result<KnowledgeCategory, String> {
    KnowledgeCategory::parse(s).ok_or_else(|| {
        let known: Vec<&str> = KnowledgeCategory::all().iter().map(|c| c.as_str()).collect();
        format!("unknown category '{}' (expected one of: {})", s, known.join(", "))
    })
}

/// Shared handles built once per invocation
struct App {
    config: Config,
    db_path: Option<PathBuf>,
    data_path: Option<PathBuf>,
    format: OutputFormat,
    quiet: bool,
}

impl App {
    async fn database(&self) -> anyhow::Result<Database> {
        let config = match &self.db_path {
            Some(path) => DatabaseConfig::with_path(path),
            None => DatabaseConfig::default(),
        };
        debug!(path = %config.path.display(), "Opening database");
        Database::new(config).await
    }

    fn records(&self) -> anyhow::Result<Arc<InMemoryStore>> {
        match &self.data_path {
            Some(path) => {
                let dataset = Dataset::load(path).map_err(|e| {
                    anyhow::anyhow!("Failed to load dataset {}: {}", path.display(), e)
                })?;
                Ok(Arc::new(InMemoryStore::from_dataset(dataset)))
            }
            None => {
                warn!("No --data file given, student and campaign records are empty");
                Ok(Arc::new(InMemoryStore::new()))
            }
        }
    }

    fn client(&self) -> anyhow::Result<Arc<LlmClient>> {
        Ok(Arc::new(LlmClient::from_config(&self.config)?))
    }

    fn retriever(&self, db: &Database, client: Arc<LlmClient>) -> KnowledgeRetriever {
        KnowledgeRetriever::new(Arc::new(db.knowledge_store()), client).with_embedding_timeout(Duration::from_secs(
            self.config.embedding.timeout_secs,
        ))
    }

    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce(&T)) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Text => text(value),
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("scholaris=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let command = match cli.command {
        Commands::Config { action } => return cmd_config(action, cli.quiet),
        command => command,
    };

    let app = App {
        config: Config::load()?,
        db_path: cli.db,
        data_path: cli.data,
        format: cli.format,
        quiet: cli.quiet,
    };

    match command {
        Commands::Search {
            query,
            course,
            category,
            limit,
        } => cmd_search(&app, &query, RetrievalScope { course_id: course, category }, limit).await,

        Commands::Context { student, course } => {
            cmd_context(&app, &student, course.as_deref()).await
        }

        Commands::Ask {
            student,
            message,
            course,
            intent,
        } => cmd_ask(&app, &student, course.as_deref(), intent, &message).await,

        Commands::History {
            student,
            course,
            limit,
        } => cmd_history(&app, &student, course.as_deref(), limit).await,

        Commands::Eligible { campaign, visitor } => {
            cmd_eligible(&app, &campaign, visitor.into_visitor()).await
        }

        Commands::Popup { campaign, visitor } => {
            cmd_popup(&app, &campaign, visitor.into_visitor()).await
        }

        Commands::Knowledge { action } => cmd_knowledge(&app, action).await,

        Commands::Doctor => cmd_doctor(&app).await,

        Commands::Config { .. } => Ok(()),
    }
}

/// Attach the error's fix-it hint, if it has one
fn with_hint(e: scholaris_core::Error) -> anyhow::Error {
    match e.suggestion() {
        Some(hint) => anyhow::anyhow!("{} [{}]\n  Try: {}", e, e.code(), hint),
        None => anyhow::anyhow!("{} [{}]", e, e.code()),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_search(
    app: &App,
    query: &str,
    scope: RetrievalScope,
    limit: usize,
) -> anyhow::Result<()> {
    let db = app.database().await?;
    let retriever = app.retriever(&db, app.client()?);

    let outcome = retriever.retrieve(query, &scope, limit).await.map_err(with_hint)?;
    if let Some(reason) = outcome.fallback_reason() {
        if !app.quiet && app.format == OutputFormat::Text {
            eprintln!("Note: semantic search unavailable ({}), showing most-used entries", reason);
        }
    }
    let result = outcome.into_result().map_err(with_hint)?;

    app.emit(&result, |result| {
        if result.is_empty() {
            if !app.quiet {
                println!("No knowledge found.");
            }
            return;
        }
        for (i, item) in result.items.iter().enumerate() {
            println!(
                "{}. {} ({}) score {:.3}",
                i + 1,
                item.title,
                item.category.as_str(),
                item.score
            );
            println!("   id: {}", item.knowledge_id);
        }
    })
}

fn print_context(context: &StudentContext) {
    println!("Student: {} ({})", context.student_name, context.student_id);
    match context.overall_average {
        Some(avg) => println!("  Overall average: {:.1}% over {} exams", avg, context.total_exams),
        None => println!("  Overall average: no grades yet"),
    }
    if !context.has_courses() {
        println!("  No course enrollments.");
    }
    for course in &context.courses {
        println!();
        println!("  {} [{}] - {}", course.course_name, course.course_id, course.status);
        if let Some(avg) = course.average_grade {
            println!("    Average: {:.1}%", avg);
        }
        for grade in &course.grades {
            let pct = grade
                .percentage
                .map(|p| format!("{}%", p))
                .unwrap_or_else(|| "n/a".to_string());
            println!(
                "    - {} ({}): {}/{} = {}",
                grade.exam_name, grade.exam_type, grade.score, grade.max_score, pct
            );
        }
        if !course.weak_areas.is_empty() {
            println!("    Weak areas: {}", course.weak_areas.join(", "));
        }
    }
}

async fn cmd_context(app: &App, student: &str, course: Option<&str>) -> anyhow::Result<()> {
    let records = app.records()?;
    let assembler = StudentContextAssembler::new(records.clone(), records.clone(), records);
    let context = assembler.assemble(student, course).await.map_err(with_hint)?;
    app.emit(&context, print_context)
}

async fn cmd_ask(
    app: &App,
    student: &str,
    course: Option<&str>,
    intent: Intent,
    message: &str,
) -> anyhow::Result<()> {
    let db = app.database().await?;
    let records = app.records()?;
    let client = app.client()?;

    let retriever = Arc::new(app.retriever(&db, client.clone()));
    let assembler = Arc::new(StudentContextAssembler::new(
        records.clone(),
        records.clone(),
        records,
    ));
    let generator = ResponseGenerator::new(retriever, assembler, client)
        .with_settings(GenerationSettings::from_config(&app.config.tutor));
    let service = TutorService::new(generator, Arc::new(db.chat_repository()));

    let reply = service
        .ask(student, course, intent, message)
        .await
        .map_err(with_hint)?;

    app.emit(&reply, |reply: &TutorReply| {
        println!("{}", reply.text);
        if app.quiet {
            return;
        }
        if !reply.sources.is_empty() {
            println!();
            println!("Sources:");
            for source in &reply.sources {
                println!("  - {} ({:.3})", source.title, source.score);
            }
        }
        if let Some(code) = reply.error_code {
            eprintln!("[{}] outcome: {}", code, reply.outcome);
        }
    })
}

async fn cmd_history(
    app: &App,
    student: &str,
    course: Option<&str>,
    limit: usize,
) -> anyhow::Result<()> {
    let db = app.database().await?;
    let messages = db
        .chat_repository()
        .history(student, course, limit)
        .await
        .map_err(with_hint)?;

    app.emit(&messages, |messages| {
        if messages.is_empty() {
            if !app.quiet {
                println!("No messages yet.");
            }
            return;
        }
        for message in messages {
            println!(
                "[{}] {}: {}",
                message.created_at.format("%Y-%m-%d %H:%M"),
                message.role.as_str(),
                message.text
            );
        }
    })
}

#[derive(Serialize)]
struct EligibilityReport<'a> {
    campaign_id: &'a str,
    eligible: bool,
}

async fn cmd_eligible(app: &App, campaign_id: &str, visitor: Visitor) -> anyhow::Result<()> {
    let records = app.records()?;
    let targeting = records
        .find_targeting_rules(campaign_id)
        .await
        .map_err(with_hint)?
        .ok_or_else(|| with_hint(scholaris_core::Error::CampaignNotFound(campaign_id.into())))?;

    let eligible = is_eligible(&targeting, &visitor, records.as_ref())
        .await
        .map_err(with_hint)?;

    let report = EligibilityReport {
        campaign_id,
        eligible,
    };
    app.emit(&report, |report| {
        if report.eligible {
            println!("Visitor is eligible for campaign {}", report.campaign_id);
        } else {
            println!("Visitor is not eligible for campaign {}", report.campaign_id);
        }
    })
}

async fn cmd_popup(app: &App, campaign_id: &str, visitor: Visitor) -> anyhow::Result<()> {
    let records = app.records()?;
    let service = PopupService::new(records.clone(), records);
    let decision = service
        .resolve(campaign_id, &visitor, Utc::now())
        .await
        .map_err(with_hint)?;

    app.emit(&decision, |decision| match &decision.popup {
        Some(popup) => {
            println!("Show popup: {}", popup.title);
            println!("  {}", popup.message);
            if let (Some(label), Some(url)) = (&popup.cta_label, &popup.cta_url) {
                println!("  [{}] -> {}", label, url);
            }
        }
        None => println!("No popup ({:?})", decision.reason),
    })
}

fn read_entries(file: &Path) -> anyhow::Result<Vec<NewKnowledgeEntry>> {
    let content = std::fs::read_to_string(file)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", file.display(), e))?;
    serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Invalid knowledge file {}: {}", file.display(), e))
}

#[derive(Serialize)]
struct EntryRow {
    id: String,
    title: String,
    category: KnowledgeCategory,
    course_id: Option<String>,
    usage_count: u64,
    embedded: bool,
    is_active: bool,
}

async fn cmd_knowledge(app: &App, action: KnowledgeAction) -> anyhow::Result<()> {
    let db = app.database().await?;
    let store = Arc::new(db.knowledge_store());

    match action {
        KnowledgeAction::Import { file } => {
            let entries = read_entries(&file)?;
            let indexer = KnowledgeIndexer::new(store.clone(), app.client()?);

            let mut created = Vec::with_capacity(entries.len());
            for input in entries {
                let entry = indexer.create(input).await.map_err(with_hint)?;
                created.push(entry.id);
            }
            let total = store.count().await.map_err(with_hint)?;

            app.emit(&created, |created| {
                if !app.quiet {
                    println!("Imported {} entries ({} total).", created.len(), total);
                }
            })?;
        }
        KnowledgeAction::List { course, limit, all } => {
            let mut filter = KnowledgeFilter::new(limit).with_course(course);
            if all {
                filter = filter.including_inactive();
            }
            let entries = store
                .find(&filter, KnowledgeOrder::MostUsed)
                .await
                .map_err(with_hint)?;
            let rows: Vec<EntryRow> = entries
                .into_iter()
                .map(|e| EntryRow {
                    embedded: e.has_embedding(),
                    id: e.id,
                    title: e.title,
                    category: e.category,
                    course_id: e.course_id,
                    usage_count: e.usage_count,
                    is_active: e.is_active,
                })
                .collect();

            app.emit(&rows, |rows| {
                if rows.is_empty() {
                    if !app.quiet {
                        println!("No knowledge entries.");
                        println!("\nImport some with: scholaris knowledge import <file.json>");
                    }
                    return;
                }
                for row in rows {
                    let mut flags = Vec::new();
                    if !row.embedded {
                        flags.push("no embedding");
                    }
                    if !row.is_active {
                        flags.push("inactive");
                    }
                    let flags = if flags.is_empty() {
                        String::new()
                    } else {
                        format!(" [{}]", flags.join(", "))
                    };
                    println!(
                        "  {} - {} ({}, {}, used {}){}",
                        row.id,
                        row.title,
                        row.category.as_str(),
                        row.course_id.as_deref().unwrap_or("global"),
                        row.usage_count,
                        flags
                    );
                }
            })?;
        }
        KnowledgeAction::Update {
            id,
            title,
            content,
            relevance,
            deactivate,
            activate,
        } => {
            let update = KnowledgeUpdate {
                title,
                content,
                relevance_score: relevance,
                is_active: if deactivate {
                    Some(false)
                } else if activate {
                    Some(true)
                } else {
                    None
                },
                ..Default::default()
            };
            let indexer = KnowledgeIndexer::new(store, app.client()?);
            let entry = indexer.update(&id, update).await.map_err(with_hint)?;

            if !app.quiet {
                println!("Updated '{}'.", entry.title);
                if !entry.has_embedding() {
                    println!("  Embedding missing; run `scholaris knowledge reindex` once a key is set.");
                }
            }
        }
        KnowledgeAction::Reindex => {
            let indexer = KnowledgeIndexer::new(store, app.client()?);
            let indexed = indexer.reindex_missing().await.map_err(with_hint)?;
            if !app.quiet {
                println!("Indexed {} entries.", indexed);
            }
        }
    }
    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            println!("{}", config.get(&key)?);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            for (key, value) in Config::load()?.list()? {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            println!("{}", Config::config_path()?.display());
        }
    }
    Ok(())
}

async fn cmd_doctor(app: &App) -> anyhow::Result<()> {
    let quiet = app.quiet;
    if !quiet {
        println!("Scholaris Health Check");
        println!("======================");
        println!();
    }

    let mut all_ok = true;

    match app.config.llm.resolved_api_key() {
        Ok(Some(_)) => {
            if !quiet {
                let redacted = app.config.llm.redacted_api_key()?.unwrap_or_default();
                println!("[OK] API Key: Configured ({})", redacted);
            }
        }
        Ok(None) => {
            all_ok = false;
            if !quiet {
                println!("[!!] API Key: Not configured (search falls back to most-used entries)");
                println!("     Set SCHOLARIS_API_KEY or OPENAI_API_KEY environment variable");
            }
        }
        Err(e) => {
            all_ok = false;
            if !quiet {
                println!("[!!] API Key: Error - {}", e);
            }
        }
    }

    if !quiet {
        println!(
            "[--] Models: chat {}, embedding {}",
            app.config.llm.model, app.config.embedding.model
        );
        match Config::config_path() {
            Ok(path) if path.exists() => println!("[OK] Config file: {}", path.display()),
            Ok(path) => println!("[--] Config file: {} (using defaults)", path.display()),
            Err(e) => println!("[!!] Config file: Error - {}", e),
        }
    }

    match app.database().await {
        Ok(db) => match db.health_check().await {
            Ok(()) => {
                if !quiet {
                    println!("[OK] Database: Connected");
                    println!("     Path: {}", db.path().display());
                    match db.migration_status().await {
                        Ok(status) if status.needs_migration => println!(
                            "[!!] Database: Migrations pending (v{} -> v{})",
                            status.current_version, status.target_version
                        ),
                        Ok(status) => println!("[OK] Database: Schema v{}", status.current_version),
                        Err(e) => println!("[!!] Database: Migration check failed - {}", e),
                    }
                    match db.stats().await {
                        Ok(stats) => println!(
                            "     Knowledge entries: {} ({} embedded), chat messages: {}",
                            stats.knowledge_entries, stats.embedded_entries, stats.chat_messages
                        ),
                        Err(e) => println!("     Stats unavailable - {}", e),
                    }
                }
            }
            Err(e) => {
                all_ok = false;
                if !quiet {
                    println!("[!!] Database: Health check failed - {}", e);
                }
            }
        },
        Err(e) => {
            all_ok = false;
            if !quiet {
                println!("[!!] Database: Failed to initialize - {}", e);
            }
        }
    }

    if let Some(path) = &app.data_path {
        match Dataset::load(path) {
            Ok(dataset) => {
                if !quiet {
                    println!(
                        "[OK] Dataset: {} students, {} courses, {} campaigns",
                        dataset.students.len(),
                        dataset.courses.len(),
                        dataset.campaigns.len()
                    );
                }
            }
            Err(e) => {
                all_ok = false;
                if !quiet {
                    println!("[!!] Dataset: {} - {}", path.display(), e);
                }
            }
        }
    }

    if !quiet {
        println!();
        if all_ok {
            println!("All checks passed!");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }

    Ok(())
}
