//! CasePilot terminal client.
//!
//! Uploads requirement documents for test-case extraction and walks a tester
//! through the generated cases one at a time.

use anyhow::Context as _;
use casepilot::api::{CaseBackend, HttpBackend};
use casepilot::config::{get_config_file_path, load_config, Theme};
use casepilot::context::AppContext;
use casepilot::events::{AppEvent, AppEventPayload, EventBus, EventReceiver, NoticeLevel};
use casepilot::logging::{init_logging, log_info, read_component_logs};
use casepilot::review::{CaseReviewSession, ReviewAction, ReviewState};
use casepilot::shutdown::ShutdownCoordinator;
use casepilot::upload_queue::{DocumentFile, StatusPresentation};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const HELP: &str = "\
Commands:
  projects                 list projects
  use <name>               switch the active project
  new-project <name>       create a project and switch to it
  upload <path>...         queue documents (max 5 at once)
  upload-now <path>        upload one document immediately
  queue                    show the upload queue
  remove <id>              remove a queued item (id prefix is enough)
  modules                  list modules of the active project
  stats                    show project statistics
  open <module>            start reviewing a module
  retest <module>          reset a module's results and run it again
  export [path]            save all cases of the project as CSV
  theme [dark|light]       show or change the stored theme
  logs [component]         recent log entries (app, upload-queue, review, sync, events)
  help                     this text
  quit                     exit

While reviewing: p = pass, f = fail, s = skip (retest), esc = back.
In the defect prompt, type the description or :cancel.";

#[derive(Parser)]
#[command(name = "casepilot")]
#[command(about = "Document-driven manual test case runner")]
#[command(version)]
struct Cli {
    /// Backend base URL (overrides the stored setting)
    #[arg(long, env = "CASEPILOT_SERVER_URL")]
    server_url: Option<String>,

    /// Project to start in (overrides the stored selection)
    #[arg(short, long)]
    project: Option<String>,
}

enum View {
    Dashboard,
    Review(CaseReviewSession),
}

struct Repl {
    context: Arc<AppContext>,
    view: View,
    events: EventReceiver,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let mut config = load_config().context("loading ~/.casepilot/config.json")?;
    if let Some(server_url) = cli.server_url {
        config.server_url = server_url;
    }
    if let Some(project) = cli.project {
        config.active_project = Some(project);
    }

    log_info("app", &format!("CasePilot v{} using {}", env!("CARGO_PKG_VERSION"), config.server_url))
        .unwrap_or_default();

    let backend: Arc<dyn CaseBackend> = Arc::new(HttpBackend::new(&config.server_url)?);
    let events = EventBus::default();
    let shutdown = ShutdownCoordinator::new();
    let context = Arc::new(AppContext::new(
        config,
        get_config_file_path()?,
        backend,
        events.clone(),
    ));

    let printer = spawn_notice_printer(&events, &shutdown);
    let sync_handle = context.sync().start(&shutdown);

    println!("CasePilot {} (type 'help')", env!("CARGO_PKG_VERSION"));
    match context.load_projects().await {
        Ok(projects) if projects.is_empty() => {
            println!("No projects yet. Create one with: new-project <name>");
        }
        Ok(_) => {
            if let Some(project) = context.active_project() {
                println!("Active project: {}", project);
            }
        }
        Err(e) => println!("⚠ Could not load projects: {}", e),
    }

    let mut repl = Repl {
        events: events.subscribe(),
        context,
        view: View::Dashboard,
    };
    repl.run().await?;

    shutdown.shutdown();
    let _ = tokio::join!(printer, sync_handle);
    Ok(())
}

/// Prints toasts and error dialogs as they are published.
fn spawn_notice_printer(events: &EventBus, shutdown: &ShutdownCoordinator) -> JoinHandle<()> {
    let mut rx = events.subscribe();
    let mut shutdown_rx = shutdown.subscribe();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Ok(event) => print_notice(&event),
                        Err(broadcast::error::RecvError::Closed) => break,
                        Err(broadcast::error::RecvError::Lagged(_)) => {}
                    }
                }
                _ = shutdown_rx.recv() => break,
            }
        }
    })
}

fn print_notice(event: &AppEvent) {
    match &event.payload {
        AppEventPayload::Notice { level, message } => {
            let marker = match level {
                NoticeLevel::Success => "✔",
                NoticeLevel::Info => "ℹ",
                NoticeLevel::Warning => "⚠",
                NoticeLevel::Error => "✖",
            };
            println!("{} {}", marker, message);
        }
        AppEventPayload::ErrorNotice { title, message } => {
            println!("✖ {}: {}", title, message);
        }
        _ => {}
    }
}

impl Repl {
    async fn run(&mut self) -> anyhow::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    if !self.handle_line(line.trim()).await {
                        break;
                    }
                }
                result = self.events.recv() => {
                    if let Ok(event) = result {
                        self.handle_event(&event);
                    }
                }
            }
        }

        Ok(())
    }

    fn handle_event(&mut self, event: &AppEvent) {
        if event.payload == AppEventPayload::ReturnToModules {
            if let View::Review(session) = &self.view {
                // Finished sessions return after their completion notice
                if matches!(session.state(), ReviewState::Finished | ReviewState::Idle) {
                    self.view = View::Dashboard;
                    println!("Back to modules.");
                }
            }
        }
    }

    /// Returns false to quit.
    async fn handle_line(&mut self, line: &str) -> bool {
        if let View::Review(session) = &mut self.view {
            let state = if session.state() == ReviewState::AwaitingDefect {
                if line == ":cancel" {
                    session.cancel_defect()
                } else {
                    session.submit_defect(line).await
                }
            } else {
                session.handle_key(line).await
            };
            print_review(session, state);
            if state == ReviewState::Idle && session.module().is_none() {
                self.view = View::Dashboard;
            }
            return true;
        }

        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        match command {
            "" => {}
            "help" => println!("{}", HELP),
            "quit" | "exit" => return false,
            "projects" => self.list_projects().await,
            "use" => {
                if let Err(e) = self.context.switch_project(rest) {
                    println!("✖ {}", e);
                }
            }
            "new-project" => {
                // Failures are shown by the notice printer
                let _ = self.context.create_project(rest).await;
            }
            "upload" => self.enqueue(rest),
            "upload-now" => self.upload_now(rest),
            "queue" => self.show_queue(),
            "remove" => self.remove(rest),
            "modules" => self.show_modules().await,
            "stats" => self.show_stats().await,
            "open" => self.open_module(rest).await,
            "retest" => {
                let _ = self.context.review_session().retest_module(rest).await;
            }
            "export" => self.export(rest).await,
            "theme" => self.theme(rest),
            "logs" => show_logs(if rest.is_empty() { "app" } else { rest }),
            other => println!("Unknown command '{}'. Type 'help'.", other),
        }

        true
    }

    async fn list_projects(&self) {
        match self.context.load_projects().await {
            Ok(projects) => {
                let active = self.context.active_project();
                for project in projects {
                    let marker = if active.as_deref() == Some(project.name.as_str()) {
                        "*"
                    } else {
                        " "
                    };
                    println!("{} {}", marker, project.name);
                }
            }
            Err(e) => println!("✖ {}", e),
        }
    }

    fn enqueue(&self, args: &str) {
        let mut files = Vec::new();
        for raw in args.split_whitespace() {
            match expand(raw).and_then(|path| Ok(DocumentFile::from_path(&path)?)) {
                Ok(file) => files.push(file),
                Err(e) => println!("✖ {}: {}", raw, e),
            }
        }
        if files.is_empty() {
            return;
        }

        if let Ok(outcome) = self.context.upload_queue().enqueue(files) {
            println!("Queued {} file(s).", outcome.accepted.len());
        }
    }

    fn upload_now(&self, arg: &str) {
        let file = match expand(arg).and_then(|path| Ok(DocumentFile::from_path(&path)?)) {
            Ok(file) => file,
            Err(e) => {
                println!("✖ {}", e);
                return;
            }
        };

        println!("Uploading {}...", file.file_name);
        let single = self.context.single_upload().clone();
        tokio::spawn(async move {
            // Outcome is reported through the event bus
            let _ = single.upload(file).await;
        });
    }

    fn show_queue(&self) {
        let items = self.context.upload_queue().snapshot();
        if items.is_empty() {
            println!("Upload queue is empty.");
            return;
        }

        for item in items {
            let status = StatusPresentation::for_phase(item.phase);
            let filled = usize::from(status.progress) / 10;
            println!(
                "{}  {:<32} [{}{}] {:>3}%  {}",
                &item.id.to_string()[..8],
                item.file.file_name,
                "#".repeat(filled),
                "-".repeat(10 - filled),
                status.progress,
                status.label
            );
            if let Some(error) = &item.error {
                println!("          {}", error);
            }
        }
    }

    fn remove(&self, prefix: &str) {
        if prefix.is_empty() {
            println!("Usage: remove <id>");
            return;
        }

        let matches: Vec<_> = self
            .context
            .upload_queue()
            .snapshot()
            .into_iter()
            .filter(|item| item.id.to_string().starts_with(prefix))
            .collect();

        match matches.as_slice() {
            [item] => match self.context.upload_queue().remove_item(item.id) {
                Ok(()) => println!("Removed {}.", item.file.file_name),
                Err(e) => println!("✖ {}", e),
            },
            [] => println!("No queued item matches '{}'.", prefix),
            _ => println!("'{}' matches several items; use a longer id.", prefix),
        }
    }

    async fn show_modules(&self) {
        match self.context.sync().refresh().await {
            Ok(snapshot) if snapshot.project.is_none() => println!("No active project."),
            Ok(snapshot) if snapshot.modules.is_empty() => {
                println!("No modules yet. Upload a document to get started.");
            }
            Ok(snapshot) => {
                for module in snapshot.modules {
                    let marker = if module.is_complete() { "✔" } else { " " };
                    println!(
                        "{} {:<32} {:>4}/{:<4} {:>5.1}%",
                        marker, module.name, module.passed, module.total, module.progress
                    );
                }
            }
            Err(e) => println!("✖ {}", e),
        }
    }

    async fn show_stats(&self) {
        match self.context.sync().refresh().await {
            Ok(snapshot) => {
                let stats = snapshot.stats;
                println!(
                    "cases: {}  passed: {}  failed: {}  pending: {}  modules: {}",
                    stats.total_cases, stats.passed, stats.failed, stats.pending, stats.modules
                );
            }
            Err(e) => println!("✖ {}", e),
        }
    }

    async fn export(&self, arg: &str) {
        // Without a project the path is never used; export_csv reports it
        let path = if arg.is_empty() {
            let project = self.context.active_project().unwrap_or_default();
            Ok(PathBuf::from(AppContext::default_export_file_name(&project)))
        } else {
            expand(arg)
        };

        match path {
            // Success and failure are reported through the event bus
            Ok(path) => {
                let _ = self.context.export_csv(&path).await;
            }
            Err(e) => println!("✖ {}", e),
        }
    }

    fn theme(&self, arg: &str) {
        if arg.is_empty() {
            println!("Theme: {}", self.context.config().theme.as_str());
            return;
        }

        match arg.parse::<Theme>().and_then(|theme| self.context.set_theme(theme)) {
            Ok(()) => println!("Theme set to {}.", self.context.config().theme.as_str()),
            Err(e) => println!("✖ {}", e),
        }
    }

    async fn open_module(&mut self, name: &str) {
        if name.is_empty() {
            println!("Usage: open <module>");
            return;
        }

        let mut session = self.context.review_session();
        let state = session.open_module(name).await;
        print_review(&session, state);
        if matches!(state, ReviewState::Presenting | ReviewState::Finished) {
            self.view = View::Review(session);
        }
    }
}

fn print_review(session: &CaseReviewSession, state: ReviewState) {
    match state {
        ReviewState::Presenting => {
            let Some(case) = session.current_case() else {
                return;
            };
            let mode = if case.is_retest { "  [RETEST]" } else { "" };
            println!();
            println!("── {} {}{}", session.module().unwrap_or_default(), case.id, mode);
            println!("Steps:\n{}", case.parsed.steps);
            println!("Expected result:\n{}", case.parsed.expected_result);

            let hints: Vec<&str> = session
                .available_actions()
                .iter()
                .map(|action| match action {
                    ReviewAction::Pass if case.is_retest => "[p] pass (fixed)",
                    ReviewAction::Pass => "[p] pass",
                    ReviewAction::Fail => "[f] failed",
                    ReviewAction::Skip => "[s] skip",
                    ReviewAction::Exit => "[esc] back",
                })
                .collect();
            println!("{}", hints.join("  "));
        }
        ReviewState::AwaitingDefect => {
            println!("🐛 Describe the defect (or :cancel):");
        }
        _ => {}
    }
}

fn show_logs(component: &str) {
    match read_component_logs(component, Some(20)) {
        Ok(entries) if entries.is_empty() => println!("No log entries for {}.", component),
        Ok(entries) => {
            for entry in entries.iter().rev() {
                println!("{} {:<5} {}", entry.timestamp, entry.level, entry.message);
            }
        }
        Err(e) => println!("✖ {}", e),
    }
}

fn expand(raw: &str) -> anyhow::Result<PathBuf> {
    let expanded = shellexpand::full(raw).with_context(|| format!("expanding {}", raw))?;
    Ok(PathBuf::from(expanded.as_ref()))
}
